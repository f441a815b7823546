use chrono::{DateTime, Utc};

use crate::core::models::event::DowntimeEvent;

/// A clamped downtime range, half-open: `[start, end)`, `end >= start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn hours(&self) -> f64 {
        (self.end - self.start).num_seconds() as f64 / 3600.0
    }
}

/// Clamp raw events to the evaluation period `[period_start, period_end)`.
///
/// Events outside the period are dropped, open events close at the period
/// end or `evaluated_at`, whichever is earlier, and intervals that collapse
/// to zero length are discarded before merging.
pub fn clamp_events(
    events: &[DowntimeEvent],
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    evaluated_at: DateTime<Utc>,
) -> Vec<Interval> {
    let open_cutoff = period_end.min(evaluated_at);
    events
        .iter()
        .filter(|ev| ev.overlaps(period_start, period_end))
        .filter_map(|ev| {
            let start = ev.start.max(period_start);
            let end = ev.end.unwrap_or(open_cutoff).min(period_end);
            (end > start).then_some(Interval { start, end })
        })
        .collect()
}

/// Merge overlapping or touching intervals so coincident site and service
/// outages are not double-counted. Summing raw durations would overstate
/// downtime whenever a site check and an endpoint check fire together, which
/// is the common case.
pub fn merge(mut intervals: Vec<Interval>) -> Vec<Interval> {
    if intervals.len() <= 1 {
        return intervals;
    }

    intervals.sort_by_key(|iv| iv.start);

    let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
    merged.push(intervals[0]);
    for current in intervals.into_iter().skip(1) {
        let last = merged.last_mut().unwrap();
        // touching counts as overlapping: no gap, so extend
        if current.start <= last.end {
            if current.end > last.end {
                last.end = current.end;
            }
        } else {
            merged.push(current);
        }
    }
    merged
}

/// Total hours covered by a set of (already merged) intervals.
pub fn total_hours(intervals: &[Interval]) -> f64 {
    intervals.iter().map(Interval::hours).sum()
}
