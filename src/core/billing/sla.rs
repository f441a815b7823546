use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

use crate::core::billing::downtime::{self, Interval};
use crate::core::config::NetworkSnapshot;
use crate::core::events::{EventLog, EventLogError};
use crate::core::models::cost::Summary;
use crate::core::models::event::DowntimeEvent;
use crate::core::models::sla::{SlaBreakdown, SlaSummary};

pub const DEFAULT_SLA_THRESHOLD: f64 = 99.99;

#[derive(Error, Debug)]
pub enum SlaError {
    #[error("event log query failed for member {member}: {source}")]
    EventLog {
        member: String,
        source: EventLogError,
    },
    #[error("invalid billing month: {0}")]
    InvalidMonth(String),
}

/// Combine period length and downed hours into an SLA verdict.
///
/// Downtime is capped at the period length (uptime floor is 0%, never
/// negative) and the threshold comparison is inclusive: exactly 99.99%
/// passes a 99.99% SLA.
pub fn evaluate(total_hours: f64, down_hours: f64, threshold: f64) -> SlaBreakdown {
    let down = down_hours.min(total_hours).max(0.0);
    let up = (total_hours - down).max(0.0);
    let uptime_percent = if total_hours > 0.0 {
        up / total_hours * 100.0
    } else {
        100.0
    };
    SlaBreakdown {
        hours_total: total_hours,
        hours_down: down,
        hours_up: up,
        uptime_percent,
        threshold,
        sla_hours: total_hours * (threshold / 100.0),
        meets_sla: uptime_percent >= threshold,
    }
}

/// Billed amount for a pair: base cost scaled by the uptime fraction.
/// The SLA credit is `base - billed`, proportional to downtime, never
/// negative and never above the base cost.
pub fn billed_amount(base_cost: f64, uptime_percent: f64) -> f64 {
    base_cost * uptime_percent / 100.0
}

/// First day of the month `months_back` before the month containing `now`.
pub fn month_floor(now: DateTime<Utc>, months_back: u32) -> NaiveDate {
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1).unwrap();
    first
        .checked_sub_months(Months::new(months_back))
        .unwrap_or(first)
}

/// Half-open UTC bounds of the billing month starting at `month`
/// (which must be a first-of-month date).
pub fn month_bounds(month: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc.from_utc_datetime(&month.and_hms_opt(0, 0, 0).unwrap());
    let next = month.checked_add_months(Months::new(1)).unwrap();
    let end = Utc.from_utc_datetime(&next.and_hms_opt(0, 0, 0).unwrap());
    (start, end)
}

/// Parse a `YYYY-MM` argument into a first-of-month date.
pub fn parse_month(raw: &str) -> Result<NaiveDate, SlaError> {
    let parsed = NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d");
    parsed.map_err(|_| SlaError::InvalidMonth(raw.to_string()))
}

/// Compute the SLA table for every billed (member, service) pair in `summary`
/// over one billing month.
///
/// Site-level outages count against every service of the member; service
/// outages only against services whose domains match. Coincident intervals
/// are merged before summing so overlapping site and endpoint outages are
/// counted once. An event-log failure propagates: the caller gets an error,
/// not a fabricated 100%-uptime table.
pub fn month_breakdown(
    summary: &Summary,
    network: &NetworkSnapshot,
    events: &dyn EventLog,
    month: NaiveDate,
    evaluated_at: DateTime<Utc>,
    threshold: f64,
) -> Result<SlaSummary, SlaError> {
    let (start, end) = month_bounds(month);
    let total_hours = (end - start).num_seconds() as f64 / 3600.0;

    // service → lowercased probe domains, resolved once per run
    let service_domains: BTreeMap<&str, Vec<String>> = network
        .services
        .iter()
        .map(|(name, svc)| {
            let domains = svc
                .domains
                .iter()
                .map(|d| d.trim().to_lowercase())
                .collect();
            (name.as_str(), domains)
        })
        .collect();

    let mut out: SlaSummary = BTreeMap::new();

    for (member_id, member_cost) in &summary.members {
        let raw = events
            .member_events(member_id, start, end)
            .map_err(|source| SlaError::EventLog {
                member: member_id.clone(),
                source,
            })?;

        let (site_events, service_events): (Vec<&DowntimeEvent>, Vec<&DowntimeEvent>) =
            raw.iter().partition(|ev| !ev.scope.is_service_level());

        let per_service = out.entry(member_id.clone()).or_default();

        for service_name in member_cost.service_costs.keys() {
            let domains = service_domains
                .get(service_name.as_str())
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            let relevant: Vec<DowntimeEvent> = site_events
                .iter()
                .copied()
                .chain(service_events.iter().copied().filter(|ev| {
                    ev.domain
                        .as_deref()
                        .is_some_and(|d| domains.iter().any(|sd| sd == d))
                }))
                .cloned()
                .collect();

            let clamped = downtime::clamp_events(&relevant, start, end, evaluated_at);
            let merged: Vec<Interval> = downtime::merge(clamped);
            let down_hours = downtime::total_hours(&merged);

            let breakdown = evaluate(total_hours, down_hours, threshold);
            if breakdown.hours_down > 0.0 {
                info!(
                    member = %member_id,
                    service = %service_name,
                    down_hours = format!("{:.2}", breakdown.hours_down),
                    uptime = format!("{:.4}", breakdown.uptime_percent),
                    "downtime recorded for pair"
                );
            }
            per_service.insert(service_name.clone(), breakdown);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{MemberConfig, ServiceConfig};
    use crate::core::models::cost::MemberCost;
    use crate::core::models::event::CheckScope;
    use chrono::Timelike;

    #[test]
    fn boundary_uptime_meets_sla() {
        let b = evaluate(720.0, 0.072, 99.99);
        assert!((b.uptime_percent - 99.99).abs() < 1e-9);
        assert!(b.meets_sla);
    }

    #[test]
    fn just_below_boundary_fails_sla() {
        let b = evaluate(720.0, 0.08, 99.99);
        assert!((b.uptime_percent - 99.9889).abs() < 1e-4);
        assert!(!b.meets_sla);
    }

    #[test]
    fn downtime_capped_at_period_length() {
        let b = evaluate(720.0, 1000.0, 99.99);
        assert_eq!(b.hours_down, 720.0);
        assert_eq!(b.hours_up, 0.0);
        assert_eq!(b.uptime_percent, 0.0);
        assert!(!b.meets_sla);
    }

    #[test]
    fn zero_period_reports_full_uptime() {
        let b = evaluate(0.0, 0.0, 99.99);
        assert_eq!(b.uptime_percent, 100.0);
        assert!(b.meets_sla);
    }

    #[test]
    fn billed_amount_is_proportional() {
        let billed = billed_amount(500.0, 99.95);
        assert!((billed - 499.75).abs() < 1e-9);
        let credit = 500.0 - billed;
        assert!((credit - 0.25).abs() < 1e-9);
    }

    #[test]
    fn month_bounds_are_half_open() {
        let month = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let (start, end) = month_bounds(month);
        assert_eq!(start.to_rfc3339(), "2026-02-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2026-03-01T00:00:00+00:00");
        // 2026 is not a leap year: February has exactly 672 hours
        assert_eq!((end - start).num_hours(), 28 * 24);
    }

    #[test]
    fn month_floor_previous_month() {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(
            month_floor(now, 1),
            NaiveDate::from_ymd_opt(2025, 12, 1).unwrap()
        );
        assert_eq!(
            month_floor(now, 0),
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
        );
    }

    #[test]
    fn parse_month_accepts_yyyy_mm() {
        assert_eq!(
            parse_month("2026-03").unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
        assert!(parse_month("2026-13").is_err());
        assert!(parse_month("march").is_err());
    }

    // ── month_breakdown over a fake event log ─────────────────────────

    struct FakeLog {
        events: Vec<(String, DowntimeEvent)>,
        fail: bool,
    }

    impl EventLog for FakeLog {
        fn member_events(
            &self,
            member: &str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<DowntimeEvent>, EventLogError> {
            if self.fail {
                return Err(EventLogError::NotFound("gone".into()));
            }
            Ok(self
                .events
                .iter()
                .filter(|(m, ev)| m == member && ev.overlaps(start, end))
                .map(|(_, ev)| ev.clone())
                .collect())
        }
    }

    fn fixture() -> (Summary, NetworkSnapshot) {
        let mut summary = Summary::empty(Utc::now());
        summary.members.insert(
            "metanodes".into(),
            MemberCost {
                member: "metanodes".into(),
                service_costs: BTreeMap::from([
                    ("chain-rpc".into(), 152.0),
                    ("bootnode".into(), 40.0),
                ]),
                total: 192.0,
            },
        );

        let mut network = NetworkSnapshot::default();
        network.services.insert(
            "chain-rpc".into(),
            ServiceConfig {
                active: true,
                level: 3,
                domains: vec!["rpc.example.net".into()],
                resources: Default::default(),
            },
        );
        network.services.insert(
            "bootnode".into(),
            ServiceConfig {
                active: true,
                level: 1,
                domains: vec!["boot.example.net".into()],
                resources: Default::default(),
            },
        );
        network.members.insert(
            "metanodes".into(),
            MemberConfig {
                region: "europe".into(),
                active: true,
                assignments: BTreeMap::new(),
            },
        );
        (summary, network)
    }

    fn march() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn mar(day: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, h, 0, 0).unwrap()
    }

    #[test]
    fn site_outage_hits_all_services() {
        let (summary, network) = fixture();
        let log = FakeLog {
            events: vec![(
                "metanodes".into(),
                DowntimeEvent {
                    scope: CheckScope::Site,
                    domain: None,
                    start: mar(5, 0),
                    end: Some(mar(5, 12)),
                },
            )],
            fail: false,
        };
        let sla =
            month_breakdown(&summary, &network, &log, march(), mar(31, 0), 99.99).unwrap();
        let per = &sla["metanodes"];
        assert!((per["chain-rpc"].hours_down - 12.0).abs() < 1e-9);
        assert!((per["bootnode"].hours_down - 12.0).abs() < 1e-9);
    }

    #[test]
    fn service_outage_hits_only_matching_service() {
        let (summary, network) = fixture();
        let log = FakeLog {
            events: vec![(
                "metanodes".into(),
                DowntimeEvent {
                    scope: CheckScope::Endpoint,
                    domain: Some("rpc.example.net".into()),
                    start: mar(5, 0),
                    end: Some(mar(5, 6)),
                },
            )],
            fail: false,
        };
        let sla =
            month_breakdown(&summary, &network, &log, march(), mar(31, 0), 99.99).unwrap();
        let per = &sla["metanodes"];
        assert!((per["chain-rpc"].hours_down - 6.0).abs() < 1e-9);
        assert_eq!(per["bootnode"].hours_down, 0.0);
        assert!(per["bootnode"].meets_sla);
    }

    #[test]
    fn coincident_site_and_service_outage_counted_once() {
        let (summary, network) = fixture();
        let log = FakeLog {
            events: vec![
                (
                    "metanodes".into(),
                    DowntimeEvent {
                        scope: CheckScope::Site,
                        domain: None,
                        start: mar(5, 10),
                        end: Some(mar(5, 11)),
                    },
                ),
                (
                    "metanodes".into(),
                    DowntimeEvent {
                        scope: CheckScope::Domain,
                        domain: Some("rpc.example.net".into()),
                        start: mar(5, 10).with_minute(30).unwrap(),
                        end: Some(mar(5, 12)),
                    },
                ),
            ],
            fail: false,
        };
        let sla =
            month_breakdown(&summary, &network, &log, march(), mar(31, 0), 99.99).unwrap();
        // merged [10:00, 12:00) = 2.0h, not 2.5h
        assert!((sla["metanodes"]["chain-rpc"].hours_down - 2.0).abs() < 1e-9);
        // bootnode only sees the site hour
        assert!((sla["metanodes"]["bootnode"].hours_down - 1.0).abs() < 1e-9);
    }

    #[test]
    fn event_log_failure_propagates() {
        let (summary, network) = fixture();
        let log = FakeLog {
            events: vec![],
            fail: true,
        };
        let err = month_breakdown(&summary, &network, &log, march(), mar(31, 0), 99.99)
            .unwrap_err();
        assert!(matches!(err, SlaError::EventLog { .. }));
    }

    #[test]
    fn no_events_full_uptime() {
        let (summary, network) = fixture();
        let log = FakeLog {
            events: vec![],
            fail: false,
        };
        let sla =
            month_breakdown(&summary, &network, &log, march(), mar(31, 0), 99.99).unwrap();
        let b = &sla["metanodes"]["chain-rpc"];
        assert_eq!(b.uptime_percent, 100.0);
        assert!(b.meets_sla);
        assert_eq!(b.hours_total, 31.0 * 24.0);
    }
}
