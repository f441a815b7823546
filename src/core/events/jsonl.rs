use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use super::{EventLog, EventLogError};
use crate::core::models::event::{CheckScope, DowntimeEvent};

/// One line of the on-disk event log. The collector appends these as checks
/// open and close outages; `scope` may still carry the legacy numeric
/// encoding, which is normalized during parsing.
#[derive(Deserialize)]
struct JsonlEvent {
    member: String,
    scope: String,
    #[serde(default)]
    domain: Option<String>,
    start: DateTime<Utc>,
    #[serde(default)]
    end: Option<DateTime<Utc>>,
}

/// File-backed event log: one JSON event per line.
#[derive(Debug)]
pub struct JsonlEventLog {
    path: PathBuf,
}

impl JsonlEventLog {
    /// Open the log, failing fast if the file does not exist. A missing
    /// event store at startup is fatal; running with empty data would
    /// silently report 100% uptime for everyone.
    pub fn open(path: &Path) -> Result<Self, EventLogError> {
        if !path.is_file() {
            return Err(EventLogError::NotFound(path.display().to_string()));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl EventLog for JsonlEventLog {
    fn member_events(
        &self,
        member: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DowntimeEvent>, EventLogError> {
        let file = std::fs::File::open(&self.path)?;
        let reader = std::io::BufReader::new(file);

        let mut events = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            // cheap pre-filter before full JSON parsing
            if !line.contains(member) {
                continue;
            }

            let raw: JsonlEvent = serde_json::from_str(line)
                .map_err(|source| EventLogError::Malformed { line: idx + 1, source })?;

            if raw.member != member {
                continue;
            }

            let Some(scope) = CheckScope::parse(&raw.scope) else {
                tracing::warn!(line = idx + 1, scope = %raw.scope, "unknown check scope, event ignored");
                continue;
            };

            let event = DowntimeEvent {
                scope,
                domain: raw.domain.map(|d| d.trim().to_lowercase()),
                start: raw.start,
                end: raw.end,
            };
            if event.overlaps(start, end) {
                events.push(event);
            }
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap(),
        )
    }

    fn write_log(lines: &[&str]) -> (tempfile::TempDir, JsonlEventLog) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut f = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(f, "{line}").unwrap();
        }
        drop(f);
        let log = JsonlEventLog::open(&path).unwrap();
        (dir, log)
    }

    #[test]
    fn open_missing_file_is_an_error() {
        let err = JsonlEventLog::open(Path::new("/nonexistent/events.jsonl")).unwrap_err();
        assert!(matches!(err, EventLogError::NotFound(_)));
    }

    #[test]
    fn filters_by_member_and_window() {
        let (_dir, log) = write_log(&[
            r#"{"member":"metanodes","scope":"site","start":"2026-03-02T10:00:00Z","end":"2026-03-02T11:00:00Z"}"#,
            r#"{"member":"polkadotters","scope":"site","start":"2026-03-02T10:00:00Z","end":"2026-03-02T11:00:00Z"}"#,
            r#"{"member":"metanodes","scope":"site","start":"2026-01-01T00:00:00Z","end":"2026-01-02T00:00:00Z"}"#,
        ]);
        let (start, end) = window();
        let events = log.member_events("metanodes", start, end).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].scope, CheckScope::Site);
    }

    #[test]
    fn open_events_are_returned() {
        let (_dir, log) = write_log(&[
            r#"{"member":"metanodes","scope":"endpoint","domain":"RPC.Example.Net","start":"2026-03-20T00:00:00Z"}"#,
        ]);
        let (start, end) = window();
        let events = log.member_events("metanodes", start, end).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].end.is_none());
        // domain normalized at the boundary
        assert_eq!(events[0].domain.as_deref(), Some("rpc.example.net"));
    }

    #[test]
    fn legacy_numeric_scope_is_normalized() {
        let (_dir, log) = write_log(&[
            r#"{"member":"metanodes","scope":"1","start":"2026-03-02T00:00:00Z","end":"2026-03-02T01:00:00Z"}"#,
            r#"{"member":"metanodes","scope":"3","domain":"rpc.example.net","start":"2026-03-02T00:00:00Z","end":"2026-03-02T01:00:00Z"}"#,
        ]);
        let (start, end) = window();
        let events = log.member_events("metanodes", start, end).unwrap();
        assert_eq!(events[0].scope, CheckScope::Site);
        assert_eq!(events[1].scope, CheckScope::Endpoint);
    }

    #[test]
    fn unknown_scope_skipped_not_fatal() {
        let (_dir, log) = write_log(&[
            r#"{"member":"metanodes","scope":"9","start":"2026-03-02T00:00:00Z","end":"2026-03-02T01:00:00Z"}"#,
            r#"{"member":"metanodes","scope":"site","start":"2026-03-02T00:00:00Z","end":"2026-03-02T01:00:00Z"}"#,
        ]);
        let (start, end) = window();
        let events = log.member_events("metanodes", start, end).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn malformed_line_is_an_error() {
        let (_dir, log) = write_log(&[r#"{"member":"metanodes","scope":"site""#]);
        let (start, end) = window();
        let err = log.member_events("metanodes", start, end).unwrap_err();
        assert!(matches!(err, EventLogError::Malformed { line: 1, .. }));
    }

    #[test]
    fn blank_lines_ignored() {
        let (_dir, log) = write_log(&[
            "",
            r#"{"member":"metanodes","scope":"site","start":"2026-03-02T00:00:00Z","end":"2026-03-02T01:00:00Z"}"#,
            "   ",
        ]);
        let (start, end) = window();
        assert_eq!(log.member_events("metanodes", start, end).unwrap().len(), 1);
    }
}
