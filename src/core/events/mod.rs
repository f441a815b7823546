pub mod jsonl;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::models::event::DowntimeEvent;

#[derive(Error, Debug)]
pub enum EventLogError {
    #[error("event log not found: {0}")]
    NotFound(String),
    #[error("failed to read event log: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("malformed event at line {line}: {source}")]
    Malformed {
        line: usize,
        source: serde_json::Error,
    },
}

/// Query surface over the stored downtime event log.
///
/// Implementations return the raw events for one member overlapping the
/// half-open window `[start, end)`, open events included. A query failure is
/// an error, never an empty result: callers must be able to tell "zero
/// downtime" apart from "could not determine downtime".
pub trait EventLog: Send + Sync {
    fn member_events(
        &self,
        member: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DowntimeEvent>, EventLogError>;
}
