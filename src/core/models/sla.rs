use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Availability of a single <member, service> pair over one billing month.
///
/// Derived on demand from the event log; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaBreakdown {
    pub hours_total: f64,
    pub hours_down: f64,
    pub hours_up: f64,
    /// 0–100 percentage
    pub uptime_percent: f64,
    /// SLA threshold in percentage (e.g. 99.99)
    pub threshold: f64,
    /// The threshold expressed in hours of required uptime.
    pub sla_hours: f64,
    pub meets_sla: bool,
}

/// member → service → breakdown.
pub type SlaSummary = BTreeMap<String, BTreeMap<String, SlaBreakdown>>;
