use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cost breakdown that one member incurs across its assigned services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberCost {
    pub member: String,
    /// serviceName → $ cost
    pub service_costs: BTreeMap<String, f64>,
    pub total: f64,
}

/// The transposed view: what one service costs across all members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCost {
    pub service: String,
    /// memberID → $ cost
    pub member_costs: BTreeMap<String, f64>,
    pub total: f64,
}

/// Both cost perspectives, published together as one immutable snapshot.
///
/// A new `Summary` fully replaces the old one in the store; nothing mutates
/// a published snapshot. BTreeMap keys keep report and log output ordering
/// reproducible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub members: BTreeMap<String, MemberCost>,
    pub services: BTreeMap<String, ServiceCost>,
    pub refreshed_at: DateTime<Utc>,
}

impl Summary {
    pub fn empty(refreshed_at: DateTime<Utc>) -> Self {
        Self {
            members: BTreeMap::new(),
            services: BTreeMap::new(),
            refreshed_at,
        }
    }

    /// Grand total across all member/service pairs.
    pub fn grand_total(&self) -> f64 {
        self.members.values().map(|m| m.total).sum()
    }
}
