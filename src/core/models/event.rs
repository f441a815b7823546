use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Closed set of availability check scopes.
///
/// Site checks apply to every service a member hosts; domain and endpoint
/// checks apply only to the services whose domains they probe. Legacy feeds
/// encode the scope either textually ("site") or numerically ("1") — both
/// are normalized here, at the ingestion boundary, and never past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckScope {
    Site,
    Domain,
    Endpoint,
}

impl CheckScope {
    /// Parse a raw scope value, accepting legacy numeric encodings.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "site" | "1" => Some(Self::Site),
            "domain" | "2" => Some(Self::Domain),
            "endpoint" | "3" => Some(Self::Endpoint),
            _ => None,
        }
    }

    /// True for scopes that map to a specific service via its domain.
    pub fn is_service_level(&self) -> bool {
        matches!(self, Self::Domain | Self::Endpoint)
    }
}

impl<'de> Deserialize<'de> for CheckScope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        CheckScope::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown check scope: {raw:?}")))
    }
}

/// A raw downtime event for one member, as returned by the event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DowntimeEvent {
    pub scope: CheckScope,
    /// Probed domain for service-level checks; absent for site checks.
    pub domain: Option<String>,
    pub start: DateTime<Utc>,
    /// None means the outage is still open.
    pub end: Option<DateTime<Utc>>,
}

impl DowntimeEvent {
    /// Whether this event overlaps the half-open window `[start, end)`.
    pub fn overlaps(&self, window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> bool {
        self.start < window_end && self.end.map_or(true, |e| e > window_start)
    }
}
