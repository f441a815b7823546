pub mod json;

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::models::cost::Summary;
use crate::core::models::sla::SlaSummary;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write report {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Sink for finished report artifacts. Paths and formatting are the
/// renderer's concern; the engine only decides when to call it and with
/// which finished data.
pub trait ReportRenderer: Send + Sync {
    /// The rolling service-cost artifact, overwritten every day.
    fn write_daily(&self, summary: &Summary) -> Result<PathBuf, ReportError>;

    /// The month's overview artifact: full cost cross-index plus SLA table.
    fn write_overview(
        &self,
        summary: &Summary,
        sla: &SlaSummary,
        month: NaiveDate,
    ) -> Result<PathBuf, ReportError>;

    /// One statement artifact for a single billed member.
    fn write_member(
        &self,
        member: &str,
        summary: &Summary,
        sla: &SlaSummary,
        month: NaiveDate,
    ) -> Result<PathBuf, ReportError>;
}
