use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{ReportError, ReportRenderer};
use crate::core::billing::sla::billed_amount;
use crate::core::models::cost::Summary;
use crate::core::models::sla::{SlaBreakdown, SlaSummary};

/// Writes report artifacts as pretty-printed JSON under `out_dir`, monthly
/// artifacts in a `YYYY-MM` subdirectory. All maps are BTreeMaps, so
/// identical inputs produce byte-identical files.
pub struct JsonReportWriter {
    out_dir: PathBuf,
}

#[derive(Serialize)]
struct MemberStatement<'a> {
    member: &'a str,
    month: String,
    services: BTreeMap<&'a str, ServiceLine<'a>>,
    base_total: f64,
    billed_total: f64,
    credit_total: f64,
}

#[derive(Serialize)]
struct ServiceLine<'a> {
    base_cost: f64,
    billed: f64,
    credit: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    sla: Option<&'a SlaBreakdown>,
}

#[derive(Serialize)]
struct Overview<'a> {
    month: String,
    summary: &'a Summary,
    sla: &'a SlaSummary,
    grand_total: f64,
}

impl JsonReportWriter {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }

    fn month_dir(&self, month: NaiveDate) -> PathBuf {
        self.out_dir.join(month.format("%Y-%m").to_string())
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<PathBuf, ReportError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ReportError::Write {
                path: path.display().to_string(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(value)?;
        std::fs::write(path, json).map_err(|source| ReportError::Write {
            path: path.display().to_string(),
            source,
        })?;
        Ok(path.to_path_buf())
    }
}

impl ReportRenderer for JsonReportWriter {
    fn write_daily(&self, summary: &Summary) -> Result<PathBuf, ReportError> {
        let path = self.out_dir.join("service-costs.json");
        self.write_json(&path, summary)
    }

    fn write_overview(
        &self,
        summary: &Summary,
        sla: &SlaSummary,
        month: NaiveDate,
    ) -> Result<PathBuf, ReportError> {
        let overview = Overview {
            month: month.format("%Y-%m").to_string(),
            summary,
            sla,
            grand_total: summary.grand_total(),
        };
        let path = self.month_dir(month).join("overview.json");
        self.write_json(&path, &overview)
    }

    fn write_member(
        &self,
        member: &str,
        summary: &Summary,
        sla: &SlaSummary,
        month: NaiveDate,
    ) -> Result<PathBuf, ReportError> {
        let empty = BTreeMap::new();
        let member_sla = sla.get(member).unwrap_or(&empty);
        let mut services = BTreeMap::new();
        let mut base_total = 0.0;
        let mut billed_total = 0.0;

        if let Some(mc) = summary.members.get(member) {
            for (service, base_cost) in &mc.service_costs {
                let breakdown = member_sla.get(service);
                let billed = match breakdown {
                    Some(b) => billed_amount(*base_cost, b.uptime_percent),
                    None => *base_cost,
                };
                base_total += base_cost;
                billed_total += billed;
                services.insert(
                    service.as_str(),
                    ServiceLine {
                        base_cost: *base_cost,
                        billed,
                        credit: base_cost - billed,
                        sla: breakdown,
                    },
                );
            }
        }

        let statement = MemberStatement {
            member,
            month: month.format("%Y-%m").to_string(),
            services,
            base_total,
            billed_total,
            credit_total: base_total - billed_total,
        };
        let path = self.month_dir(month).join(format!("{member}.json"));
        self.write_json(&path, &statement)
    }
}
