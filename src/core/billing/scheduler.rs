use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::core::billing::cost;
use crate::core::billing::sla::{self, SlaError};
use crate::core::billing::state::{BeginOutcome, GenerationGuard};
use crate::core::billing::store::SummaryStore;
use crate::core::config::{ConfigError, ConfigSource};
use crate::core::events::EventLog;
use crate::core::models::cost::Summary;
use crate::core::reports::{ReportError, ReportRenderer};

/// Injectable time source so tests can steer the schedule without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Daily and monthly jobs fire at five past the hour, after the hourly
/// refresh has republished.
const JOB_MINUTE: u32 = 5;

/// Next top-of-hour boundary after `now`. Recomputed from the live clock on
/// every iteration, so a late wake-up never accumulates into drift.
pub fn next_hour(now: DateTime<Utc>) -> DateTime<Utc> {
    let floor = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    floor + Duration::hours(1)
}

/// Next daily trigger (00:05 UTC) after `now`.
pub fn next_daily(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = Utc
        .from_utc_datetime(&now.date_naive().and_hms_opt(0, JOB_MINUTE, 0).unwrap());
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Next monthly trigger (first of month, 00:05 UTC) after `now`.
pub fn next_monthly(now: DateTime<Utc>) -> DateTime<Utc> {
    let this_month = Utc.from_utc_datetime(
        &sla::month_floor(now, 0).and_hms_opt(0, JOB_MINUTE, 0).unwrap(),
    );
    if this_month > now {
        this_month
    } else {
        Utc.from_utc_datetime(
            &sla::month_floor(now, 0)
                .checked_add_months(chrono::Months::new(1))
                .unwrap()
                .and_hms_opt(0, JOB_MINUTE, 0)
                .unwrap(),
        )
    }
}

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sla(#[from] SlaError),
    #[error("{failed} of {total} artifacts failed for {month}")]
    Artifacts {
        month: NaiveDate,
        failed: usize,
        total: usize,
    },
}

/// What a monthly trigger actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthlyOutcome {
    Generated { artifacts: usize },
    AlreadyDone,
    InProgress,
}

/// The collator service object: owns the summary store and the generation
/// guard, and drives all periodic work. Constructed once and shared by
/// reference; no package-level state.
pub struct Collator {
    store: Arc<SummaryStore>,
    config: Arc<dyn ConfigSource>,
    events: Arc<dyn EventLog>,
    renderer: Arc<dyn ReportRenderer>,
    guard: GenerationGuard,
    clock: Arc<dyn Clock>,
    threshold: f64,
}

impl Collator {
    pub fn new(
        store: Arc<SummaryStore>,
        config: Arc<dyn ConfigSource>,
        events: Arc<dyn EventLog>,
        renderer: Arc<dyn ReportRenderer>,
        guard: GenerationGuard,
        clock: Arc<dyn Clock>,
        threshold: f64,
    ) -> Self {
        Self {
            store,
            config,
            events,
            renderer,
            guard,
            clock,
            threshold,
        }
    }

    pub fn store(&self) -> &SummaryStore {
        &self.store
    }

    /// Recompute the cost cross-index from a fresh configuration read and
    /// publish it as the new snapshot.
    pub fn refresh(&self) -> Result<Arc<Summary>, ConfigError> {
        let started = std::time::Instant::now();
        let network = self.config.snapshot()?;
        let summary = cost::build_summary(&network, self.clock.now());
        let members = summary.members.len();
        let services = summary.services.len();
        self.store.publish(summary);
        info!(
            members,
            services,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "billing refresh complete"
        );
        Ok(self.store.read())
    }

    /// Write the rolling service-cost artifact. Stateless and safe to rerun;
    /// each run overwrites the day's output.
    pub fn generate_daily(&self) -> Result<std::path::PathBuf, ReportError> {
        let summary = self.store.read();
        let path = self.renderer.write_daily(&summary)?;
        info!(path = %path.display(), "daily service-cost report written");
        Ok(path)
    }

    /// Run monthly generation for `month` (a first-of-month date), guarded
    /// against duplicate runs. The guard is held only while flipping flags;
    /// the slow artifact writing happens outside it.
    pub fn generate_monthly(&self, month: NaiveDate) -> Result<MonthlyOutcome, GenerateError> {
        match self.guard.try_begin(month) {
            BeginOutcome::AlreadyDone => {
                info!(month = %month.format("%Y-%m"), "monthly report already generated");
                return Ok(MonthlyOutcome::AlreadyDone);
            }
            BeginOutcome::InProgress => {
                info!(month = %month.format("%Y-%m"), "monthly generation already in progress");
                return Ok(MonthlyOutcome::InProgress);
            }
            BeginOutcome::Started => {}
        }

        info!(month = %month.format("%Y-%m"), "starting monthly report generation");
        let result = self.run_generation(month);
        self.guard.finish(month, result.is_ok());
        match &result {
            Ok(artifacts) => {
                info!(
                    month = %month.format("%Y-%m"),
                    artifacts,
                    "monthly report generation completed"
                );
            }
            Err(err) => {
                warn!(
                    month = %month.format("%Y-%m"),
                    error = %err,
                    "monthly generation failed; will retry on next run"
                );
            }
        }
        result.map(|artifacts| MonthlyOutcome::Generated { artifacts })
    }

    fn run_generation(&self, month: NaiveDate) -> Result<usize, GenerateError> {
        let network = self.config.snapshot()?;
        let summary = self.store.read();
        let sla_table = sla::month_breakdown(
            &summary,
            &network,
            self.events.as_ref(),
            month,
            self.clock.now(),
            self.threshold,
        )?;

        let mut violations = 0usize;
        for (member, services) in &sla_table {
            for (service, breakdown) in services {
                if !breakdown.meets_sla {
                    violations += 1;
                    warn!(
                        member = %member,
                        service = %service,
                        uptime = format!("{:.4}", breakdown.uptime_percent),
                        required = breakdown.threshold,
                        down_hours = format!("{:.2}", breakdown.hours_down),
                        "SLA violation"
                    );
                }
            }
        }
        info!(month = %month.format("%Y-%m"), violations, "SLA evaluation complete");

        let total = summary.members.len() + 1;
        let mut failed = 0usize;

        if let Err(err) = self.renderer.write_overview(&summary, &sla_table, month) {
            failed += 1;
            error!(error = %err, "failed to write monthly overview");
        }
        for member in summary.members.keys() {
            if let Err(err) = self.renderer.write_member(member, &summary, &sla_table, month) {
                failed += 1;
                error!(member = %member, error = %err, "failed to write member statement");
            }
        }

        if failed > 0 {
            return Err(GenerateError::Artifacts {
                month,
                failed,
                total,
            });
        }
        Ok(total)
    }

    /// Startup catch-up: if the previous calendar month has no recorded
    /// generation, run it once now, then refresh the daily artifact.
    pub fn catch_up(&self) {
        let previous = sla::month_floor(self.clock.now(), 1);
        let needs_generation = self
            .guard
            .last_generated()
            .map_or(true, |done| done < previous);
        if needs_generation {
            info!(month = %previous.format("%Y-%m"), "generating report for previous month at startup");
            if let Err(err) = self.generate_monthly(previous) {
                error!(error = %err, "startup catch-up generation failed");
            }
        }
        if let Err(err) = self.generate_daily() {
            error!(error = %err, "startup daily report failed");
        }
    }

    /// Spawn the three long-lived scheduler loops. Each job runs to
    /// completion or fails and waits for its next natural tick; failures are
    /// never retried in a tight loop.
    pub fn spawn_loops(self: &Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        let collator = Arc::clone(self);
        handles.push(tokio::spawn(async move {
            loop {
                sleep_until(collator.clock.now(), next_hour(collator.clock.now())).await;
                if let Err(err) = collator.refresh() {
                    error!(error = %err, "scheduled refresh failed");
                }
            }
        }));

        let collator = Arc::clone(self);
        handles.push(tokio::spawn(async move {
            loop {
                sleep_until(collator.clock.now(), next_daily(collator.clock.now())).await;
                if let Err(err) = collator.generate_daily() {
                    error!(error = %err, "scheduled daily report failed");
                }
            }
        }));

        let collator = Arc::clone(self);
        handles.push(tokio::spawn(async move {
            loop {
                let target = next_monthly(collator.clock.now());
                info!(at = %target, "next monthly generation scheduled");
                sleep_until(collator.clock.now(), target).await;
                let month = sla::month_floor(collator.clock.now(), 1);
                if let Err(err) = collator.generate_monthly(month) {
                    error!(error = %err, "scheduled monthly generation failed");
                }
            }
        }));

        handles
    }
}

async fn sleep_until(now: DateTime<Utc>, target: DateTime<Utc>) {
    let wait = (target - now).to_std().unwrap_or_default();
    tokio::time::sleep(wait).await;
}
