use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use std::path::Path;
use std::sync::Arc;

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::renderer;
use crate::core::billing::scheduler::{Collator, MonthlyOutcome, SystemClock};
use crate::core::billing::state::GenerationGuard;
use crate::core::billing::store::SummaryStore;
use crate::core::billing::{cost, sla};
use crate::core::config::{AppConfig, FileConfigSource};
use crate::core::events::jsonl::JsonlEventLog;
use crate::core::reports::json::JsonReportWriter;

/// One-shot cost refresh: read config, build the cross-index, print it.
pub fn refresh(config_path: &Path, opts: &OutputOptions) -> Result<()> {
    let config = load_config(config_path)?;
    let summary = cost::build_summary(&config.network(), Utc::now());

    match opts.format {
        OutputFormat::Json => print_json(&summary, opts)?,
        OutputFormat::Text => {
            println!("{}", renderer::render_summary(&summary, opts.use_color));
        }
    }
    Ok(())
}

/// Evaluate SLAs for one billing month and print the table.
pub fn sla_report(config_path: &Path, month_raw: Option<&str>, opts: &OutputOptions) -> Result<()> {
    let config = load_config(config_path)?;
    let now = Utc::now();
    let month = resolve_month(month_raw, now)?;

    let network = config.network();
    let summary = cost::build_summary(&network, now);
    let events = JsonlEventLog::open(&config.settings.event_log).with_context(|| {
        format!(
            "failed to open event log {}",
            config.settings.event_log.display()
        )
    })?;
    let table = sla::month_breakdown(
        &summary,
        &network,
        &events,
        month,
        now,
        config.settings.sla_threshold,
    )?;

    match opts.format {
        OutputFormat::Json => print_json(&table, opts)?,
        OutputFormat::Text => {
            let label = month.format("%Y-%m").to_string();
            println!("{}", renderer::render_sla(&table, &label, opts.use_color));
        }
    }
    Ok(())
}

/// Run report generation for one month on demand, using the same dedup
/// guard as the long-running service.
pub fn generate(config_path: &Path, month_raw: Option<&str>, opts: &OutputOptions) -> Result<()> {
    let config = load_config(config_path)?;
    let now = Utc::now();
    let month = resolve_month(month_raw, now)?;

    let events = JsonlEventLog::open(&config.settings.event_log).with_context(|| {
        format!(
            "failed to open event log {}",
            config.settings.event_log.display()
        )
    })?;
    let guard = GenerationGuard::load(&config.settings.out_dir.join("generation-state.json"));
    let collator = Collator::new(
        Arc::new(SummaryStore::new(now)),
        Arc::new(FileConfigSource::new(config_path.to_path_buf())),
        Arc::new(events),
        Arc::new(JsonReportWriter::new(config.settings.out_dir.clone())),
        guard,
        Arc::new(SystemClock),
        config.settings.sla_threshold,
    );
    collator.refresh()?;

    let outcome = collator.generate_monthly(month)?;
    if opts.is_json() {
        return print_json(
            &generate_payload(&outcome, month, &config.settings.out_dir),
            opts,
        );
    }

    match outcome {
        MonthlyOutcome::Generated { artifacts } => {
            println!(
                "Generated {} artifact{} for {} under {}",
                artifacts,
                if artifacts == 1 { "" } else { "s" },
                month.format("%Y-%m"),
                config.settings.out_dir.display()
            );
        }
        MonthlyOutcome::AlreadyDone => {
            println!(
                "Reports for {} already generated; remove {} to force a rerun.",
                month.format("%Y-%m"),
                config
                    .settings
                    .out_dir
                    .join("generation-state.json")
                    .display()
            );
        }
        MonthlyOutcome::InProgress => {
            println!("A generation run for {} is already in progress.", month.format("%Y-%m"));
        }
    }
    Ok(())
}

fn generate_payload(
    outcome: &MonthlyOutcome,
    month: NaiveDate,
    out_dir: &Path,
) -> serde_json::Value {
    let label = month.format("%Y-%m").to_string();
    match outcome {
        MonthlyOutcome::Generated { artifacts } => serde_json::json!({
            "month": label,
            "status": "generated",
            "artifacts": artifacts,
            "out_dir": out_dir.display().to_string(),
        }),
        MonthlyOutcome::AlreadyDone => serde_json::json!({
            "month": label,
            "status": "already_done",
        }),
        MonthlyOutcome::InProgress => serde_json::json!({
            "month": label,
            "status": "in_progress",
        }),
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))
}

/// Explicit `YYYY-MM` if given, otherwise the previous calendar month.
fn resolve_month(raw: Option<&str>, now: chrono::DateTime<Utc>) -> Result<NaiveDate> {
    match raw {
        Some(raw) => Ok(sla::parse_month(raw)?),
        None => Ok(sla::month_floor(now, 1)),
    }
}

fn print_json<T: serde::Serialize>(value: &T, opts: &OutputOptions) -> Result<()> {
    let rendered = if opts.pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}
