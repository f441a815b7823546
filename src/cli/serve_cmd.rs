use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cli::output::OutputOptions;
use crate::core::billing::scheduler::{Collator, SystemClock};
use crate::core::billing::state::GenerationGuard;
use crate::core::billing::store::SummaryStore;
use crate::core::config::{AppConfig, FileConfigSource};
use crate::core::events::jsonl::JsonlEventLog;
use crate::core::reports::json::JsonReportWriter;

/// Build the collator and run the synchronous first refresh.
///
/// An unreadable config or a missing event log is fatal: a service that
/// cannot see downtime data would silently bill everyone at full uptime.
/// Validation issues are not — a misconfigured member/service pair is
/// skipped during refresh and must never keep the rest of the network
/// from being billed.
fn startup(config_path: &Path) -> Result<(Arc<Collator>, AppConfig)> {
    let config = AppConfig::load(config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    for issue in config.validate() {
        warn!(%issue, "config issue; the affected pair will be skipped");
    }

    let events = JsonlEventLog::open(&config.settings.event_log).with_context(|| {
        format!(
            "failed to open event log {}",
            config.settings.event_log.display()
        )
    })?;

    let collator = Arc::new(Collator::new(
        Arc::new(SummaryStore::new(Utc::now())),
        Arc::new(FileConfigSource::new(config_path.to_path_buf())),
        Arc::new(events),
        Arc::new(JsonReportWriter::new(config.settings.out_dir.clone())),
        GenerationGuard::load(&config.settings.out_dir.join("generation-state.json")),
        Arc::new(SystemClock),
        config.settings.sla_threshold,
    ));

    // First refresh is synchronous: the service never serves an empty
    // snapshot once startup returns.
    collator
        .refresh()
        .context("initial billing refresh failed")?;

    Ok((collator, config))
}

/// Start the long-running collator and block until Ctrl-C.
pub async fn run(config_path: &Path, _opts: &OutputOptions) -> Result<()> {
    let (collator, config) = startup(config_path)?;
    collator.catch_up();

    let handles = collator.spawn_loops();
    info!(
        config = %config_path.display(),
        out_dir = %config.settings.out_dir.display(),
        "collator running; press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");
    for handle in handles {
        handle.abort();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_fixture(dir: &tempfile::TempDir, mutate: impl FnOnce(&mut AppConfig)) -> std::path::PathBuf {
        let mut config = AppConfig::sample();
        config.settings.event_log = dir.path().join("events.jsonl");
        config.settings.out_dir = dir.path().join("reports");
        mutate(&mut config);
        let path = dir.path().join("geobill.toml");
        config.save(&path).unwrap();
        path
    }

    #[test]
    fn starts_despite_unknown_service_assignment() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir, |config| {
            config
                .members
                .get_mut("metanodes")
                .unwrap()
                .assignments
                .insert("extra".into(), vec!["no-such-service".into()]);
        });
        std::fs::write(dir.path().join("events.jsonl"), "").unwrap();

        let (collator, _) = startup(&path).unwrap();
        // the valid assignment is billed, the bad one is skipped
        let snapshot = collator.store().read();
        assert!(snapshot.members.contains_key("metanodes"));
        assert_eq!(snapshot.members["metanodes"].service_costs.len(), 1);
    }

    #[test]
    fn starts_despite_unpriced_region() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir, |config| {
            let mut member = config.members["metanodes"].clone();
            member.region = "atlantis".into();
            config.members.insert("lostnodes".into(), member);
        });
        std::fs::write(dir.path().join("events.jsonl"), "").unwrap();

        let (collator, _) = startup(&path).unwrap();
        let snapshot = collator.store().read();
        assert!(snapshot.members.contains_key("metanodes"));
        assert!(!snapshot.members.contains_key("lostnodes"));
    }

    #[test]
    fn missing_event_log_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir, |_| {});
        // no events.jsonl written
        assert!(startup(&path).is_err());
    }

    #[test]
    fn unreadable_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geobill.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        assert!(startup(&path).is_err());
    }
}
