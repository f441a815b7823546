use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

const STATE_VERSION: u64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    version: u64,
    /// First day of the last month whose generation fully succeeded.
    last_generated: Option<NaiveDate>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            last_generated: None,
        }
    }
}

/// Outcome of asking the guard to start a monthly run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    Started,
    AlreadyDone,
    InProgress,
}

struct GuardState {
    last_generated: Option<NaiveDate>,
    in_progress: bool,
}

/// Duplicate-run protection for monthly generation.
///
/// The mutex is held only while flipping flags, never across the slow
/// report-writing work. `last_generated` advances only on a fully
/// successful run and is persisted so the startup catch-up check survives
/// restarts; a failed run leaves the prior state untouched and the month
/// is retried wholesale on the next tick.
pub struct GenerationGuard {
    inner: Mutex<GuardState>,
    path: PathBuf,
}

impl GenerationGuard {
    /// Load persisted state from `path`, or start clean. A mismatched
    /// version clears the file, same as the cost cache.
    pub fn load(path: &Path) -> Self {
        let state = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<StateFile>(&content) {
                Ok(parsed) if parsed.version == STATE_VERSION => parsed,
                Ok(parsed) => {
                    warn!(
                        path = %path.display(),
                        found = parsed.version,
                        expected = STATE_VERSION,
                        "generation state version mismatch, starting clean; the last finished month may rerun"
                    );
                    StateFile::default()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "unreadable generation state, starting clean; the last finished month may rerun"
                    );
                    StateFile::default()
                }
            },
            Err(_) => StateFile::default(),
        };
        Self {
            inner: Mutex::new(GuardState {
                last_generated: state.last_generated,
                in_progress: false,
            }),
            path: path.to_path_buf(),
        }
    }

    pub fn last_generated(&self) -> Option<NaiveDate> {
        self.inner.lock().expect("generation guard poisoned").last_generated
    }

    /// Try to claim the run for `target` (a first-of-month date).
    pub fn try_begin(&self, target: NaiveDate) -> BeginOutcome {
        let mut guard = self.inner.lock().expect("generation guard poisoned");
        if guard.last_generated.is_some_and(|done| done >= target) {
            return BeginOutcome::AlreadyDone;
        }
        if guard.in_progress {
            return BeginOutcome::InProgress;
        }
        guard.in_progress = true;
        BeginOutcome::Started
    }

    /// Record the end of a run started via `try_begin`. Only success
    /// advances `last_generated`; failure keeps the month retriable.
    pub fn finish(&self, target: NaiveDate, success: bool) {
        let snapshot = {
            let mut guard = self.inner.lock().expect("generation guard poisoned");
            guard.in_progress = false;
            if success && guard.last_generated.map_or(true, |done| done < target) {
                guard.last_generated = Some(target);
            }
            guard.last_generated
        };
        if success {
            if let Err(err) = self.save(snapshot) {
                warn!(error = %err, "failed to persist generation state");
            }
        }
    }

    fn save(&self, last_generated: Option<NaiveDate>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let state = StateFile {
            version: STATE_VERSION,
            last_generated,
        };
        let json = serde_json::to_string(&state)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&self.path, json)
    }
}
