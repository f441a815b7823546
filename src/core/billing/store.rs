use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};

use crate::core::models::cost::Summary;

/// Owner of the current cost snapshot.
///
/// `publish` swaps the whole snapshot atomically; `read` hands out the
/// immutable `Arc` so a reader that started before a publish keeps the full
/// old snapshot, never a partial mix. The lock is held only for the pointer
/// swap or clone, never across I/O.
pub struct SummaryStore {
    inner: RwLock<Arc<Summary>>,
}

impl SummaryStore {
    pub fn new(initial: DateTime<Utc>) -> Self {
        Self {
            inner: RwLock::new(Arc::new(Summary::empty(initial))),
        }
    }

    /// Replace the current snapshot with a freshly built one.
    pub fn publish(&self, summary: Summary) {
        let mut guard = self.inner.write().expect("summary store lock poisoned");
        *guard = Arc::new(summary);
    }

    /// The current snapshot. Callers hold it as long as they like without
    /// blocking refreshes.
    pub fn read(&self) -> Arc<Summary> {
        self.inner.read().expect("summary store lock poisoned").clone()
    }
}
