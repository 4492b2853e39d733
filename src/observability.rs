//! Process-wide sync counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle shared by the sync service and the local API
#[derive(Debug, Default)]
pub struct Metrics {
    syncs_started: AtomicU64,
    syncs_succeeded: AtomicU64,
    syncs_failed: AtomicU64,
    files_downloaded: AtomicU64,
    files_removed: AtomicU64,
    bytes_downloaded: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync_started(&self) {
        self.syncs_started.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "syncs_started", "Metric incremented");
    }

    pub fn sync_finished(&self, ok: bool) {
        let (counter, name) = if ok {
            (&self.syncs_succeeded, "syncs_succeeded")
        } else {
            (&self.syncs_failed, "syncs_failed")
        };
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = name, "Metric incremented");
    }

    pub fn file_downloaded(&self, bytes: u64) {
        self.files_downloaded.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn files_removed(&self, count: usize) {
        self.files_removed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            syncs_started: self.syncs_started.load(Ordering::Relaxed),
            syncs_succeeded: self.syncs_succeeded.load(Ordering::Relaxed),
            syncs_failed: self.syncs_failed.load(Ordering::Relaxed),
            files_downloaded: self.files_downloaded.load(Ordering::Relaxed),
            files_removed: self.files_removed.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub syncs_started: u64,
    pub syncs_succeeded: u64,
    pub syncs_failed: u64,
    pub files_downloaded: u64,
    pub files_removed: u64,
    pub bytes_downloaded: u64,
}
