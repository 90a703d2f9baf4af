use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    datasets_committed: AtomicU64,
    datasets_unchanged: AtomicU64,
    datasets_failed: AtomicU64,
    rows_appended: AtomicU64,
    bytes_uploaded: AtomicU64,
    retry_count: AtomicU64,
}

/// Run-wide counters shared by every sync unit.
#[derive(Debug, Clone)]
pub struct SyncMetrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub datasets_committed: u64,
    pub datasets_unchanged: u64,
    pub datasets_failed: u64,
    pub rows_appended: u64,
    pub bytes_uploaded: u64,
    pub retry_count: u64,
}

impl SyncMetrics {
    pub fn new() -> Self {
        SyncMetrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn increment_committed(&self) {
        self.inner.datasets_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_unchanged(&self) {
        self.inner.datasets_unchanged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failures(&self) {
        self.inner.datasets_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rows(&self, count: u64) {
        self.inner.rows_appended.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_bytes(&self, count: u64) {
        self.inner.bytes_uploaded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_retries(&self, count: u64) {
        self.inner.retry_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            datasets_committed: self.inner.datasets_committed.load(Ordering::Relaxed),
            datasets_unchanged: self.inner.datasets_unchanged.load(Ordering::Relaxed),
            datasets_failed: self.inner.datasets_failed.load(Ordering::Relaxed),
            rows_appended: self.inner.rows_appended.load(Ordering::Relaxed),
            bytes_uploaded: self.inner.bytes_uploaded.load(Ordering::Relaxed),
            retry_count: self.inner.retry_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}
