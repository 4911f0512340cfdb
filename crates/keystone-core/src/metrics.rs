use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::models::MetricsSnapshot;

/// Counters shared between a queue and whoever reports on it. Construct one
/// per queue (or per test) and pass it in; nothing here is process-global.
#[derive(Debug)]
pub struct QueueMetrics {
    pushed_memory: AtomicU64,
    spilled_disk: AtomicU64,
    popped: AtomicU64,
    rejected_capacity: AtomicU64,
    rejected_duplicate: AtomicU64,
    persistence_failures: AtomicU64,
    requeued: AtomicU64,
    dead_lettered: AtomicU64,
    started_at: Instant,
}

impl Default for QueueMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pushed_memory: AtomicU64::new(0),
            spilled_disk: AtomicU64::new(0),
            popped: AtomicU64::new(0),
            rejected_capacity: AtomicU64::new(0),
            rejected_duplicate: AtomicU64::new(0),
            persistence_failures: AtomicU64::new(0),
            requeued: AtomicU64::new(0),
            dead_lettered: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub(crate) fn inc_pushed_memory(&self) {
        self.pushed_memory.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_spilled_disk(&self) {
        self.spilled_disk.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_popped(&self, count: u64) {
        self.popped.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn inc_rejected_capacity(&self) {
        self.rejected_capacity.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_rejected_duplicate(&self) {
        self.rejected_duplicate.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_persistence_failures(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_requeued(&self) {
        self.requeued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_dead_lettered(&self) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pushed_memory: self.pushed_memory.load(Ordering::Relaxed),
            spilled_disk: self.spilled_disk.load(Ordering::Relaxed),
            popped: self.popped.load(Ordering::Relaxed),
            rejected_capacity: self.rejected_capacity.load(Ordering::Relaxed),
            rejected_duplicate: self.rejected_duplicate.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}
