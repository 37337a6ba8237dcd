use std::sync::atomic::{AtomicU64, Ordering};

use crate::filter::JanitorStats;

/// Cumulative janitor counters, shared by every scanner a hook creates.
#[derive(Debug, Default)]
pub struct JanitorMetrics {
    invalid: AtomicU64,
    stale: AtomicU64,
    passes: AtomicU64,
    unfiltered_passes: AtomicU64,
}

/// Point-in-time copy of [`JanitorMetrics`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub invalid: u64,
    pub stale: u64,
    /// Passes that ran with transaction state.
    pub passes: u64,
    /// Passes that ran without transaction state and dropped nothing.
    pub unfiltered_passes: u64,
}

impl JanitorMetrics {
    pub fn record_pass(&self, stats: JanitorStats) {
        self.invalid.fetch_add(stats.invalid, Ordering::Relaxed);
        self.stale.fetch_add(stats.stale, Ordering::Relaxed);
        self.passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unfiltered_pass(&self) {
        self.unfiltered_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            invalid: self.invalid.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            passes: self.passes.load(Ordering::Relaxed),
            unfiltered_passes: self.unfiltered_passes.load(Ordering::Relaxed),
        }
    }
}
