//! Per-orchestrator counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub(crate) struct CacheStats {
    memory_hits: AtomicU64,
    shared_hits: AtomicU64,
    misses: AtomicU64,
    loader_failures: AtomicU64,
    shared_unavailable: AtomicU64,
    shared_write_failures: AtomicU64,
}

impl CacheStats {
    pub(crate) fn record_memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_shared_hit(&self) {
        self.shared_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_loader_failure(&self) {
        self.loader_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_shared_unavailable(&self) {
        self.shared_unavailable.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_shared_write_failure(&self) {
        self.shared_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            shared_hits: self.shared_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loader_failures: self.loader_failures.load(Ordering::Relaxed),
            shared_unavailable: self.shared_unavailable.load(Ordering::Relaxed),
            shared_write_failures: self.shared_write_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the orchestrator's counters.
///
/// `misses` counts loader invocations, successful or not. A rising
/// `shared_unavailable` means degraded caching, not degraded correctness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatsSnapshot {
    pub memory_hits: u64,
    pub shared_hits: u64,
    pub misses: u64,
    pub loader_failures: u64,
    pub shared_unavailable: u64,
    pub shared_write_failures: u64,
}

impl CacheStatsSnapshot {
    pub fn requests(&self) -> u64 {
        self.memory_hits + self.shared_hits + self.misses
    }

    /// Fraction of requests served without calling the loader.
    pub fn hit_ratio(&self) -> f64 {
        match self.requests() {
            0 => 0.0,
            total => (self.memory_hits + self.shared_hits) as f64 / total as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_ratio() {
        let stats = CacheStats::default();
        assert_eq!(stats.snapshot().hit_ratio(), 0.0);

        stats.record_memory_hit();
        stats.record_shared_hit();
        stats.record_miss();
        stats.record_memory_hit();

        let snap = stats.snapshot();
        assert_eq!(snap.requests(), 4);
        assert_eq!(snap.hit_ratio(), 0.75);
    }
}
