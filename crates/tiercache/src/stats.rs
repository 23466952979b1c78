//! Resolver statistics tracking

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-resolver counters, one per resolution outcome
#[derive(Debug, Default)]
pub struct ResolverStats {
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    fetches: AtomicU64,
    fetch_failures: AtomicU64,
    disk_failures: AtomicU64,
    coalesced: AtomicU64,
}

impl ResolverStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a retrieval answered from memory
    pub fn record_memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a retrieval answered from disk
    pub fn record_disk_hit(&self) {
        self.disk_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a network fetch being started
    pub fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed network fetch
    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a disk read or write that failed
    pub fn record_disk_failure(&self) {
        self.disk_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a caller that joined an in-flight resolution
    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total memory hits
    pub fn memory_hits(&self) -> u64 {
        self.memory_hits.load(Ordering::Relaxed)
    }

    /// Get total disk hits
    pub fn disk_hits(&self) -> u64 {
        self.disk_hits.load(Ordering::Relaxed)
    }

    /// Get total fetches started
    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Get total failed fetches
    pub fn fetch_failures(&self) -> u64 {
        self.fetch_failures.load(Ordering::Relaxed)
    }

    /// Get total disk failures
    pub fn disk_failures(&self) -> u64 {
        self.disk_failures.load(Ordering::Relaxed)
    }

    /// Get total callers that shared another caller's resolution
    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }

    /// Fraction of resolutions that avoided the network (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.memory_hits() + self.disk_hits();
        let total = hits + self.fetches();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Reset all statistics
    pub fn reset(&self) {
        self.memory_hits.store(0, Ordering::Relaxed);
        self.disk_hits.store(0, Ordering::Relaxed);
        self.fetches.store(0, Ordering::Relaxed);
        self.fetch_failures.store(0, Ordering::Relaxed);
        self.disk_failures.store(0, Ordering::Relaxed);
        self.coalesced.store(0, Ordering::Relaxed);
    }
}
