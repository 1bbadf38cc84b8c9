//! Cache Statistics Module
//!
//! Counts hits, misses, puts and evictions as fire-and-forget events.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Metrics Sink ==
/// Receiver for store access events.
///
/// Implementations must be cheap and must never call back into the cache.
pub trait MetricsSink: Send + Sync + fmt::Debug {
    fn hit(&self);
    fn miss(&self);
    fn put(&self);
    fn evict(&self);
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn hit(&self) {}
    fn miss(&self) {}
    fn put(&self) {}
    fn evict(&self) {}
}

// == Metrics Collector ==
/// Lock-free counters that can be shared by many stores.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
    evictions: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Acquire)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Acquire)
    }

    pub fn puts(&self) -> u64 {
        self.puts.load(Ordering::Acquire)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Acquire)
    }

    // == Snapshot ==
    /// Returns the current counter values.
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits(),
            misses: self.misses(),
            puts: self.puts(),
            evictions: self.evictions(),
        }
    }

    /// Single-line summary for logs.
    pub fn summary(&self) -> String {
        self.snapshot().to_string()
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Release);
        self.misses.store(0, Ordering::Release);
        self.puts.store(0, Ordering::Release);
        self.evictions.store(0, Ordering::Release);
    }
}

impl MetricsSink for MetricsCollector {
    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::AcqRel);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::AcqRel);
    }

    fn put(&self) {
        self.puts.fetch_add(1, Ordering::AcqRel);
    }

    fn evict(&self) {
        self.evictions.fetch_add(1, Ordering::AcqRel);
    }
}

// == Cache Stats ==
/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of inserts and overwrites
    pub puts: u64,
    /// Number of entries dropped by LRU pressure or TTL expiry
    pub evictions: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} misses={} puts={} evictions={}",
            self.hits, self.misses, self.puts, self.evictions
        )
    }
}
