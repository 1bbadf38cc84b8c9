//! Cache Module
//!
//! Provides the bounded in-memory store with LRU eviction and lazy TTL
//! expiration, plus the metrics it reports.

mod entry;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use lru::LruList;
pub use stats::{CacheStats, MetricsCollector, MetricsSink, NoopMetrics};
pub use store::BoundedTtlStore;
