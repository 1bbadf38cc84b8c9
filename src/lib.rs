//! Region Cache - an in-process second-level cache engine
//!
//! Bounded LRU/TTL stores, reclaimable soft locks and read/write coherence
//! strategies, grouped into named regions.

pub mod access;
pub mod cache;
pub mod config;
pub mod error;
pub mod key;
pub mod lock;
pub mod region;

pub use access::{AccessStrategy, AccessType, Policy};
pub use cache::{BoundedTtlStore, CacheStats, MetricsCollector, MetricsSink, NoopMetrics};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use key::{CacheKey, KeyKind};
pub use lock::{FencingToken, LockHandle, SoftLockTable, DEFAULT_PURGE_THRESHOLD};
pub use region::{DataRegion, Region, RegionRegistry, RegistryStats};
