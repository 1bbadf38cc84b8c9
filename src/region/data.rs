//! Data Regions
//!
//! Plain get/put regions for cached query results and update timestamps.
//! They sit directly on a store: no access strategy, no soft locks.

use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::cache::{BoundedTtlStore, CacheStats, MetricsCollector, MetricsSink};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Data Region ==
/// A named store without coherence locking.
///
/// Once destroyed, reads miss and writes are dropped silently instead of
/// failing, so late callers racing a shutdown never see an error.
#[derive(Debug)]
pub struct DataRegion<K, V> {
    name: String,
    store: BoundedTtlStore<K, V>,
    metrics: Arc<MetricsCollector>,
    live: RwLock<bool>,
}

impl<K, V> DataRegion<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructor ==
    pub fn new(name: impl Into<String>, config: &CacheConfig) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CacheError::InvalidConfiguration(
                "region name cannot be empty".to_string(),
            ));
        }
        config.validate()?;

        let metrics = Arc::new(MetricsCollector::new());
        let sink: Arc<dyn MetricsSink> = metrics.clone();
        let store = BoundedTtlStore::from_config(config, sink)?;

        Ok(Self {
            name,
            store,
            metrics,
            live: RwLock::new(true),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_destroyed(&self) -> bool {
        !*self.live.read()
    }

    // == Get / Put ==
    pub fn get(&self, key: &K) -> Option<V> {
        let live = self.live.read();
        if !*live {
            return None;
        }
        self.store.get(key)
    }

    pub fn put(&self, key: K, value: V) {
        let live = self.live.read();
        if *live {
            self.store.put(key, value);
        }
    }

    pub fn evict(&self, key: &K) {
        self.store.remove(key);
    }

    /// Drops every entry unless the region is destroyed.
    pub fn clear(&self) {
        let live = self.live.read();
        if *live {
            self.store.clear();
        }
    }

    pub fn size(&self) -> usize {
        self.store.size()
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot()
    }

    /// Marks the region destroyed and clears it. Idempotent.
    pub(crate) fn destroy(&self) {
        let mut live = self.live.write();
        if *live {
            *live = false;
            self.store.clear();
            debug!(region = %self.name, "data region cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    fn region(config: &CacheConfig) -> DataRegion<String, u64> {
        DataRegion::new("queries", config).unwrap()
    }

    #[test]
    fn test_data_region_rejects_empty_name() {
        let result: Result<DataRegion<String, u64>> = DataRegion::new("", &CacheConfig::default());
        assert!(matches!(result, Err(CacheError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_put_get_and_clear() {
        let region = region(&CacheConfig::default());
        region.put("q1".to_string(), 1);
        region.put("q2".to_string(), 2);

        assert_eq!(region.get(&"q1".to_string()), Some(1));
        assert_eq!(region.get(&"missing".to_string()), None);
        assert_eq!(region.size(), 2);

        region.evict(&"q1".to_string());
        assert_eq!(region.get(&"q1".to_string()), None);

        region.clear();
        assert_eq!(region.size(), 0);

        let stats = region.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.puts, 2);
    }

    #[test]
    fn test_entries_expire_with_ttl() {
        let config = CacheConfig {
            ttl_millis: 30,
            ..CacheConfig::default()
        };
        let region = region(&config);
        region.put("q".to_string(), 1);

        sleep(Duration::from_millis(60));

        assert_eq!(region.get(&"q".to_string()), None);
    }

    #[test]
    fn test_capacity_is_bounded() {
        let config = CacheConfig {
            max_entries: 2,
            ..CacheConfig::default()
        };
        let region = region(&config);
        for i in 0..5 {
            region.put(format!("q{i}"), i);
        }
        assert_eq!(region.size(), 2);
        assert_eq!(region.get(&"q4".to_string()), Some(4));
    }

    #[test]
    fn test_destroyed_region_ignores_reads_and_writes() {
        let region = region(&CacheConfig::default());
        region.put("q".to_string(), 1);

        region.destroy();
        region.destroy();

        assert!(region.is_destroyed());
        assert_eq!(region.size(), 0);
        assert_eq!(region.get(&"q".to_string()), None);
        region.put("q".to_string(), 2);
        region.clear();
        assert_eq!(region.size(), 0);
    }
}
