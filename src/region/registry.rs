//! Region Registry
//!
//! Owns the named regions of one cache instance: entity-style regions with
//! an access strategy, plus query-results and timestamps data regions. Names
//! are qualified with the registry's prefix so several registries can share
//! log output and stats reports without collisions, and are unique across
//! all region kinds.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;

use crate::access::AccessType;
use crate::cache::CacheStats;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::key::KeyKind;
use crate::region::{DataRegion, Region};

pub const DEFAULT_PREFIX: &str = "default";

/// Point-in-time metrics for every region of a registry.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    /// RFC 3339 capture time
    pub captured_at: String,
    pub regions: BTreeMap<String, CacheStats>,
}

#[derive(Debug)]
struct Regions<V> {
    entities: HashMap<String, Arc<Region<V>>>,
    query_results: HashMap<String, Arc<DataRegion<String, V>>>,
    timestamps: HashMap<String, Arc<DataRegion<String, u64>>>,
}

impl<V> Regions<V> {
    fn new() -> Self {
        Self {
            entities: HashMap::new(),
            query_results: HashMap::new(),
            timestamps: HashMap::new(),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
            || self.query_results.contains_key(name)
            || self.timestamps.contains_key(name)
    }

    fn len(&self) -> usize {
        self.entities.len() + self.query_results.len() + self.timestamps.len()
    }
}

// == Region Registry ==
#[derive(Debug)]
pub struct RegionRegistry<V> {
    prefix: String,
    config: CacheConfig,
    regions: RwLock<Regions<V>>,
    last_timestamp: AtomicU64,
}

impl<V: Clone> RegionRegistry<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_prefix(DEFAULT_PREFIX, config)
    }

    pub fn with_prefix(prefix: impl Into<String>, config: CacheConfig) -> Self {
        Self {
            prefix: prefix.into(),
            config,
            regions: RwLock::new(Regions::new()),
            last_timestamp: AtomicU64::new(0),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// `orders` becomes `<prefix>.orders`; already qualified names pass through.
    pub fn qualify(&self, name: &str) -> String {
        let name = name.trim();
        match name.strip_prefix(self.prefix.as_str()) {
            Some(rest) if rest.starts_with('.') => name.to_string(),
            _ => format!("{}.{name}", self.prefix),
        }
    }

    pub fn default_access_type(&self) -> AccessType {
        AccessType::ReadWrite
    }

    pub fn minimal_puts_enabled_by_default(&self) -> bool {
        self.config.minimal_puts
    }

    /// Wall-clock millis, strictly increasing across calls.
    pub fn next_timestamp(&self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let (Ok(last) | Err(last)) =
            self.last_timestamp
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                    Some(now.max(last + 1))
                });
        now.max(last + 1)
    }

    // == Build Region ==
    /// Creates a region with the registry's configuration.
    pub fn build_region(
        &self,
        name: &str,
        key_kind: KeyKind,
        access_type: AccessType,
    ) -> Result<Arc<Region<V>>> {
        self.build_region_with_config(name, key_kind, access_type, self.config.clone())
    }

    /// Creates a region with its own configuration.
    ///
    /// Fails with `RegionExists` if the qualified name is taken and with
    /// `InvalidConfiguration` for an empty name or unusable settings.
    pub fn build_region_with_config(
        &self,
        name: &str,
        key_kind: KeyKind,
        access_type: AccessType,
        config: CacheConfig,
    ) -> Result<Arc<Region<V>>> {
        let qualified = self.checked_name(name)?;

        let mut regions = self.regions.write();
        if regions.contains(&qualified) {
            return Err(CacheError::RegionExists(qualified));
        }

        let region = Arc::new(Region::new(qualified.clone(), key_kind, access_type, &config)?);
        regions.entities.insert(qualified.clone(), Arc::clone(&region));

        info!(
            region = %qualified,
            key_kind = %key_kind,
            access_type = %access_type,
            max_entries = config.max_entries,
            "region created"
        );
        Ok(region)
    }

    // == Build Data Regions ==
    /// Creates a region for cached query results, using the registry's
    /// capacity and TTL.
    pub fn build_query_results_region(&self, name: &str) -> Result<Arc<DataRegion<String, V>>> {
        let qualified = self.checked_name(name)?;

        let mut regions = self.regions.write();
        if regions.contains(&qualified) {
            return Err(CacheError::RegionExists(qualified));
        }

        let region = Arc::new(DataRegion::new(qualified.clone(), &self.config)?);
        regions.query_results.insert(qualified.clone(), Arc::clone(&region));

        info!(region = %qualified, ttl_ms = self.config.ttl_millis, "query results region created");
        Ok(region)
    }

    /// Creates a region for update timestamps. Its entries never expire.
    pub fn build_timestamps_region(&self, name: &str) -> Result<Arc<DataRegion<String, u64>>> {
        let qualified = self.checked_name(name)?;

        let mut regions = self.regions.write();
        if regions.contains(&qualified) {
            return Err(CacheError::RegionExists(qualified));
        }

        let config = CacheConfig {
            ttl_millis: 0,
            ..self.config.clone()
        };
        let region = Arc::new(DataRegion::new(qualified.clone(), &config)?);
        regions.timestamps.insert(qualified.clone(), Arc::clone(&region));

        info!(region = %qualified, "timestamps region created");
        Ok(region)
    }

    fn checked_name(&self, name: &str) -> Result<String> {
        if name.trim().is_empty() {
            return Err(CacheError::InvalidConfiguration(
                "region name cannot be empty".to_string(),
            ));
        }
        Ok(self.qualify(name))
    }

    // == Lookup ==
    pub fn region(&self, name: &str) -> Option<Arc<Region<V>>> {
        self.regions.read().entities.get(&self.qualify(name)).cloned()
    }

    pub fn query_results_region(&self, name: &str) -> Option<Arc<DataRegion<String, V>>> {
        self.regions
            .read()
            .query_results
            .get(&self.qualify(name))
            .cloned()
    }

    pub fn timestamps_region(&self, name: &str) -> Option<Arc<DataRegion<String, u64>>> {
        self.regions
            .read()
            .timestamps
            .get(&self.qualify(name))
            .cloned()
    }

    /// Qualified names of all live regions of every kind, sorted.
    pub fn region_names(&self) -> Vec<String> {
        let regions = self.regions.read();
        let mut names: Vec<String> = regions
            .entities
            .keys()
            .chain(regions.query_results.keys())
            .chain(regions.timestamps.keys())
            .cloned()
            .collect();
        names.sort();
        names
    }

    // == Destroy ==
    /// Unregisters, clears and destroys a region of any kind. Outstanding
    /// handles to an entity region fail with `RegionDestroyed` from then on;
    /// data regions turn into no-ops.
    pub fn destroy_region(&self, name: &str) -> Result<()> {
        let qualified = self.qualify(name);
        let mut regions = self.regions.write();

        if let Some(region) = regions.entities.remove(&qualified) {
            region.destroy();
        } else if let Some(region) = regions.query_results.remove(&qualified) {
            region.destroy();
        } else if let Some(region) = regions.timestamps.remove(&qualified) {
            region.destroy();
        } else {
            return Err(CacheError::RegionNotFound(qualified));
        }

        info!(region = %qualified, "region destroyed");
        Ok(())
    }

    /// Destroys every region.
    pub fn stop(&self) {
        let drained = std::mem::replace(&mut *self.regions.write(), Regions::new());
        let count = drained.len();
        for region in drained.entities.values() {
            region.destroy();
        }
        for region in drained.query_results.values() {
            region.destroy();
        }
        for region in drained.timestamps.values() {
            region.destroy();
        }
        info!(regions = count, "registry stopped");
    }

    // == Stats ==
    pub fn stats(&self) -> RegistryStats {
        let guard = self.regions.read();
        let entities = guard
            .entities
            .iter()
            .map(|(name, region)| (name.clone(), region.stats()));
        let query_results = guard
            .query_results
            .iter()
            .map(|(name, region)| (name.clone(), region.stats()));
        let timestamps = guard
            .timestamps
            .iter()
            .map(|(name, region)| (name.clone(), region.stats()));
        let regions = entities.chain(query_results).chain(timestamps).collect();
        RegistryStats {
            captured_at: Utc::now().to_rfc3339(),
            regions,
        }
    }

    /// Runs lock maintenance on every entity region, returning how many
    /// records were dropped.
    pub fn purge_expired_locks(&self) -> usize {
        self.regions
            .read()
            .entities
            .values()
            .map(|region| region.purge_expired_locks())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::CacheKey;

    fn registry() -> RegionRegistry<u64> {
        RegionRegistry::new(CacheConfig::default())
    }

    #[test]
    fn test_qualify() {
        let registry = registry();
        assert_eq!(registry.prefix(), "default");
        assert_eq!(registry.qualify("orders"), "default.orders");
        assert_eq!(registry.qualify("default.orders"), "default.orders");
        assert_eq!(registry.qualify("defaultish"), "default.defaultish");

        let custom: RegionRegistry<u64> = RegionRegistry::with_prefix("app", CacheConfig::default());
        assert_eq!(custom.qualify("orders"), "app.orders");
    }

    #[test]
    fn test_build_and_lookup() {
        let registry = registry();
        let built = registry
            .build_region("orders", KeyKind::Entity, AccessType::ReadWrite)
            .unwrap();

        let found = registry.region("orders").unwrap();
        assert!(Arc::ptr_eq(&built, &found));
        assert_eq!(found.name(), "default.orders");
        assert!(registry.region("default.orders").is_some());
        assert!(registry.region("missing").is_none());
    }

    #[test]
    fn test_duplicate_region_is_rejected() {
        let registry = registry();
        registry
            .build_region("orders", KeyKind::Entity, AccessType::ReadWrite)
            .unwrap();

        let result = registry.build_region("orders", KeyKind::Entity, AccessType::ReadOnly);
        assert!(matches!(result, Err(CacheError::RegionExists(_))));
    }

    #[test]
    fn test_invalid_region_definitions() {
        let registry = registry();
        assert!(matches!(
            registry.build_region("", KeyKind::Entity, AccessType::ReadWrite),
            Err(CacheError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            registry.build_region("tx", KeyKind::Entity, AccessType::Transactional),
            Err(CacheError::InvalidConfiguration(_))
        ));
        let zero = CacheConfig {
            max_entries: 0,
            ..CacheConfig::default()
        };
        assert!(matches!(
            registry.build_region_with_config("tiny", KeyKind::Entity, AccessType::ReadWrite, zero),
            Err(CacheError::InvalidConfiguration(_))
        ));
        assert!(registry.region_names().is_empty());
    }

    #[test]
    fn test_destroy_region() {
        let registry = registry();
        let region = registry
            .build_region("orders", KeyKind::Entity, AccessType::ReadWrite)
            .unwrap();
        let key = CacheKey::entity("Order", "1").unwrap();
        region.put_from_load(key.clone(), 10).unwrap();

        registry.destroy_region("orders").unwrap();

        assert!(registry.region("orders").is_none());
        assert!(matches!(region.get(&key), Err(CacheError::RegionDestroyed(_))));
        assert!(matches!(
            registry.destroy_region("orders"),
            Err(CacheError::RegionNotFound(_))
        ));

        // The name is free again
        assert!(registry
            .build_region("orders", KeyKind::Entity, AccessType::ReadWrite)
            .is_ok());
    }

    #[test]
    fn test_stats_and_stop() {
        let registry = registry();
        let orders = registry
            .build_region("orders", KeyKind::Entity, AccessType::ReadWrite)
            .unwrap();
        registry
            .build_region("lines", KeyKind::Collection, AccessType::NonStrictReadWrite)
            .unwrap();

        let key = CacheKey::entity("Order", "1").unwrap();
        orders.put_from_load(key.clone(), 1).unwrap();
        orders.get(&key).unwrap();

        let stats = registry.stats();
        assert_eq!(stats.regions.len(), 2);
        assert_eq!(stats.regions["default.orders"].hits, 1);
        assert!(chrono::DateTime::parse_from_rfc3339(&stats.captured_at).is_ok());
        assert_eq!(
            registry.region_names(),
            vec!["default.lines".to_string(), "default.orders".to_string()]
        );

        registry.stop();
        assert!(registry.region_names().is_empty());
        assert!(orders.is_destroyed());
    }

    #[test]
    fn test_query_results_region_lifecycle() {
        let registry = registry();
        let queries = registry.build_query_results_region("queries").unwrap();
        assert_eq!(queries.name(), "default.queries");
        assert!(Arc::ptr_eq(
            &queries,
            &registry.query_results_region("queries").unwrap()
        ));

        queries.put("select * from orders".to_string(), 3);
        assert_eq!(queries.get(&"select * from orders".to_string()), Some(3));

        registry.destroy_region("queries").unwrap();

        assert!(registry.query_results_region("queries").is_none());
        assert!(queries.is_destroyed());
        assert_eq!(queries.get(&"select * from orders".to_string()), None);
        queries.put("late".to_string(), 4);
        assert_eq!(queries.size(), 0);
        assert!(matches!(
            registry.destroy_region("queries"),
            Err(CacheError::RegionNotFound(_))
        ));
    }

    #[test]
    fn test_timestamps_region_never_expires() {
        let config = CacheConfig {
            ttl_millis: 20,
            ..CacheConfig::default()
        };
        let registry: RegionRegistry<u64> = RegionRegistry::new(config);
        let timestamps = registry.build_timestamps_region("timestamps").unwrap();
        let queries = registry.build_query_results_region("queries").unwrap();

        let stamp = registry.next_timestamp();
        timestamps.put("orders".to_string(), stamp);
        queries.put("q".to_string(), 1);
        std::thread::sleep(std::time::Duration::from_millis(50));

        assert_eq!(timestamps.get(&"orders".to_string()), Some(stamp));
        assert_eq!(queries.get(&"q".to_string()), None);
        assert!(registry.timestamps_region("timestamps").is_some());
    }

    #[test]
    fn test_region_names_are_unique_across_kinds() {
        let registry = registry();
        registry
            .build_region("orders", KeyKind::Entity, AccessType::ReadWrite)
            .unwrap();
        registry.build_query_results_region("queries").unwrap();

        assert!(matches!(
            registry.build_query_results_region("orders"),
            Err(CacheError::RegionExists(_))
        ));
        assert!(matches!(
            registry.build_timestamps_region("queries"),
            Err(CacheError::RegionExists(_))
        ));
        assert!(matches!(
            registry.build_region("queries", KeyKind::Entity, AccessType::ReadWrite),
            Err(CacheError::RegionExists(_))
        ));
        assert!(matches!(
            registry.build_timestamps_region(" "),
            Err(CacheError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_stop_destroys_every_kind() {
        let registry = registry();
        let orders = registry
            .build_region("orders", KeyKind::Entity, AccessType::ReadWrite)
            .unwrap();
        let queries = registry.build_query_results_region("queries").unwrap();
        let timestamps = registry.build_timestamps_region("timestamps").unwrap();
        queries.put("q".to_string(), 1);
        timestamps.put("orders".to_string(), 1);

        let stats = registry.stats();
        assert_eq!(stats.regions.len(), 3);
        assert_eq!(stats.regions["default.queries"].puts, 1);
        assert_eq!(
            registry.region_names(),
            vec![
                "default.orders".to_string(),
                "default.queries".to_string(),
                "default.timestamps".to_string()
            ]
        );

        registry.stop();

        assert!(registry.region_names().is_empty());
        assert!(orders.is_destroyed());
        assert!(queries.is_destroyed());
        assert!(timestamps.is_destroyed());
        assert_eq!(timestamps.get(&"orders".to_string()), None);
    }

    #[test]
    fn test_defaults() {
        let registry = registry();
        assert_eq!(registry.default_access_type(), AccessType::ReadWrite);
        assert!(registry.minimal_puts_enabled_by_default());
    }

    #[test]
    fn test_next_timestamp_strictly_increases() {
        let registry = registry();
        let mut last = registry.next_timestamp();
        assert!(last > 0);
        for _ in 0..1000 {
            let next = registry.next_timestamp();
            assert!(next > last);
            last = next;
        }
    }
}
