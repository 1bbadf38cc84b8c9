//! Named Cache Region
//!
//! Binds one store, its metrics and one access strategy under a name, and
//! checks every key against the kind of data the region holds.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use tracing::debug;

use crate::access::{AccessStrategy, AccessType};
use crate::cache::{BoundedTtlStore, CacheStats, MetricsCollector, MetricsSink};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::key::{CacheKey, KeyKind};
use crate::lock::LockHandle;

type Handle = LockHandle<CacheKey>;

/// Held for the duration of an operation; destruction waits for it.
type Live<'a> = RwLockReadGuard<'a, bool>;

// == Region ==
/// A named cache region.
///
/// Keyed operations fail with `InvalidKey` for keys of another [`KeyKind`]
/// and with `RegionDestroyed` once the region has been destroyed. Every
/// operation holds the read side of the liveness lock while it runs, so
/// destruction clears the region only after in-flight writes have landed.
#[derive(Debug)]
pub struct Region<V> {
    name: String,
    key_kind: KeyKind,
    minimal_puts: bool,
    strategy: AccessStrategy<CacheKey, V>,
    metrics: Arc<MetricsCollector>,
    live: RwLock<bool>,
}

impl<V: Clone> Region<V> {
    // == Constructor ==
    pub fn new(
        name: impl Into<String>,
        key_kind: KeyKind,
        access_type: AccessType,
        config: &CacheConfig,
    ) -> Result<Self> {
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
        let strategy = AccessStrategy::new(access_type, Arc::new(store), config)?;

        Ok(Self {
            name,
            key_kind,
            minimal_puts: config.minimal_puts,
            strategy,
            metrics,
            live: RwLock::new(true),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_kind(&self) -> KeyKind {
        self.key_kind
    }

    pub fn access_type(&self) -> AccessType {
        self.strategy.access_type()
    }

    pub fn strategy(&self) -> &AccessStrategy<CacheKey, V> {
        &self.strategy
    }

    pub fn is_destroyed(&self) -> bool {
        !*self.live.read()
    }

    fn ensure_live(&self) -> Result<Live<'_>> {
        let live = self.live.read();
        if !*live {
            return Err(CacheError::RegionDestroyed(self.name.clone()));
        }
        Ok(live)
    }

    fn check_key(&self, key: &CacheKey) -> Result<Live<'_>> {
        let live = self.ensure_live()?;
        if key.kind() != self.key_kind {
            return Err(CacheError::InvalidKey(format!(
                "{key} is a {} key, region {} holds {} keys",
                key.kind(),
                self.name,
                self.key_kind
            )));
        }
        Ok(live)
    }

    // == Reads ==
    pub fn get(&self, key: &CacheKey) -> Result<Option<V>> {
        let _live = self.check_key(key)?;
        Ok(self.strategy.get(key))
    }

    pub fn contains(&self, key: &CacheKey) -> Result<bool> {
        let _live = self.check_key(key)?;
        Ok(self.strategy.contains(key))
    }

    // == Loads ==
    /// Caches a loaded value using the region's minimal-puts setting.
    pub fn put_from_load(&self, key: CacheKey, value: V) -> Result<bool> {
        self.put_from_load_with(key, value, self.minimal_puts)
    }

    pub fn put_from_load_with(&self, key: CacheKey, value: V, minimal_put: bool) -> Result<bool> {
        let _live = self.check_key(&key)?;
        Ok(self.strategy.put_from_load(key, value, minimal_put))
    }

    // == Locks ==
    pub fn lock_item(&self, key: &CacheKey) -> Result<Option<Handle>> {
        let _live = self.check_key(key)?;
        self.strategy.lock_item(key)
    }

    pub fn unlock_item(&self, lock: Option<Handle>) -> Result<bool> {
        let _live = self.ensure_live()?;
        Ok(self.strategy.unlock_item(lock))
    }

    pub fn lock_region(&self) -> Result<Option<Handle>> {
        let _live = self.ensure_live()?;
        self.strategy.lock_region()
    }

    pub fn unlock_region(&self, lock: Option<Handle>) -> Result<bool> {
        let _live = self.ensure_live()?;
        Ok(self.strategy.unlock_region(lock))
    }

    // == Writes ==
    pub fn insert(&self, key: &CacheKey) -> Result<Option<Handle>> {
        let _live = self.check_key(key)?;
        self.strategy.insert(key)
    }

    pub fn after_insert(&self, key: CacheKey, value: V, lock: Option<Handle>) -> Result<bool> {
        let _live = self.check_key(&key)?;
        self.strategy.after_insert(key, value, lock)
    }

    pub fn update(&self, key: &CacheKey) -> Result<Option<Handle>> {
        let _live = self.check_key(key)?;
        self.strategy.update(key)
    }

    pub fn after_update(&self, key: CacheKey, value: V, lock: Option<Handle>) -> Result<bool> {
        let _live = self.check_key(&key)?;
        self.strategy.after_update(key, value, lock)
    }

    pub fn remove(&self, key: &CacheKey) -> Result<()> {
        let _live = self.check_key(key)?;
        self.strategy.remove(key)
    }

    pub fn remove_all(&self) -> Result<()> {
        let _live = self.ensure_live()?;
        self.strategy.remove_all()
    }

    pub fn evict(&self, key: &CacheKey) -> Result<()> {
        let _live = self.check_key(key)?;
        self.strategy.evict(key);
        Ok(())
    }

    pub fn evict_all(&self) -> Result<()> {
        let _live = self.ensure_live()?;
        self.strategy.evict_all();
        Ok(())
    }

    // == Maintenance ==
    /// Drops lock records that expired without being reclaimed.
    ///
    /// Acquisitions purge on their own once the table tracks
    /// [`crate::lock::DEFAULT_PURGE_THRESHOLD`] records; regions that lock
    /// many distinct keys and want a tighter bound call this periodically.
    pub fn purge_expired_locks(&self) -> usize {
        let purged = self.strategy.lock_table().purge_expired();
        if purged > 0 {
            debug!(region = %self.name, purged, "purged expired locks");
        }
        purged
    }

    pub fn size(&self) -> usize {
        self.strategy.size()
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot()
    }

    /// Marks the region destroyed and clears it. Waits for operations in
    /// flight. Idempotent.
    pub(crate) fn destroy(&self) {
        let mut live = self.live.write();
        if *live {
            *live = false;
            self.strategy.evict_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(access_type: AccessType) -> Region<String> {
        Region::new("orders", KeyKind::Entity, access_type, &CacheConfig::default()).unwrap()
    }

    fn order(id: &str) -> CacheKey {
        CacheKey::entity("Order", id).unwrap()
    }

    #[test]
    fn test_region_rejects_empty_name() {
        let result: Result<Region<String>> =
            Region::new(" ", KeyKind::Entity, AccessType::ReadWrite, &CacheConfig::default());
        assert!(matches!(result, Err(CacheError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_region_rejects_transactional() {
        let result: Result<Region<String>> = Region::new(
            "orders",
            KeyKind::Entity,
            AccessType::Transactional,
            &CacheConfig::default(),
        );
        assert!(matches!(result, Err(CacheError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_load_and_get() {
        let region = region(AccessType::ReadWrite);

        assert!(region.put_from_load(order("1"), "first".to_string()).unwrap());
        assert_eq!(region.get(&order("1")).unwrap(), Some("first".to_string()));
        assert_eq!(region.get(&order("2")).unwrap(), None);

        let stats = region.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.puts, 1);
    }

    #[test]
    fn test_minimal_puts_default_applies() {
        let region = region(AccessType::ReadWrite);

        assert!(region.put_from_load(order("1"), "a".to_string()).unwrap());
        assert!(!region.put_from_load(order("1"), "b".to_string()).unwrap());
        assert!(region
            .put_from_load_with(order("1"), "c".to_string(), false)
            .unwrap());
        assert_eq!(region.get(&order("1")).unwrap(), Some("c".to_string()));
    }

    #[test]
    fn test_wrong_key_kind_is_invalid_key() {
        let region = region(AccessType::ReadWrite);
        let lines = CacheKey::collection("Order.lines", "1").unwrap();

        assert!(matches!(region.get(&lines), Err(CacheError::InvalidKey(_))));
        assert!(matches!(
            region.put_from_load(lines.clone(), "x".to_string()),
            Err(CacheError::InvalidKey(_))
        ));
        assert!(matches!(region.lock_item(&lines), Err(CacheError::InvalidKey(_))));
        assert!(matches!(region.remove(&lines), Err(CacheError::InvalidKey(_))));
    }

    #[test]
    fn test_update_cycle_through_region() {
        let region = region(AccessType::ReadWrite);
        region.put_from_load(order("1"), "old".to_string()).unwrap();

        let lock = region.update(&order("1")).unwrap();
        assert_eq!(region.get(&order("1")).unwrap(), None);
        assert!(region
            .after_update(order("1"), "new".to_string(), lock)
            .unwrap());

        assert_eq!(region.get(&order("1")).unwrap(), Some("new".to_string()));
    }

    #[test]
    fn test_destroyed_region_rejects_operations() {
        let region = region(AccessType::ReadWrite);
        region.put_from_load(order("1"), "a".to_string()).unwrap();

        region.destroy();

        assert!(region.is_destroyed());
        assert_eq!(region.size(), 0);
        assert!(matches!(region.get(&order("1")), Err(CacheError::RegionDestroyed(_))));
        assert!(matches!(region.remove_all(), Err(CacheError::RegionDestroyed(_))));
        assert!(matches!(region.lock_region(), Err(CacheError::RegionDestroyed(_))));
    }

    #[test]
    fn test_destroy_waits_for_in_flight_loads() {
        let region = region(AccessType::NonStrictReadWrite);
        let barrier = std::sync::Barrier::new(5);

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let (region, barrier) = (&region, &barrier);
                scope.spawn(move || {
                    barrier.wait();
                    for i in 0..10_000 {
                        let key = order(&format!("{worker}-{i}"));
                        if region.put_from_load(key, "v".to_string()).is_err() {
                            break;
                        }
                    }
                });
            }
            barrier.wait();
            std::thread::sleep(std::time::Duration::from_millis(5));
            region.destroy();
        });

        assert!(region.is_destroyed());
        assert_eq!(region.size(), 0);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let region = region(AccessType::ReadWrite);
        region.destroy();
        region.destroy();
        assert!(matches!(
            region.put_from_load(order("1"), "a".to_string()),
            Err(CacheError::RegionDestroyed(_))
        ));
        assert_eq!(region.size(), 0);
    }

    #[test]
    fn test_read_only_region() {
        let region = region(AccessType::ReadOnly);
        region.put_from_load(order("1"), "a".to_string()).unwrap();

        assert!(matches!(
            region.update(&order("1")),
            Err(CacheError::ReadOnlyViolation(_))
        ));
        assert_eq!(region.get(&order("1")).unwrap(), None);
    }

    #[test]
    fn test_purge_expired_locks() {
        let config = CacheConfig {
            lock_timeout_millis: 30,
            ..CacheConfig::default()
        };
        let region: Region<String> =
            Region::new("orders", KeyKind::Entity, AccessType::ReadWrite, &config).unwrap();
        let _abandoned = region.lock_item(&order("1")).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(60));

        assert_eq!(region.purge_expired_locks(), 1);
        assert_eq!(region.purge_expired_locks(), 0);
    }
}
