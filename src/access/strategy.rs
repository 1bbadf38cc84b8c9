//! Access Strategy Module
//!
//! The read/write coherence protocol. One implementation serves every access
//! type; the [`Policy`] record decides which transitions are reachable.
//!
//! Per key the protocol moves between four states:
//! - unlocked and cached: reads hit
//! - unlocked and absent: reads miss
//! - locked: the value was evicted when the lock was taken and reads miss
//! - locked but expired: behaves like unlocked and absent, and the next
//!   writer reclaims the lock

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::access::{AccessType, Policy};
use crate::cache::BoundedTtlStore;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::lock::{LockHandle, SoftLockTable};

// == Access Strategy ==
/// Coherent front end to a [`BoundedTtlStore`].
///
/// Writers bracket the update of the system of record with
/// `insert`/`update` (or `lock_item`) and `after_insert`/`after_update`
/// (or `unlock_item`). While a strict read-write lock is held every read of
/// the key misses, so no reader observes the value being replaced.
///
/// Non-strict read-write writes and evicts directly, tolerating a short
/// window where a reader racing an update may load the old value back in.
/// Read-only never locks and rejects updates.
#[derive(Debug)]
pub struct AccessStrategy<K, V> {
    access_type: AccessType,
    policy: Policy,
    store: Arc<BoundedTtlStore<K, V>>,
    locks: SoftLockTable<K, V>,
}

impl<K, V> AccessStrategy<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    // == Constructor ==
    /// Builds the strategy for `access_type` over `store`.
    ///
    /// `Transactional` access is not supported and fails with
    /// `InvalidConfiguration`, as does a zero lock timeout.
    pub fn new(
        access_type: AccessType,
        store: Arc<BoundedTtlStore<K, V>>,
        config: &CacheConfig,
    ) -> Result<Self> {
        let policy = Policy::for_access_type(access_type)
            .ok_or_else(|| unsupported(access_type))?
            .with_restore_on_unlock(
                access_type == AccessType::ReadWrite && config.restore_on_unlock,
            );
        Self::with_policy(access_type, policy, store, config.lock_timeout())
    }

    /// Builds a strategy with an explicit policy.
    pub fn with_policy(
        access_type: AccessType,
        policy: Policy,
        store: Arc<BoundedTtlStore<K, V>>,
        lock_timeout: Duration,
    ) -> Result<Self> {
        if access_type == AccessType::Transactional {
            return Err(unsupported(access_type));
        }
        let locks = SoftLockTable::new(Arc::clone(&store), lock_timeout)?;
        Ok(Self {
            access_type,
            policy,
            store,
            locks,
        })
    }

    pub fn access_type(&self) -> AccessType {
        self.access_type
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn store(&self) -> &Arc<BoundedTtlStore<K, V>> {
        &self.store
    }

    pub fn lock_table(&self) -> &SoftLockTable<K, V> {
        &self.locks
    }

    pub fn size(&self) -> usize {
        self.store.size()
    }

    pub fn is_locked(&self, key: &K) -> bool {
        self.locks.is_locked(key)
    }

    // == Reads ==
    /// Returns the cached value, or None if absent, expired or locked.
    pub fn get(&self, key: &K) -> Option<V> {
        self.locks
            .with_unlocked(key, |store| store.get(key))
            .flatten()
    }

    /// True if a live, unlocked value is cached. Does not count as an access.
    pub fn contains(&self, key: &K) -> bool {
        self.locks
            .with_unlocked(key, |store| store.contains(key))
            .unwrap_or(false)
    }

    // == Put From Load ==
    /// Caches a value just read from the system of record.
    ///
    /// Rejected while the key is locked. With `minimal_put_override` the put
    /// is skipped if a value is already cached. Returns whether the value
    /// was written.
    pub fn put_from_load(&self, key: K, value: V, minimal_put_override: bool) -> bool {
        let outcome = self.locks.with_unlocked(&key, |store| {
            if minimal_put_override && store.contains(&key) {
                return false;
            }
            store.put(key.clone(), value);
            true
        });

        match outcome {
            Some(written) => {
                if !written {
                    debug!(key = ?key, "load skipped: already cached");
                }
                written
            }
            None => {
                debug!(key = ?key, "load rejected: key locked");
                false
            }
        }
    }

    // == Item Locks ==
    /// Starts an update of `key`: locks it and evicts it, keeping the
    /// evicted value as the snapshot an abort may restore.
    ///
    /// Returns `Ok(None)` for policies without item locking.
    pub fn lock_item(&self, key: &K) -> Result<Option<LockHandle<K>>> {
        if !self.policy.item_locking {
            return Ok(None);
        }
        self.locks.acquire_item_lock(key.clone()).map(Some)
    }

    /// Ends an update without a new value.
    ///
    /// The key stays absent unless the policy restores the prior value, which
    /// happens only while the handle is still the current holder and nothing
    /// has been cached for the key since. Returns whether the lock was
    /// still held.
    pub fn unlock_item(&self, lock: Option<LockHandle<K>>) -> bool {
        let Some(handle) = lock else {
            return false;
        };
        if !self.policy.restore_on_unlock {
            return self.locks.release_item_lock(&handle);
        }
        self.locks.release_item_lock_then(&handle, |store, record| {
            if let (Some(key), Some(prior)) = (record.key, record.prior_value) {
                if !store.contains(&key) {
                    store.put(key, prior);
                }
            }
        })
    }

    // == Region Lock ==
    /// Locks the whole region. Returns `Ok(None)` without region locking.
    pub fn lock_region(&self) -> Result<Option<LockHandle<K>>> {
        if !self.policy.region_locking {
            return Ok(None);
        }
        self.locks.acquire_region_lock().map(Some)
    }

    pub fn unlock_region(&self, lock: Option<LockHandle<K>>) -> bool {
        lock.is_some_and(|handle| {
            self.locks
                .release_region_lock(&handle, self.policy.release_item_locks_with_region)
        })
    }

    // == Insert ==
    /// Called before a new record is written to the system of record.
    ///
    /// Strict read-write locks the key; nothing is written to the cache.
    pub fn insert(&self, key: &K) -> Result<Option<LockHandle<K>>> {
        self.lock_item(key)
    }

    /// Called after the insert committed. Returns whether the value was cached.
    pub fn after_insert(&self, key: K, value: V, lock: Option<LockHandle<K>>) -> Result<bool> {
        if !self.policy.accepts_updates {
            // Read-only data enters the cache through loads only
            return Ok(false);
        }
        check_handle(&key, lock.as_ref())?;
        Ok(self.complete_write(key, value, lock))
    }

    // == Update ==
    /// Called before an existing record is updated in the system of record.
    ///
    /// Strict read-write locks the key, non-strict evicts it, read-only
    /// evicts it and reports a violation.
    pub fn update(&self, key: &K) -> Result<Option<LockHandle<K>>> {
        if !self.policy.accepts_updates {
            return Err(self.reject_update(key));
        }
        if self.policy.item_locking {
            return self.lock_item(key);
        }
        self.store.remove(key);
        Ok(None)
    }

    /// Called after the update committed. Writes `value` and releases the
    /// lock in one step. Returns whether the value was cached; a handle
    /// whose lock was reclaimed in the meantime writes nothing.
    pub fn after_update(&self, key: K, value: V, lock: Option<LockHandle<K>>) -> Result<bool> {
        if !self.policy.accepts_updates {
            return Err(self.reject_update(&key));
        }
        check_handle(&key, lock.as_ref())?;
        Ok(self.complete_write(key, value, lock))
    }

    // == Remove ==
    /// Drops the cached value after the record was deleted.
    ///
    /// Under strict read-write this is lock, evict, unlock; the lock is
    /// released even if the eviction unwinds.
    pub fn remove(&self, key: &K) -> Result<()> {
        if !self.policy.item_locking {
            self.store.remove(key);
            return Ok(());
        }
        let guard = self.locks.lock_item_scoped(key.clone())?;
        self.store.remove(key);
        drop(guard);
        Ok(())
    }

    /// Drops every cached value, under the region lock when the policy
    /// has one.
    pub fn remove_all(&self) -> Result<()> {
        if !self.policy.region_locking {
            self.store.clear();
            return Ok(());
        }
        let guard = self
            .locks
            .lock_region_scoped(self.policy.release_item_locks_with_region)?;
        self.store.clear();
        drop(guard);
        Ok(())
    }

    // == Evict ==
    /// Forcibly drops the key's lock and value.
    pub fn evict(&self, key: &K) {
        self.locks.force_release(key);
        self.store.remove(key);
    }

    /// Forcibly drops every item lock and value. A held region lock stays.
    pub fn evict_all(&self) {
        let dropped = self.locks.release_all_item_locks();
        self.store.clear();
        debug!(dropped_locks = dropped, "region evicted");
    }

    fn complete_write(&self, key: K, value: V, lock: Option<LockHandle<K>>) -> bool {
        match lock {
            Some(handle) => {
                let written = self
                    .locks
                    .release_item_lock_then(&handle, |store, _| store.put(key, value));
                if !written {
                    debug!(token = %handle.token(), "write dropped: lock no longer held");
                }
                written
            }
            None if self.policy.item_locking || self.policy.region_locking => self
                .locks
                .with_unlocked(&key, |store| store.put(key.clone(), value))
                .is_some(),
            None => {
                self.store.put(key, value);
                true
            }
        }
    }

    fn reject_update(&self, key: &K) -> CacheError {
        self.store.remove(key);
        warn!(key = ?key, "update of read-only data; evicted");
        CacheError::ReadOnlyViolation(format!("{key:?}"))
    }
}

fn unsupported(access_type: AccessType) -> CacheError {
    CacheError::InvalidConfiguration(format!("{access_type} access is not supported"))
}

fn check_handle<K: PartialEq + Debug>(key: &K, lock: Option<&LockHandle<K>>) -> Result<()> {
    match lock {
        Some(handle) if handle.key() != Some(key) => Err(CacheError::InvalidKey(format!(
            "lock {} does not belong to {key:?}",
            handle.token()
        ))),
        _ => Ok(()),
    }
}
