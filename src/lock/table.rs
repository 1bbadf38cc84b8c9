//! Soft Lock Table Module
//!
//! Tracks in-flight per-key soft locks and the optional whole-region lock,
//! and evicts a key from the store at the moment its lock is taken.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::cache::BoundedTtlStore;
use crate::error::{CacheError, Result};
use crate::lock::{FencingToken, ItemLockGuard, LockHandle, LockRecord, RegionLockGuard};

/// Tracked item records at which an acquisition first drops expired ones.
pub const DEFAULT_PURGE_THRESHOLD: usize = 1024;

#[derive(Debug)]
struct LockState<K, V> {
    items: HashMap<K, LockRecord<K, V>>,
    region: Option<LockRecord<K, V>>,
}

impl<K: Eq + Hash, V> LockState<K, V> {
    fn region_held(&self, timeout: Duration, now: Instant) -> bool {
        self.region
            .as_ref()
            .is_some_and(|lock| !lock.is_expired(timeout, now))
    }

    fn item_held(&self, key: &K, timeout: Duration, now: Instant) -> bool {
        self.items
            .get(key)
            .is_some_and(|lock| !lock.is_expired(timeout, now))
    }

    fn purge_items(&mut self, timeout: Duration, now: Instant) -> usize {
        let before = self.items.len();
        self.items.retain(|_, lock| !lock.is_expired(timeout, now));
        before - self.items.len()
    }
}

// == Soft Lock Table ==
/// Expiry-aware lock table sitting in front of a [`BoundedTtlStore`].
///
/// Every acquisition and release is a single non-blocking attempt made under
/// the table's write lock: the check for a live holder, the replacement of
/// an expired one and the store eviction happen in one critical section, so
/// no caller can observe the lock without the eviction. Reads that must not
/// straddle an acquisition go through [`SoftLockTable::with_unlocked`],
/// which holds the read side for the duration of the store access.
///
/// The table lock is always taken before the store's own mutex, never after.
///
/// Expired records of keys nobody locks again are dropped by
/// [`SoftLockTable::purge_expired`], and by any acquisition that finds the
/// table tracking at least `purge_threshold` item records.
#[derive(Debug)]
pub struct SoftLockTable<K, V> {
    store: Arc<BoundedTtlStore<K, V>>,
    state: RwLock<LockState<K, V>>,
    next_token: AtomicU64,
    lock_timeout: Duration,
    purge_threshold: usize,
}

impl<K, V> SoftLockTable<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    // == Constructor ==
    /// Creates a lock table guarding `store`.
    ///
    /// # Arguments
    /// * `store` - The store whose keys are evicted on lock acquisition
    /// * `lock_timeout` - Age after which a lock is treated as abandoned, must be positive
    pub fn new(store: Arc<BoundedTtlStore<K, V>>, lock_timeout: Duration) -> Result<Self> {
        if lock_timeout.is_zero() {
            return Err(CacheError::InvalidConfiguration(
                "lock timeout must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            store,
            state: RwLock::new(LockState {
                items: HashMap::new(),
                region: None,
            }),
            next_token: AtomicU64::new(1),
            lock_timeout,
            purge_threshold: DEFAULT_PURGE_THRESHOLD,
        })
    }

    /// Sets the record count at which acquisitions purge expired item locks.
    pub fn with_purge_threshold(mut self, purge_threshold: usize) -> Self {
        self.purge_threshold = purge_threshold.max(1);
        self
    }

    pub fn store(&self) -> &Arc<BoundedTtlStore<K, V>> {
        &self.store
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    fn next_token(&self) -> FencingToken {
        FencingToken::new(self.next_token.fetch_add(1, Ordering::Relaxed))
    }

    // == Acquire Item Lock ==
    /// Locks `key` and evicts it from the store.
    ///
    /// The evicted live value becomes the record's prior value, so the
    /// snapshot is always the value committed when the lock was granted.
    /// Fails with `AlreadyLocked` while an unexpired lock exists for the key
    /// or for the whole region. An expired lock on the key is replaced.
    pub fn acquire_item_lock(&self, key: K) -> Result<LockHandle<K>> {
        let now = Instant::now();
        let mut state = self.state.write();

        if state.region_held(self.lock_timeout, now) {
            debug!(key = ?key, "item lock refused: region is locked");
            return Err(CacheError::AlreadyLocked(format!(
                "region lock blocks {key:?}"
            )));
        }

        if let Some(existing) = state.items.get(&key) {
            if !existing.is_expired(self.lock_timeout, now) {
                debug!(key = ?key, holder = %existing.token, "item lock refused");
                return Err(CacheError::AlreadyLocked(format!("{key:?}")));
            }
            debug!(key = ?key, stale = %existing.token, "reclaiming expired item lock");
        }

        if state.items.len() >= self.purge_threshold {
            let purged = state.purge_items(self.lock_timeout, now);
            if purged > 0 {
                debug!(purged, "purged expired item locks");
            }
        }

        let prior_value = self.store.take(&key);
        let record = LockRecord::new(Some(key.clone()), prior_value, self.next_token());
        let handle = record.handle();
        state.items.insert(key, record);

        debug!(key = ?handle.key(), token = %handle.token(), "item lock acquired");
        Ok(handle)
    }

    /// Like [`Self::acquire_item_lock`], but the lock is released when the
    /// returned guard is dropped.
    pub fn lock_item_scoped(&self, key: K) -> Result<ItemLockGuard<'_, K, V>> {
        let handle = self.acquire_item_lock(key)?;
        Ok(ItemLockGuard::new(self, handle))
    }

    // == Release Item Lock ==
    /// Removes the lock record if it still carries the handle's token.
    ///
    /// Returns false for a stale handle. Never writes to the store.
    pub fn release_item_lock(&self, handle: &LockHandle<K>) -> bool {
        self.release_item_lock_then(handle, |_, _| {})
    }

    /// Releases the lock and then runs `on_release` in the same critical
    /// section, so the store write it performs cannot interleave with
    /// another writer's acquisition.
    ///
    /// The record is removed before the callback runs; a panicking callback
    /// still leaves the key unlocked. `on_release` must not call back into
    /// this table.
    pub fn release_item_lock_then<F>(&self, handle: &LockHandle<K>, on_release: F) -> bool
    where
        F: FnOnce(&BoundedTtlStore<K, V>, LockRecord<K, V>),
    {
        let Some(key) = handle.key() else {
            warn!(token = %handle.token(), "region handle passed to item release");
            return false;
        };

        let mut state = self.state.write();
        let held = state
            .items
            .get(key)
            .is_some_and(|lock| lock.token == handle.token());
        if !held {
            warn!(key = ?key, token = %handle.token(), "ignoring stale item lock release");
            return false;
        }

        let Some(record) = state.items.remove(key) else {
            return false;
        };
        debug!(key = ?key, token = %handle.token(), "item lock released");
        on_release(&self.store, record);
        true
    }

    // == Acquire Region Lock ==
    /// Installs the whole-region lock.
    ///
    /// Fails with `AlreadyLocked` while an unexpired region lock exists.
    /// Existing item locks are left in place.
    pub fn acquire_region_lock(&self) -> Result<LockHandle<K>> {
        let now = Instant::now();
        let mut state = self.state.write();

        if let Some(existing) = state.region.as_ref() {
            if !existing.is_expired(self.lock_timeout, now) {
                debug!(holder = %existing.token, "region lock refused");
                return Err(CacheError::AlreadyLocked("region".to_string()));
            }
            debug!(stale = %existing.token, "reclaiming expired region lock");
        }

        let record = LockRecord::new(None, None, self.next_token());
        let handle = record.handle();
        state.region = Some(record);

        debug!(token = %handle.token(), "region lock acquired");
        Ok(handle)
    }

    /// Like [`Self::acquire_region_lock`], but released on drop of the guard.
    pub fn lock_region_scoped(&self, release_item_locks: bool) -> Result<RegionLockGuard<'_, K, V>> {
        let handle = self.acquire_region_lock()?;
        Ok(RegionLockGuard::new(self, handle, release_item_locks))
    }

    // == Release Region Lock ==
    /// Clears the region lock if the token matches, optionally dropping
    /// every item lock with it.
    pub fn release_region_lock(&self, handle: &LockHandle<K>, release_item_locks: bool) -> bool {
        if !handle.is_region() {
            warn!(token = %handle.token(), "item handle passed to region release");
            return false;
        }

        let mut state = self.state.write();
        let held = state
            .region
            .as_ref()
            .is_some_and(|lock| lock.token == handle.token());
        if !held {
            warn!(token = %handle.token(), "ignoring stale region lock release");
            return false;
        }

        state.region = None;
        if release_item_locks {
            let dropped = state.items.len();
            state.items.clear();
            debug!(token = %handle.token(), dropped, "region lock released with item locks");
        } else {
            debug!(token = %handle.token(), "region lock released");
        }
        true
    }

    // == Queries ==
    /// True if the region lock or an item lock for `key` is live.
    pub fn is_locked(&self, key: &K) -> bool {
        let now = Instant::now();
        let state = self.state.read();
        state.region_held(self.lock_timeout, now) || state.item_held(key, self.lock_timeout, now)
    }

    pub fn is_region_locked(&self) -> bool {
        self.state
            .read()
            .region_held(self.lock_timeout, Instant::now())
    }

    /// Number of live item locks.
    pub fn active_item_locks(&self) -> usize {
        let now = Instant::now();
        self.state
            .read()
            .items
            .values()
            .filter(|lock| !lock.is_expired(self.lock_timeout, now))
            .count()
    }

    // == With Unlocked ==
    /// Runs `f` against the store only if `key` is unlocked, holding off
    /// lock acquisition until `f` returns.
    ///
    /// Returns None without calling `f` when the key or region is locked.
    /// `f` must not call back into this table.
    pub fn with_unlocked<R, F>(&self, key: &K, f: F) -> Option<R>
    where
        F: FnOnce(&BoundedTtlStore<K, V>) -> R,
    {
        let now = Instant::now();
        let state = self.state.read();
        if state.region_held(self.lock_timeout, now) || state.item_held(key, self.lock_timeout, now)
        {
            return None;
        }
        Some(f(&self.store))
    }

    // == Administrative ==
    /// Drops any lock on `key` regardless of holder.
    pub fn force_release(&self, key: &K) -> bool {
        let released = self.state.write().items.remove(key).is_some();
        if released {
            debug!(key = ?key, "item lock force-released");
        }
        released
    }

    /// Drops every item lock. The region lock is untouched.
    pub fn release_all_item_locks(&self) -> usize {
        let mut state = self.state.write();
        let dropped = state.items.len();
        state.items.clear();
        dropped
    }

    /// Discards expired records that no acquirer has reclaimed yet.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let timeout = self.lock_timeout;
        let mut state = self.state.write();
        let purged = state.purge_items(timeout, now);
        if state
            .region
            .as_ref()
            .is_some_and(|lock| lock.is_expired(timeout, now))
        {
            state.region = None;
        }
        purged
    }

    /// Item records currently held, expired ones included.
    pub fn tracked_item_locks(&self) -> usize {
        self.state.read().items.len()
    }
}
