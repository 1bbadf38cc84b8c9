//! Cache Store Module
//!
//! Bounded cache engine combining a hash index with LRU ordering and lazy
//! idle-TTL expiration.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::cache::{CacheEntry, LruList, MetricsSink};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

#[derive(Debug)]
struct StoreInner<K, V> {
    /// Key to slot index in `lru`
    index: HashMap<K, usize>,
    /// Entries in access order
    lru: LruList<K, V>,
}

impl<K: Eq + Hash, V> StoreInner<K, V> {
    fn remove(&mut self, key: &K) -> Option<CacheEntry<K, V>> {
        let idx = self.index.remove(key)?;
        self.lru.remove(idx)
    }
}

// == Bounded TTL Store ==
/// Fixed-capacity map with LRU eviction and optional per-entry idle TTL.
///
/// All operations take `&self` and are safe to call from any thread. The
/// index and recency list sit behind one mutex that is held only for O(1)
/// map and pointer work plus a value clone on reads; values that are
/// expensive to clone should be wrapped in [`Arc`]. The live count is
/// mirrored in an atomic so [`BoundedTtlStore::size`] never blocks.
#[derive(Debug)]
pub struct BoundedTtlStore<K, V> {
    inner: Mutex<StoreInner<K, V>>,
    len: AtomicUsize,
    max_entries: usize,
    /// Zero disables expiry
    ttl: Duration,
    metrics: Arc<dyn MetricsSink>,
}

impl<K, V> BoundedTtlStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates a new store with the given capacity and idle TTL.
    ///
    /// # Arguments
    /// * `max_entries` - Maximum number of live entries, must be positive
    /// * `ttl` - Idle time after which an entry is treated as absent, zero disables expiry
    /// * `metrics` - Receives hit, miss, put and evict events
    pub fn new(max_entries: usize, ttl: Duration, metrics: Arc<dyn MetricsSink>) -> Result<Self> {
        if max_entries == 0 {
            return Err(CacheError::InvalidConfiguration(
                "max_entries must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            inner: Mutex::new(StoreInner {
                index: HashMap::new(),
                lru: LruList::new(),
            }),
            len: AtomicUsize::new(0),
            max_entries,
            ttl,
            metrics,
        })
    }

    pub fn from_config(config: &CacheConfig, metrics: Arc<dyn MetricsSink>) -> Result<Self> {
        Self::new(config.max_entries, config.ttl(), metrics)
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// A hit refreshes the entry's access time and makes it most recently
    /// used. Expired entries are removed and counted as a miss plus an
    /// eviction.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let Some(&idx) = inner.index.get(key) else {
            self.metrics.miss();
            return None;
        };

        let expired = inner
            .lru
            .get(idx)
            .map_or(true, |entry| entry.is_expired(self.ttl, now));
        if expired {
            inner.remove(key);
            self.len.store(inner.lru.len(), Ordering::Release);
            self.metrics.miss();
            self.metrics.evict();
            return None;
        }

        let value = inner.lru.get_mut(idx).map(|entry| {
            entry.touch(now);
            entry.value.clone()
        });
        inner.lru.move_to_front(idx);
        self.metrics.hit();
        value
    }

    // == Peek ==
    /// Returns the live value without touching recency or metrics.
    pub fn peek(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let inner = self.inner.lock();
        let idx = *inner.index.get(key)?;
        inner
            .lru
            .get(idx)
            .filter(|entry| !entry.is_expired(self.ttl, now))
            .map(|entry| entry.value.clone())
    }

    /// True if a live value is stored for the key. Like [`Self::peek`], this
    /// neither promotes the entry nor records metrics.
    pub fn contains(&self, key: &K) -> bool {
        let now = Instant::now();
        let inner = self.inner.lock();
        inner
            .index
            .get(key)
            .and_then(|&idx| inner.lru.get(idx))
            .is_some_and(|entry| !entry.is_expired(self.ttl, now))
    }

    // == Put ==
    /// Inserts or overwrites a value.
    ///
    /// An overwrite refreshes the access time and recency position without
    /// changing the entry count. An insert into a full store first evicts
    /// exactly one least recently used entry, so the new entry is never the
    /// one evicted.
    pub fn put(&self, key: K, value: V) {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        if let Some(&idx) = inner.index.get(&key) {
            if let Some(entry) = inner.lru.get_mut(idx) {
                entry.value = value;
                entry.touch(now);
            }
            inner.lru.move_to_front(idx);
            self.metrics.put();
            return;
        }

        if inner.lru.len() >= self.max_entries {
            if let Some(evicted) = inner.lru.pop_back() {
                inner.index.remove(&evicted.key);
                self.metrics.evict();
            }
        }

        let idx = inner
            .lru
            .push_front(CacheEntry::accessed_at(key.clone(), value, now));
        inner.index.insert(key, idx);
        self.len.store(inner.lru.len(), Ordering::Release);
        self.metrics.put();
    }

    // == Remove ==
    /// Deletes the entry for `key` if present and returns its value.
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let removed = inner.remove(key)?;
        self.len.store(inner.lru.len(), Ordering::Release);
        Some(removed.value)
    }

    /// Removes the entry for `key` and returns its value if it was live.
    /// An expired entry is dropped and yields None. No metrics are recorded.
    pub fn take(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let removed = inner.remove(key)?;
        self.len.store(inner.lru.len(), Ordering::Release);
        (!removed.is_expired(self.ttl, now)).then_some(removed.value)
    }

    // == Clear ==
    /// Empties the store in one critical section.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.index.clear();
        inner.lru.clear();
        self.len.store(0, Ordering::Release);
    }
}

impl<K, V> BoundedTtlStore<K, V> {
    // == Size ==
    /// Current live entry count, including entries that have expired but
    /// have not been touched since.
    pub fn size(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
