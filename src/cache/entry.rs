//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with idle-TTL support.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// Represents a single cache entry with value and access metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<K, V> {
    /// The key the entry is indexed under
    pub key: K,
    /// The stored value
    pub value: V,
    /// Time of the last successful get or put
    pub last_access: Instant,
}

impl<K, V> CacheEntry<K, V> {
    // == Constructor ==
    /// Creates a new cache entry accessed right now.
    pub fn new(key: K, value: V) -> Self {
        Self::accessed_at(key, value, Instant::now())
    }

    pub fn accessed_at(key: K, value: V, last_access: Instant) -> Self {
        Self {
            key,
            value,
            last_access,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has been idle longer than `ttl`.
    ///
    /// A zero `ttl` disables expiry. The entry is expired only once its age
    /// strictly exceeds the ttl.
    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        !ttl.is_zero() && now.saturating_duration_since(self.last_access) > ttl
    }

    // == Touch ==
    /// Refreshes the access time.
    pub fn touch(&mut self, now: Instant) {
        self.last_access = now;
    }
}
