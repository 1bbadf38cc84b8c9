//! Lock Record Module
//!
//! Soft lock bookkeeping: the record kept by the lock table and the handle
//! returned to the writer holding it.

use std::fmt;
use std::time::{Duration, Instant};

// == Fencing Token ==
/// Opaque token identifying one acquisition of a soft lock.
///
/// Tokens are unique per lock table, so a release carrying an older token
/// can never remove a newer lock on the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FencingToken(u64);

impl FencingToken {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for FencingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// == Lock Record ==
/// A held soft lock. `key == None` marks the whole-region lock.
#[derive(Debug, Clone)]
pub struct LockRecord<K, V> {
    pub key: Option<K>,
    /// Value cached when the lock was taken, if any
    pub prior_value: Option<V>,
    pub token: FencingToken,
    pub created_at: Instant,
}

impl<K, V> LockRecord<K, V> {
    pub(crate) fn new(key: Option<K>, prior_value: Option<V>, token: FencingToken) -> Self {
        Self {
            key,
            prior_value,
            token,
            created_at: Instant::now(),
        }
    }

    /// True once the lock is older than `timeout` and may be reclaimed.
    pub fn is_expired(&self, timeout: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > timeout
    }

    pub fn is_region(&self) -> bool {
        self.key.is_none()
    }
}

impl<K: Clone, V> LockRecord<K, V> {
    pub(crate) fn handle(&self) -> LockHandle<K> {
        LockHandle {
            key: self.key.clone(),
            token: self.token,
            acquired_at: self.created_at,
        }
    }
}

// == Lock Handle ==
/// Proof of holding a soft lock, passed back to release it.
///
/// Handles are cheap to clone. A clone presented after the lock was released
/// or reclaimed is rejected by token comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle<K> {
    key: Option<K>,
    token: FencingToken,
    acquired_at: Instant,
}

impl<K> LockHandle<K> {
    /// The locked key, or None for a region lock.
    pub fn key(&self) -> Option<&K> {
        self.key.as_ref()
    }

    pub fn token(&self) -> FencingToken {
        self.token
    }

    pub fn acquired_at(&self) -> Instant {
        self.acquired_at
    }

    pub fn is_region(&self) -> bool {
        self.key.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_expiry_is_strict() {
        let record: LockRecord<&str, u32> = LockRecord::new(Some("k"), None, FencingToken::new(1));
        let timeout = Duration::from_millis(100);

        assert!(!record.is_expired(timeout, record.created_at + timeout));
        assert!(record.is_expired(timeout, record.created_at + timeout + Duration::from_millis(1)));
    }

    #[test]
    fn test_handle_mirrors_record() {
        let record: LockRecord<&str, u32> =
            LockRecord::new(Some("k"), Some(5), FencingToken::new(9));
        let handle = record.handle();

        assert_eq!(handle.key(), Some(&"k"));
        assert_eq!(handle.token(), FencingToken::new(9));
        assert_eq!(handle.acquired_at(), record.created_at);
        assert!(!handle.is_region());
    }

    #[test]
    fn test_region_record() {
        let record: LockRecord<&str, u32> = LockRecord::new(None, None, FencingToken::new(2));
        assert!(record.is_region());
        assert!(record.handle().is_region());
        assert_eq!(record.token.to_string(), "#2");
    }
}
