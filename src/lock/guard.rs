//! Scoped soft lock guards.
//!
//! Guards release their lock on drop, including during unwinding, so a
//! failed store operation between acquisition and release cannot leave a
//! key locked until its timeout.

use std::fmt::Debug;
use std::hash::Hash;

use crate::lock::{LockHandle, SoftLockTable};

/// Holds an item lock until dropped or explicitly released.
#[derive(Debug)]
#[must_use = "dropping the guard releases the lock immediately"]
pub struct ItemLockGuard<'a, K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    table: &'a SoftLockTable<K, V>,
    handle: Option<LockHandle<K>>,
}

impl<'a, K, V> ItemLockGuard<'a, K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    pub(crate) fn new(table: &'a SoftLockTable<K, V>, handle: LockHandle<K>) -> Self {
        Self {
            table,
            handle: Some(handle),
        }
    }

    pub fn handle(&self) -> Option<&LockHandle<K>> {
        self.handle.as_ref()
    }

    /// Releases now and reports whether the lock was still held.
    pub fn release(mut self) -> bool {
        self.handle
            .take()
            .is_some_and(|handle| self.table.release_item_lock(&handle))
    }
}

impl<K, V> Drop for ItemLockGuard<'_, K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.table.release_item_lock(&handle);
        }
    }
}

/// Holds the region lock until dropped or explicitly released.
#[derive(Debug)]
#[must_use = "dropping the guard releases the lock immediately"]
pub struct RegionLockGuard<'a, K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    table: &'a SoftLockTable<K, V>,
    handle: Option<LockHandle<K>>,
    release_item_locks: bool,
}

impl<'a, K, V> RegionLockGuard<'a, K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    pub(crate) fn new(
        table: &'a SoftLockTable<K, V>,
        handle: LockHandle<K>,
        release_item_locks: bool,
    ) -> Self {
        Self {
            table,
            handle: Some(handle),
            release_item_locks,
        }
    }

    pub fn handle(&self) -> Option<&LockHandle<K>> {
        self.handle.as_ref()
    }

    pub fn release(mut self) -> bool {
        let release_item_locks = self.release_item_locks;
        self.handle
            .take()
            .is_some_and(|handle| self.table.release_region_lock(&handle, release_item_locks))
    }
}

impl<K, V> Drop for RegionLockGuard<'_, K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.table
                .release_region_lock(&handle, self.release_item_locks);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{BoundedTtlStore, NoopMetrics};
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Arc;
    use std::time::Duration;

    fn table() -> SoftLockTable<u32, u32> {
        let store = BoundedTtlStore::new(8, Duration::ZERO, Arc::new(NoopMetrics)).unwrap();
        SoftLockTable::new(Arc::new(store), Duration::from_secs(60)).unwrap()
    }

    #[test]
    fn test_explicit_release() {
        let table = table();
        let guard = table.lock_item_scoped(1).unwrap();

        assert!(guard.release());
        assert!(!table.is_locked(&1));
    }

    #[test]
    fn test_release_after_force_release_reports_false() {
        let table = table();
        let guard = table.lock_item_scoped(1).unwrap();
        table.force_release(&1);

        assert!(!guard.release());
    }

    #[test]
    fn test_guard_releases_during_unwind() {
        let table = table();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _guard = table.lock_item_scoped(1).unwrap();
            panic!("store write failed");
        }));

        assert!(result.is_err());
        assert!(!table.is_locked(&1));
    }

    #[test]
    fn test_region_guard_explicit_release() {
        let table = table();
        let guard = table.lock_region_scoped(false).unwrap();
        assert!(guard.handle().is_some_and(|h| h.is_region()));

        assert!(guard.release());
        assert!(!table.is_region_locked());
    }
}
