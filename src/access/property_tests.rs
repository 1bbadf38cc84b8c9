//! Property-Based Tests for Access Strategies
//!
//! Drives a strict read-write strategy with arbitrary single-threaded
//! operation sequences and compares every observation against a simple
//! model of the lock protocol.

use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::access::{AccessStrategy, AccessType, Policy};
use crate::cache::{BoundedTtlStore, NoopMetrics};
use crate::error::CacheError;
use crate::lock::LockHandle;

fn strict() -> AccessStrategy<u8, u32> {
    let store = BoundedTtlStore::new(64, Duration::ZERO, Arc::new(NoopMetrics)).unwrap();
    AccessStrategy::with_policy(
        AccessType::ReadWrite,
        Policy::read_write(),
        Arc::new(store),
        Duration::from_secs(600),
    )
    .unwrap()
}

#[derive(Debug, Clone)]
enum Op {
    Load { key: u8, value: u32, minimal: bool },
    Get { key: u8 },
    Lock { key: u8 },
    AfterUpdate { key: u8, value: u32 },
    Unlock { key: u8 },
    Remove { key: u8 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let key = 0u8..4;
    prop_oneof![
        (key.clone(), any::<u32>(), any::<bool>())
            .prop_map(|(key, value, minimal)| Op::Load { key, value, minimal }),
        key.clone().prop_map(|key| Op::Get { key }),
        key.clone().prop_map(|key| Op::Lock { key }),
        (key.clone(), any::<u32>()).prop_map(|(key, value)| Op::AfterUpdate { key, value }),
        key.clone().prop_map(|key| Op::Unlock { key }),
        key.prop_map(|key| Op::Remove { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // A locked key is never readable or loadable, at most one lock per key
    // is granted, and an update makes exactly its new value visible.
    #[test]
    fn prop_strict_protocol_matches_model(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let cache = strict();
        let mut values: HashMap<u8, u32> = HashMap::new();
        let mut held: HashMap<u8, LockHandle<u8>> = HashMap::new();

        for op in ops {
            match op {
                Op::Load { key, value, minimal } => {
                    let expected = !held.contains_key(&key) && !(minimal && values.contains_key(&key));
                    prop_assert_eq!(cache.put_from_load(key, value, minimal), expected);
                    if expected {
                        values.insert(key, value);
                    }
                }
                Op::Get { key } => {
                    let expected = if held.contains_key(&key) { None } else { values.get(&key).copied() };
                    prop_assert_eq!(cache.get(&key), expected);
                }
                Op::Lock { key } => {
                    let result = cache.lock_item(&key);
                    if held.contains_key(&key) {
                        prop_assert!(matches!(result, Err(CacheError::AlreadyLocked(_))));
                    } else {
                        let handle = result.unwrap();
                        prop_assert!(handle.is_some());
                        held.insert(key, handle.unwrap());
                        values.remove(&key);
                    }
                }
                Op::AfterUpdate { key, value } => {
                    if let Some(handle) = held.remove(&key) {
                        prop_assert!(cache.after_update(key, value, Some(handle)).unwrap());
                        values.insert(key, value);
                    }
                }
                Op::Unlock { key } => {
                    if let Some(handle) = held.remove(&key) {
                        prop_assert!(cache.unlock_item(Some(handle)));
                    }
                }
                Op::Remove { key } => {
                    let result = cache.remove(&key);
                    if held.contains_key(&key) {
                        prop_assert!(matches!(result, Err(CacheError::AlreadyLocked(_))));
                    } else {
                        prop_assert!(result.is_ok());
                        values.remove(&key);
                    }
                }
            }
        }

        prop_assert_eq!(cache.size(), values.len());
        prop_assert_eq!(cache.lock_table().active_item_locks(), held.len());
    }

    // Non-strict updates never block and always leave the new value visible.
    #[test]
    fn prop_nonstrict_last_write_visible(writes in prop::collection::vec((0u8..4, any::<u32>()), 1..40)) {
        let store = BoundedTtlStore::new(64, Duration::ZERO, Arc::new(NoopMetrics)).unwrap();
        let cache: AccessStrategy<u8, u32> = AccessStrategy::with_policy(
            AccessType::NonStrictReadWrite,
            Policy::nonstrict_read_write(),
            Arc::new(store),
            Duration::from_secs(600),
        )
        .unwrap();
        let mut last = HashMap::new();

        for (key, value) in writes {
            prop_assert_eq!(cache.update(&key).unwrap(), None);
            prop_assert_eq!(cache.get(&key), None);
            prop_assert!(cache.after_update(key, value, None).unwrap());
            last.insert(key, value);
        }

        for (key, value) in last {
            prop_assert_eq!(cache.get(&key), Some(value));
        }
    }
}
