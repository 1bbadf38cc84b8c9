//! Soft Lock Module
//!
//! Timeout-based, reclaimable write locks over keys of a store and over the
//! store as a whole.

mod guard;
mod record;
mod table;

pub use guard::{ItemLockGuard, RegionLockGuard};
pub use record::{FencingToken, LockHandle, LockRecord};
pub use table::{SoftLockTable, DEFAULT_PURGE_THRESHOLD};
