//! Access types and the policy record that parameterises the coherence
//! protocol.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

// == Access Type ==
/// How aggressively a region coordinates writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessType {
    /// Immutable data; no locking, updates are protocol violations
    ReadOnly,
    /// Full soft-lock protocol
    ReadWrite,
    /// Direct writes and eviction without exclusive locks
    #[serde(rename = "nonstrict-read-write")]
    NonStrictReadWrite,
    /// Two-phase-commit participation, not supported
    Transactional,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::ReadOnly => "read-only",
            AccessType::ReadWrite => "read-write",
            AccessType::NonStrictReadWrite => "nonstrict-read-write",
            AccessType::Transactional => "transactional",
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessType {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "read-only" => Ok(AccessType::ReadOnly),
            "read-write" => Ok(AccessType::ReadWrite),
            "nonstrict-read-write" => Ok(AccessType::NonStrictReadWrite),
            "transactional" => Ok(AccessType::Transactional),
            other => Err(CacheError::InvalidConfiguration(format!(
                "unknown access type '{other}'"
            ))),
        }
    }
}

// == Policy ==
/// Which transitions of the soft-lock protocol a strategy may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// `lock_item`, `insert` and `update` take exclusive item locks
    pub item_locking: bool,
    /// `lock_region` and `remove_all` take the region lock
    pub region_locking: bool,
    /// Aborting an update puts the snapshotted prior value back
    pub restore_on_unlock: bool,
    /// Releasing the region lock also drops every item lock
    pub release_item_locks_with_region: bool,
    /// Updates are allowed at all
    pub accepts_updates: bool,
}

impl Policy {
    pub const fn read_write() -> Self {
        Self {
            item_locking: true,
            region_locking: true,
            restore_on_unlock: false,
            release_item_locks_with_region: true,
            accepts_updates: true,
        }
    }

    pub const fn nonstrict_read_write() -> Self {
        Self {
            item_locking: false,
            region_locking: false,
            restore_on_unlock: false,
            release_item_locks_with_region: false,
            accepts_updates: true,
        }
    }

    pub const fn read_only() -> Self {
        Self {
            item_locking: false,
            region_locking: false,
            restore_on_unlock: false,
            release_item_locks_with_region: false,
            accepts_updates: false,
        }
    }

    /// Policy for `access_type`; `Transactional` has none.
    pub fn for_access_type(access_type: AccessType) -> Option<Self> {
        match access_type {
            AccessType::ReadOnly => Some(Self::read_only()),
            AccessType::ReadWrite => Some(Self::read_write()),
            AccessType::NonStrictReadWrite => Some(Self::nonstrict_read_write()),
            AccessType::Transactional => None,
        }
    }

    pub const fn with_restore_on_unlock(mut self, restore: bool) -> Self {
        self.restore_on_unlock = restore;
        self
    }
}
