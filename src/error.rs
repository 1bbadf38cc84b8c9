//! Error types for the region cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the region cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Bad construction arguments (capacity, timeouts, access type, names)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Key of the wrong shape for the region, or a lock handle for another key
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Another writer holds an unexpired soft lock on the key or region
    #[error("Already locked: {0}")]
    AlreadyLocked(String),

    /// Attempt to update data cached under a read-only strategy
    #[error("Read-only violation: {0}")]
    ReadOnlyViolation(String),

    /// A region with this name is already registered
    #[error("Region already exists: {0}")]
    RegionExists(String),

    /// No region with this name is registered
    #[error("Region not found: {0}")]
    RegionNotFound(String),

    /// The region was destroyed and no longer serves requests
    #[error("Region destroyed: {0}")]
    RegionDestroyed(String),
}

impl CacheError {
    /// Returns true for contention errors the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CacheError::AlreadyLocked(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the region cache.
pub type Result<T> = std::result::Result<T, CacheError>;
