//! Configuration Module
//!
//! Handles loading and validating cache configuration from environment
//! variables, property maps or serialized documents.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{CacheError, Result};

// == Property Keys ==
pub const MAX_ENTRIES_PROPERTY: &str = "cache.max_entries";
pub const TTL_SECONDS_PROPERTY: &str = "cache.ttl_seconds";
pub const LOCK_TIMEOUT_SECONDS_PROPERTY: &str = "cache.lock_timeout_seconds";
pub const RESTORE_ON_UNLOCK_PROPERTY: &str = "cache.restore_on_unlock";
pub const MINIMAL_PUTS_PROPERTY: &str = "cache.minimal_puts";
pub const DEBUG_LOGGING_PROPERTY: &str = "cache.debug_logging";

// == Defaults ==
const DEFAULT_MAX_ENTRIES: usize = 10_000;
const DEFAULT_TTL_MILLIS: u64 = 60 * 60 * 1000;
const DEFAULT_LOCK_TIMEOUT_MILLIS: u64 = 60 * 1000;

/// Cache configuration parameters.
///
/// Read once when a store or strategy is built; nothing re-reads it later.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of live entries per store
    pub max_entries: usize,
    /// Idle time after which an entry is treated as absent, 0 = no expiry
    pub ttl_millis: u64,
    /// Age after which a soft lock is considered abandoned
    pub lock_timeout_millis: u64,
    /// Put the snapshotted prior value back when a lock is released without an update
    pub restore_on_unlock: bool,
    /// Whether loads skip keys that are already cached unless told otherwise
    pub minimal_puts: bool,
    /// Log at debug level when `RUST_LOG` does not say otherwise
    pub debug_logging: bool,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 10000)
    /// - `CACHE_TTL_MILLIS` - Entry TTL in milliseconds (default: 3600000)
    /// - `CACHE_LOCK_TIMEOUT_MILLIS` - Soft lock timeout in milliseconds (default: 60000)
    /// - `CACHE_RESTORE_ON_UNLOCK` - Restore prior value on abort (default: false)
    /// - `CACHE_MINIMAL_PUTS` - Minimal puts by default (default: true)
    /// - `CACHE_DEBUG_LOGGING` - Default to debug-level logs (default: false)
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: env_or("CACHE_MAX_ENTRIES", defaults.max_entries),
            ttl_millis: env_or("CACHE_TTL_MILLIS", defaults.ttl_millis),
            lock_timeout_millis: env_or("CACHE_LOCK_TIMEOUT_MILLIS", defaults.lock_timeout_millis),
            restore_on_unlock: env_or("CACHE_RESTORE_ON_UNLOCK", defaults.restore_on_unlock),
            minimal_puts: env_or("CACHE_MINIMAL_PUTS", defaults.minimal_puts),
            debug_logging: env_or("CACHE_DEBUG_LOGGING", defaults.debug_logging),
        }
    }

    /// Creates a CacheConfig from a host-supplied property map.
    ///
    /// Durations are given in seconds. Missing or empty properties use the
    /// defaults; negative or unparseable numbers are rejected.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self> {
        let defaults = Self::default();
        let max_entries = property_or(properties, MAX_ENTRIES_PROPERTY, defaults.max_entries)?;
        let ttl_seconds =
            property_or(properties, TTL_SECONDS_PROPERTY, defaults.ttl_millis / 1000)?;
        let lock_timeout_seconds = property_or(
            properties,
            LOCK_TIMEOUT_SECONDS_PROPERTY,
            defaults.lock_timeout_millis / 1000,
        )?;

        let config = Self {
            max_entries,
            ttl_millis: ttl_seconds.saturating_mul(1000),
            lock_timeout_millis: lock_timeout_seconds.saturating_mul(1000),
            restore_on_unlock: property_or(
                properties,
                RESTORE_ON_UNLOCK_PROPERTY,
                defaults.restore_on_unlock,
            )?,
            minimal_puts: property_or(properties, MINIMAL_PUTS_PROPERTY, defaults.minimal_puts)?,
            debug_logging: property_or(properties, DEBUG_LOGGING_PROPERTY, defaults.debug_logging)?,
        };
        config.validate()?;
        Ok(config)
    }

    // == Validate ==
    /// Rejects configurations no store or lock table can be built from.
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(CacheError::InvalidConfiguration(
                "max_entries must be greater than 0".to_string(),
            ));
        }
        if self.lock_timeout_millis == 0 {
            return Err(CacheError::InvalidConfiguration(
                "lock_timeout_millis must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_millis)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_millis)
    }

    /// `EnvFilter` directive to use when `RUST_LOG` is unset.
    pub fn default_log_filter(&self) -> &'static str {
        if self.debug_logging {
            "region_cache=debug"
        } else {
            "region_cache=info"
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            ttl_millis: DEFAULT_TTL_MILLIS,
            lock_timeout_millis: DEFAULT_LOCK_TIMEOUT_MILLIS,
            restore_on_unlock: false,
            minimal_puts: true,
            debug_logging: false,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn property_or<T: FromStr>(
    properties: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T> {
    match properties.get(name).map(|v| v.trim()) {
        None | Some("") => Ok(default),
        Some(raw) => raw.parse().map_err(|_| {
            CacheError::InvalidConfiguration(format!("{name} has invalid value '{raw}'"))
        }),
    }
}
