//! Environment configuration
//!
//! | Variable             | Meaning                                        | Default                       |
//! |----------------------|------------------------------------------------|-------------------------------|
//! | `OBJECT_CACHE_BATCH` | batch/CLI run, forces the local-only engine    | `false`                       |
//! | `OBJECT_CACHE_STORE` | `redis`, `memcached`, `memory` or `none`       | `redis` (`none` without it)   |
//! | `REDIS_URL`          | Redis connection string                        | `redis://127.0.0.1:6379`      |
//! | `MEMCACHED_URL`      | Memcached connection string                    | `memcache://127.0.0.1:11211`  |

use std::fmt;
use std::str::FromStr;

use crate::error::{CacheError, Result};

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_MEMCACHED_URL: &str = "memcache://127.0.0.1:11211";

const BATCH_VAR: &str = "OBJECT_CACHE_BATCH";
const STORE_VAR: &str = "OBJECT_CACHE_STORE";
const REDIS_URL_VAR: &str = "REDIS_URL";
const MEMCACHED_URL_VAR: &str = "MEMCACHED_URL";

/// Which shared store to connect to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Redis,
    Memcached,
    /// In-process `MemoryStore`
    Memory,
    /// No shared store; the local-only engine is selected
    None,
}

impl Default for StoreKind {
    fn default() -> Self {
        if cfg!(feature = "redis") { Self::Redis } else { Self::None }
    }
}

impl FromStr for StoreKind {
    type Err = CacheError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memcached" | "memcache" => Ok(Self::Memcached),
            "memory" => Ok(Self::Memory),
            "none" | "" => Ok(Self::None),
            _ => Err(CacheError::InvalidConfig {
                var: STORE_VAR,
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Redis => "redis",
            Self::Memcached => "memcached",
            Self::Memory => "memory",
            Self::None => "none",
        })
    }
}

/// Object cache configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Running under a batch/CLI harness
    pub batch_mode: bool,
    pub store: StoreKind,
    pub redis_url: String,
    pub memcached_url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            batch_mode: false,
            store: StoreKind::default(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            memcached_url: DEFAULT_MEMCACHED_URL.to_string(),
        }
    }
}

impl CacheConfig {
    /// Load configuration from process environment variables
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfig`] for an unparseable variable.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfig`] for an unparseable variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let batch_mode = match lookup(BATCH_VAR) {
            Some(value) => parse_flag(BATCH_VAR, &value)?,
            None => defaults.batch_mode,
        };
        let store = match lookup(STORE_VAR) {
            Some(value) => value.parse()?,
            None => defaults.store,
        };

        Ok(Self {
            batch_mode,
            store,
            redis_url: lookup(REDIS_URL_VAR).unwrap_or(defaults.redis_url),
            memcached_url: lookup(MEMCACHED_URL_VAR).unwrap_or(defaults.memcached_url),
        })
    }
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(CacheError::InvalidConfig {
            var,
            value: value.to_string(),
        }),
    }
}
