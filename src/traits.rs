//! Cache Traits
//!
//! This module defines the seams of the object cache:
//!
//! - `CacheCodec`: serialization of values on their way into a shared store
//! - `SharedStore`: the process-external backing store consumed by `TieredCache`
//! - `CacheEngine`: the operation surface both engines implement identically
//!
//! # Example: Custom Shared Store
//!
//! ```rust,ignore
//! use tiered_object_cache::{SharedStore, async_trait};
//! use std::time::Duration;
//! use anyhow::Result;
//!
//! struct MyStore {
//!     // Your client
//! }
//!
//! #[async_trait]
//! impl SharedStore for MyStore {
//!     async fn exists(&self, key: &str) -> Result<bool> { /* ... */ }
//!     async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>> { /* ... */ }
//!     async fn store(&self, key: &str, value: &[u8], expire: Duration) -> Result<()> { /* ... */ }
//!     async fn delete(&self, key: &str) -> Result<()> { /* ... */ }
//!     async fn clear_all(&self) -> Result<()> { /* ... */ }
//!     async fn increment(&self, key: &str, offset: i64) -> Result<Option<i64>> { /* ... */ }
//!     async fn decrement(&self, key: &str, offset: i64) -> Result<Option<i64>> { /* ... */ }
//!     async fn health_check(&self) -> bool { /* ... */ }
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;

/// Request shape for `get_multi`: group name to the keys wanted from it
pub type MultiKeys = HashMap<String, Vec<String>>;

/// Result shape for `get_multi`: group name to the entries that were found
pub type MultiValues = HashMap<String, HashMap<String, Value>>;

/// Trait for cache value serialization/deserialization
///
/// Implementations must be `Send + Sync + Debug` to support concurrent access
/// across async tasks and provide debugging capabilities.
pub trait CacheCodec: Send + Sync + Debug {
    /// Serialize a value to bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented by this codec.
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize bytes to a value
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid encoding of `T`.
    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;

    /// Get the name of the codec, used for logging
    fn name(&self) -> &'static str;
}

/// Shared backing store contract
///
/// The store is process-external and shared by every process running the
/// cache. It owns persistence and expiration; the cache only relies on the
/// atomicity of its individual primitives.
///
/// # Error Semantics
///
/// `Err` means the store could not be reached or the command failed. A key
/// that simply is not there is `Ok(false)` / `Ok(None)`. Engines log errors
/// and degrade them to a miss, they never propagate them.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one store is shared by every
/// engine in the process.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Check whether `key` holds a live entry
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Fetch the raw bytes stored under `key`
    ///
    /// * `Ok(Some(bytes))` - Entry found
    /// * `Ok(None)` - Key absent or expired
    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, overwriting any previous entry
    ///
    /// `expire == Duration::ZERO` means no expiration (store default).
    async fn store(&self, key: &str, value: &[u8], expire: Duration) -> Result<()>;

    /// Remove `key`
    ///
    /// `Ok(())` means the key is gone afterwards, whether or not it existed.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove every entry in the store, not only those written by this process
    async fn clear_all(&self) -> Result<()>;

    /// Atomically add `offset` to the integer stored under `key`
    ///
    /// * `Ok(Some(n))` - New value
    /// * `Ok(None)` - Key absent or not an integer; nothing is created
    async fn increment(&self, key: &str, offset: i64) -> Result<Option<i64>>;

    /// Atomically subtract `offset` from the integer stored under `key`
    ///
    /// Same contract as [`SharedStore::increment`].
    async fn decrement(&self, key: &str, offset: i64) -> Result<Option<i64>>;

    /// Check if the store is reachable and answering
    async fn health_check(&self) -> bool;

    /// Get the name of this store (e.g., "Redis", "Memcached")
    fn name(&self) -> &'static str {
        "unknown"
    }
}

/// Operation surface of a cache engine
///
/// `LocalOnlyCache` and `TieredCache` implement this identically; the
/// `Dispatcher` forwards to whichever one was selected at startup.
///
/// No method returns an error: misses, store outages and recursion guard
/// trips all surface as `false` / `None`.
#[async_trait]
pub trait CacheEngine: Send + Sync {
    /// Store `value` only if nothing is cached under the key yet
    async fn add(&self, key: &str, group: &str, value: Value, expire: Duration) -> bool;

    /// Store `value` unconditionally
    async fn set(&self, key: &str, group: &str, value: Value, expire: Duration) -> bool;

    /// Look up a value
    ///
    /// `Some(value)` means found, even when `value` is `false`, `null` or `0`.
    /// `force` is advisory and ignored by both engines.
    async fn get(&self, key: &str, group: &str, force: bool) -> Option<Value>;

    /// Remove a value; succeeds whether or not it was present
    async fn delete(&self, key: &str, group: &str) -> bool;

    /// Drop every cached value
    async fn flush(&self) -> bool;

    /// Overwrite a value only if one is already cached under the key
    async fn replace(&self, key: &str, group: &str, value: Value, expire: Duration) -> bool;

    /// Add `offset` to a cached integer, returning the new value
    async fn increment(&self, key: &str, offset: i64, group: &str) -> Option<i64>;

    /// Subtract `offset` from a cached integer, returning the new value
    async fn decrement(&self, key: &str, offset: i64, group: &str) -> Option<i64>;

    /// Look up many keys across groups
    ///
    /// Keys that are not found are omitted, and so are groups in which no
    /// key was found.
    async fn get_multi(&self, groups: &MultiKeys) -> MultiValues {
        let mut results = MultiValues::new();
        for (group, keys) in groups {
            for key in keys {
                if let Some(value) = self.get(key, group, false).await {
                    results
                        .entry(group.clone())
                        .or_default()
                        .insert(key.clone(), value);
                }
            }
        }
        results
    }

    /// Declare groups shared across contexts
    fn add_global_groups(&self, groups: &[&str]);

    /// Declare groups that should not outlive a context switch
    fn add_non_persistent_groups(&self, groups: &[&str]);

    /// Switch to another logical context (tenant/site)
    fn switch_to_context(&self, context_id: u64);

    /// Reset per-context state
    fn reset(&self);

    /// Get the name of this engine, used for logging
    fn name(&self) -> &'static str;
}
