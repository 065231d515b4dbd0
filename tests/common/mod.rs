//! Common utilities for integration tests
//!
//! - `ScriptedStore`: in-memory shared store that counts calls and can be
//!   switched into a failing mode
//! - Unique key helpers
//! - Test data

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tiered_object_cache::{async_trait, Dispatcher, MemoryStore, SharedStore, TieredCache};

/// Get Redis URL from environment or use default
pub fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

/// Create a test key with a random suffix to avoid conflicts between tests
pub fn test_key(name: &str) -> String {
    format!("test_{}_{}", name, rand::random::<u32>())
}

/// Shared store backed by `MemoryStore` that counts calls and can be made to fail
#[derive(Default)]
pub struct ScriptedStore {
    inner: MemoryStore,
    failing: AtomicBool,
    exists_checks: AtomicUsize,
    fetches: AtomicUsize,
    stores: AtomicUsize,
    clears: AtomicUsize,
}

impl ScriptedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store whose every call errors, as if the server were down
    pub fn failing() -> Arc<Self> {
        let store = Self::new();
        store.set_failing(true);
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn exists_checks(&self) -> usize {
        self.exists_checks.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn stores(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    /// Direct access to the backing entries, bypassing the failure switch
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(anyhow!("scripted store outage"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SharedStore for ScriptedStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        self.exists_checks.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.exists(key).await
    }

    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.fetch(key).await
    }

    async fn store(&self, key: &str, value: &[u8], expire: Duration) -> Result<()> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.store(key, value, expire).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn clear_all(&self) -> Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.clear_all().await
    }

    async fn increment(&self, key: &str, offset: i64) -> Result<Option<i64>> {
        self.check()?;
        self.inner.increment(key, offset).await
    }

    async fn decrement(&self, key: &str, offset: i64) -> Result<Option<i64>> {
        self.check()?;
        self.inner.decrement(key, offset).await
    }

    async fn health_check(&self) -> bool {
        self.check().is_ok()
    }

    fn name(&self) -> &'static str {
        "Scripted"
    }
}

/// Tiered engine in front of a fresh scripted store
pub fn tiered_cache() -> (TieredCache, Arc<ScriptedStore>) {
    let store = ScriptedStore::new();
    (TieredCache::new(store.clone()), store)
}

/// One dispatcher per engine, for contract tests that must hold for both
pub fn both_engines() -> Vec<Dispatcher> {
    vec![Dispatcher::local_only(), Dispatcher::tiered(ScriptedStore::new())]
}

/// Generate test data
pub mod test_data {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct User {
        pub id: u64,
        pub name: String,
        pub email: String,
    }

    impl User {
        pub fn new(id: u64) -> Self {
            Self {
                id,
                name: format!("User {}", id),
                email: format!("user{}@example.com", id),
            }
        }
    }

    /// Generate JSON test data
    pub fn json_user(id: u64) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "name": format!("User {}", id),
            "email": format!("user{}@example.com", id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let key1 = test_key("user");
        let key2 = test_key("user");
        assert_ne!(key1, key2, "Keys should be unique");
        assert!(key1.starts_with("test_user_"));
    }
}
