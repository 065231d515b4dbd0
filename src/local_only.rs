//! Local-only cache engine
//!
//! Plain in-memory map with no shared store behind it. Selected for batch
//! runs and for hosts where no shared store is reachable. Expirations are
//! accepted and ignored: entries live as long as the engine.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::key::CacheKey;
use crate::traits::CacheEngine;

/// In-memory engine
///
/// ```rust
/// use tiered_object_cache::{CacheEngine, LocalOnlyCache, NO_EXPIRATION};
/// use serde_json::json;
///
/// # async fn example() {
/// let cache = LocalOnlyCache::new();
/// assert!(cache.add("k", "", json!(1), NO_EXPIRATION).await);
/// assert!(!cache.add("k", "", json!(2), NO_EXPIRATION).await);
/// assert_eq!(cache.get("k", "default", false).await, Some(json!(1)));
/// # }
/// ```
#[derive(Debug, Default)]
pub struct LocalOnlyCache {
    entries: DashMap<CacheKey, Value>,
}

impl LocalOnlyCache {
    #[must_use]
    pub fn new() -> Self {
        info!("Initializing local-only object cache");
        Self::default()
    }

    /// Number of cached entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn adjust(&self, key: &str, group: &str, op: impl FnOnce(i64) -> Option<i64>) -> Option<i64> {
        let mut entry = self.entries.get_mut(&CacheKey::compose(key, group))?;
        // Non-integer values are left untouched
        let next = op(entry.as_i64()?)?;
        *entry = Value::from(next);
        Some(next)
    }
}

#[async_trait]
impl CacheEngine for LocalOnlyCache {
    async fn add(&self, key: &str, group: &str, value: Value, _expire: Duration) -> bool {
        match self.entries.entry(CacheKey::compose(key, group)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    async fn set(&self, key: &str, group: &str, value: Value, _expire: Duration) -> bool {
        self.entries.insert(CacheKey::compose(key, group), value);
        true
    }

    async fn get(&self, key: &str, group: &str, _force: bool) -> Option<Value> {
        self.entries
            .get(&CacheKey::compose(key, group))
            .map(|entry| entry.value().clone())
    }

    async fn delete(&self, key: &str, group: &str) -> bool {
        self.entries.remove(&CacheKey::compose(key, group));
        true
    }

    async fn flush(&self) -> bool {
        self.entries.clear();
        debug!("[LocalOnly] Flushed all entries");
        true
    }

    async fn replace(&self, key: &str, group: &str, value: Value, _expire: Duration) -> bool {
        match self.entries.get_mut(&CacheKey::compose(key, group)) {
            Some(mut entry) => {
                *entry = value;
                true
            }
            None => false,
        }
    }

    async fn increment(&self, key: &str, offset: i64, group: &str) -> Option<i64> {
        self.adjust(key, group, |current| current.checked_add(offset))
    }

    async fn decrement(&self, key: &str, offset: i64, group: &str) -> Option<i64> {
        self.adjust(key, group, |current| current.checked_sub(offset))
    }

    fn add_global_groups(&self, _groups: &[&str]) {}

    fn add_non_persistent_groups(&self, _groups: &[&str]) {}

    fn switch_to_context(&self, _context_id: u64) {}

    fn reset(&self) {}

    fn name(&self) -> &'static str {
        "LocalOnly"
    }
}
