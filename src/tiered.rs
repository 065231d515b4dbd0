//! Tiered cache engine
//!
//! Keeps a local map in front of a [`SharedStore`]. Reads go local first and
//! fall back to the store; writes go to both. The store is never trusted to
//! be available: every store failure degrades to a miss or a `false` result.
//!
//! # Architecture
//!
//! ```text
//! get  → local map ─ hit ─→ return
//!            │ miss
//!            ↓
//!        recursion guard ─ limit reached ─→ not found (store untouched)
//!            │ allowed
//!            ↓
//!        shared store ─ hit ─→ populate local map, return
//!            │ miss / error
//!            ↓
//!        not found
//! ```

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::codecs::JsonCodec;
use crate::groups::GroupSet;
use crate::key::CacheKey;
use crate::recursion_guard::RecursionGuard;
use crate::traits::{CacheCodec, CacheEngine, SharedStore};

/// Local map backed by a shared store
///
/// The local map and the recursion guard are concurrent maps, so one engine
/// can be shared by many tasks. Nothing coordinates concurrent misses across
/// processes: the last `set` wins.
pub struct TieredCache {
    local: DashMap<CacheKey, Value>,
    guard: RecursionGuard,
    groups: GroupSet,
    store: Arc<dyn SharedStore>,
    codec: JsonCodec,
    local_hits: AtomicU64,
    shared_hits: AtomicU64,
    misses: AtomicU64,
    guard_trips: AtomicU64,
    store_errors: AtomicU64,
}

impl TieredCache {
    /// Create an engine in front of `store`
    #[must_use]
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        info!(store = store.name(), "Initializing tiered object cache");

        Self {
            local: DashMap::new(),
            guard: RecursionGuard::new(),
            groups: GroupSet::new(),
            store,
            codec: JsonCodec,
            local_hits: AtomicU64::new(0),
            shared_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            guard_trips: AtomicU64::new(0),
            store_errors: AtomicU64::new(0),
        }
    }

    /// Declared group sets
    #[must_use]
    pub fn groups(&self) -> &GroupSet {
        &self.groups
    }

    /// Whether `group` was declared global
    #[must_use]
    pub fn is_global_group(&self, group: &str) -> bool {
        self.groups.is_global(group)
    }

    /// Whether `group` was declared non-persistent
    #[must_use]
    pub fn is_non_persistent_group(&self, group: &str) -> bool {
        self.groups.is_non_persistent(group)
    }

    /// Recursion guard attempts recorded for `(key, group)`
    #[must_use]
    pub fn guard_attempts(&self, key: &str, group: &str) -> u32 {
        self.guard.attempts(&CacheKey::compose(key, group))
    }

    /// Name of the backing store
    #[must_use]
    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    /// Check the backing store
    pub async fn health_check(&self) -> bool {
        self.store.health_check().await
    }

    /// Get engine statistics
    #[must_use]
    pub fn stats(&self) -> TieredCacheStats {
        let local_hits = self.local_hits.load(Ordering::Relaxed);
        let shared_hits = self.shared_hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let guard_trips = self.guard_trips.load(Ordering::Relaxed);
        let lookups = local_hits + shared_hits + misses + guard_trips;

        #[allow(clippy::cast_precision_loss)]
        let hit_rate = if lookups > 0 {
            ((local_hits + shared_hits) as f64 / lookups as f64) * 100.0
        } else {
            0.0
        };

        TieredCacheStats {
            local_hits,
            shared_hits,
            misses,
            guard_trips,
            store_errors: self.store_errors.load(Ordering::Relaxed),
            hit_rate,
            local_entries: self.local.len(),
            guarded_keys: self.guard.tracked_keys(),
        }
    }

    fn local_value(&self, key: &CacheKey) -> Option<Value> {
        self.local.get(key).map(|entry| entry.value().clone())
    }

    fn store_failed(&self, op: &'static str, key: &CacheKey, error: &anyhow::Error) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
        warn!(store = self.store.name(), op, key = %key, error = %error, "Shared store call failed");
    }

    /// Existence check against the store; an unreachable store counts as absent
    async fn exists_in_store(&self, key: &CacheKey) -> Option<bool> {
        match self.store.exists(key.as_str()).await {
            Ok(exists) => Some(exists),
            Err(e) => {
                self.store_failed("exists", key, &e);
                None
            }
        }
    }

    /// Write to the local map, then the store. The store's result is reported.
    async fn write_through(&self, key: CacheKey, value: Value, expire: Duration) -> bool {
        let bytes = match self.codec.serialize(&value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode value for shared store");
                return false;
            }
        };

        self.local.insert(key.clone(), value);

        match self.store.store(key.as_str(), &bytes, expire).await {
            Ok(()) => {
                debug!(key = %key, expire_secs = expire.as_secs(), "[Tiered] Stored in local + shared");
                true
            }
            Err(e) => {
                self.store_failed("store", &key, &e);
                false
            }
        }
    }

    /// Optimistic local adjustment, made before the store answers
    ///
    /// Non-integer entries are left as they are. Returns the entry held before
    /// the call so a failed adjustment can be rolled back.
    fn guess_locally(&self, key: &CacheKey, guess: impl FnOnce(Option<i64>) -> i64) -> Option<Value> {
        match self.local.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let previous = entry.get().clone();
                if let Some(current) = previous.as_i64() {
                    entry.insert(Value::from(guess(Some(current))));
                }
                Some(previous)
            }
            Entry::Vacant(entry) => {
                entry.insert(Value::from(guess(None)));
                None
            }
        }
    }

    /// Replace the local guess with the store's answer, or roll it back
    fn resync(
        &self,
        op: &'static str,
        key: CacheKey,
        previous: Option<Value>,
        answer: anyhow::Result<Option<i64>>,
    ) -> Option<i64> {
        match answer {
            Ok(Some(value)) => {
                self.local.insert(key, Value::from(value));
                return Some(value);
            }
            Ok(None) => {}
            Err(e) => self.store_failed(op, &key, &e),
        }

        match previous {
            Some(value) => {
                self.local.insert(key, value);
            }
            None => {
                self.local.remove(&key);
            }
        }
        None
    }
}

#[async_trait]
impl CacheEngine for TieredCache {
    async fn add(&self, key: &str, group: &str, value: Value, expire: Duration) -> bool {
        let cache_key = CacheKey::compose(key, group);
        if self.local.contains_key(&cache_key) {
            return false;
        }
        match self.exists_in_store(&cache_key).await {
            Some(false) => self.write_through(cache_key, value, expire).await,
            Some(true) | None => false,
        }
    }

    async fn set(&self, key: &str, group: &str, value: Value, expire: Duration) -> bool {
        self.write_through(CacheKey::compose(key, group), value, expire)
            .await
    }

    async fn get(&self, key: &str, group: &str, _force: bool) -> Option<Value> {
        let cache_key = CacheKey::compose(key, group);

        if let Some(value) = self.local_value(&cache_key) {
            self.local_hits.fetch_add(1, Ordering::Relaxed);
            return Some(value);
        }

        if !self.guard.enter(&cache_key) {
            self.guard_trips.fetch_add(1, Ordering::Relaxed);
            debug!(key = %cache_key, "[Tiered] Recursion guard tripped, skipping shared store");
            return None;
        }

        let bytes = match self.store.fetch(cache_key.as_str()).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Err(e) => {
                self.store_failed("fetch", &cache_key, &e);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        match self.codec.deserialize::<Value>(&bytes) {
            Ok(value) => {
                self.shared_hits.fetch_add(1, Ordering::Relaxed);
                self.local.insert(cache_key, value.clone());
                Some(value)
            }
            Err(e) => {
                warn!(key = %cache_key, error = %e, "Undecodable value in shared store");
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn delete(&self, key: &str, group: &str) -> bool {
        let cache_key = CacheKey::compose(key, group);
        self.local.remove(&cache_key);

        match self.store.delete(cache_key.as_str()).await {
            Ok(()) => true,
            Err(e) => {
                self.store_failed("delete", &cache_key, &e);
                false
            }
        }
    }

    async fn flush(&self) -> bool {
        self.local.clear();

        match self.store.clear_all().await {
            Ok(()) => {
                info!(store = self.store.name(), "[Tiered] Flushed local map and shared store");
                true
            }
            Err(e) => {
                self.store_errors.fetch_add(1, Ordering::Relaxed);
                warn!(store = self.store.name(), error = %e, "Shared store clear failed");
                false
            }
        }
    }

    async fn replace(&self, key: &str, group: &str, value: Value, expire: Duration) -> bool {
        let cache_key = CacheKey::compose(key, group);
        match self.exists_in_store(&cache_key).await {
            Some(true) => self.write_through(cache_key, value, expire).await,
            Some(false) | None => false,
        }
    }

    async fn increment(&self, key: &str, offset: i64, group: &str) -> Option<i64> {
        let cache_key = CacheKey::compose(key, group);
        let previous = self.guess_locally(&cache_key, |current| {
            current.and_then(|n| n.checked_add(offset)).unwrap_or(offset)
        });
        let answer = self.store.increment(cache_key.as_str(), offset).await;
        self.resync("increment", cache_key, previous, answer)
    }

    async fn decrement(&self, key: &str, offset: i64, group: &str) -> Option<i64> {
        let cache_key = CacheKey::compose(key, group);
        let previous = self.guess_locally(&cache_key, |current| {
            current.and_then(|n| n.checked_sub(offset)).unwrap_or(0)
        });
        let answer = self.store.decrement(cache_key.as_str(), offset).await;
        self.resync("decrement", cache_key, previous, answer)
    }

    fn add_global_groups(&self, groups: &[&str]) {
        self.groups.add_global(groups);
    }

    fn add_non_persistent_groups(&self, groups: &[&str]) {
        self.groups.add_non_persistent(groups);
    }

    fn switch_to_context(&self, context_id: u64) {
        debug!(context_id, "[Tiered] Context switch requested");
    }

    fn reset(&self) {
        debug!("[Tiered] Reset requested");
    }

    fn name(&self) -> &'static str {
        "Tiered"
    }
}

/// Tiered cache statistics
#[derive(Debug, Clone, PartialEq)]
pub struct TieredCacheStats {
    /// Reads answered by the local map
    pub local_hits: u64,
    /// Reads answered by the shared store
    pub shared_hits: u64,
    /// Reads the store could not answer (absent, failed, undecodable)
    pub misses: u64,
    /// Reads refused by the recursion guard
    pub guard_trips: u64,
    pub store_errors: u64,
    /// Percentage of reads that found a value
    pub hit_rate: f64,
    pub local_entries: usize,
    pub guarded_keys: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::NO_EXPIRATION;
    use anyhow::anyhow;
    use serde_json::json;

    /// Store whose every call fails
    struct DownStore;

    #[async_trait]
    impl SharedStore for DownStore {
        async fn exists(&self, _key: &str) -> anyhow::Result<bool> {
            Err(anyhow!("connection refused"))
        }
        async fn fetch(&self, _key: &str) -> anyhow::Result<Option<Vec<u8>>> {
            Err(anyhow!("connection refused"))
        }
        async fn store(&self, _key: &str, _value: &[u8], _expire: Duration) -> anyhow::Result<()> {
            Err(anyhow!("connection refused"))
        }
        async fn delete(&self, _key: &str) -> anyhow::Result<()> {
            Err(anyhow!("connection refused"))
        }
        async fn clear_all(&self) -> anyhow::Result<()> {
            Err(anyhow!("connection refused"))
        }
        async fn increment(&self, _key: &str, _offset: i64) -> anyhow::Result<Option<i64>> {
            Err(anyhow!("connection refused"))
        }
        async fn decrement(&self, _key: &str, _offset: i64) -> anyhow::Result<Option<i64>> {
            Err(anyhow!("connection refused"))
        }
        async fn health_check(&self) -> bool {
            false
        }
    }

    fn memory_backed() -> (TieredCache, MemoryStore) {
        let store = MemoryStore::new();
        (TieredCache::new(Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn set_writes_both_tiers() {
        let (cache, store) = memory_backed();
        assert!(cache.set("k", "g", json!({"a": 1}), NO_EXPIRATION).await);

        assert_eq!(cache.stats().local_entries, 1);
        assert_eq!(store.fetch("g:k").await.unwrap(), Some(br#"{"a":1}"#.to_vec()));
    }

    #[tokio::test]
    async fn local_hit_skips_store() {
        let (cache, store) = memory_backed();
        cache.set("k", "g", json!(1), NO_EXPIRATION).await;

        assert_eq!(cache.get("k", "g", false).await, Some(json!(1)));
        assert_eq!(store.counters().0, 0);
        assert_eq!(cache.guard_attempts("k", "g"), 0);
        assert_eq!(cache.stats().local_hits, 1);
    }

    #[tokio::test]
    async fn shared_hit_populates_local_map() {
        let (cache, store) = memory_backed();
        store.store("g:k", b"\"shared\"", NO_EXPIRATION).await.unwrap();

        assert_eq!(cache.get("k", "g", false).await, Some(json!("shared")));
        assert_eq!(cache.get("k", "g", false).await, Some(json!("shared")));

        let stats = cache.stats();
        assert_eq!(stats.shared_hits, 1);
        assert_eq!(stats.local_hits, 1);
        assert_eq!(store.counters().0, 1);
    }

    #[tokio::test]
    async fn add_checks_the_shared_store() {
        let (cache, store) = memory_backed();
        store.store("g:k", b"1", NO_EXPIRATION).await.unwrap();

        assert!(!cache.add("k", "g", json!(2), NO_EXPIRATION).await);
        assert_eq!(store.fetch("g:k").await.unwrap(), Some(b"1".to_vec()));
        assert!(cache.add("other", "g", json!(2), NO_EXPIRATION).await);
        assert!(!cache.add("other", "g", json!(3), NO_EXPIRATION).await);
    }

    #[tokio::test]
    async fn replace_consults_the_store_not_the_local_map() {
        let (cache, store) = memory_backed();
        cache.set("k", "g", json!(1), NO_EXPIRATION).await;
        // Another process removed it
        store.delete("g:k").await.unwrap();

        assert!(!cache.replace("k", "g", json!(2), NO_EXPIRATION).await);
        assert!(!store.exists("g:k").await.unwrap());
    }

    #[tokio::test]
    async fn increment_resynchronizes_to_store_value() {
        let (cache, store) = memory_backed();
        // Written by another process; local mirror is empty
        store.store("g:n", b"40", NO_EXPIRATION).await.unwrap();

        assert_eq!(cache.increment("n", 2, "g").await, Some(42));
        assert_eq!(cache.get("n", "g", false).await, Some(json!(42)));
        assert_eq!(cache.decrement("n", 50, "g").await, Some(-8));
        assert_eq!(cache.get("n", "g", false).await, Some(json!(-8)));
    }

    #[tokio::test]
    async fn failed_increment_leaves_no_local_guess() {
        let (cache, _store) = memory_backed();

        assert_eq!(cache.increment("n", 3, "g").await, None);
        assert_eq!(cache.decrement("n", 3, "g").await, None);
        assert_eq!(cache.stats().local_entries, 0);
    }

    #[tokio::test]
    async fn failed_increment_keeps_non_integer_local_value() {
        let cache = TieredCache::new(Arc::new(DownStore));
        cache.set("s", "g", json!("text"), NO_EXPIRATION).await;

        assert_eq!(cache.increment("s", 1, "g").await, None);
        assert_eq!(cache.decrement("s", 1, "g").await, None);
        assert_eq!(cache.get("s", "g", false).await, Some(json!("text")));
        assert_eq!(cache.guard_attempts("s", "g"), 0);
    }

    #[tokio::test]
    async fn failed_increment_restores_previous_integer() {
        let cache = TieredCache::new(Arc::new(DownStore));
        cache.set("n", "g", json!(5), NO_EXPIRATION).await;

        assert_eq!(cache.increment("n", 2, "g").await, None);
        assert_eq!(cache.get("n", "g", false).await, Some(json!(5)));
    }

    #[tokio::test]
    async fn non_integer_increment_needs_no_store_lookup_afterwards() {
        let (cache, store) = memory_backed();
        cache.set("s", "g", json!("text"), NO_EXPIRATION).await;

        assert_eq!(cache.increment("s", 1, "g").await, None);
        assert_eq!(cache.get("s", "g", false).await, Some(json!("text")));
        assert_eq!(store.counters().0 + store.counters().1, 0);
        assert_eq!(cache.guard_attempts("s", "g"), 0);
    }

    #[tokio::test]
    async fn unavailable_store_degrades_to_misses_and_false() {
        let cache = TieredCache::new(Arc::new(DownStore));

        assert!(!cache.set("k", "g", json!(1), NO_EXPIRATION).await);
        assert!(!cache.add("a", "g", json!(1), NO_EXPIRATION).await);
        assert!(!cache.replace("k", "g", json!(1), NO_EXPIRATION).await);
        assert!(!cache.delete("k", "g").await);
        assert_eq!(cache.get("missing", "g", false).await, None);
        assert_eq!(cache.increment("n", 1, "g").await, None);
        assert!(!cache.health_check().await);
        assert!(cache.stats().store_errors >= 6);
    }

    #[tokio::test]
    async fn set_keeps_local_copy_when_store_write_fails() {
        let cache = TieredCache::new(Arc::new(DownStore));

        assert!(!cache.set("k", "g", json!("local"), NO_EXPIRATION).await);
        assert_eq!(cache.get("k", "g", false).await, Some(json!("local")));
    }

    #[tokio::test]
    async fn flush_clears_local_map_even_when_store_fails() {
        let cache = TieredCache::new(Arc::new(DownStore));
        cache.set("k", "g", json!(1), NO_EXPIRATION).await;

        assert!(!cache.flush().await);
        assert_eq!(cache.get("k", "g", false).await, None);
    }

    #[test]
    fn declared_groups_are_queryable() {
        let (cache, _store) = memory_backed();
        cache.add_global_groups(&["users", "site-options"]);
        cache.add_non_persistent_groups(&["counts"]);

        assert!(cache.is_global_group("users"));
        assert!(!cache.is_global_group("counts"));
        assert!(cache.is_non_persistent_group("counts"));
        assert!(!cache.is_non_persistent_group("users"));
    }

    #[tokio::test]
    async fn guard_trips_after_four_store_lookups() {
        let (cache, store) = memory_backed();

        for _ in 0..8 {
            assert_eq!(cache.get("never", "g", false).await, None);
        }

        assert_eq!(store.counters().1, 4);
        let stats = cache.stats();
        assert_eq!(stats.misses, 4);
        assert_eq!(stats.guard_trips, 4);
        assert_eq!(cache.guard_attempts("never", "g"), 8);
    }

    #[tokio::test]
    async fn undecodable_store_value_reads_as_miss() {
        let (cache, store) = memory_backed();
        store.store("g:bad", b"\xff\xfe", NO_EXPIRATION).await.unwrap();

        assert_eq!(cache.get("bad", "g", false).await, None);
        assert_eq!(cache.stats().local_entries, 0);
    }

    #[tokio::test]
    async fn group_declarations_are_recorded() {
        let (cache, _store) = memory_backed();
        cache.add_global_groups(&["users"]);
        cache.add_non_persistent_groups(&["counts"]);

        assert!(cache.groups().is_global("users"));
        assert!(cache.groups().is_non_persistent("counts"));
    }
}
