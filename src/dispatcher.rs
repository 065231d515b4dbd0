//! Dispatcher - Engine Selection and Forwarding
//!
//! Holds exactly one engine, chosen once when the dispatcher is built, and
//! forwards every operation to it unchanged. The choice never changes for the
//! dispatcher's lifetime; `flush` is the only way to start over.
//!
//! # Selection Order
//!
//! 1. Batch/CLI run → [`LocalOnlyCache`]
//! 2. No shared store available → [`LocalOnlyCache`]
//! 3. Otherwise → [`TieredCache`]

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::local_only::LocalOnlyCache;
use crate::tiered::{TieredCache, TieredCacheStats};
use crate::traits::{CacheEngine, MultiKeys, MultiValues, SharedStore};

/// Capability signals evaluated once at startup
#[derive(Clone, Default)]
pub struct CacheEnvironment {
    /// Running under a batch/CLI harness, where sharing across processes is meaningless
    pub batch_mode: bool,
    /// Reachable shared store, if any
    pub shared_store: Option<Arc<dyn SharedStore>>,
}

/// Which engine a dispatcher selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    LocalOnly,
    Tiered,
}

enum ActiveEngine {
    LocalOnly(LocalOnlyCache),
    Tiered(TieredCache),
}

/// Forward a call to whichever engine is active
macro_rules! forward {
    ($self:ident, $engine:ident => $call:expr) => {
        match &$self.engine {
            ActiveEngine::LocalOnly($engine) => $call,
            ActiveEngine::Tiered($engine) => $call,
        }
    };
}

/// Entry point for every cache operation
///
/// # Example
///
/// ```rust
/// use tiered_object_cache::{CacheEnvironment, Dispatcher, EngineKind, NO_EXPIRATION};
/// use serde_json::json;
///
/// # async fn example() {
/// let cache = Dispatcher::select(CacheEnvironment { batch_mode: true, shared_store: None });
/// assert_eq!(cache.engine_kind(), EngineKind::LocalOnly);
///
/// cache.set("greeting", "", json!("hello"), NO_EXPIRATION).await;
/// assert_eq!(cache.get("greeting", "", false).await, Some(json!("hello")));
/// # }
/// ```
pub struct Dispatcher {
    engine: ActiveEngine,
}

impl Dispatcher {
    /// Select an engine from the environment's capability signals
    #[must_use]
    pub fn select(environment: CacheEnvironment) -> Self {
        let engine = match environment {
            CacheEnvironment { batch_mode: true, .. } => {
                info!("Batch mode detected, selecting local-only object cache");
                ActiveEngine::LocalOnly(LocalOnlyCache::new())
            }
            CacheEnvironment { shared_store: None, .. } => {
                info!("No shared store available, selecting local-only object cache");
                ActiveEngine::LocalOnly(LocalOnlyCache::new())
            }
            CacheEnvironment { shared_store: Some(store), .. } => {
                info!(store = store.name(), "Selecting tiered object cache");
                ActiveEngine::Tiered(TieredCache::new(store))
            }
        };
        Self { engine }
    }

    /// Dispatcher over a fresh [`LocalOnlyCache`]
    #[must_use]
    pub fn local_only() -> Self {
        Self::select(CacheEnvironment::default())
    }

    /// Dispatcher over a [`TieredCache`] in front of `store`
    #[must_use]
    pub fn tiered(store: Arc<dyn SharedStore>) -> Self {
        Self::select(CacheEnvironment {
            batch_mode: false,
            shared_store: Some(store),
        })
    }

    #[must_use]
    pub fn engine_kind(&self) -> EngineKind {
        match self.engine {
            ActiveEngine::LocalOnly(_) => EngineKind::LocalOnly,
            ActiveEngine::Tiered(_) => EngineKind::Tiered,
        }
    }

    /// Name of the active engine
    #[must_use]
    pub fn engine_name(&self) -> &'static str {
        forward!(self, engine => engine.name())
    }

    /// Statistics of the tiered engine; `None` when running local-only
    #[must_use]
    pub fn tiered_stats(&self) -> Option<TieredCacheStats> {
        match &self.engine {
            ActiveEngine::Tiered(engine) => Some(engine.stats()),
            ActiveEngine::LocalOnly(_) => None,
        }
    }

    /// Tiered engine, for group and guard introspection
    #[must_use]
    pub fn as_tiered(&self) -> Option<&TieredCache> {
        match &self.engine {
            ActiveEngine::Tiered(engine) => Some(engine),
            ActiveEngine::LocalOnly(_) => None,
        }
    }

    /// Check the active engine; local-only is always healthy
    pub async fn health_check(&self) -> bool {
        match &self.engine {
            ActiveEngine::LocalOnly(_) => true,
            ActiveEngine::Tiered(engine) => engine.health_check().await,
        }
    }

    // ===== Engine Operations =====

    pub async fn add(&self, key: &str, group: &str, value: Value, expire: Duration) -> bool {
        forward!(self, engine => engine.add(key, group, value, expire).await)
    }

    pub async fn set(&self, key: &str, group: &str, value: Value, expire: Duration) -> bool {
        forward!(self, engine => engine.set(key, group, value, expire).await)
    }

    pub async fn get(&self, key: &str, group: &str, force: bool) -> Option<Value> {
        forward!(self, engine => engine.get(key, group, force).await)
    }

    pub async fn delete(&self, key: &str, group: &str) -> bool {
        forward!(self, engine => engine.delete(key, group).await)
    }

    pub async fn flush(&self) -> bool {
        forward!(self, engine => engine.flush().await)
    }

    pub async fn replace(&self, key: &str, group: &str, value: Value, expire: Duration) -> bool {
        forward!(self, engine => engine.replace(key, group, value, expire).await)
    }

    pub async fn increment(&self, key: &str, offset: i64, group: &str) -> Option<i64> {
        forward!(self, engine => engine.increment(key, offset, group).await)
    }

    pub async fn decrement(&self, key: &str, offset: i64, group: &str) -> Option<i64> {
        forward!(self, engine => engine.decrement(key, offset, group).await)
    }

    pub async fn get_multi(&self, groups: &MultiKeys) -> MultiValues {
        forward!(self, engine => engine.get_multi(groups).await)
    }

    pub fn add_global_groups(&self, groups: &[&str]) {
        forward!(self, engine => engine.add_global_groups(groups));
    }

    pub fn add_non_persistent_groups(&self, groups: &[&str]) {
        forward!(self, engine => engine.add_non_persistent_groups(groups));
    }

    pub fn switch_to_context(&self, context_id: u64) {
        forward!(self, engine => engine.switch_to_context(context_id));
    }

    pub fn reset(&self) {
        forward!(self, engine => engine.reset());
    }

    // ===== Typed Helpers =====

    /// Serialize `value` and `set` it
    ///
    /// Returns `false` if `value` cannot be represented as JSON.
    pub async fn set_as<T: Serialize + ?Sized>(
        &self,
        key: &str,
        group: &str,
        value: &T,
        expire: Duration,
    ) -> bool {
        match serde_json::to_value(value) {
            Ok(value) => self.set(key, group, value, expire).await,
            Err(e) => {
                warn!(key = %key, group = %group, error = %e, "Failed to serialize value for cache");
                false
            }
        }
    }

    /// Serialize `value` and `add` it
    pub async fn add_as<T: Serialize + ?Sized>(
        &self,
        key: &str,
        group: &str,
        value: &T,
        expire: Duration,
    ) -> bool {
        match serde_json::to_value(value) {
            Ok(value) => self.add(key, group, value, expire).await,
            Err(e) => {
                warn!(key = %key, group = %group, error = %e, "Failed to serialize value for cache");
                false
            }
        }
    }

    /// `get` and deserialize; a value of another shape reads as not found
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str, group: &str) -> Option<T> {
        let value = self.get(key, group, false).await?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                debug!(key = %key, group = %group, error = %e, "Cached value has unexpected shape");
                None
            }
        }
    }

    /// Get a value, computing and caching it on a miss
    ///
    /// The regeneration loop this enables is the one the recursion guard
    /// bounds: when the store keeps missing, at most four lookups per key
    /// reach it and `compute_fn` supplies the value from then on.
    ///
    /// # Errors
    ///
    /// Returns whatever error `compute_fn` returns. A failed cache write is
    /// logged and the computed value is still returned.
    ///
    /// # Example
    /// ```rust,ignore
    /// let options = cache.get_or_compute_with("alloptions", "options", NO_EXPIRATION, || async {
    ///     load_options_from_database().await
    /// }).await?;
    /// ```
    pub async fn get_or_compute_with<F, Fut>(
        &self,
        key: &str,
        group: &str,
        expire: Duration,
        compute_fn: F,
    ) -> anyhow::Result<Value>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<Value>> + Send,
    {
        if let Some(value) = self.get(key, group, false).await {
            return Ok(value);
        }

        debug!(key = %key, group = %group, "Computing fresh value");
        let fresh = compute_fn().await?;

        if !self.set(key, group, fresh.clone(), expire).await {
            warn!(key = %key, group = %group, "Failed to cache computed value");
        }
        Ok(fresh)
    }

    /// Typed variant of [`Dispatcher::get_or_compute_with`]
    ///
    /// # Errors
    ///
    /// Returns the error of `compute_fn`, or a serialization error if the
    /// computed value cannot be represented as JSON.
    pub async fn get_or_compute_typed<T, F, Fut>(
        &self,
        key: &str,
        group: &str,
        expire: Duration,
        compute_fn: F,
    ) -> anyhow::Result<T>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<T>> + Send,
    {
        if let Some(typed) = self.get_as::<T>(key, group).await {
            return Ok(typed);
        }

        debug!(key = %key, group = %group, "Computing fresh typed value");
        let fresh = compute_fn().await?;
        let value = serde_json::to_value(&fresh)?;

        if !self.set(key, group, value, expire).await {
            warn!(key = %key, group = %group, "Failed to cache computed value");
        }
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::NO_EXPIRATION;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Post {
        id: u64,
        title: String,
    }

    fn memory_store() -> Arc<dyn SharedStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn batch_mode_wins_over_available_store() {
        let dispatcher = Dispatcher::select(CacheEnvironment {
            batch_mode: true,
            shared_store: Some(memory_store()),
        });
        assert_eq!(dispatcher.engine_kind(), EngineKind::LocalOnly);
        assert!(dispatcher.tiered_stats().is_none());
    }

    #[test]
    fn missing_store_selects_local_only() {
        let dispatcher = Dispatcher::select(CacheEnvironment::default());
        assert_eq!(dispatcher.engine_kind(), EngineKind::LocalOnly);
        assert_eq!(dispatcher.engine_name(), "LocalOnly");
    }

    #[test]
    fn available_store_selects_tiered() {
        let dispatcher = Dispatcher::tiered(memory_store());
        assert_eq!(dispatcher.engine_kind(), EngineKind::Tiered);
        assert_eq!(dispatcher.engine_name(), "Tiered");
        assert!(dispatcher.as_tiered().is_some());
    }

    #[tokio::test]
    async fn forwards_found_flag_unchanged() {
        for dispatcher in [Dispatcher::local_only(), Dispatcher::tiered(memory_store())] {
            dispatcher.set("zero", "", json!(0), NO_EXPIRATION).await;
            assert_eq!(dispatcher.get("zero", "", false).await, Some(json!(0)));
            assert_eq!(dispatcher.get("absent", "", true).await, None);
        }
    }

    #[tokio::test]
    async fn typed_helpers_round_trip_structs() {
        let dispatcher = Dispatcher::tiered(memory_store());
        let post = Post { id: 7, title: "Hello".to_string() };

        assert!(dispatcher.set_as("7", "posts", &post, NO_EXPIRATION).await);
        assert!(!dispatcher.add_as("7", "posts", &post, NO_EXPIRATION).await);
        assert_eq!(dispatcher.get_as::<Post>("7", "posts").await, Some(post));
        assert_eq!(dispatcher.get_as::<u64>("7", "posts").await, None);
    }

    #[tokio::test]
    async fn get_or_compute_caches_the_computed_value() {
        let dispatcher = Dispatcher::tiered(memory_store());
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        for _ in 0..3 {
            let value = dispatcher
                .get_or_compute_with("expensive", "", NO_EXPIRATION, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({"rows": 3}))
                })
                .await
                .unwrap();
            assert_eq!(value, json!({"rows": 3}));
        }

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_or_compute_propagates_compute_errors() {
        let dispatcher = Dispatcher::local_only();
        let result = dispatcher
            .get_or_compute_with("broken", "", NO_EXPIRATION, || async {
                Err(anyhow::anyhow!("database down"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(dispatcher.get("broken", "", false).await, None);
    }

    #[tokio::test]
    async fn get_or_compute_typed_returns_structs() {
        let dispatcher = Dispatcher::local_only();
        let post = dispatcher
            .get_or_compute_typed("1", "posts", NO_EXPIRATION, || async {
                Ok(Post { id: 1, title: "First".to_string() })
            })
            .await
            .unwrap();

        assert_eq!(post.id, 1);
        assert_eq!(
            dispatcher.get("1", "posts", false).await,
            Some(json!({"id": 1, "title": "First"}))
        );
    }

    #[tokio::test]
    async fn local_only_is_always_healthy() {
        assert!(Dispatcher::local_only().health_check().await);
        assert!(Dispatcher::tiered(memory_store()).health_check().await);
    }
}
