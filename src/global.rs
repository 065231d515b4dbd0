//! Process-wide dispatcher slot and flat cache API
//!
//! Hosts that expect free functions (`cache_get`, `cache_set`, ...) install one
//! [`Dispatcher`] at startup and call through this module. Code that can take
//! the dispatcher as a parameter should do that instead.
//!
//! ```rust,no_run
//! use tiered_object_cache::global;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     global::init_from_env().await?;
//!
//!     global::cache_set("k", "", json!(1), global::NO_EXPIRATION).await;
//!     let found = global::cache_get("k", "", false).await;
//!     Ok(())
//! }
//! ```
//!
//! Calls made before a dispatcher is installed behave like misses.

use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::warn;

use crate::builder::DispatcherBuilder;
use crate::config::CacheConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{CacheError, Result};
use crate::traits::{MultiKeys, MultiValues};

pub use crate::NO_EXPIRATION;

static DISPATCHER: OnceLock<Dispatcher> = OnceLock::new();

/// Install the process's dispatcher
///
/// # Errors
///
/// Returns [`CacheError::AlreadyInstalled`] if one was installed before;
/// the earlier dispatcher stays in place.
pub fn install(dispatcher: Dispatcher) -> Result<&'static Dispatcher> {
    let mut slot = Some(dispatcher);
    let installed = DISPATCHER.get_or_init(|| slot.take().unwrap_or_else(Dispatcher::local_only));
    if slot.is_some() {
        return Err(CacheError::AlreadyInstalled);
    }
    Ok(installed)
}

/// Build a dispatcher from environment variables and install it
///
/// # Errors
///
/// Returns configuration errors, or [`CacheError::AlreadyInstalled`].
pub async fn init_from_env() -> Result<&'static Dispatcher> {
    let dispatcher = DispatcherBuilder::from_config(CacheConfig::from_env()?)
        .build()
        .await?;
    install(dispatcher)
}

/// The installed dispatcher, if any
#[must_use]
pub fn installed() -> Option<&'static Dispatcher> {
    DISPATCHER.get()
}

fn active(op: &'static str) -> Option<&'static Dispatcher> {
    let dispatcher = installed();
    if dispatcher.is_none() {
        warn!(op, "Object cache used before a dispatcher was installed");
    }
    dispatcher
}

/// Lifecycle hook; engines are ready as soon as they are installed
pub fn cache_init() {}

/// Lifecycle hook; nothing to release
#[must_use]
pub fn cache_close() -> bool {
    true
}

pub async fn cache_add(key: &str, group: &str, value: Value, expire: Duration) -> bool {
    match active("add") {
        Some(dispatcher) => dispatcher.add(key, group, value, expire).await,
        None => false,
    }
}

pub async fn cache_set(key: &str, group: &str, value: Value, expire: Duration) -> bool {
    match active("set") {
        Some(dispatcher) => dispatcher.set(key, group, value, expire).await,
        None => false,
    }
}

pub async fn cache_get(key: &str, group: &str, force: bool) -> Option<Value> {
    active("get")?.get(key, group, force).await
}

pub async fn cache_delete(key: &str, group: &str) -> bool {
    match active("delete") {
        Some(dispatcher) => dispatcher.delete(key, group).await,
        None => false,
    }
}

pub async fn cache_flush() -> bool {
    match active("flush") {
        Some(dispatcher) => dispatcher.flush().await,
        None => false,
    }
}

pub async fn cache_replace(key: &str, group: &str, value: Value, expire: Duration) -> bool {
    match active("replace") {
        Some(dispatcher) => dispatcher.replace(key, group, value, expire).await,
        None => false,
    }
}

pub async fn cache_incr(key: &str, offset: i64, group: &str) -> Option<i64> {
    active("incr")?.increment(key, offset, group).await
}

pub async fn cache_decr(key: &str, offset: i64, group: &str) -> Option<i64> {
    active("decr")?.decrement(key, offset, group).await
}

pub async fn cache_get_multi(groups: &MultiKeys) -> MultiValues {
    match active("get_multi") {
        Some(dispatcher) => dispatcher.get_multi(groups).await,
        None => MultiValues::new(),
    }
}

pub fn cache_add_global_groups(groups: &[&str]) {
    if let Some(dispatcher) = active("add_global_groups") {
        dispatcher.add_global_groups(groups);
    }
}

pub fn cache_add_non_persistent_groups(groups: &[&str]) {
    if let Some(dispatcher) = active("add_non_persistent_groups") {
        dispatcher.add_non_persistent_groups(groups);
    }
}

pub fn cache_switch_to_context(context_id: u64) {
    if let Some(dispatcher) = active("switch_to_context") {
        dispatcher.switch_to_context(context_id);
    }
}

pub fn cache_reset() {
    if let Some(dispatcher) = active("reset") {
        dispatcher.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Unit tests never install a dispatcher; the installed path is covered
    // by tests/integration_global.rs, which runs in its own process.

    #[tokio::test]
    async fn calls_before_install_behave_like_misses() {
        assert!(installed().is_none());
        assert!(!cache_set("k", "", json!(1), NO_EXPIRATION).await);
        assert!(!cache_add("k", "", json!(1), NO_EXPIRATION).await);
        assert_eq!(cache_get("k", "", false).await, None);
        assert_eq!(cache_incr("k", 1, "").await, None);
        assert!(cache_get_multi(&MultiKeys::new()).await.is_empty());
        cache_reset();
        cache_switch_to_context(2);
    }

    #[test]
    fn lifecycle_hooks_are_no_ops() {
        cache_init();
        assert!(cache_close());
    }
}
