//! Tiered Object Cache
//!
//! A two-tier key-value object cache:
//! - **Local map**: in-process values, answering repeated lookups within a request for free
//! - **Shared store**: Redis or Memcached, sharing values across processes
//! - **Recursion guard**: per-key cap on shared-store lookups, so a store that
//!   never answers cannot keep a regeneration loop going
//! - **Local-only fallback**: the same contract in plain memory, for batch runs
//!   and hosts without a shared store
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tiered_object_cache::{CacheConfig, DispatcherBuilder, NO_EXPIRATION};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Selects the engine once: tiered if the store answers, local-only otherwise
//!     let cache = DispatcherBuilder::from_config(CacheConfig::from_env()?)
//!         .build()
//!         .await?;
//!
//!     cache.set("1", "users", json!({"name": "alice"}), NO_EXPIRATION).await;
//!
//!     if let Some(user) = cache.get("1", "users", false).await {
//!         tracing::info!("Cached user: {}", user);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Dispatcher ─┬─ LocalOnlyCache   (batch run, or no shared store)
//!             └─ TieredCache ── local map → recursion guard → shared store
//! ```
//!
//! # Failure Model
//!
//! Cache operations never return errors. Absent keys, unreachable stores and
//! tripped recursion guards all look the same to the caller: `None` from reads,
//! `false` from writes. Callers recompute and `set` when they get a miss.

use std::time::Duration;

pub mod builder;
pub mod codecs;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod global;
pub mod groups;
pub mod key;
pub mod local_only;
pub mod recursion_guard;
pub mod stores;
pub mod tiered;
pub mod traits;

pub use builder::DispatcherBuilder;
pub use codecs::JsonCodec;
pub use config::{CacheConfig, StoreKind};
pub use dispatcher::{CacheEnvironment, Dispatcher, EngineKind};
pub use error::CacheError;
pub use groups::GroupSet;
pub use key::{CacheKey, DEFAULT_GROUP};
pub use local_only::LocalOnlyCache;
pub use recursion_guard::{RecursionGuard, RECURSION_LIMIT};
pub use stores::MemoryStore;
pub use tiered::{TieredCache, TieredCacheStats};
pub use traits::{CacheCodec, CacheEngine, MultiKeys, MultiValues, SharedStore};

#[cfg(feature = "redis")]
pub use stores::RedisStore;

#[cfg(feature = "memcached")]
pub use stores::MemcachedStore;

// Re-export async_trait for user convenience
pub use async_trait::async_trait;

/// Expiration meaning "never expire" (the store's default)
pub const NO_EXPIRATION: Duration = Duration::ZERO;
