//! Shared Store Implementations
//!
//! Backing stores consumed by `TieredCache` through the
//! [`SharedStore`](crate::traits::SharedStore) trait.
//!
//! # Available Stores
//!
//! - **`MemoryStore`** - `DashMap` store shared within one process (always available)
//! - **`RedisStore`** - Redis, shared across processes (feature: `redis`, default)
//! - **`MemcachedStore`** - Memcached, shared across processes (feature: `memcached`)
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tiered_object_cache::stores::RedisStore;
//! use tiered_object_cache::{SharedStore, TieredCache};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store: Arc<dyn SharedStore> = Arc::new(RedisStore::with_url("redis://localhost:6379").await?);
//! let cache = TieredCache::new(store);
//! # Ok(())
//! # }
//! ```

pub mod memory_store;

#[cfg(feature = "redis")]
pub mod redis_store;

#[cfg(feature = "memcached")]
pub mod memcached_store;

pub use memory_store::MemoryStore;

#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

#[cfg(feature = "memcached")]
pub use memcached_store::MemcachedStore;
