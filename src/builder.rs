//! Dispatcher Builder
//!
//! The composition root: turns a [`CacheConfig`] (or an explicit store) into
//! the one [`Dispatcher`] a process should use.
//!
//! # Example: From Environment
//!
//! ```rust,no_run
//! use tiered_object_cache::{CacheConfig, DispatcherBuilder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = DispatcherBuilder::from_config(CacheConfig::from_env()?)
//!         .build()
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! # Example: Custom Store
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tiered_object_cache::DispatcherBuilder;
//!
//! let cache = DispatcherBuilder::new()
//!     .with_store(Arc::new(MyStore::new()))
//!     .build()
//!     .await?;
//! ```

use anyhow::anyhow;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{CacheConfig, StoreKind};
use crate::dispatcher::{CacheEnvironment, Dispatcher};
use crate::error::{CacheError, Result};
use crate::stores::MemoryStore;
use crate::traits::SharedStore;

/// Builder for the process's [`Dispatcher`]
///
/// # Default Behavior
///
/// A store that cannot be connected to, or that fails its health check, is
/// treated as "no shared store": the local-only engine is selected and a
/// warning is logged. Call [`DispatcherBuilder::require_shared_store`] to turn
/// that into an error instead.
pub struct DispatcherBuilder {
    config: CacheConfig,
    store: Option<Arc<dyn SharedStore>>,
    require_shared_store: bool,
}

impl DispatcherBuilder {
    /// Create a builder with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(CacheConfig::default())
    }

    #[must_use]
    pub fn from_config(config: CacheConfig) -> Self {
        Self {
            config,
            store: None,
            require_shared_store: false,
        }
    }

    /// Use `store` instead of connecting to the configured one
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SharedStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Mark this run as a batch/CLI invocation
    #[must_use]
    pub fn batch_mode(mut self, batch_mode: bool) -> Self {
        self.config.batch_mode = batch_mode;
        self
    }

    /// Fail the build instead of falling back to local-only when the store is unusable
    #[must_use]
    pub fn require_shared_store(mut self, required: bool) -> Self {
        self.require_shared_store = required;
        self
    }

    /// Build the dispatcher, selecting its engine once
    ///
    /// # Errors
    ///
    /// Only with [`DispatcherBuilder::require_shared_store`] set: returns
    /// [`CacheError::UnsupportedStore`] or [`CacheError::StoreUnavailable`]
    /// when no usable shared store is found.
    pub async fn build(mut self) -> Result<Dispatcher> {
        if self.config.batch_mode {
            return Ok(Dispatcher::select(CacheEnvironment {
                batch_mode: true,
                shared_store: None,
            }));
        }

        let store = match self.store.take() {
            Some(store) => Ok(Some(store)),
            None => connect_store(&self.config).await,
        };

        let store = match store {
            Ok(Some(store)) => {
                if store.health_check().await {
                    Some(store)
                } else {
                    let error = CacheError::StoreUnavailable(anyhow!("{} health check failed", store.name()));
                    self.degrade(error)?
                }
            }
            Ok(None) if self.require_shared_store => {
                return Err(CacheError::UnsupportedStore(StoreKind::None.to_string()));
            }
            Ok(None) => None,
            Err(error) => self.degrade(error)?,
        };

        Ok(Dispatcher::select(CacheEnvironment {
            batch_mode: false,
            shared_store: store,
        }))
    }

    fn degrade(&self, error: CacheError) -> Result<Option<Arc<dyn SharedStore>>> {
        if self.require_shared_store {
            return Err(error);
        }
        warn!(store = %self.config.store, error = %error, "Shared store unusable, falling back to local-only cache");
        Ok(None)
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Connect to the store named by `config`; `Ok(None)` when none is configured
async fn connect_store(config: &CacheConfig) -> Result<Option<Arc<dyn SharedStore>>> {
    info!(store = %config.store, "Connecting shared store");

    match config.store {
        StoreKind::None => Ok(None),
        StoreKind::Memory => Ok(Some(Arc::new(MemoryStore::new()))),
        #[cfg(feature = "redis")]
        StoreKind::Redis => crate::stores::RedisStore::with_url(&config.redis_url)
            .await
            .map(|store| Some(Arc::new(store) as Arc<dyn SharedStore>))
            .map_err(CacheError::StoreUnavailable),
        #[cfg(feature = "memcached")]
        StoreKind::Memcached => crate::stores::MemcachedStore::with_url(&config.memcached_url)
            .map(|store| Some(Arc::new(store) as Arc<dyn SharedStore>))
            .map_err(CacheError::StoreUnavailable),
        #[allow(unreachable_patterns)]
        other => Err(CacheError::UnsupportedStore(other.to_string())),
    }
}
