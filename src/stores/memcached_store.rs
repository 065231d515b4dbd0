//! Memcached Store - Distributed Shared Store
//!
//! Memcached-based implementation of [`SharedStore`].
//!
//! **Note**: the `memcache` client is blocking; calls run on the calling task.
//! Memcached's own semantics apply to counters: `incr`/`decr` fail on absent
//! keys and `decr` clamps at zero instead of going negative.

use anyhow::{anyhow, Result};
use memcache::MemcacheError;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Memcached reads relative expirations above this as absolute unix times
const MAX_RELATIVE_EXPIRATION: u64 = 60 * 60 * 24 * 30;

/// Memcached shared store
pub struct MemcachedStore {
    client: memcache::Client,
}

impl MemcachedStore {
    /// Create new Memcached store from the `MEMCACHED_URL` environment variable
    ///
    /// # Errors
    ///
    /// Returns an error if the Memcached client cannot be created.
    pub fn new() -> Result<Self> {
        let memcached_url = std::env::var("MEMCACHED_URL")
            .unwrap_or_else(|_| crate::config::DEFAULT_MEMCACHED_URL.to_string());
        Self::with_url(&memcached_url)
    }

    /// Create new Memcached store with custom URL
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot connect or the version probe fails.
    pub fn with_url(memcached_url: &str) -> Result<Self> {
        info!(url = %memcached_url, "Initializing Memcached store");

        let client = memcache::connect(memcached_url)
            .map_err(|e| anyhow!("Failed to connect to Memcached: {e}"))?;

        let versions = client
            .version()
            .map_err(|e| anyhow!("Memcached connection test failed: {e}"))?;

        info!(
            url = %memcached_url,
            server_count = versions.len(),
            "Memcached store connected successfully"
        );

        Ok(Self { client })
    }

    fn adjust(&self, key: &str, offset: i64) -> Result<Option<i64>> {
        let magnitude = offset.unsigned_abs();
        let result = if offset >= 0 {
            self.client.increment(key, magnitude)
        } else {
            self.client.decrement(key, magnitude)
        };

        match result {
            Ok(value) => Ok(i64::try_from(value).ok()),
            // Absent key or non-numeric value
            Err(MemcacheError::CommandError(e)) => {
                debug!(key = %key, error = %e, "[Memcached] Counter adjustment refused");
                Ok(None)
            }
            Err(e) => Err(anyhow!("Memcached INCR/DECR failed for key '{key}': {e}")),
        }
    }
}

/// Convert a relative expiration to memcached's wire representation
fn wire_expiration(expire: Duration) -> u32 {
    if expire.is_zero() {
        return 0;
    }
    let secs = expire.as_secs().max(1);
    let secs = if secs > MAX_RELATIVE_EXPIRATION {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        now.saturating_add(secs)
    } else {
        secs
    };
    u32::try_from(secs).unwrap_or(u32::MAX)
}

// ===== Trait Implementations =====

use crate::traits::SharedStore;
use async_trait::async_trait;

#[async_trait]
impl SharedStore for MemcachedStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.fetch(key).await?.is_some())
    }

    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.client
            .get::<Vec<u8>>(key)
            .map_err(|e| anyhow!("Memcached GET failed for key '{key}': {e}"))
    }

    async fn store(&self, key: &str, value: &[u8], expire: Duration) -> Result<()> {
        self.client
            .set(key, value, wire_expiration(expire))
            .map_err(|e| anyhow!("Memcached SET failed for key '{key}': {e}"))?;
        debug!(key = %key, expire_secs = %expire.as_secs(), "[Memcached] Stored key");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete(key)
            .map_err(|e| anyhow!("Memcached DELETE failed for key '{key}': {e}"))?;
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        self.client
            .flush()
            .map_err(|e| anyhow!("Memcached FLUSH_ALL failed: {e}"))?;
        info!("[Memcached] Flushed all servers");
        Ok(())
    }

    async fn increment(&self, key: &str, offset: i64) -> Result<Option<i64>> {
        self.adjust(key, offset)
    }

    async fn decrement(&self, key: &str, offset: i64) -> Result<Option<i64>> {
        let Some(delta) = offset.checked_neg() else {
            return Ok(None);
        };
        self.adjust(key, delta)
    }

    async fn health_check(&self) -> bool {
        self.client.version().is_ok()
    }

    fn name(&self) -> &'static str {
        "Memcached"
    }
}
