//! Redis Store - Distributed Shared Store
//!
//! Redis-based implementation of [`SharedStore`], shared by every process
//! pointed at the same database.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use std::time::Duration;
use tracing::{debug, info};

/// Adjust an integer only if the key exists. Plain `INCRBY` would create it.
const ADJUST_EXISTING: &str = r"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return redis.call('INCRBY', KEYS[1], ARGV[1])
end
return false
";

/// Redis shared store with `ConnectionManager` for automatic reconnection
///
/// - Values are stored as raw bytes with `SET` / `SET EX`
/// - `increment`/`decrement` run a Lua script so that absent keys are never
///   created and the existence check is atomic with the adjustment
/// - `clear_all` issues `FLUSHDB`, wiping the whole configured database
pub struct RedisStore {
    /// Redis connection manager - handles reconnection automatically
    conn_manager: ConnectionManager,
    adjust_script: Script,
}

impl RedisStore {
    /// Create new Redis store from the `REDIS_URL` environment variable
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis client cannot be created or connection fails.
    pub async fn new() -> Result<Self> {
        let redis_url = std::env::var("REDIS_URL")
            .unwrap_or_else(|_| crate::config::DEFAULT_REDIS_URL.to_string());
        Self::with_url(&redis_url).await
    }

    /// Create new Redis store with custom URL
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection string (e.g., `<redis://localhost:6379>`)
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis client cannot be created or connection fails.
    pub async fn with_url(redis_url: &str) -> Result<Self> {
        info!(redis_url = %redis_url, "Initializing Redis store with ConnectionManager");

        let client = Client::open(redis_url)
            .with_context(|| format!("Failed to create Redis client with URL: {redis_url}"))?;

        let conn_manager = ConnectionManager::new(client)
            .await
            .context("Failed to establish Redis connection manager")?;

        let mut conn = conn_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis PING health check failed")?;

        info!(redis_url = %redis_url, "Redis store connected successfully");

        Ok(Self {
            conn_manager,
            adjust_script: Script::new(ADJUST_EXISTING),
        })
    }

    async fn adjust(&self, key: &str, delta: i64) -> Result<Option<i64>> {
        let mut conn = self.conn_manager.clone();
        let value: Option<i64> = self
            .adjust_script
            .key(key)
            .arg(delta)
            .invoke_async(&mut conn)
            .await
            .with_context(|| format!("Redis INCRBY failed for key '{key}'"))?;
        debug!(key = %key, delta, result = ?value, "[Redis] Adjusted counter");
        Ok(value)
    }
}

// ===== Trait Implementations =====

use crate::traits::SharedStore;
use async_trait::async_trait;

#[async_trait]
impl SharedStore for RedisStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        let exists: bool = conn
            .exists(key)
            .await
            .with_context(|| format!("Redis EXISTS failed for key '{key}'"))?;
        Ok(exists)
    }

    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn_manager.clone();
        let value: Option<Vec<u8>> = conn
            .get(key)
            .await
            .with_context(|| format!("Redis GET failed for key '{key}'"))?;
        Ok(value)
    }

    async fn store(&self, key: &str, value: &[u8], expire: Duration) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        if expire.is_zero() {
            let _: () = conn
                .set(key, value)
                .await
                .with_context(|| format!("Redis SET failed for key '{key}'"))?;
        } else {
            // SET EX has second granularity; never round a live entry down to 0
            let secs = expire.as_secs().max(1);
            let _: () = conn
                .set_ex(key, value, secs)
                .await
                .with_context(|| format!("Redis SET EX failed for key '{key}'"))?;
        }

        debug!(key = %key, expire_secs = %expire.as_secs(), "[Redis] Stored key");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn
            .del(key)
            .await
            .with_context(|| format!("Redis DEL failed for key '{key}'"))?;
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: () = redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .context("Redis FLUSHDB failed")?;
        info!("[Redis] Flushed database");
        Ok(())
    }

    async fn increment(&self, key: &str, offset: i64) -> Result<Option<i64>> {
        self.adjust(key, offset).await
    }

    async fn decrement(&self, key: &str, offset: i64) -> Result<Option<i64>> {
        let Some(delta) = offset.checked_neg() else {
            return Ok(None);
        };
        self.adjust(key, delta).await
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.conn_manager.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok_and(|pong| pong == "PONG")
    }

    fn name(&self) -> &'static str {
        "Redis"
    }
}
