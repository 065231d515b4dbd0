//! Regeneration loop against a store that is down
//!
//! The recursion guard stops consulting the store after four attempts per key,
//! while `get_or_compute_with` keeps serving computed values.

use anyhow::anyhow;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tiered_object_cache::{async_trait, Dispatcher, SharedStore, NO_EXPIRATION};
use tracing_subscriber::EnvFilter;

struct UnreachableStore;

#[async_trait]
impl SharedStore for UnreachableStore {
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
    fn name(&self) -> &'static str {
        "Unreachable"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .init();

    let cache = Dispatcher::tiered(Arc::new(UnreachableStore));

    for round in 1..=6 {
        // Drop the local copy so every round goes back to the store
        cache.delete("alloptions", "options").await;
        let options = cache
            .get_or_compute_with("alloptions", "options", NO_EXPIRATION, move || async move {
                Ok(json!({"blogname": "Example", "round": round}))
            })
            .await?;
        tracing::info!(round, %options, "Served options");
    }

    if let Some(stats) = cache.tiered_stats() {
        tracing::info!(
            store_errors = stats.store_errors,
            guard_trips = stats.guard_trips,
            "Store stayed down; guard trips after four lookups"
        );
    }
    Ok(())
}
