//! Basic usage: build a dispatcher from the environment and run a few operations
//!
//! `OBJECT_CACHE_STORE=memory cargo run --example basic_usage`

use serde_json::json;
use tiered_object_cache::{CacheConfig, DispatcherBuilder, MultiKeys, NO_EXPIRATION};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cache = DispatcherBuilder::from_config(CacheConfig::from_env()?)
        .build()
        .await?;
    tracing::info!(engine = cache.engine_name(), "Object cache ready");

    cache.add_global_groups(&["users"]);

    cache.set("1", "users", json!({"name": "alice"}), NO_EXPIRATION).await;
    cache.set("views", "stats", json!(0), NO_EXPIRATION).await;

    let views = cache.increment("views", 1, "stats").await;
    tracing::info!(?views, "Incremented view counter");

    let request = MultiKeys::from([("users".to_string(), vec!["1".to_string(), "2".to_string()])]);
    let found = cache.get_multi(&request).await;
    tracing::info!(?found, "Multi-get result");

    if let Some(stats) = cache.tiered_stats() {
        tracing::info!(?stats, "Tiered cache statistics");
    }

    Ok(())
}
