//! Tests for the process-wide dispatcher slot
//!
//! Runs in its own test binary, so installing here does not leak into other tests.

mod common;

use common::*;
use serde_json::json;
use tiered_object_cache::{global, CacheError, Dispatcher, EngineKind, MultiKeys};

/// Everything in one test: the slot can only be filled once per process
#[tokio::test]
async fn test_install_once_then_flat_api_forwards() {
    let installed = global::install(Dispatcher::tiered(ScriptedStore::new())).unwrap();
    assert_eq!(installed.engine_kind(), EngineKind::Tiered);

    let second = global::install(Dispatcher::local_only());
    assert!(matches!(second, Err(CacheError::AlreadyInstalled)));
    assert_eq!(
        global::installed().map(Dispatcher::engine_kind),
        Some(EngineKind::Tiered),
        "First dispatcher stays installed"
    );

    assert!(global::cache_add("k", "", json!(1), global::NO_EXPIRATION).await);
    assert!(!global::cache_add("k", "", json!(1), global::NO_EXPIRATION).await);
    assert_eq!(global::cache_get("k", "default", false).await, Some(json!(1)));
    assert_eq!(global::cache_incr("k", 2, "").await, Some(3));
    assert_eq!(global::cache_decr("k", 1, "").await, Some(2));
    assert!(global::cache_replace("k", "", json!("r"), global::NO_EXPIRATION).await);
    assert!(global::cache_set("other", "g", json!(true), global::NO_EXPIRATION).await);

    let request = MultiKeys::from([("g".to_string(), vec!["other".to_string(), "nope".to_string()])]);
    let found = global::cache_get_multi(&request).await;
    assert_eq!(found.get("g").and_then(|entries| entries.get("other")), Some(&json!(true)));
    assert_eq!(found.get("g").map(std::collections::HashMap::len), Some(1));

    global::cache_add_global_groups(&["users"]);
    global::cache_add_non_persistent_groups(&["counts"]);
    global::cache_switch_to_context(3);
    global::cache_reset();
    let tiered = installed.as_tiered().unwrap();
    assert!(tiered.groups().is_global("users"));
    assert!(tiered.groups().is_non_persistent("counts"));

    assert!(global::cache_delete("k", "").await);
    assert_eq!(global::cache_get("k", "", false).await, None);
    assert!(global::cache_flush().await);
    assert_eq!(global::cache_get("other", "g", false).await, None);
    assert!(global::cache_close());
}
