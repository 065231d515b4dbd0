//! Memory Store - In-Process Shared Store
//!
//! A `DashMap`-backed implementation of [`SharedStore`]. It is shared only by
//! the engines of one process, so it is mainly useful for tests and for
//! deployments where several engines in one process should see each other's
//! writes without a network hop.

use anyhow::Result;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Stored bytes with expiration tracking
#[derive(Debug, Clone)]
struct StoreEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoreEntry {
    fn new(value: Vec<u8>, expire: Duration) -> Self {
        Self {
            value,
            expires_at: (!expire.is_zero()).then(|| Instant::now() + expire),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() > expires_at)
    }

    fn as_integer(&self) -> Option<i64> {
        std::str::from_utf8(&self.value).ok()?.trim().parse().ok()
    }
}

/// Concurrent in-process shared store using `DashMap`
///
/// **Features**:
/// - Lock-free concurrent reads/writes
/// - Per-key expiration, checked lazily on access
/// - Atomic increment/decrement on decimal integer values
///
/// **Limitations**:
/// - Not shared across processes
/// - No size limits (unbounded growth)
/// - Expired entries linger until touched or `cleanup_expired` runs
///
/// **Example**:
/// ```rust
/// use tiered_object_cache::stores::MemoryStore;
/// use tiered_object_cache::SharedStore;
/// use std::time::Duration;
///
/// # async fn example() -> anyhow::Result<()> {
/// let store = MemoryStore::new();
/// store.store("default:hits", b"1", Duration::ZERO).await?;
/// assert_eq!(store.increment("default:hits", 2).await?, Some(3));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MemoryStore {
    map: Arc<DashMap<String, StoreEntry>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    sets: Arc<AtomicU64>,
}

impl MemoryStore {
    /// Create new empty store
    #[must_use]
    pub fn new() -> Self {
        info!("Initializing in-process memory store");

        Self {
            map: Arc::new(DashMap::new()),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            sets: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Remove expired entries, returning how many were dropped
    pub fn cleanup_expired(&self) -> usize {
        let mut removed = 0;
        self.map.retain(|_, entry| {
            if entry.is_expired() {
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            debug!(count = removed, "[Memory] Cleaned up expired entries");
        }
        removed
    }

    /// Number of entries, expired ones included
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the store holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Fetch and miss counters since creation, as `(hits, misses, sets)`
    #[must_use]
    pub fn counters(&self) -> (u64, u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.sets.load(Ordering::Relaxed),
        )
    }

    fn evict_if_expired(&self, key: &str) {
        self.map.remove_if(key, |_, entry| entry.is_expired());
    }

    /// Apply `op` to the integer under `key` while holding its shard lock
    fn adjust(&self, key: &str, op: impl FnOnce(i64) -> Option<i64>) -> Option<i64> {
        self.evict_if_expired(key);
        let mut entry = self.map.get_mut(key)?;
        let next = op(entry.as_integer()?)?;
        entry.value = next.to_string().into_bytes();
        Some(next)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// ===== Trait Implementations =====

use crate::traits::SharedStore;
use async_trait::async_trait;

#[async_trait]
impl SharedStore for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        self.evict_if_expired(key);
        Ok(self.map.contains_key(key))
    }

    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.evict_if_expired(key);
        let value = self.map.get(key).map(|entry| entry.value.clone());
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(value)
    }

    async fn store(&self, key: &str, value: &[u8], expire: Duration) -> Result<()> {
        self.map
            .insert(key.to_string(), StoreEntry::new(value.to_vec(), expire));
        self.sets.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, expire_secs = %expire.as_secs(), "[Memory] Stored key");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.map.remove(key);
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        self.map.clear();
        debug!("[Memory] Cleared all entries");
        Ok(())
    }

    async fn increment(&self, key: &str, offset: i64) -> Result<Option<i64>> {
        Ok(self.adjust(key, |current| current.checked_add(offset)))
    }

    async fn decrement(&self, key: &str, offset: i64) -> Result<Option<i64>> {
        Ok(self.adjust(key, |current| current.checked_sub(offset)))
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "Memory"
    }
}
