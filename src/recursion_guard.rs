//! Per-key recursion guard
//!
//! Every local miss that would go to the shared store bumps a counter for
//! its key. Once a key's counter reaches [`RECURSION_LIMIT`] the store is no
//! longer consulted for it. Counters never reset: the guard bounds retries
//! for the lifetime of the engine, it does not count real attempts.

use dashmap::DashMap;

use crate::key::CacheKey;

/// Attempt number at which store lookups for a key stop
pub const RECURSION_LIMIT: u32 = 5;

/// Process-local attempt counters, one per composed key
#[derive(Debug, Default)]
pub struct RecursionGuard {
    attempts: DashMap<CacheKey, u32>,
}

impl RecursionGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attempt and report whether the store may be consulted
    ///
    /// Attempts 1 through 4 are allowed; attempt 5 and later are refused.
    pub fn enter(&self, key: &CacheKey) -> bool {
        let mut attempts = self.attempts.entry(key.clone()).or_insert(0);
        *attempts = attempts.saturating_add(1);
        *attempts < RECURSION_LIMIT
    }

    /// Attempts recorded for `key` so far
    #[must_use]
    pub fn attempts(&self, key: &CacheKey) -> u32 {
        self.attempts.get(key).map_or(0, |attempts| *attempts)
    }

    /// Number of keys with at least one recorded attempt
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.attempts.len()
    }
}
