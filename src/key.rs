//! Cache key composition
//!
//! Every logical `(key, group)` pair maps to one composed string,
//! `group:key`. The same string addresses the entry in the local map,
//! the recursion guard table and the shared store.

use std::fmt;

/// Group used when the caller passes an empty group
pub const DEFAULT_GROUP: &str = "default";

/// Composed cache key (`group:key`)
///
/// Two pairs address the same entry iff their composed strings are equal.
/// Neither part is escaped, so `("b:c", "a")` and `("c", "a:b")` collide.
///
/// ```rust
/// use tiered_object_cache::CacheKey;
///
/// assert_eq!(CacheKey::compose("x", "").as_str(), "default:x");
/// assert_eq!(CacheKey::compose("x", "posts").as_str(), "posts:x");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Compose a key, normalizing an empty group to [`DEFAULT_GROUP`]
    #[must_use]
    pub fn compose(key: &str, group: &str) -> Self {
        let group = normalize_group(group);
        let mut composed = String::with_capacity(group.len() + 1 + key.len());
        composed.push_str(group);
        composed.push(':');
        composed.push_str(key);
        Self(composed)
    }

    /// The composed string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Map an empty group name to [`DEFAULT_GROUP`]
#[must_use]
pub fn normalize_group(group: &str) -> &str {
    if group.is_empty() { DEFAULT_GROUP } else { group }
}
