//! Declared group sets
//!
//! Groups can be declared *global* (shared by every context) or
//! *non-persistent* (should not outlive a context switch). The sets are
//! recorded for callers to consult; the cache itself does not act on them.

use parking_lot::RwLock;
use std::collections::BTreeSet;

use crate::key::normalize_group;

/// Global and non-persistent group declarations
#[derive(Debug, Default)]
pub struct GroupSet {
    global: RwLock<BTreeSet<String>>,
    non_persistent: RwLock<BTreeSet<String>>,
}

impl GroupSet {
    /// Create empty declarations
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record global groups; repeated declarations are merged
    pub fn add_global(&self, groups: &[&str]) {
        extend(&self.global, groups);
    }

    /// Record non-persistent groups; repeated declarations are merged
    pub fn add_non_persistent(&self, groups: &[&str]) {
        extend(&self.non_persistent, groups);
    }

    #[must_use]
    pub fn is_global(&self, group: &str) -> bool {
        self.global.read().contains(normalize_group(group))
    }

    #[must_use]
    pub fn is_non_persistent(&self, group: &str) -> bool {
        self.non_persistent.read().contains(normalize_group(group))
    }

    /// Snapshot of the global groups, sorted
    #[must_use]
    pub fn global(&self) -> Vec<String> {
        self.global.read().iter().cloned().collect()
    }

    /// Snapshot of the non-persistent groups, sorted
    #[must_use]
    pub fn non_persistent(&self) -> Vec<String> {
        self.non_persistent.read().iter().cloned().collect()
    }
}

fn extend(set: &RwLock<BTreeSet<String>>, groups: &[&str]) {
    let mut set = set.write();
    set.extend(groups.iter().map(|group| normalize_group(group).to_string()));
}
