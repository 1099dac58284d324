use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::common::collections::hash_map::Entry;
use crate::common::collections::{HashMap, HashSet};
use crate::common::config::RetentionSettings;
use crate::model::{NavTree, NodeKey};

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Protection {
    Locked,
    Pinned,
    Retained,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RetentionError {
    #[error("`{0}` is not tracked")]
    Unknown(NodeKey),
    #[error("`{0}` is not locked")]
    NotLocked(NodeKey),
    #[error("`{key}` is {reason}; only a forced remove drops it")]
    Protected { key: NodeKey, reason: Protection },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RetentionEntry {
    pub key: NodeKey,
    pub last_access: u64,
    lock_count: u32,
    pub pinned: bool,
    /// Inactive tab branch or pane slot still reachable in the tree.
    pub retained: bool,
}

impl RetentionEntry {
    fn new(key: NodeKey) -> Self {
        RetentionEntry {
            key,
            last_access: 0,
            lock_count: 0,
            pinned: false,
            retained: false,
        }
    }

    pub fn locked(&self) -> bool { self.lock_count > 0 }

    pub fn lock_count(&self) -> u32 { self.lock_count }

    pub fn protection(&self) -> Option<Protection> {
        if self.locked() {
            Some(Protection::Locked)
        } else if self.pinned {
            Some(Protection::Pinned)
        } else if self.retained {
            Some(Protection::Retained)
        } else {
            None
        }
    }

    pub fn is_protected(&self) -> bool { self.protection().is_some() }
}

/// Outcome of an eviction pass.
#[must_use]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Oldest first.
    pub evicted: Vec<NodeKey>,
    /// Entries above capacity that could not be evicted because every
    /// candidate was protected.
    pub overrun: usize,
}

impl EvictionReport {
    /// Folds `other` into this report, keeping the worst overrun seen.
    pub fn merge(&mut self, other: EvictionReport) {
        self.evicted.extend(other.evicted);
        self.overrun = self.overrun.max(other.overrun);
    }

    pub fn is_empty(&self) -> bool { self.evicted.is_empty() && self.overrun == 0 }
}

/// Bounded LRU of retained UI state.
///
/// Every mutation goes through the methods below and leaves the store
/// consistent: locks live on their entry, so removing an entry never leaves a
/// lock behind.
#[derive(Clone, Debug)]
pub struct RetentionStore {
    entries: HashMap<NodeKey, RetentionEntry>,
    capacity: usize,
    counter: u64,
}

impl Default for RetentionStore {
    fn default() -> Self { Self::from_settings(&RetentionSettings::default()) }
}

impl RetentionStore {
    pub fn new(capacity: usize) -> Self {
        RetentionStore {
            entries: HashMap::default(),
            capacity: capacity.max(1),
            counter: 0,
        }
    }

    pub fn from_settings(settings: &RetentionSettings) -> Self { Self::new(settings.capacity) }

    pub fn capacity(&self) -> usize { self.capacity }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn get(&self, key: &str) -> Option<&RetentionEntry> { self.entries.get(key) }

    pub fn contains(&self, key: &str) -> bool { self.entries.contains_key(key) }

    /// Keys from least to most recently used.
    pub fn lru_order(&self) -> Vec<&NodeKey> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by_key(|e| e.last_access);
        entries.into_iter().map(|e| &e.key).collect()
    }

    fn stamp(&mut self, key: &NodeKey) -> &mut RetentionEntry {
        self.counter += 1;
        let counter = self.counter;
        let entry = match self.entries.entry(key.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(RetentionEntry::new(key.clone())),
        };
        entry.last_access = counter;
        entry
    }

    /// Marks `key` as just used, tracking it if new. Going over capacity
    /// evicts older entries, never the one just touched.
    pub fn touch(&mut self, key: &NodeKey) -> EvictionReport {
        self.stamp(key);
        self.evict(Some(key))
    }

    /// Protects `key` for the duration of an animation. Locks are counted;
    /// an unknown key is tracked and touched.
    pub fn lock(&mut self, key: &NodeKey) -> EvictionReport {
        let entry = self.stamp(key);
        entry.lock_count += 1;
        trace!(%key, count = entry.lock_count, "locked");
        self.evict(Some(key))
    }

    /// Releases one lock and immediately reclaims space if over capacity.
    pub fn unlock(&mut self, key: &NodeKey) -> Result<EvictionReport, RetentionError> {
        let entry = self
            .entries
            .get_mut(key.as_str())
            .ok_or_else(|| RetentionError::Unknown(key.clone()))?;
        if entry.lock_count == 0 {
            return Err(RetentionError::NotLocked(key.clone()));
        }
        entry.lock_count -= 1;
        trace!(%key, count = entry.lock_count, "unlocked");
        Ok(self.evict_if_over_capacity())
    }

    /// Releases one lock on each key, then reclaims space once. Keys that
    /// are gone or unlocked are skipped.
    pub fn unlock_all<'k>(&mut self, keys: impl IntoIterator<Item = &'k NodeKey>) -> EvictionReport {
        for key in keys {
            match self.entries.get_mut(key.as_str()) {
                Some(entry) if entry.lock_count > 0 => entry.lock_count -= 1,
                _ => trace!(%key, "no lock to release"),
            }
        }
        self.evict_if_over_capacity()
    }

    pub fn pin(&mut self, key: &NodeKey) -> EvictionReport {
        self.stamp(key).pinned = true;
        self.evict(Some(key))
    }

    pub fn unpin(&mut self, key: &NodeKey) -> Result<EvictionReport, RetentionError> {
        let entry = self
            .entries
            .get_mut(key.as_str())
            .ok_or_else(|| RetentionError::Unknown(key.clone()))?;
        entry.pinned = false;
        Ok(self.evict_if_over_capacity())
    }

    /// Drops `key`. Protected entries are only dropped when `force` is set,
    /// and take their locks with them.
    pub fn remove(&mut self, key: &NodeKey, force: bool) -> Result<RetentionEntry, RetentionError> {
        let entry = self
            .entries
            .get(key.as_str())
            .ok_or_else(|| RetentionError::Unknown(key.clone()))?;
        if !force {
            if let Some(reason) = entry.protection() {
                return Err(RetentionError::Protected { key: key.clone(), reason });
            }
        }
        debug!(%key, force, "removing retained entry");
        self.entries
            .remove(key.as_str())
            .ok_or_else(|| RetentionError::Unknown(key.clone()))
    }

    pub fn evict_if_over_capacity(&mut self) -> EvictionReport { self.evict(None) }

    fn evict(&mut self, spare: Option<&NodeKey>) -> EvictionReport {
        let mut report = EvictionReport::default();
        while self.entries.len() > self.capacity {
            let victim = self
                .entries
                .values()
                .filter(|e| !e.is_protected() && Some(&e.key) != spare)
                .min_by_key(|e| e.last_access)
                .map(|e| e.key.clone());
            let Some(victim) = victim else {
                report.overrun = self.entries.len() - self.capacity;
                warn!(
                    overrun = report.overrun,
                    capacity = self.capacity,
                    "retention store over capacity with every entry protected"
                );
                break;
            };
            trace!(key = %victim, "evicting");
            self.entries.remove(victim.as_str());
            report.evicted.push(victim);
        }
        report
    }

    /// Marks inactive but reachable branches of `tree` as retained, together
    /// with the chain of active children below each, since those are the
    /// entries a reselected branch shows again. Retained entries whose branch
    /// became active lose the flag; those whose branch left the tree are
    /// dropped regardless of locks.
    pub fn sync_with_tree(&mut self, tree: &NavTree) -> EvictionReport {
        let inactive: HashSet<NodeKey> = tree
            .inactive_branches()
            .into_iter()
            .flat_map(|id| tree.active_path_from(id))
            .map(|id| tree[id].key.clone())
            .collect();

        let stale: Vec<NodeKey> = self
            .entries
            .values()
            .filter(|e| e.retained && !inactive.contains(&e.key))
            .map(|e| e.key.clone())
            .collect();
        for key in stale {
            if tree.contains_key(key.as_str()) {
                if let Some(entry) = self.entries.get_mut(key.as_str()) {
                    entry.retained = false;
                }
            } else {
                debug!(%key, "branch left the tree, releasing");
                self.entries.remove(key.as_str());
            }
        }

        for key in &inactive {
            match self.entries.get_mut(key.as_str()) {
                Some(entry) => entry.retained = true,
                None => self.stamp(key).retained = true,
            }
        }
        self.evict_if_over_capacity()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::model::NavNode;

    fn key(k: &str) -> NodeKey { NodeKey::from(k) }

    fn filled(capacity: usize, keys: &[&str]) -> RetentionStore {
        let mut store = RetentionStore::new(capacity);
        for k in keys {
            let _ = store.touch(&key(k));
        }
        store
    }

    mod lru {
        use pretty_assertions::assert_eq;
        use test_log::test;

        use super::*;

        #[test]
        fn evicts_least_recently_used_first() {
            let mut store = filled(2, &["a", "b"]);
            let _ = store.touch(&key("a"));
            let report = store.touch(&key("c"));
            assert_eq!(report.evicted, vec![key("b")]);
            assert_eq!(store.lru_order(), vec![&key("a"), &key("c")]);
        }

        #[test]
        fn touch_never_evicts_the_touched_key() {
            let mut store = RetentionStore::new(1);
            let _ = store.lock(&key("a"));
            let report = store.touch(&key("b"));
            assert!(report.evicted.is_empty());
            assert_eq!(report.overrun, 1);
            assert_eq!(store.len(), 2);
        }

        #[test]
        fn merged_reports_keep_the_worst_overrun() {
            let mut report = EvictionReport { evicted: vec![key("a")], overrun: 2 };
            report.merge(EvictionReport { evicted: vec![key("b")], overrun: 0 });
            assert_eq!(report, EvictionReport { evicted: vec![key("a"), key("b")], overrun: 2 });
        }

        #[test]
        fn capacity_is_at_least_one() {
            assert_eq!(RetentionStore::new(0).capacity(), 1);
            assert_eq!(RetentionStore::default().capacity(), 16);
        }
    }

    mod protection {
        use pretty_assertions::assert_eq;
        use test_log::test;

        use super::*;

        #[test]
        fn locked_entries_survive_any_number_of_passes() {
            let mut store = filled(2, &["a", "b"]);
            let _ = store.lock(&key("a"));
            let _ = store.touch(&key("c"));
            for _ in 0..5 {
                let _ = store.evict_if_over_capacity();
            }
            assert!(store.contains("a"));
            assert!(!store.contains("b"));
        }

        #[test]
        fn unlock_reclaims_the_oldest_entry_at_once() {
            let mut store = RetentionStore::new(2);
            let _ = store.lock(&key("a"));
            let _ = store.lock(&key("b"));
            let _ = store.touch(&key("c"));
            assert_eq!(store.len(), 3);
            let report = store.unlock(&key("a")).unwrap();
            assert_eq!(report.evicted, vec![key("a")]);
            assert_eq!(store.len(), 2);
        }

        #[test]
        fn locks_are_counted() {
            let mut store = RetentionStore::new(4);
            let _ = store.lock(&key("a"));
            let _ = store.lock(&key("a"));
            let _ = store.unlock(&key("a")).unwrap();
            assert!(store.get("a").unwrap().locked());
            let _ = store.unlock(&key("a")).unwrap();
            assert!(!store.get("a").unwrap().locked());
            assert_eq!(store.unlock(&key("a")), Err(RetentionError::NotLocked(key("a"))));
            assert_eq!(store.unlock(&key("zz")), Err(RetentionError::Unknown(key("zz"))));
        }

        #[test]
        fn batch_unlock_evicts_once_oldest_first() {
            let mut store = RetentionStore::new(1);
            let _ = store.lock(&key("old"));
            let _ = store.lock(&key("new"));
            let report = store.unlock_all([&key("new"), &key("old"), &key("missing")]);
            assert_eq!(report.evicted, vec![key("old")]);
            assert!(store.contains("new"));
        }

        #[test]
        fn pinned_entries_stay_until_unpinned() {
            let mut store = RetentionStore::new(1);
            let _ = store.pin(&key("a"));
            let _ = store.touch(&key("b"));
            let _ = store.touch(&key("c"));
            assert!(store.contains("a"));
            let report = store.unpin(&key("a")).unwrap();
            assert_eq!(report.evicted, vec![key("a")]);
        }

        #[test]
        fn all_protected_overrun_is_reported_not_fatal() {
            let mut store = RetentionStore::new(1);
            let _ = store.lock(&key("a"));
            let _ = store.pin(&key("b"));
            let report = store.evict_if_over_capacity();
            assert_eq!(report, EvictionReport { evicted: vec![], overrun: 1 });
        }
    }

    mod removal {
        use pretty_assertions::assert_eq;
        use test_log::test;

        use super::*;

        #[test]
        fn protected_entries_need_force() {
            let mut store = RetentionStore::new(4);
            let _ = store.lock(&key("a"));
            assert_eq!(
                store.remove(&key("a"), false),
                Err(RetentionError::Protected { key: key("a"), reason: Protection::Locked })
            );
            let entry = store.remove(&key("a"), true).unwrap();
            assert_eq!(entry.lock_count(), 1);
            assert!(!store.contains("a"));
            // The lock went with the entry.
            assert_eq!(store.unlock(&key("a")), Err(RetentionError::Unknown(key("a"))));
        }

        #[test]
        fn unprotected_entries_remove_plainly() {
            let mut store = filled(4, &["a"]);
            assert!(store.remove(&key("a"), false).is_ok());
            assert_eq!(store.remove(&key("a"), false), Err(RetentionError::Unknown(key("a"))));
        }
    }

    mod tree_sync {
        use pretty_assertions::assert_eq;
        use test_log::test;

        use super::*;

        fn tabs(active: usize, branches: &[&str]) -> NavTree {
            NavTree::new(NavNode::tab("tabs", active, branches.iter().map(|b| NavNode::screen(*b))))
                .unwrap()
        }

        #[test]
        fn inactive_branches_are_retained() {
            let mut store = RetentionStore::new(1);
            let _ = store.sync_with_tree(&tabs(0, &["a", "b", "c"]));
            assert!(store.get("b").unwrap().retained);
            assert!(store.get("c").unwrap().retained);
            assert_eq!(store.get("b").unwrap().protection(), Some(Protection::Retained));
            assert_eq!(
                store.remove(&key("b"), false),
                Err(RetentionError::Protected { key: key("b"), reason: Protection::Retained })
            );
        }

        #[test]
        fn activated_branch_loses_retention() {
            let mut store = RetentionStore::new(8);
            let _ = store.sync_with_tree(&tabs(0, &["a", "b"]));
            let _ = store.sync_with_tree(&tabs(1, &["a", "b"]));
            assert!(!store.get("b").unwrap().retained);
            assert!(store.get("a").unwrap().retained);
        }

        #[test]
        fn screens_under_a_hidden_branch_are_retained() {
            let tree = NavTree::new(NavNode::tab(
                "tabs",
                0,
                [
                    NavNode::stack("feed", [NavNode::screen("F0")]),
                    NavNode::stack("profile", [NavNode::screen("Me"), NavNode::screen("Edit")]),
                ],
            ))
            .unwrap();
            let mut store = RetentionStore::new(8);
            let _ = store.sync_with_tree(&tree);
            assert!(store.get("profile").unwrap().retained);
            assert!(store.get("Edit").unwrap().retained);
            // Only the top of the hidden stack is shown on return.
            assert!(!store.contains("Me"));
            assert!(!store.contains("F0"));
        }

        #[test]
        fn branch_leaving_the_tree_is_released_even_if_locked() {
            let mut store = RetentionStore::new(8);
            let _ = store.sync_with_tree(&tabs(0, &["a", "b"]));
            let _ = store.lock(&key("b"));
            let _ = store.sync_with_tree(&tabs(0, &["a", "c"]));
            assert!(!store.contains("b"));
            assert!(store.get("c").unwrap().retained);
        }
    }

    mod properties {
        use proptest::prelude::*;
        use test_log::test;

        use super::*;

        #[derive(Clone, Debug)]
        enum Op {
            Touch(u8),
            Lock(u8),
            Unlock(u8),
            Evict,
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u8..8).prop_map(Op::Touch),
                (0u8..8).prop_map(Op::Lock),
                (0u8..8).prop_map(Op::Unlock),
                Just(Op::Evict),
            ]
        }

        proptest! {
            #[test]
            fn locked_keys_are_never_evicted(ops in prop::collection::vec(op(), 1..64)) {
                let mut store = RetentionStore::new(3);
                for op in ops {
                    let locked: Vec<NodeKey> = store
                        .lru_order()
                        .into_iter()
                        .filter(|k| store.get(k.as_str()).is_some_and(|e| e.locked()))
                        .cloned()
                        .collect();
                    let unlocked = match &op {
                        Op::Unlock(k) => Some(key(&format!("k{k}"))),
                        _ => None,
                    };
                    let report = match op {
                        Op::Touch(k) => store.touch(&key(&format!("k{k}"))),
                        Op::Lock(k) => store.lock(&key(&format!("k{k}"))),
                        Op::Unlock(k) => store.unlock(&key(&format!("k{k}"))).unwrap_or_default(),
                        Op::Evict => store.evict_if_over_capacity(),
                    };
                    for k in &locked {
                        // Unlocking may legitimately reclaim the key itself.
                        if unlocked.as_ref() != Some(k) {
                            prop_assert!(!report.evicted.contains(k));
                            prop_assert!(store.contains(k.as_str()));
                        }
                    }
                    let unprotected = store.lru_order().iter().filter(|k| {
                        store.get(k.as_str()).is_some_and(|e| !e.is_protected())
                    }).count();
                    prop_assert!(store.len() <= store.capacity() || unprotected <= 1);
                }
            }
        }
    }
}
