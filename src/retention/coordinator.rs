use tracing::{debug, trace};

use super::store::{EvictionReport, RetentionStore};
use crate::common::collections::HashSet;
use crate::common::config::RetentionSettings;
use crate::flatten::{FlattenResult, RenderableSurface, TransitionPhase};
use crate::model::{NavTree, NodeKey};

/// Keeps a [`RetentionStore`] in step with successive flatten results.
#[derive(Debug, Default)]
pub struct RetentionCoordinator {
    store: RetentionStore,
    /// Keys this coordinator holds a lock on.
    animating: HashSet<NodeKey>,
}

impl RetentionCoordinator {
    pub fn new(settings: &RetentionSettings) -> Self {
        RetentionCoordinator {
            store: RetentionStore::from_settings(settings),
            animating: HashSet::default(),
        }
    }

    pub fn store(&self) -> &RetentionStore { &self.store }

    pub fn store_mut(&mut self) -> &mut RetentionStore { &mut self.store }

    pub fn is_animating(&self, key: &str) -> bool { self.animating.contains(key) }

    /// Applies one flatten pass: retains inactive branches of `tree`, touches
    /// every shown surface, locks what started animating and unlocks what
    /// stopped.
    pub fn apply(&mut self, result: &FlattenResult, tree: &NavTree) -> EvictionReport {
        let mut report = self.store.sync_with_tree(tree);

        let now: HashSet<NodeKey> = result
            .hints
            .animating
            .iter()
            .filter_map(|id| result.surface(id.as_str()))
            .map(cache_key)
            .collect();
        // Lock before touching so a small store cannot evict what is about
        // to animate. A key whose entry was removed since the last pass lost
        // its lock with it and is locked again.
        for key in &now {
            let held = self.animating.contains(key)
                && self.store.get(key.as_str()).is_some_and(|e| e.locked());
            if !held {
                report.merge(self.store.lock(key));
            }
        }

        for surface in &result.surfaces {
            if surface.phase == TransitionPhase::Hidden {
                continue;
            }
            report.merge(self.store.touch(&cache_key(surface)));
        }

        let ended: Vec<&NodeKey> = self.animating.difference(&now).collect();
        if !ended.is_empty() {
            trace!(?ended, "animation ended");
            report.merge(self.store.unlock_all(ended));
        }
        self.animating = now;

        let settled = self.store.evict_if_over_capacity();
        report.evicted.extend(settled.evicted);
        // Earlier overruns may have cleared; report the store as it is left.
        report.overrun = settled.overrun;
        if !report.is_empty() {
            debug!(evicted = ?report.evicted, overrun = report.overrun, "retention pass");
        }
        report
    }
}

/// Retention key of a surface. A wrapper keys its whole container, so a
/// `whole-wrapper` surface keeps the container's state as one entry.
fn cache_key(surface: &RenderableSurface) -> NodeKey { surface.node_key.clone() }
