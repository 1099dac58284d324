use std::sync::Arc;

use tracing::trace;

use super::{FlattenError, FlattenResult, flatten};
use crate::common::config::FlattenSettings;
use crate::model::NavTree;
use crate::transition::TransitionState;
use crate::window::WindowContext;

#[derive(Debug, Clone, PartialEq)]
struct Inputs {
    tree: Arc<NavTree>,
    transition: Option<TransitionState>,
    window: WindowContext,
}

/// Memoizes the last flatten.
///
/// Structurally equal inputs return the cached plan without walking the tree
/// again; any change in tree, transition or window recomputes it.
#[derive(Debug, Default)]
pub struct Flattener {
    settings: FlattenSettings,
    last: Option<(Inputs, Arc<FlattenResult>)>,
    hits: u64,
    misses: u64,
}

impl Flattener {
    pub fn new(settings: FlattenSettings) -> Self {
        Flattener { settings, ..Default::default() }
    }

    pub fn settings(&self) -> &FlattenSettings { &self.settings }

    pub fn flatten(
        &mut self,
        tree: &Arc<NavTree>,
        transition: Option<&TransitionState>,
        window: &WindowContext,
    ) -> Result<Arc<FlattenResult>, FlattenError> {
        if let Some((inputs, result)) = &self.last {
            if *inputs.tree == **tree
                && inputs.transition.as_ref() == transition
                && inputs.window == *window
            {
                self.hits += 1;
                trace!(hits = self.hits, "reusing flatten result");
                return Ok(result.clone());
            }
        }

        self.misses += 1;
        let result = Arc::new(flatten(tree, transition, window, &self.settings)?);
        self.last = Some((
            Inputs {
                tree: tree.clone(),
                transition: transition.cloned(),
                window: *window,
            },
            result.clone(),
        ));
        Ok(result)
    }

    /// Flattens the tree a transition state leads to.
    pub fn flatten_state(
        &mut self,
        state: &TransitionState,
        window: &WindowContext,
    ) -> Result<Arc<FlattenResult>, FlattenError> {
        let tree = state.target().clone();
        self.flatten(&tree, Some(state), window)
    }

    pub fn cache_hits(&self) -> u64 { self.hits }

    pub fn cache_misses(&self) -> u64 { self.misses }

    pub fn invalidate(&mut self) { self.last = None; }
}
