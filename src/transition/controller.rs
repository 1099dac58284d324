use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::state::{NavDirection, TransitionError, TransitionState};
use crate::common::collections::HashSet;
use crate::model::{NavTree, NodeKey};

#[derive(Debug, Clone)]
pub enum TransitionEvent {
    StartAnimation {
        target: Arc<NavTree>,
        direction: NavDirection,
    },
    StartProposed {
        speculative: Arc<NavTree>,
    },
    UpdateProgress(f64),
    CommitProposed,
    CancelProposed,
    CompleteAnimation,
}

/// Retention keys the caller should forward to the retention store after an
/// accepted event.
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventResponse {
    pub lock: Vec<NodeKey>,
    pub unlock: Vec<NodeKey>,
}

impl EventResponse {
    pub fn is_empty(&self) -> bool { self.lock.is_empty() && self.unlock.is_empty() }
}

/// Owns the transition state and applies events strictly in arrival order.
#[derive(Debug, Clone)]
pub struct TransitionController {
    state: TransitionState,
    locked: Vec<NodeKey>,
}

impl TransitionController {
    pub fn new(tree: impl Into<Arc<NavTree>>) -> Self {
        TransitionController {
            state: TransitionState::idle(tree),
            locked: Vec::new(),
        }
    }

    pub fn state(&self) -> &TransitionState { &self.state }

    /// Keys held locked by the running transition.
    pub fn locked_keys(&self) -> &[NodeKey] { &self.locked }

    pub fn handle_event(&mut self, event: TransitionEvent) -> Result<EventResponse, TransitionError> {
        trace!(?event, state = %self.state.name());
        let next = match &event {
            TransitionEvent::StartAnimation { target, direction } => {
                self.state.start_animation(target.clone(), *direction)
            }
            TransitionEvent::StartProposed { speculative } => {
                self.state.start_proposed(speculative.clone())
            }
            TransitionEvent::UpdateProgress(p) => self.state.with_progress(*p),
            TransitionEvent::CommitProposed => self.state.commit_proposed(),
            TransitionEvent::CancelProposed => self.state.cancel_proposed(),
            TransitionEvent::CompleteAnimation => self.state.complete_animation(),
        };
        let next = match next {
            Ok(next) => next,
            Err(e) => {
                warn!("rejected transition event: {e}");
                return Err(e);
            }
        };

        let was_idle = self.state.is_idle();
        self.state = next;
        debug!(state = %self.state.name(), progress = ?self.state.progress().map(|p| p.get()));

        let mut response = EventResponse::default();
        if was_idle && !self.state.is_idle() {
            self.locked = self.animating_keys();
            response.lock = self.locked.clone();
        } else if !was_idle && self.state.is_idle() {
            response.unlock = std::mem::take(&mut self.locked);
        }
        Ok(response)
    }

    /// Every key in the exiting and entering subtrees of the divergence.
    fn animating_keys(&self) -> Vec<NodeKey> {
        let Some(divergence) = self.state.divergence() else {
            return Vec::new();
        };
        let mut seen = HashSet::default();
        let mut keys = Vec::new();
        let before = divergence.exiting().map(|id| (self.state.current(), id));
        let after = divergence.entering().map(|id| (self.state.target(), id));
        for (tree, id) in before.into_iter().chain(after) {
            for key in tree.subtree_keys(id) {
                if seen.insert(key.clone()) {
                    keys.push(key.clone());
                }
            }
        }
        keys
    }
}
