use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::diff::{self, Divergence};
use crate::model::{NavTree, NodeKey};

/// Animation progress, always within `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Progress(f64);

impl Progress {
    pub const ZERO: Progress = Progress(0.0);
    pub const ONE: Progress = Progress(1.0);

    /// Clamps into range. NaN reads as no progress at all.
    pub fn new(value: f64) -> Self {
        if value.is_nan() { Progress(0.0) } else { Progress(value.clamp(0.0, 1.0)) }
    }

    pub fn get(self) -> f64 { self.0 }
}

// NaN is unrepresentable.
impl Eq for Progress {}

impl From<f64> for Progress {
    fn from(value: f64) -> Self { Progress::new(value) }
}

impl From<Progress> for f64 {
    fn from(p: Progress) -> Self { p.0 }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NavDirection {
    Forward,
    Backward,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum StateName {
    Idle,
    Proposed,
    Animating,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    StartAnimation,
    StartProposed,
    UpdateProgress,
    CommitProposed,
    CancelProposed,
    CompleteAnimation,
}

impl Operation {
    /// Operations accepted from each state. Everything else is rejected.
    pub fn is_legal_from(self, state: StateName) -> bool {
        use Operation::*;
        matches!(
            (state, self),
            (StateName::Idle, StartAnimation | StartProposed)
                | (StateName::Proposed, UpdateProgress | CommitProposed | CancelProposed)
                | (StateName::Animating, UpdateProgress | CompleteAnimation)
        )
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {operation} while {state}")]
    InvalidTransition {
        operation: Operation,
        state: StateName,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum TransitionState {
    Idle {
        current: Arc<NavTree>,
    },
    Proposed {
        current: Arc<NavTree>,
        speculative: Arc<NavTree>,
        progress: Progress,
    },
    Animating {
        current: Arc<NavTree>,
        target: Arc<NavTree>,
        progress: Progress,
        direction: NavDirection,
    },
}

impl TransitionState {
    pub fn idle(tree: impl Into<Arc<NavTree>>) -> Self {
        TransitionState::Idle { current: tree.into() }
    }

    pub fn name(&self) -> StateName {
        match self {
            TransitionState::Idle { .. } => StateName::Idle,
            TransitionState::Proposed { .. } => StateName::Proposed,
            TransitionState::Animating { .. } => StateName::Animating,
        }
    }

    pub fn is_idle(&self) -> bool { matches!(self, TransitionState::Idle { .. }) }

    pub fn is_gesture(&self) -> bool { matches!(self, TransitionState::Proposed { .. }) }

    /// The tree on screen before this transition.
    pub fn current(&self) -> &Arc<NavTree> {
        match self {
            TransitionState::Idle { current }
            | TransitionState::Proposed { current, .. }
            | TransitionState::Animating { current, .. } => current,
        }
    }

    /// The tree this transition leads to; the current tree when idle.
    pub fn target(&self) -> &Arc<NavTree> {
        match self {
            TransitionState::Idle { current } => current,
            TransitionState::Proposed { speculative, .. } => speculative,
            TransitionState::Animating { target, .. } => target,
        }
    }

    pub fn progress(&self) -> Option<Progress> {
        match self {
            TransitionState::Idle { .. } => None,
            TransitionState::Proposed { progress, .. }
            | TransitionState::Animating { progress, .. } => Some(*progress),
        }
    }

    /// A proposed transition is a predictive back gesture, so it always
    /// reads as backward.
    pub fn direction(&self) -> Option<NavDirection> {
        match self {
            TransitionState::Idle { .. } => None,
            TransitionState::Proposed { .. } => Some(NavDirection::Backward),
            TransitionState::Animating { direction, .. } => Some(*direction),
        }
    }

    fn reject(&self, operation: Operation) -> TransitionError {
        TransitionError::InvalidTransition { operation, state: self.name() }
    }

    pub fn start_animation(
        &self,
        target: impl Into<Arc<NavTree>>,
        direction: NavDirection,
    ) -> Result<Self, TransitionError> {
        match self {
            TransitionState::Idle { current } => Ok(TransitionState::Animating {
                current: current.clone(),
                target: target.into(),
                progress: Progress::ZERO,
                direction,
            }),
            _ => Err(self.reject(Operation::StartAnimation)),
        }
    }

    pub fn start_proposed(
        &self,
        speculative: impl Into<Arc<NavTree>>,
    ) -> Result<Self, TransitionError> {
        match self {
            TransitionState::Idle { current } => Ok(TransitionState::Proposed {
                current: current.clone(),
                speculative: speculative.into(),
                progress: Progress::ZERO,
            }),
            _ => Err(self.reject(Operation::StartProposed)),
        }
    }

    /// Sets the progress of a running transition, clamped into `[0, 1]`.
    /// Rejected while idle.
    pub fn with_progress(&self, value: f64) -> Result<Self, TransitionError> {
        let progress = Progress::new(value);
        match self {
            TransitionState::Idle { .. } => Err(self.reject(Operation::UpdateProgress)),
            TransitionState::Proposed { current, speculative, .. } => {
                Ok(TransitionState::Proposed {
                    current: current.clone(),
                    speculative: speculative.clone(),
                    progress,
                })
            }
            TransitionState::Animating { current, target, direction, .. } => {
                Ok(TransitionState::Animating {
                    current: current.clone(),
                    target: target.clone(),
                    progress,
                    direction: *direction,
                })
            }
        }
    }

    /// Turns the gesture into a backward animation, keeping its progress.
    pub fn commit_proposed(&self) -> Result<Self, TransitionError> {
        match self {
            TransitionState::Proposed { current, speculative, progress } => {
                Ok(TransitionState::Animating {
                    current: current.clone(),
                    target: speculative.clone(),
                    progress: *progress,
                    direction: NavDirection::Backward,
                })
            }
            _ => Err(self.reject(Operation::CommitProposed)),
        }
    }

    /// Drops the speculative tree at any progress, including 1.0.
    pub fn cancel_proposed(&self) -> Result<Self, TransitionError> {
        match self {
            TransitionState::Proposed { current, .. } => {
                Ok(TransitionState::Idle { current: current.clone() })
            }
            _ => Err(self.reject(Operation::CancelProposed)),
        }
    }

    pub fn complete_animation(&self) -> Result<Self, TransitionError> {
        match self {
            TransitionState::Animating { target, .. } => {
                Ok(TransitionState::Idle { current: target.clone() })
            }
            _ => Err(self.reject(Operation::CompleteAnimation)),
        }
    }

    /// Where the before and after trees first differ, if a transition is
    /// running and they differ at all.
    pub fn divergence(&self) -> Option<Divergence> {
        match self {
            TransitionState::Idle { .. } => None,
            _ => diff::find_divergence(self.current(), self.target()),
        }
    }

    /// Whether this transition changes something inside the container keyed
    /// `key` (the container itself included).
    pub fn affects_container(&self, key: &str) -> bool {
        match self.divergence() {
            Some(divergence) => diff::is_within(self.target(), divergence.key.as_str(), key),
            None => false,
        }
    }

    /// Active child of stack `key` before this transition.
    pub fn previous_active_child(&self, key: &str) -> Option<NodeKey> {
        if self.is_idle() {
            return None;
        }
        diff::active_child_key(self.current(), key)
    }

    /// Active branch index of tab `key` before this transition.
    pub fn previous_active_index(&self, key: &str) -> Option<usize> {
        if self.is_idle() {
            return None;
        }
        diff::active_index(self.current(), key)
    }
}
