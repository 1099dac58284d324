//! Transition state machine and the tree diff the flattener reads from it.
//!
//! A [`TransitionState`] is always exactly one of idle, proposed (a gesture
//! is previewing a back navigation) or animating. It is replaced wholesale
//! on every accepted change; rejected changes leave it untouched.

mod controller;
pub mod diff;
mod state;

pub use controller::{EventResponse, TransitionController, TransitionEvent};
pub use diff::{ContainerChange, Divergence};
pub use state::{NavDirection, Operation, Progress, StateName, TransitionError, TransitionState};
