//! Reconciles a declarative navigation tree into a flat, z-ordered render
//! plan.
//!
//! A navigator hands over snapshots of its [`model::NavNode`] tree and
//! drives a [`transition::TransitionState`]. [`flatten::flatten`] turns
//! both into the surfaces a renderer must show, the animation pairs between
//! them and the hints telling [`retention`] which UI state to keep alive.

pub mod common;
pub mod compose;
pub mod flatten;
pub mod model;
pub mod pairing;
pub mod retention;
pub mod transition;
pub mod window;

static_assertions::assert_impl_all!(flatten::FlattenResult: Send, Sync);
static_assertions::assert_impl_all!(transition::TransitionState: Send, Sync);
