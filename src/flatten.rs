//! Flattening of a navigation tree into an ordered render plan.
//!
//! [`flatten`] walks the tree the renderer should end up showing, together
//! with the running transition (which supplies the tree being left) and the
//! window size. It emits every surface that must be on screen, sorted by
//! z-order, plus the animation pairs and caching hints for this pass. It is
//! a pure function; [`Flattener`] adds memoization on top.

mod flattener;
mod pass;
mod surface;

use std::collections::BTreeMap;

pub use flattener::Flattener;
pub use pass::{flatten, flatten_node};
use serde::{Deserialize, Serialize};
pub use surface::{
    AnimationPair, PairKind, PaneSlotSurface, RenderableSurface, SurfaceId, SurfaceKind,
    TransitionPhase,
};
use thiserror::Error;

use crate::model::{NodeKey, TreeError};
use crate::retention::CacheScope;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FlattenError {
    #[error("no space to show screen `{key}` in a {width}x{height} window")]
    NoSpace { key: NodeKey, width: f64, height: f64 },
    #[error("z increment must be an even number of at least 2 (got {0})")]
    InvalidIncrement(i32),
    #[error(transparent)]
    Tree(#[from] TreeError),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachingHints {
    pub scopes: BTreeMap<SurfaceId, CacheScope>,
    /// Inactive tab branches and hidden pane slots that are still in the
    /// tree and must keep their state.
    pub retained: Vec<NodeKey>,
    /// Surfaces entering or exiting in this pass.
    pub animating: Vec<SurfaceId>,
}

impl CachingHints {
    pub fn scope(&self, id: &str) -> CacheScope { self.scopes.get(id).copied().unwrap_or_default() }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenResult {
    /// Sorted by z-order, ties in emission order.
    pub surfaces: Vec<RenderableSurface>,
    pub pairs: Vec<AnimationPair>,
    pub hints: CachingHints,
}

impl FlattenResult {
    pub fn surface(&self, id: &str) -> Option<&RenderableSurface> {
        self.surfaces.iter().find(|s| s.id.as_str() == id)
    }

    pub fn ids(&self) -> Vec<&str> { self.surfaces.iter().map(|s| s.id.as_str()).collect() }

    pub fn wrappers(&self) -> impl Iterator<Item = &RenderableSurface> + '_ {
        self.surfaces.iter().filter(|s| s.kind.is_wrapper())
    }

    pub fn contents(&self) -> impl Iterator<Item = &RenderableSurface> + '_ {
        self.surfaces.iter().filter(|s| s.kind.is_content())
    }
}
