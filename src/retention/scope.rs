use serde::{Deserialize, Serialize};

use crate::flatten::{SurfaceId, SurfaceKind};
use crate::model::NavTree;
use crate::transition::{ContainerChange, Divergence, TransitionState};

/// Level at which a surface's retained state is keyed.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CacheScope {
    #[default]
    FullScreen,
    /// The wrapper and everything in it are kept or dropped together.
    WholeWrapper,
    /// Only the content is swapped; the enclosing wrapper stays put.
    ContentOnly,
}

/// Classifies a surface for the given transition.
///
/// The result depends only on the surface kind and on where the transition
/// crosses container boundaries, so it is stable across memoized flattens.
pub fn resolve_scope(
    transition: Option<&TransitionState>,
    surface: &SurfaceId,
    kind: SurfaceKind,
) -> CacheScope {
    let Some(transition) = transition else {
        return CacheScope::FullScreen;
    };
    match transition.divergence() {
        Some(divergence) => {
            scope_within(transition.current(), transition.target(), &divergence, surface, kind)
        }
        None => CacheScope::FullScreen,
    }
}

pub(crate) fn scope_within(
    before: &NavTree,
    after: &NavTree,
    divergence: &Divergence,
    surface: &SurfaceId,
    kind: SurfaceKind,
) -> CacheScope {
    let key = surface.node_key();
    let at_divergence = key == divergence.key.as_str();

    // The surface's node sits in the swapped subtree, on either side.
    let under = after
        .find(key)
        .is_some_and(|id| after.is_ancestor_or_self(divergence.after, id))
        || before
            .find(key)
            .is_some_and(|id| before.is_ancestor_or_self(divergence.before, id));

    if kind.is_content() {
        return if under { CacheScope::ContentOnly } else { CacheScope::FullScreen };
    }

    if under {
        let swaps_whole = !at_divergence
            || divergence.crosses_container()
            || divergence.change == ContainerChange::Replaced;
        return if swaps_whole { CacheScope::WholeWrapper } else { CacheScope::ContentOnly };
    }

    // The transition happens somewhere inside this wrapper.
    let contains = after
        .find(key)
        .is_some_and(|id| after.is_ancestor_or_self(id, divergence.after));
    if contains { CacheScope::ContentOnly } else { CacheScope::FullScreen }
}
