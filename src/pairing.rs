//! Animation pairs between two successive render plans.
//!
//! The flattener already pairs the surfaces of the transition it walks.
//! [`track`] recovers pairs from plain surface lists instead, for renderers
//! that only keep the previous plan around. Matching is keyed, so the
//! result does not depend on the order of either list.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::flatten::{AnimationPair, PairKind, RenderableSurface, SurfaceId, SurfaceKind};
use crate::transition::NavDirection;

/// Pairs surfaces that appear in `next` but not in `previous` with those that
/// went the other way.
///
/// An entering surface is matched, in order of preference, to the exiting
/// surface its `previous_surface_id` names, then to an exiting surface with
/// the same `parent_wrapper_id`, then (when neither has a wrapper) to one of
/// the same kind. Ties go to the smallest id. Exiting surfaces left over
/// still emit a pop with nothing entering; entering ones left over emit a
/// pair of kind [`PairKind::None`].
///
/// `direction` decides between push and pop for stack-like pairs and
/// defaults to forward.
pub fn track(
    previous: &[RenderableSurface],
    next: &[RenderableSurface],
    direction: Option<NavDirection>,
) -> Vec<AnimationPair> {
    let before: BTreeMap<&SurfaceId, &RenderableSurface> =
        previous.iter().map(|s| (&s.id, s)).collect();
    let after: BTreeMap<&SurfaceId, &RenderableSurface> =
        next.iter().map(|s| (&s.id, s)).collect();

    let mut exiting: BTreeSet<&SurfaceId> =
        before.keys().copied().filter(|id| !after.contains_key(id)).collect();
    let entering: Vec<&RenderableSurface> = after
        .iter()
        .filter(|(id, _)| !before.contains_key(*id))
        .map(|(_, s)| *s)
        .collect();

    let mut matched: BTreeMap<&SurfaceId, &SurfaceId> = BTreeMap::new();

    // Hints first, so a group match cannot steal a hinted partner.
    for surface in &entering {
        let Some(hint) = &surface.previous_surface_id else { continue };
        if exiting.remove(hint) {
            matched.insert(&surface.id, hint);
        }
    }

    for surface in &entering {
        if matched.contains_key(&surface.id) {
            continue;
        }
        let partner = exiting.iter().copied().find(|id| same_group(before[id], surface));
        if let Some(partner) = partner {
            exiting.remove(partner);
            matched.insert(&surface.id, partner);
        }
    }

    let mut pairs = Vec::with_capacity(entering.len() + exiting.len());
    for surface in &entering {
        let pair = match matched.get(&surface.id) {
            Some(&out) => AnimationPair {
                entering_id: Some(surface.id.clone()),
                exiting_id: Some(out.clone()),
                kind: pair_kind(surface.kind, direction),
                container_id: surface
                    .parent_wrapper_id
                    .clone()
                    .or_else(|| before[out].parent_wrapper_id.clone()),
            },
            None => AnimationPair {
                entering_id: Some(surface.id.clone()),
                exiting_id: None,
                kind: PairKind::None,
                container_id: surface.parent_wrapper_id.clone(),
            },
        };
        pairs.push(pair);
    }
    for id in exiting {
        pairs.push(AnimationPair {
            entering_id: None,
            exiting_id: Some(id.clone()),
            kind: PairKind::Pop,
            container_id: before[id].parent_wrapper_id.clone(),
        });
    }

    pairs.sort_by(|a, b| {
        (&a.entering_id, &a.exiting_id).cmp(&(&b.entering_id, &b.exiting_id))
    });
    trace!(pairs = pairs.len(), "tracked animation pairs");
    pairs
}

fn same_group(exiting: &RenderableSurface, entering: &RenderableSurface) -> bool {
    match (&exiting.parent_wrapper_id, &entering.parent_wrapper_id) {
        (Some(a), Some(b)) => a == b,
        (None, None) => exiting.kind == entering.kind,
        _ => false,
    }
}

fn pair_kind(entering: SurfaceKind, direction: Option<NavDirection>) -> PairKind {
    match entering {
        SurfaceKind::TabContent => PairKind::TabSwitch,
        SurfaceKind::PaneContent => PairKind::PaneSwitch,
        _ => match direction.unwrap_or(NavDirection::Forward) {
            NavDirection::Forward => PairKind::Push,
            NavDirection::Backward => PairKind::Pop,
        },
    }
}

/// Remembers the last plan so each new one can be paired against it.
#[derive(Debug, Default)]
pub struct PairTracker {
    previous: Vec<RenderableSurface>,
}

impl PairTracker {
    pub fn new() -> Self { Self::default() }

    pub fn previous(&self) -> &[RenderableSurface] { &self.previous }

    /// Pairs `next` against the last plan seen and keeps `next` for the
    /// following call.
    pub fn advance(
        &mut self,
        next: &[RenderableSurface],
        direction: Option<NavDirection>,
    ) -> Vec<AnimationPair> {
        let pairs = track(&self.previous, next, direction);
        self.previous = next.to_vec();
        pairs
    }

    pub fn reset(&mut self) { self.previous.clear(); }
}
