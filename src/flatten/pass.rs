use std::ops::Range;

use tracing::{debug, trace};

use super::{
    AnimationPair, CachingHints, FlattenError, FlattenResult, PairKind, PaneSlotSurface,
    RenderableSurface, SurfaceId, SurfaceKind, TransitionPhase,
};
use crate::common::collections::{HashMap, HashSet};
use crate::common::config::FlattenSettings;
use crate::model::{AdaptStrategy, NavNode, NavTree, NodeId, NodeKey, NodeKind, PaneRole, SlotEntry};
use crate::retention::CacheScope;
use crate::retention::scope::scope_within;
use crate::transition::{ContainerChange, Divergence, NavDirection, Progress, TransitionState, diff};
use crate::window::WindowContext;

/// Flattens `tree` into a render plan.
///
/// `tree` is the tree to end up on; a running `transition` supplies the tree
/// being left. Only the container where the two first differ animates.
pub fn flatten(
    tree: &NavTree,
    transition: Option<&TransitionState>,
    window: &WindowContext,
    settings: &FlattenSettings,
) -> Result<FlattenResult, FlattenError> {
    let inc = settings.z_increment;
    if inc < 2 || inc % 2 != 0 {
        return Err(FlattenError::InvalidIncrement(inc));
    }

    let running = transition.filter(|t| !t.is_idle());
    let before: &NavTree = running.map_or(tree, |t| &**t.current());
    let divergence = running.and_then(|_| diff::find_divergence(before, tree));

    let mut pass = Pass {
        before,
        after: tree,
        divergence: divergence.as_ref(),
        progress: running.and_then(|t| t.progress()).unwrap_or_default(),
        direction: running.and_then(|t| t.direction()).unwrap_or(NavDirection::Forward),
        window,
        inc,
        surfaces: Vec::new(),
        pairs: Vec::new(),
        shown_slots: HashSet::default(),
    };
    pass.emit(Side::After, tree.root(), 0, TransitionPhase::Visible)?;
    let result = pass.finish();
    trace!(surfaces = result.surfaces.len(), pairs = result.pairs.len(), "flattened");
    Ok(result)
}

/// Validates `node` and flattens it with no transition running.
pub fn flatten_node(
    node: NavNode,
    window: &WindowContext,
    settings: &FlattenSettings,
) -> Result<FlattenResult, FlattenError> {
    let tree = NavTree::new(node)?;
    flatten(&tree, None, window, settings)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Before,
    After,
}

struct Pass<'a> {
    before: &'a NavTree,
    after: &'a NavTree,
    divergence: Option<&'a Divergence>,
    progress: Progress,
    direction: NavDirection,
    window: &'a WindowContext,
    inc: i32,
    surfaces: Vec<RenderableSurface>,
    pairs: Vec<AnimationPair>,
    /// Slots of the after tree that are on screen although not active.
    shown_slots: HashSet<NodeId>,
}

impl<'a> Pass<'a> {
    fn tree(&self, side: Side) -> &'a NavTree {
        match side {
            Side::Before => self.before,
            Side::After => self.after,
        }
    }

    fn push(&mut self, surface: RenderableSurface) -> usize {
        self.surfaces.push(surface);
        self.surfaces.len() - 1
    }

    fn slot_z(&self, base: i32, index: usize) -> i32 { base + (index as i32 + 1) * self.inc }

    fn push_or_pop(&self) -> PairKind {
        match self.direction {
            NavDirection::Forward => PairKind::Push,
            NavDirection::Backward => PairKind::Pop,
        }
    }

    /// Emits the surfaces for one node and returns the indices of those
    /// that are top-level, i.e. not yet owned by a wrapper.
    fn emit(
        &mut self,
        side: Side,
        id: NodeId,
        base: i32,
        phase: TransitionPhase,
    ) -> Result<Vec<usize>, FlattenError> {
        if side == Side::After {
            if let Some(divergence) = self.divergence.filter(|d| d.after == id) {
                return self.emit_transition(divergence, base, phase);
            }
        }
        self.emit_node(side, id, base, phase)
    }

    fn emit_node(
        &mut self,
        side: Side,
        id: NodeId,
        base: i32,
        phase: TransitionPhase,
    ) -> Result<Vec<usize>, FlattenError> {
        let tree = self.tree(side);
        let node = &tree[id];
        match &node.kind {
            NodeKind::Screen { destination } => {
                if !self.window.has_space() {
                    return Err(FlattenError::NoSpace {
                        key: node.key.clone(),
                        width: self.window.width,
                        height: self.window.height,
                    });
                }
                Ok(vec![self.push(RenderableSurface::screen(&node.key, destination, base, phase))])
            }
            NodeKind::Stack { children } => match children.last() {
                Some(&top) => self.emit(side, top, base + self.inc, phase),
                None => Ok(Vec::new()),
            },
            NodeKind::Tab { branches, active_index } => {
                let wrapper = self.push(RenderableSurface::wrapper(
                    &node.key,
                    SurfaceKind::TabWrapper,
                    base,
                    phase,
                ));
                if let Some(&branch) = branches.get(*active_index) {
                    let content = self.emit(side, branch, base + self.inc, phase)?;
                    self.adopt(&content, wrapper, SurfaceKind::TabContent, None);
                }
                Ok(vec![wrapper])
            }
            NodeKind::Pane { slots, active_role } => {
                if self.window.supports_multi_pane() {
                    let wrapper = self.push(RenderableSurface::wrapper(
                        &node.key,
                        SurfaceKind::PaneWrapper,
                        base,
                        phase,
                    ));
                    let visible = visible_slots(slots, *active_role, self.window.max_pane_slots());
                    for (index, slot) in visible.into_iter().enumerate() {
                        let content = self.emit(side, slot.node, self.slot_z(base, index), phase)?;
                        if side == Side::After {
                            self.shown_slots.insert(slot.node);
                        }
                        self.attach_slot(wrapper, slot.role, &content);
                    }
                    Ok(vec![wrapper])
                } else {
                    let Some(active) = node.active_child() else {
                        return Ok(Vec::new());
                    };
                    let content = self.emit(side, active, base + self.inc, phase)?;
                    self.relabel(&content, SurfaceKind::PaneAsSingle);
                    Ok(content)
                }
            }
        }
    }

    fn emit_transition(
        &mut self,
        divergence: &'a Divergence,
        base: i32,
        phase: TransitionPhase,
    ) -> Result<Vec<usize>, FlattenError> {
        let entering = TransitionPhase::Entering(self.progress);
        let exiting = TransitionPhase::Exiting(self.progress);
        debug!(
            container = %divergence.key,
            change = ?divergence.change,
            progress = self.progress.get(),
            direction = %self.direction,
            "animating container"
        );

        match &divergence.change {
            ContainerChange::Replaced => {
                let mark = self.surfaces.len();
                let out = self.emit_node(Side::Before, divergence.before, base, exiting)?;
                let split = self.surfaces.len();
                let inn =
                    self.emit_node(Side::After, divergence.after, self.above(mark, base), entering)?;
                self.disambiguate(mark..split, split..self.surfaces.len());
                self.pair(&inn, &out, self.push_or_pop(), None);
                Ok([out, inn].concat())
            }
            ContainerChange::StackTop { previous, current } => {
                let mark = self.surfaces.len();
                let out = match previous {
                    Some(previous) => self.emit(Side::Before, *previous, base, exiting)?,
                    None => Vec::new(),
                };
                let split = self.surfaces.len();
                let inn = match current {
                    Some(current) => {
                        self.emit(Side::After, *current, self.above(mark, base), entering)?
                    }
                    None => Vec::new(),
                };
                self.disambiguate(mark..split, split..self.surfaces.len());
                self.relabel(&out, SurfaceKind::StackContent);
                self.relabel(&inn, SurfaceKind::StackContent);
                self.pair(&inn, &out, self.push_or_pop(), None);
                Ok([out, inn].concat())
            }
            ContainerChange::TabSwitch { previous, current, .. } => {
                // The wrapper is shared by both branches and never duplicated.
                let wrapper = self.push(RenderableSurface::wrapper(
                    &divergence.key,
                    SurfaceKind::TabWrapper,
                    base,
                    phase,
                ));
                let mark = self.surfaces.len();
                let out = self.emit(Side::Before, *previous, base + self.inc, exiting)?;
                let split = self.surfaces.len();
                let inn =
                    self.emit(Side::After, *current, self.above(mark, base + self.inc), entering)?;
                self.disambiguate(mark..split, split..self.surfaces.len());
                self.adopt(&out, wrapper, SurfaceKind::TabContent, None);
                self.adopt(&inn, wrapper, SurfaceKind::TabContent, None);
                let container = Some(self.surfaces[wrapper].id.clone());
                self.pair(&inn, &out, PairKind::TabSwitch, container);
                Ok(vec![wrapper])
            }
            ContainerChange::PaneSwitch { previous_role, current_role, previous, current } => {
                if self.window.supports_multi_pane() {
                    return self.emit_pane_switch(divergence, *previous_role, *current_role, base, phase);
                }
                let mark = self.surfaces.len();
                let out = self.emit(Side::Before, *previous, base, exiting)?;
                let split = self.surfaces.len();
                let inn = self.emit(Side::After, *current, self.above(mark, base), entering)?;
                self.disambiguate(mark..split, split..self.surfaces.len());
                self.relabel(&out, SurfaceKind::PaneAsSingle);
                self.relabel(&inn, SurfaceKind::PaneAsSingle);
                self.pair(&inn, &out, self.push_or_pop(), None);
                Ok([out, inn].concat())
            }
        }
    }

    /// Multi-slot pane whose active role changed. Slots visible on both sides
    /// stay put, newly visible slots enter half a level up and slots that no
    /// longer fit exit from their old position.
    fn emit_pane_switch(
        &mut self,
        divergence: &'a Divergence,
        previous_role: PaneRole,
        current_role: PaneRole,
        base: i32,
        phase: TransitionPhase,
    ) -> Result<Vec<usize>, FlattenError> {
        let (before, after) = (self.before, self.after);
        let (
            NodeKind::Pane { slots: before_slots, .. },
            NodeKind::Pane { slots: after_slots, .. },
        ) = (&before[divergence.before].kind, &after[divergence.after].kind)
        else {
            return Ok(Vec::new());
        };
        let half = self.inc / 2;
        let max = self.window.max_pane_slots();
        let before_visible = visible_slots(before_slots, previous_role, max);
        let after_visible = visible_slots(after_slots, current_role, max);
        let same = |b: &SlotEntry, a: &SlotEntry| {
            b.role == a.role && before[b.node].key == after[a.node].key
        };

        let wrapper = self.push(RenderableSurface::wrapper(
            &divergence.key,
            SurfaceKind::PaneWrapper,
            base,
            phase,
        ));

        let shown = self.surfaces.len();
        let mut stayed_content = Vec::new();
        let mut inn = Vec::new();
        for (index, slot) in after_visible.iter().enumerate() {
            let stayed = before_visible.iter().any(|b| same(b, slot));
            let (z, slot_phase) = if stayed {
                (self.slot_z(base, index), phase)
            } else {
                (self.slot_z(base, index) + half, TransitionPhase::Entering(self.progress))
            };
            let content = self.emit(Side::After, slot.node, z, slot_phase)?;
            self.shown_slots.insert(slot.node);
            self.attach_slot(wrapper, slot.role, &content);
            if slot.role == current_role {
                inn = content.clone();
            }
            stayed_content.push((slot.role, content));
        }

        let shown = shown..self.surfaces.len();
        let mut out = Vec::new();
        for (index, slot) in before_visible.iter().enumerate() {
            if after_visible.iter().any(|a| same(slot, a)) {
                if slot.role == previous_role {
                    if let Some((_, content)) = stayed_content.iter().find(|(r, _)| *r == slot.role) {
                        out = content.clone();
                    }
                }
                continue;
            }
            let mark = self.surfaces.len();
            let content = self.emit(
                Side::Before,
                slot.node,
                self.slot_z(base, index),
                TransitionPhase::Exiting(self.progress),
            )?;
            self.disambiguate(mark..self.surfaces.len(), shown.clone());
            self.attach_slot(wrapper, slot.role, &content);
            if slot.role == previous_role {
                out = content;
            }
        }

        let container = Some(self.surfaces[wrapper].id.clone());
        self.pair(&inn, &out, PairKind::PaneSwitch, container);
        Ok(vec![wrapper])
    }

    /// Base for an entering subtree: half a level above `floor` and above
    /// every surface emitted since `mark`, so the whole exiting subtree
    /// paints below it.
    fn above(&self, mark: usize, floor: i32) -> i32 {
        let top = self.surfaces[mark..].iter().map(|s| s.z_order).fold(floor, i32::max);
        top + self.inc / 2
    }

    /// Renames exiting surfaces whose id the entering side also uses. This
    /// happens when a screen or container moves to another parent between
    /// the two trees. References held inside the exiting range follow.
    fn disambiguate(&mut self, exiting: Range<usize>, entering: Range<usize>) {
        let taken: HashSet<&SurfaceId> = self.surfaces[entering].iter().map(|s| &s.id).collect();
        let renamed: HashMap<SurfaceId, SurfaceId> = self.surfaces[exiting.clone()]
            .iter()
            .filter(|s| taken.contains(&s.id))
            .map(|s| (s.id.clone(), s.id.exiting()))
            .collect();
        if renamed.is_empty() {
            return;
        }
        debug!(moved = ?renamed.keys().collect::<Vec<_>>(), "surfaces on both sides of the transition");
        let rename = |id: &mut SurfaceId| {
            if let Some(new) = renamed.get(&*id) {
                *id = new.clone();
            }
        };
        for surface in &mut self.surfaces[exiting] {
            rename(&mut surface.id);
            if let Some(parent) = surface.parent_wrapper_id.as_mut() {
                rename(parent);
            }
            for slot in surface.pane_slots.iter_mut().flatten() {
                slot.surfaces.iter_mut().for_each(rename);
            }
        }
    }

    /// Links top-level content to its wrapper. Plain screens take the
    /// wrapper's content kind; nested wrappers and stack content keep theirs.
    fn adopt(&mut self, content: &[usize], wrapper: usize, kind: SurfaceKind, role: Option<PaneRole>) {
        let wrapper_id = self.surfaces[wrapper].id.clone();
        for &i in content {
            let surface = &mut self.surfaces[i];
            if surface.kind == SurfaceKind::SingleScreen {
                surface.kind = kind;
            }
            surface.parent_wrapper_id = Some(wrapper_id.clone());
            if surface.pane_role.is_none() {
                surface.pane_role = role;
            }
        }
    }

    fn attach_slot(&mut self, wrapper: usize, role: PaneRole, content: &[usize]) {
        self.adopt(content, wrapper, SurfaceKind::PaneContent, Some(role));
        let ids: Vec<_> = content.iter().map(|&i| self.surfaces[i].id.clone()).collect();
        let Some(slots) = self.surfaces[wrapper].pane_slots.as_mut() else {
            return;
        };
        match slots.iter_mut().find(|s| s.role == role) {
            Some(existing) => existing.surfaces.extend(ids),
            None => slots.push(PaneSlotSurface { role, surfaces: ids }),
        }
    }

    fn relabel(&mut self, content: &[usize], kind: SurfaceKind) {
        for &i in content {
            if self.surfaces[i].kind == SurfaceKind::SingleScreen {
                self.surfaces[i].kind = kind;
            }
        }
    }

    /// Records a pair between the first top-level surface of each side and
    /// hints the entering surface at its predecessor.
    fn pair(
        &mut self,
        entering: &[usize],
        exiting: &[usize],
        kind: PairKind,
        container_id: Option<SurfaceId>,
    ) {
        let entering_id = entering.first().map(|&i| self.surfaces[i].id.clone());
        let exiting_id = exiting.first().map(|&i| self.surfaces[i].id.clone());
        if entering_id.is_none() && exiting_id.is_none() {
            return;
        }
        if let (Some(&i), Some(previous)) = (entering.first(), &exiting_id) {
            if self.surfaces[i].id != *previous {
                self.surfaces[i].previous_surface_id = Some(previous.clone());
            }
        }
        self.pairs.push(AnimationPair {
            entering_id,
            exiting_id,
            kind,
            container_id,
        });
    }

    fn finish(mut self) -> FlattenResult {
        // Stable: equal z keeps emission order.
        self.surfaces.sort_by_key(|s| s.z_order);

        let mut hints = CachingHints::default();
        for surface in &self.surfaces {
            let scope = match self.divergence {
                Some(d) => scope_within(self.before, self.after, d, &surface.id, surface.kind),
                None => CacheScope::FullScreen,
            };
            hints.scopes.insert(surface.id.clone(), scope);
            if surface.phase.is_animating() {
                hints.animating.push(surface.id.clone());
            }
        }

        let mut retained: Vec<NodeKey> = self
            .after
            .inactive_branches()
            .into_iter()
            .filter(|id| !self.shown_slots.contains(id))
            .flat_map(|id| self.after.active_path_from(id))
            .map(|id| self.after[id].key.clone())
            .collect();
        retained.sort();
        retained.dedup();
        hints.retained = retained;

        FlattenResult {
            surfaces: self.surfaces,
            pairs: self.pairs,
            hints,
        }
    }
}

/// Slots shown side by side, in layout order. The active role always
/// shows; remaining room goes to reflow slots before hide slots.
fn visible_slots(slots: &[SlotEntry], active: PaneRole, max: usize) -> Vec<&SlotEntry> {
    let mut chosen = vec![active];
    let by_strategy =
        |strategy: AdaptStrategy| slots.iter().filter(move |s| s.adapt == strategy && s.role != active);
    for slot in by_strategy(AdaptStrategy::Reflow).chain(by_strategy(AdaptStrategy::Hide)) {
        if chosen.len() >= max {
            break;
        }
        chosen.push(slot.role);
    }
    slots.iter().filter(|s| chosen.contains(&s.role)).collect()
}
