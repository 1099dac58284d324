//! Bounded diff of the before/after trees of a transition.
//!
//! Both trees are walked from the root along the active path (and into
//! every pane slot). The walk stops at the first container whose live child
//! changed, so the work done is proportional to the depth of that container.

use crate::model::{NavTree, NodeId, NodeKey, NodeKind, PaneRole};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContainerChange {
    /// A different node now sits where the old one was: the root key changed,
    /// or a node kept its key but changed kind.
    Replaced,
    /// The top of a stack changed. Either side is absent when the stack was
    /// or became empty.
    StackTop {
        previous: Option<NodeId>,
        current: Option<NodeId>,
    },
    TabSwitch {
        previous_index: usize,
        current_index: usize,
        previous: NodeId,
        current: NodeId,
    },
    PaneSwitch {
        previous_role: PaneRole,
        current_role: PaneRole,
        previous: NodeId,
        current: NodeId,
    },
}

/// The container at which two trees first differ.
///
/// `before` and `after` are the container's ids in the respective trees;
/// ids are only meaningful within their own tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Divergence {
    pub key: NodeKey,
    pub before: NodeId,
    pub after: NodeId,
    pub change: ContainerChange,
}

impl Divergence {
    /// Subtree leaving the screen, as an id into the before tree.
    pub fn exiting(&self) -> Option<NodeId> {
        match &self.change {
            ContainerChange::Replaced => Some(self.before),
            ContainerChange::StackTop { previous, .. } => *previous,
            ContainerChange::TabSwitch { previous, .. }
            | ContainerChange::PaneSwitch { previous, .. } => Some(*previous),
        }
    }

    /// Subtree arriving on screen, as an id into the after tree.
    pub fn entering(&self) -> Option<NodeId> {
        match &self.change {
            ContainerChange::Replaced => Some(self.after),
            ContainerChange::StackTop { current, .. } => *current,
            ContainerChange::TabSwitch { current, .. }
            | ContainerChange::PaneSwitch { current, .. } => Some(*current),
        }
    }

    /// Whether the change swaps whole children of a tab or pane, as opposed
    /// to moving within a stack.
    pub fn crosses_container(&self) -> bool {
        matches!(
            self.change,
            ContainerChange::TabSwitch { .. } | ContainerChange::PaneSwitch { .. }
        )
    }
}

pub fn find_divergence(before: &NavTree, after: &NavTree) -> Option<Divergence> {
    walk(before, before.root(), after, after.root())
}

fn walk(before: &NavTree, b: NodeId, after: &NavTree, a: NodeId) -> Option<Divergence> {
    let (bn, an) = (&before[b], &after[a]);
    let diverge = |change| {
        Some(Divergence {
            key: an.key.clone(),
            before: b,
            after: a,
            change,
        })
    };
    if bn.key != an.key {
        return diverge(ContainerChange::Replaced);
    }

    match (&bn.kind, &an.kind) {
        (NodeKind::Screen { .. }, NodeKind::Screen { .. }) => None,
        (NodeKind::Stack { .. }, NodeKind::Stack { .. }) => {
            match (bn.active_child(), an.active_child()) {
                (None, None) => None,
                (Some(bc), Some(ac)) if before[bc].key == after[ac].key => {
                    walk(before, bc, after, ac)
                }
                (previous, current) => diverge(ContainerChange::StackTop { previous, current }),
            }
        }
        (
            NodeKind::Tab { active_index: previous_index, .. },
            NodeKind::Tab { active_index: current_index, .. },
        ) => {
            let (bc, ac) = (bn.active_child()?, an.active_child()?);
            if previous_index != current_index || before[bc].key != after[ac].key {
                diverge(ContainerChange::TabSwitch {
                    previous_index: *previous_index,
                    current_index: *current_index,
                    previous: bc,
                    current: ac,
                })
            } else {
                walk(before, bc, after, ac)
            }
        }
        (
            NodeKind::Pane { active_role: previous_role, slots: before_slots },
            NodeKind::Pane { active_role: current_role, slots: after_slots },
        ) => {
            let (bc, ac) = (bn.active_child()?, an.active_child()?);
            if previous_role != current_role || before[bc].key != after[ac].key {
                return diverge(ContainerChange::PaneSwitch {
                    previous_role: *previous_role,
                    current_role: *current_role,
                    previous: bc,
                    current: ac,
                });
            }
            walk(before, bc, after, ac).or_else(|| {
                after_slots
                    .iter()
                    .filter(|slot| slot.role != *current_role)
                    .filter_map(|slot| {
                        let old = before_slots.iter().find(|s| s.role == slot.role)?;
                        (before[old.node].key == after[slot.node].key).then_some((old, slot))
                    })
                    .find_map(|(old, slot)| walk(before, old.node, after, slot.node))
            })
        }
        _ => diverge(ContainerChange::Replaced),
    }
}

/// Whether node `node` is `container` or lies beneath it in `tree`.
pub fn is_within(tree: &NavTree, node: &str, container: &str) -> bool {
    match (tree.find(node), tree.find(container)) {
        (Some(node), Some(container)) => tree.is_ancestor_or_self(container, node),
        _ => false,
    }
}

pub fn active_child_key(tree: &NavTree, stack: &str) -> Option<NodeKey> {
    let node = tree.node(stack)?;
    match &node.kind {
        NodeKind::Stack { children } => children.last().map(|c| tree[*c].key.clone()),
        _ => None,
    }
}

pub fn active_index(tree: &NavTree, tab: &str) -> Option<usize> {
    match &tree.node(tab)?.kind {
        NodeKind::Tab { active_index, .. } => Some(*active_index),
        _ => None,
    }
}
