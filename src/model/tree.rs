use std::ops::Index;

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use thiserror::Error;

use super::node::{AdaptStrategy, Destination, NavNode, NodeKey, PaneRole};
use crate::common::collections::HashMap;

/// Separator reserved for derived surface ids (`"<key>#wrapper"`).
pub const RESERVED_KEY_CHAR: char = '#';

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("node keys must not be empty")]
    EmptyKey,
    #[error("node key `{0}` contains the reserved character `#`")]
    ReservedCharacter(NodeKey),
    #[error("duplicate node key `{0}`")]
    DuplicateKey(NodeKey),
    #[error("tab `{key}` has active index {index} but only {len} branches")]
    ActiveIndexOutOfRange {
        key: NodeKey,
        index: usize,
        len: usize,
    },
    #[error("pane `{key}` has no slot for its active role `{role}`")]
    MissingActiveRole { key: NodeKey, role: PaneRole },
    #[error("pane `{key}` declares role `{role}` more than once")]
    DuplicatePaneRole { key: NodeKey, role: PaneRole },
}

slotmap::new_key_type! {
    /// Position of a node inside one [`NavTree`] snapshot.
    ///
    /// Ids are only meaningful for the snapshot that produced them; compare
    /// snapshots through [`NodeKey`].
    pub struct NodeId;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotEntry {
    pub role: PaneRole,
    pub node: NodeId,
    pub adapt: AdaptStrategy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Screen {
        destination: Destination,
    },
    Stack {
        children: Vec<NodeId>,
    },
    Tab {
        branches: Vec<NodeId>,
        active_index: usize,
    },
    /// Slots are kept in layout order (primary first).
    Pane {
        slots: Vec<SlotEntry>,
        active_role: PaneRole,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub key: NodeKey,
    /// Parent stored as an arena key, never as a reference.
    pub parent: Option<NodeId>,
    pub depth: usize,
    pub kind: NodeKind,
}

impl Node {
    pub fn is_screen(&self) -> bool { matches!(self.kind, NodeKind::Screen { .. }) }

    pub fn is_container(&self) -> bool { !self.is_screen() }

    /// The child that is live: last stack entry, active tab branch, or the
    /// slot holding the active pane role.
    pub fn active_child(&self) -> Option<NodeId> {
        match &self.kind {
            NodeKind::Screen { .. } => None,
            NodeKind::Stack { children } => children.last().copied(),
            NodeKind::Tab { branches, active_index } => branches.get(*active_index).copied(),
            NodeKind::Pane { slots, active_role } => {
                slots.iter().find(|s| s.role == *active_role).map(|s| s.node)
            }
        }
    }

    pub fn children(&self) -> Vec<NodeId> {
        match &self.kind {
            NodeKind::Screen { .. } => Vec::new(),
            NodeKind::Stack { children } => children.clone(),
            NodeKind::Tab { branches, .. } => branches.clone(),
            NodeKind::Pane { slots, .. } => slots.iter().map(|s| s.node).collect(),
        }
    }

    pub fn slot(&self, role: PaneRole) -> Option<&SlotEntry> {
        match &self.kind {
            NodeKind::Pane { slots, .. } => slots.iter().find(|s| s.role == role),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        match &self.kind {
            NodeKind::Screen { destination } => {
                format!("Screen {} -> {}", self.key, destination.route)
            }
            NodeKind::Stack { children } => format!("Stack {} [{}]", self.key, children.len()),
            NodeKind::Tab { branches, active_index } => {
                format!("Tab {} [{}/{}]", self.key, active_index, branches.len())
            }
            NodeKind::Pane { active_role, .. } => format!("Pane {} ({active_role})", self.key),
        }
    }
}

/// Validated, indexed snapshot of a navigation tree.
///
/// Nodes live in a flat arena keyed by [`NodeId`] with a secondary index from
/// [`NodeKey`]. Equality and serialization go through the source
/// [`NavNode`], so two trees built from structurally equal input are equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "NavNode", into = "NavNode")]
pub struct NavTree {
    nodes: SlotMap<NodeId, Node>,
    index: HashMap<NodeKey, NodeId>,
    root: NodeId,
    source: NavNode,
}

impl PartialEq for NavTree {
    fn eq(&self, other: &Self) -> bool { self.source == other.source }
}

impl Eq for NavTree {}

impl TryFrom<NavNode> for NavTree {
    type Error = TreeError;

    fn try_from(node: NavNode) -> Result<Self, Self::Error> { NavTree::new(node) }
}

impl From<NavTree> for NavNode {
    fn from(tree: NavTree) -> Self { tree.source }
}

impl Index<NodeId> for NavTree {
    type Output = Node;

    fn index(&self, index: NodeId) -> &Self::Output { &self.nodes[index] }
}

impl NavTree {
    pub fn new(root: NavNode) -> Result<Self, TreeError> {
        let mut nodes = SlotMap::with_key();
        let mut index = HashMap::default();
        let root_id = Self::insert(&mut nodes, &mut index, &root, None, 0)?;
        Ok(NavTree {
            nodes,
            index,
            root: root_id,
            source: root,
        })
    }

    fn insert(
        nodes: &mut SlotMap<NodeId, Node>,
        index: &mut HashMap<NodeKey, NodeId>,
        node: &NavNode,
        parent: Option<NodeId>,
        depth: usize,
    ) -> Result<NodeId, TreeError> {
        let key = node.key();
        if key.as_str().is_empty() {
            return Err(TreeError::EmptyKey);
        }
        if key.as_str().contains(RESERVED_KEY_CHAR) {
            return Err(TreeError::ReservedCharacter(key.clone()));
        }
        if index.contains_key(key) {
            return Err(TreeError::DuplicateKey(key.clone()));
        }

        // Children are attached after the parent has an id.
        let id = nodes.insert(Node {
            key: key.clone(),
            parent,
            depth,
            kind: NodeKind::Stack { children: Vec::new() },
        });
        index.insert(key.clone(), id);

        let kind = match node {
            NavNode::Screen { destination, .. } => NodeKind::Screen {
                destination: destination.clone(),
            },
            NavNode::Stack { children, .. } => NodeKind::Stack {
                children: children
                    .iter()
                    .map(|child| Self::insert(nodes, index, child, Some(id), depth + 1))
                    .collect::<Result<_, _>>()?,
            },
            NavNode::Tab { branches, active_index, .. } => {
                if *active_index >= branches.len() {
                    return Err(TreeError::ActiveIndexOutOfRange {
                        key: key.clone(),
                        index: *active_index,
                        len: branches.len(),
                    });
                }
                NodeKind::Tab {
                    branches: branches
                        .iter()
                        .map(|branch| Self::insert(nodes, index, branch, Some(id), depth + 1))
                        .collect::<Result<_, _>>()?,
                    active_index: *active_index,
                }
            }
            NavNode::Pane { slots, active_role, .. } => {
                let mut entries: Vec<SlotEntry> = Vec::with_capacity(slots.len());
                for slot in slots {
                    if entries.iter().any(|e| e.role == slot.role) {
                        return Err(TreeError::DuplicatePaneRole {
                            key: key.clone(),
                            role: slot.role,
                        });
                    }
                    entries.push(SlotEntry {
                        role: slot.role,
                        node: Self::insert(nodes, index, &slot.content, Some(id), depth + 1)?,
                        adapt: slot.adapt,
                    });
                }
                if !entries.iter().any(|e| e.role == *active_role) {
                    return Err(TreeError::MissingActiveRole {
                        key: key.clone(),
                        role: *active_role,
                    });
                }
                entries.sort_by_key(|e| e.role);
                NodeKind::Pane {
                    slots: entries,
                    active_role: *active_role,
                }
            }
        };
        nodes[id].kind = kind;
        Ok(id)
    }

    pub fn root(&self) -> NodeId { self.root }

    pub fn root_node(&self) -> &Node { &self.nodes[self.root] }

    pub fn source(&self) -> &NavNode { &self.source }

    pub fn len(&self) -> usize { self.nodes.len() }

    pub fn get(&self, id: NodeId) -> Option<&Node> { self.nodes.get(id) }

    pub fn find(&self, key: &str) -> Option<NodeId> { self.index.get(key).copied() }

    pub fn node(&self, key: &str) -> Option<&Node> { self.find(key).map(|id| &self.nodes[id]) }

    pub fn contains_key(&self, key: &str) -> bool { self.index.contains_key(key) }

    pub fn keys(&self) -> impl Iterator<Item = &NodeKey> + '_ { self.index.keys() }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> { self.nodes.get(id).and_then(|n| n.parent) }

    /// Walks from `id` up to the root, `id` first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut next = Some(id);
        std::iter::from_fn(move || {
            let node = next;
            next = node.and_then(|n| self.parent(n));
            node
        })
    }

    pub fn traverse_preorder(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack = vec![id];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            if let Some(n) = self.nodes.get(node) {
                stack.extend(n.children().into_iter().rev());
            }
            Some(node)
        })
    }

    pub fn subtree_keys(&self, id: NodeId) -> impl Iterator<Item = &NodeKey> + '_ {
        self.traverse_preorder(id).map(|n| &self.nodes[n].key)
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    /// Nodes from the root down the chain of active children.
    pub fn active_path(&self) -> Vec<NodeId> { self.active_path_from(self.root) }

    /// `id` and the chain of active children below it. For an inactive tab
    /// branch this is what shows again once the branch is reselected.
    pub fn active_path_from(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut node = id;
        while let Some(child) = self.nodes[node].active_child() {
            path.push(child);
            node = child;
        }
        path
    }

    /// Tab branches and pane slots that exist in the tree but are not the
    /// active child of their container.
    pub fn inactive_branches(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        for id in self.traverse_preorder(self.root) {
            let node = &self.nodes[id];
            match &node.kind {
                NodeKind::Tab { .. } | NodeKind::Pane { .. } => {
                    let active = node.active_child();
                    out.extend(node.children().into_iter().filter(|c| Some(*c) != active));
                }
                _ => {}
            }
        }
        out
    }

    pub fn draw(&self) -> String {
        let tree = self.ascii_tree(self.root);
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = ascii_tree::write_tree(&mut out, &tree);
        out
    }

    fn ascii_tree(&self, id: NodeId) -> ascii_tree::Tree {
        let node = &self.nodes[id];
        let status = match node.parent {
            None => "",
            Some(parent) if self.nodes[parent].active_child() == Some(id) => "☒ ",
            Some(_) => "☐ ",
        };
        let desc = format!("{status}{}", node.describe());
        let children: Vec<_> = node.children().into_iter().map(|c| self.ascii_tree(c)).collect();
        if children.is_empty() {
            ascii_tree::Tree::Leaf(vec![desc])
        } else {
            ascii_tree::Tree::Node(desc, children)
        }
    }
}

static_assertions::assert_impl_all!(NavTree: Send, Sync);

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::node::PaneSlot;

    fn sample() -> NavNode {
        NavNode::stack(
            "root",
            [
                NavNode::screen("Home"),
                NavNode::tab(
                    "tabs",
                    1,
                    [
                        NavNode::stack("feed", [NavNode::screen("FeedList")]),
                        NavNode::stack("profile", [NavNode::screen("Me"), NavNode::screen("Edit")]),
                    ],
                ),
            ],
        )
    }

    mod validation {
        use pretty_assertions::assert_eq;

        use super::*;

        #[test]
        fn accepts_well_formed_tree() {
            let tree = NavTree::new(sample()).unwrap();
            assert_eq!(tree.len(), 8);
            assert!(tree.contains_key("Edit"));
        }

        #[test]
        fn rejects_duplicate_keys() {
            let node = NavNode::stack("root", [NavNode::screen("A"), NavNode::screen("A")]);
            assert_eq!(
                NavTree::new(node).unwrap_err(),
                TreeError::DuplicateKey(NodeKey::from("A"))
            );
        }

        #[test]
        fn rejects_duplicate_key_across_levels() {
            let node = NavNode::stack("root", [NavNode::stack("root", [])]);
            assert_eq!(
                NavTree::new(node).unwrap_err(),
                TreeError::DuplicateKey(NodeKey::from("root"))
            );
        }

        #[test]
        fn rejects_dangling_active_index() {
            let node = NavNode::tab("t", 2, [NavNode::screen("a"), NavNode::screen("b")]);
            assert_eq!(
                NavTree::new(node).unwrap_err(),
                TreeError::ActiveIndexOutOfRange {
                    key: "t".into(),
                    index: 2,
                    len: 2
                }
            );
        }

        #[test]
        fn rejects_empty_tab() {
            let node = NavNode::tab("t", 0, []);
            assert!(matches!(
                NavTree::new(node),
                Err(TreeError::ActiveIndexOutOfRange { len: 0, .. })
            ));
        }

        #[test]
        fn rejects_missing_active_role() {
            let node = NavNode::pane(
                "p",
                PaneRole::Supporting,
                [PaneSlot::new(PaneRole::Primary, NavNode::screen("a"))],
            );
            assert_eq!(
                NavTree::new(node).unwrap_err(),
                TreeError::MissingActiveRole {
                    key: "p".into(),
                    role: PaneRole::Supporting
                }
            );
        }

        #[test]
        fn rejects_duplicate_roles() {
            let node = NavNode::pane(
                "p",
                PaneRole::Primary,
                [
                    PaneSlot::new(PaneRole::Primary, NavNode::screen("a")),
                    PaneSlot::new(PaneRole::Primary, NavNode::screen("b")),
                ],
            );
            assert!(matches!(
                NavTree::new(node),
                Err(TreeError::DuplicatePaneRole { role: PaneRole::Primary, .. })
            ));
        }

        #[test]
        fn rejects_reserved_and_empty_keys() {
            assert_eq!(
                NavTree::new(NavNode::screen("a#b")).unwrap_err(),
                TreeError::ReservedCharacter("a#b".into())
            );
            assert_eq!(NavTree::new(NavNode::screen("")).unwrap_err(), TreeError::EmptyKey);
        }

        #[test]
        fn empty_stack_is_allowed() {
            let tree = NavTree::new(NavNode::stack("root", [])).unwrap();
            assert_eq!(tree.root_node().active_child(), None);
        }
    }

    mod navigation {
        use pretty_assertions::assert_eq;

        use super::*;

        #[test]
        fn active_path_follows_live_children() {
            let tree = NavTree::new(sample()).unwrap();
            let keys: Vec<_> =
                tree.active_path().into_iter().map(|id| tree[id].key.to_string()).collect();
            assert_eq!(keys, vec!["root", "tabs", "profile", "Edit"]);
        }

        #[test]
        fn parents_are_keys_not_references() {
            let tree = NavTree::new(sample()).unwrap();
            let edit = tree.find("Edit").unwrap();
            let ancestors: Vec<_> =
                tree.ancestors(edit).map(|id| tree[id].key.to_string()).collect();
            assert_eq!(ancestors, vec!["Edit", "profile", "tabs", "root"]);
            assert_eq!(tree[edit].depth, 3);
        }

        #[test]
        fn preorder_visits_every_node_once() {
            let tree = NavTree::new(sample()).unwrap();
            let keys: Vec<_> = tree
                .traverse_preorder(tree.root())
                .map(|id| tree[id].key.to_string())
                .collect();
            assert_eq!(
                keys,
                vec!["root", "Home", "tabs", "feed", "FeedList", "profile", "Me", "Edit"]
            );
        }

        #[test]
        fn inactive_branches_lists_hidden_tab_branches() {
            let tree = NavTree::new(sample()).unwrap();
            let keys: Vec<_> =
                tree.inactive_branches().into_iter().map(|id| tree[id].key.to_string()).collect();
            assert_eq!(keys, vec!["feed"]);
        }

        #[test]
        fn active_path_from_a_hidden_branch_reaches_its_top_screen() {
            let tree = NavTree::new(sample()).unwrap();
            let profile = tree.find("profile").unwrap();
            let keys: Vec<_> = tree
                .active_path_from(profile)
                .into_iter()
                .map(|id| tree[id].key.to_string())
                .collect();
            assert_eq!(keys, vec!["profile", "Edit"]);
        }

        #[test]
        fn pane_slots_are_sorted_by_role() {
            let tree = NavTree::new(NavNode::pane(
                "p",
                PaneRole::Supporting,
                [
                    PaneSlot::new(PaneRole::Extra, NavNode::screen("x")),
                    PaneSlot::new(PaneRole::Supporting, NavNode::screen("s")),
                    PaneSlot::new(PaneRole::Primary, NavNode::screen("p1")),
                ],
            ))
            .unwrap();
            let NodeKind::Pane { slots, .. } = &tree.root_node().kind else {
                panic!("expected a pane");
            };
            let roles: Vec<_> = slots.iter().map(|s| s.role).collect();
            assert_eq!(roles, vec![PaneRole::Primary, PaneRole::Supporting, PaneRole::Extra]);
            assert_eq!(tree[tree.root_node().active_child().unwrap()].key.as_str(), "s");
        }
    }

    #[test]
    fn equality_is_structural() {
        let a = NavTree::new(sample()).unwrap();
        let b = NavTree::new(sample()).unwrap();
        assert_eq!(a, b);
        let c = NavTree::new(NavNode::screen("Home")).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn deserializing_validates() {
        let err = ron::from_str::<NavTree>(
            r#"Stack(key: "s", children: [Screen(key: "a", destination: (route: "a")), Screen(key: "a", destination: (route: "a"))])"#,
        );
        assert!(err.is_err());
        let ok: NavTree = ron::from_str(r#"Screen(key: "a", destination: (route: "a"))"#).unwrap();
        assert_eq!(ok.root_node().key.as_str(), "a");
    }

    #[test]
    fn draw_marks_active_children() {
        let tree = NavTree::new(sample()).unwrap();
        let drawn = tree.draw();
        assert!(drawn.contains("Stack root [2]"), "{drawn}");
        assert!(drawn.contains("☒ Tab tabs [1/2]"), "{drawn}");
        assert!(drawn.contains("☐ Stack feed [1]"), "{drawn}");
    }
}
