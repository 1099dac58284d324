//! The declarative navigation tree handed to us by the navigator.
//!
//! [`NavNode`] is the input format: an owned, recursive value that can be
//! built in code or deserialized from RON/JSON fixtures. It is validated and
//! indexed into a [`NavTree`](super::NavTree) before anything reads it.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity of a navigation node.
///
/// Two snapshots describing the same logical destination use the same key,
/// which is what lets the flattener diff trees by key rather than position.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    pub fn new(key: impl Into<String>) -> Self { NodeKey(key.into()) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for NodeKey {
    fn from(s: &str) -> Self { NodeKey(s.to_owned()) }
}

impl From<String> for NodeKey {
    fn from(s: String) -> Self { NodeKey(s) }
}

impl Borrow<str> for NodeKey {
    fn borrow(&self) -> &str { &self.0 }
}

/// Reference to the content a screen shows. Opaque to this crate; it is only
/// handed back to the content resolver.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    pub route: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: BTreeMap<String, String>,
}

impl Destination {
    pub fn new(route: impl Into<String>) -> Self {
        Destination {
            route: route.into(),
            arguments: BTreeMap::new(),
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }
}

/// Role of a pane slot. The declaration order is the side-by-side layout
/// order, primary first.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaneRole {
    Primary,
    Supporting,
    Extra,
}

/// What happens to a non-active slot when fewer slots fit than exist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptStrategy {
    /// Dropped first.
    #[default]
    Hide,
    /// Kept in preference to `Hide` slots.
    Reflow,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaneSlot {
    pub role: PaneRole,
    pub content: NavNode,
    #[serde(default)]
    pub adapt: AdaptStrategy,
}

impl PaneSlot {
    pub fn new(role: PaneRole, content: NavNode) -> Self {
        PaneSlot {
            role,
            content,
            adapt: AdaptStrategy::default(),
        }
    }

    pub fn reflow(mut self) -> Self {
        self.adapt = AdaptStrategy::Reflow;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavNode {
    Screen {
        key: NodeKey,
        destination: Destination,
    },
    /// LIFO history; the last child is the live one.
    Stack {
        key: NodeKey,
        #[serde(default)]
        children: Vec<NavNode>,
    },
    Tab {
        key: NodeKey,
        branches: Vec<NavNode>,
        #[serde(default)]
        active_index: usize,
    },
    Pane {
        key: NodeKey,
        slots: Vec<PaneSlot>,
        active_role: PaneRole,
    },
}

impl NavNode {
    /// A screen whose route equals its key.
    pub fn screen(key: impl Into<NodeKey>) -> Self {
        let key = key.into();
        let destination = Destination::new(key.as_str());
        NavNode::Screen { key, destination }
    }

    pub fn screen_with(key: impl Into<NodeKey>, destination: Destination) -> Self {
        NavNode::Screen {
            key: key.into(),
            destination,
        }
    }

    pub fn stack(key: impl Into<NodeKey>, children: impl IntoIterator<Item = NavNode>) -> Self {
        NavNode::Stack {
            key: key.into(),
            children: children.into_iter().collect(),
        }
    }

    pub fn tab(
        key: impl Into<NodeKey>,
        active_index: usize,
        branches: impl IntoIterator<Item = NavNode>,
    ) -> Self {
        NavNode::Tab {
            key: key.into(),
            branches: branches.into_iter().collect(),
            active_index,
        }
    }

    pub fn pane(
        key: impl Into<NodeKey>,
        active_role: PaneRole,
        slots: impl IntoIterator<Item = PaneSlot>,
    ) -> Self {
        NavNode::Pane {
            key: key.into(),
            slots: slots.into_iter().collect(),
            active_role,
        }
    }

    pub fn key(&self) -> &NodeKey {
        match self {
            NavNode::Screen { key, .. }
            | NavNode::Stack { key, .. }
            | NavNode::Tab { key, .. }
            | NavNode::Pane { key, .. } => key,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            NavNode::Screen { .. } => "screen",
            NavNode::Stack { .. } => "stack",
            NavNode::Tab { .. } => "tab",
            NavNode::Pane { .. } => "pane",
        }
    }
}
