pub mod node;
pub mod tree;

pub use node::{AdaptStrategy, Destination, NavNode, NodeKey, PaneRole, PaneSlot};
pub use tree::{NavTree, Node, NodeId, NodeKind, SlotEntry, TreeError};
