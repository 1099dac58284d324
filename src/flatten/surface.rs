use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Destination, NodeKey, PaneRole};
use crate::transition::Progress;

const WRAPPER_SUFFIX: &str = "#wrapper";
const EXITING_SUFFIX: &str = "#exiting";

/// Identity of a surface in the flattened plan.
///
/// Content surfaces reuse the key of the screen they render; wrappers append
/// `#wrapper` to the key of their container. A node that is on both sides of
/// a transition keeps its id on the entering side and gets `#exiting`
/// appended on the other. Node keys cannot contain `#`, so none of these
/// collide.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceId(String);

impl SurfaceId {
    pub fn content(key: &NodeKey) -> Self { SurfaceId(key.as_str().to_owned()) }

    pub fn wrapper(key: &NodeKey) -> Self { SurfaceId(format!("{key}{WRAPPER_SUFFIX}")) }

    pub fn as_str(&self) -> &str { &self.0 }

    pub(crate) fn exiting(&self) -> Self { SurfaceId(format!("{}{EXITING_SUFFIX}", self.0)) }

    fn base(&self) -> &str { self.0.strip_suffix(EXITING_SUFFIX).unwrap_or(&self.0) }

    pub fn is_wrapper(&self) -> bool { self.base().ends_with(WRAPPER_SUFFIX) }

    /// Key of the node this surface was derived from.
    pub fn node_key(&self) -> &str {
        let base = self.base();
        base.strip_suffix(WRAPPER_SUFFIX).unwrap_or(base)
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for SurfaceId {
    fn from(s: &str) -> Self { SurfaceId(s.to_owned()) }
}

impl Borrow<str> for SurfaceId {
    fn borrow(&self) -> &str { &self.0 }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SurfaceKind {
    SingleScreen,
    StackContent,
    TabWrapper,
    TabContent,
    PaneWrapper,
    PaneContent,
    PaneAsSingle,
}

impl SurfaceKind {
    pub fn is_wrapper(self) -> bool { matches!(self, SurfaceKind::TabWrapper | SurfaceKind::PaneWrapper) }

    pub fn is_content(self) -> bool { !self.is_wrapper() }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPhase {
    Visible,
    Entering(Progress),
    Exiting(Progress),
    Hidden,
}

impl TransitionPhase {
    pub fn is_animating(self) -> bool {
        matches!(self, TransitionPhase::Entering(_) | TransitionPhase::Exiting(_))
    }
}

impl fmt::Display for TransitionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionPhase::Visible => f.write_str("visible"),
            TransitionPhase::Entering(p) => write!(f, "entering({})", p.get()),
            TransitionPhase::Exiting(p) => write!(f, "exiting({})", p.get()),
            TransitionPhase::Hidden => f.write_str("hidden"),
        }
    }
}

/// One visible slot of a pane wrapper and the top-level surfaces rendered
/// into it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaneSlotSurface {
    pub role: PaneRole,
    pub surfaces: Vec<SurfaceId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderableSurface {
    pub id: SurfaceId,
    /// Key of the screen (content) or container (wrapper) behind the surface.
    pub node_key: NodeKey,
    pub z_order: i32,
    pub kind: SurfaceKind,
    pub phase: TransitionPhase,
    /// The wrapper owns this surface for caching purposes only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_wrapper_id: Option<SurfaceId>,
    /// Pairing hint, never an ownership link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_surface_id: Option<SurfaceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Destination>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pane_role: Option<PaneRole>,
    /// Only set on pane wrappers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pane_slots: Option<Vec<PaneSlotSurface>>,
}

impl RenderableSurface {
    pub(crate) fn screen(key: &NodeKey, destination: &Destination, z_order: i32, phase: TransitionPhase) -> Self {
        RenderableSurface {
            id: SurfaceId::content(key),
            node_key: key.clone(),
            z_order,
            kind: SurfaceKind::SingleScreen,
            phase,
            parent_wrapper_id: None,
            previous_surface_id: None,
            destination: Some(destination.clone()),
            pane_role: None,
            pane_slots: None,
        }
    }

    pub(crate) fn wrapper(key: &NodeKey, kind: SurfaceKind, z_order: i32, phase: TransitionPhase) -> Self {
        RenderableSurface {
            id: SurfaceId::wrapper(key),
            node_key: key.clone(),
            z_order,
            kind,
            phase,
            parent_wrapper_id: None,
            previous_surface_id: None,
            destination: None,
            pane_role: None,
            pane_slots: if kind == SurfaceKind::PaneWrapper { Some(Vec::new()) } else { None },
        }
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PairKind {
    Push,
    Pop,
    TabSwitch,
    PaneSwitch,
    /// Nothing to animate against, e.g. content appearing with no
    /// predecessor.
    None,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationPair {
    pub entering_id: Option<SurfaceId>,
    pub exiting_id: Option<SurfaceId>,
    pub kind: PairKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<SurfaceId>,
}
