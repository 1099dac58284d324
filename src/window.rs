//! Window size classification consumed by the flattener.
//!
//! The renderer reports the available window size on every flatten call.
//! Only the discrete [`SizeClass`] per axis influences which pane slots are
//! shown; the raw size is kept so that a zero-area window can be reported as
//! a configuration error instead of silently producing an empty plan.

use serde::{Deserialize, Serialize};

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SizeClass {
    Compact,
    Medium,
    Expanded,
}

impl SizeClass {
    fn classify(value: f64, medium: f64, expanded: f64) -> Self {
        if value >= expanded {
            SizeClass::Expanded
        } else if value >= medium {
            SizeClass::Medium
        } else {
            SizeClass::Compact
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Breakpoints {
    pub medium_width: f64,
    pub expanded_width: f64,
    pub medium_height: f64,
    pub expanded_height: f64,
}

impl Default for Breakpoints {
    fn default() -> Self { crate::common::config::WindowSettings::default().breakpoints() }
}

/// Available window space for one flatten pass.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowContext {
    pub width: f64,
    pub height: f64,
    pub width_class: SizeClass,
    pub height_class: SizeClass,
}

impl WindowContext {
    pub fn new(width: f64, height: f64, breakpoints: &Breakpoints) -> Self {
        let width = sanitize(width);
        let height = sanitize(height);
        WindowContext {
            width,
            height,
            width_class: SizeClass::classify(
                width,
                breakpoints.medium_width,
                breakpoints.expanded_width,
            ),
            height_class: SizeClass::classify(
                height,
                breakpoints.medium_height,
                breakpoints.expanded_height,
            ),
        }
    }

    /// A context built from size classes alone, sized at the lower bound of
    /// each class under the default breakpoints (compact uses a phone-sized
    /// nominal value so it never reads as zero space).
    pub fn from_classes(width_class: SizeClass, height_class: SizeClass) -> Self {
        let bp = Breakpoints::default();
        let nominal = |class, compact, medium, expanded| match class {
            SizeClass::Compact => compact,
            SizeClass::Medium => medium,
            SizeClass::Expanded => expanded,
        };
        WindowContext {
            width: nominal(width_class, 360.0, bp.medium_width, bp.expanded_width),
            height: nominal(height_class, 400.0, bp.medium_height, bp.expanded_height),
            width_class,
            height_class,
        }
    }

    pub fn compact() -> Self { Self::from_classes(SizeClass::Compact, SizeClass::Medium) }

    pub fn medium() -> Self { Self::from_classes(SizeClass::Medium, SizeClass::Medium) }

    pub fn expanded() -> Self { Self::from_classes(SizeClass::Expanded, SizeClass::Expanded) }

    pub fn has_space(&self) -> bool { self.width > 0.0 && self.height > 0.0 }

    /// How many pane slots can be laid out side by side.
    pub fn max_pane_slots(&self) -> usize {
        match self.width_class {
            SizeClass::Compact => 1,
            SizeClass::Medium => 2,
            SizeClass::Expanded => 3,
        }
    }

    pub fn supports_multi_pane(&self) -> bool { self.max_pane_slots() > 1 }
}

impl Default for WindowContext {
    fn default() -> Self { Self::compact() }
}

fn sanitize(value: f64) -> f64 { if value.is_finite() && value > 0.0 { value } else { 0.0 } }
