//! Turns a render plan into renderer output.
//!
//! The plan says where each surface goes; what it shows comes from two
//! caller-supplied resolvers. [`ContentResolver`] renders screens.
//! [`WrapperResolver`] renders tab and pane chrome around the content of
//! its slots, which it pulls through [`SlotContent`] exactly once per
//! visible slot.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::trace;

use crate::flatten::{FlattenResult, RenderableSurface, SurfaceId, SurfaceKind, TransitionPhase};
use crate::model::{Destination, PaneRole};

/// Renders the content of one screen surface.
pub trait ContentResolver {
    type Output;

    fn resolve(&mut self, destination: &Destination, surface: &RenderableSurface) -> Self::Output;
}

/// Renders a tab or pane wrapper around its slots.
///
/// `wrap` must call [`SlotContent::render`] once for every slot in
/// `slots`; skipping one or rendering one twice fails the composition.
pub trait WrapperResolver<R> {
    fn wrap(&mut self, scope: &WrapperScope<'_>, slots: &mut SlotContent<'_, R>) -> R;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComposeError {
    #[error("wrapper `{wrapper}` did not render slot {index}")]
    SlotSkipped { wrapper: SurfaceId, index: usize },
    #[error("wrapper `{wrapper}` rendered slot {index} more than once")]
    SlotRenderedTwice { wrapper: SurfaceId, index: usize },
    #[error("wrapper `{wrapper}` asked for slot {index} but has {len}")]
    NoSuchSlot { wrapper: SurfaceId, index: usize, len: usize },
    #[error("screen surface `{0}` has no destination")]
    MissingDestination(SurfaceId),
    #[error("surface `{surface}` belongs to wrapper `{wrapper}`, which is not in the plan")]
    UnknownWrapper { surface: SurfaceId, wrapper: SurfaceId },
    #[error("pane slot of `{wrapper}` lists `{surface}`, which it does not own")]
    UnknownSlotSurface { wrapper: SurfaceId, surface: SurfaceId },
}

/// One resolved surface together with its place in the plan.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedSurface<R> {
    pub id: SurfaceId,
    pub z_order: i32,
    pub phase: TransitionPhase,
    pub output: R,
}

/// What a wrapper resolver knows about the wrapper it renders.
#[derive(Debug, Clone, Copy)]
pub struct WrapperScope<'a> {
    pub surface: &'a RenderableSurface,
    /// Pane roles of the slots in order; `None` for the single slot of a
    /// tab wrapper.
    pub roles: &'a [Option<PaneRole>],
}

impl WrapperScope<'_> {
    pub fn id(&self) -> &SurfaceId { &self.surface.id }

    pub fn kind(&self) -> SurfaceKind { self.surface.kind }

    pub fn slot_count(&self) -> usize { self.roles.len() }
}

#[derive(Debug)]
struct Slot<R> {
    content: Option<Vec<ComposedSurface<R>>>,
    calls: u32,
}

/// Already-resolved content of a wrapper's visible slots. Each slot hands
/// out its content once.
#[derive(Debug)]
pub struct SlotContent<'a, R> {
    wrapper: &'a SurfaceId,
    slots: Vec<Slot<R>>,
    stray: Option<usize>,
}

impl<'a, R> SlotContent<'a, R> {
    fn new(wrapper: &'a SurfaceId, slots: Vec<Vec<ComposedSurface<R>>>) -> Self {
        SlotContent {
            wrapper,
            slots: slots
                .into_iter()
                .map(|content| Slot { content: Some(content), calls: 0 })
                .collect(),
            stray: None,
        }
    }

    pub fn len(&self) -> usize { self.slots.len() }

    pub fn is_empty(&self) -> bool { self.slots.is_empty() }

    /// Content of slot `index`, lowest z first. A second call for the same
    /// slot, or a call past the last slot, yields nothing and fails the
    /// composition.
    pub fn render(&mut self, index: usize) -> Vec<ComposedSurface<R>> {
        let Some(slot) = self.slots.get_mut(index) else {
            self.stray.get_or_insert(index);
            return Vec::new();
        };
        slot.calls += 1;
        slot.content.take().unwrap_or_default()
    }

    fn finish(self) -> Result<(), ComposeError> {
        let wrapper = self.wrapper.clone();
        if let Some(index) = self.stray {
            return Err(ComposeError::NoSuchSlot { wrapper, index, len: self.slots.len() });
        }
        for (index, slot) in self.slots.iter().enumerate() {
            match slot.calls {
                0 => return Err(ComposeError::SlotSkipped { wrapper, index }),
                1 => {}
                _ => return Err(ComposeError::SlotRenderedTwice { wrapper, index }),
            }
        }
        Ok(())
    }
}

/// Resolves every surface of `plan`.
///
/// Surfaces owned by a wrapper are handed to that wrapper's resolver
/// through its slots; the returned list holds only top-level surfaces, in
/// plan order.
pub fn compose<C, W>(
    plan: &FlattenResult,
    content: &mut C,
    wrappers: &mut W,
) -> Result<Vec<ComposedSurface<C::Output>>, ComposeError>
where
    C: ContentResolver,
    W: WrapperResolver<C::Output>,
{
    let by_id: BTreeMap<&SurfaceId, &RenderableSurface> =
        plan.surfaces.iter().map(|s| (&s.id, s)).collect();
    let mut owned: BTreeMap<&SurfaceId, Vec<&RenderableSurface>> = BTreeMap::new();
    let mut top = Vec::new();
    for surface in &plan.surfaces {
        match &surface.parent_wrapper_id {
            Some(wrapper) if by_id.contains_key(wrapper) => {
                owned.entry(wrapper).or_default().push(surface)
            }
            Some(wrapper) => {
                return Err(ComposeError::UnknownWrapper {
                    surface: surface.id.clone(),
                    wrapper: wrapper.clone(),
                });
            }
            None => top.push(surface),
        }
    }

    let mut composer = Composer { owned: &owned, content, wrappers };
    top.into_iter().map(|surface| composer.surface(surface)).collect()
}

struct Composer<'p, 'r, C, W> {
    /// Surfaces of each wrapper in plan order.
    owned: &'p BTreeMap<&'p SurfaceId, Vec<&'p RenderableSurface>>,
    content: &'r mut C,
    wrappers: &'r mut W,
}

impl<'p, C, W> Composer<'p, '_, C, W>
where
    C: ContentResolver,
    W: WrapperResolver<C::Output>,
{
    fn surface(
        &mut self,
        surface: &RenderableSurface,
    ) -> Result<ComposedSurface<C::Output>, ComposeError> {
        let output = if surface.kind.is_wrapper() {
            self.wrapper(surface)?
        } else {
            let destination = surface
                .destination
                .as_ref()
                .ok_or_else(|| ComposeError::MissingDestination(surface.id.clone()))?;
            self.content.resolve(destination, surface)
        };
        Ok(ComposedSurface {
            id: surface.id.clone(),
            z_order: surface.z_order,
            phase: surface.phase,
            output,
        })
    }

    fn wrapper(&mut self, surface: &RenderableSurface) -> Result<C::Output, ComposeError> {
        let map = self.owned;
        let owned: &'p [&'p RenderableSurface] =
            map.get(&surface.id).map_or(&[], |v| v.as_slice());

        let (roles, groups): (Vec<Option<PaneRole>>, Vec<Vec<&'p RenderableSurface>>) =
            match &surface.pane_slots {
                Some(slots) => {
                    let mut groups = Vec::with_capacity(slots.len());
                    for slot in slots {
                        let mut group = Vec::with_capacity(slot.surfaces.len());
                        for id in &slot.surfaces {
                            let member = owned.iter().find(|s| s.id == *id).ok_or_else(|| {
                                ComposeError::UnknownSlotSurface {
                                    wrapper: surface.id.clone(),
                                    surface: id.clone(),
                                }
                            })?;
                            group.push(*member);
                        }
                        group.sort_by_key(|s| s.z_order);
                        groups.push(group);
                    }
                    (slots.iter().map(|s| Some(s.role)).collect(), groups)
                }
                None if owned.is_empty() => (Vec::new(), Vec::new()),
                None => (vec![None], vec![owned.to_vec()]),
            };

        let mut resolved = Vec::with_capacity(groups.len());
        for group in groups {
            let composed = group
                .into_iter()
                .map(|s| self.surface(s))
                .collect::<Result<Vec<_>, _>>()?;
            resolved.push(composed);
        }

        let scope = WrapperScope { surface, roles: &roles };
        let mut slots = SlotContent::new(&surface.id, resolved);
        let output = self.wrappers.wrap(&scope, &mut slots);
        slots.finish()?;
        trace!(wrapper = %surface.id, slots = roles.len(), "composed wrapper");
        Ok(output)
    }
}
