use bitflags::bitflags;
use log::error;

use crate::scene::{Drawable, DrawableIndex, GeometryId, Material, MaterialId, PassId};

/// How the batches of a scene pass are ordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScenePassKind {
    /// Sorted by pipeline state, then material and geometry.
    Unordered,
    /// Sorted far to near for blending.
    BackToFront,
    /// Unordered, restricted to outlined drawables with an outline material pass.
    Outline,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ScenePassFlags: u32 {
        /// Geometry added to this pass receives ambient and per-vertex lighting.
        const HAS_AMBIENT_LIGHTING = 1 << 0;
        const DISABLE_INSTANCING = 1 << 1;
    }
}

/// Material passes a geometry batch is rendered with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeometryBatchPasses {
    Deferred(PassId),
    Forward {
        unlit_base: PassId,
        /// Base pass that also applies the first pixel light.
        lit_base: Option<PassId>,
        /// Additive pass for the remaining pixel lights.
        light: Option<PassId>,
    },
}

/// Source batch of a visible drawable accepted by a scene pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeometryBatch {
    pub drawable_index: DrawableIndex,
    pub source_batch_index: usize,
    pub geometry: GeometryId,
    pub material: MaterialId,
    pub passes: GeometryBatchPasses,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AddBatchResult {
    pub added: bool,
    /// The batch needs per-pixel forward lights.
    pub forward_lit: bool,
}

impl AddBatchResult {
    const NOT_ADDED: AddBatchResult = AddBatchResult {
        added: false,
        forward_lit: false,
    };
}

/// Material pass ids a scene pass may draw with. A batch uses the deferred pass when
/// its material has one, and the forward passes otherwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct PassSlots {
    deferred: Option<PassId>,
    unlit_base: Option<PassId>,
    lit_base: Option<PassId>,
    light: Option<PassId>,
}

/// One scene pass: which material passes it draws and how its batches are ordered.
#[derive(Clone, Debug)]
pub struct ScenePass {
    name: String,
    kind: ScenePassKind,
    flags: ScenePassFlags,
    slots: PassSlots,
    geometry_batches: Vec<GeometryBatch>,
}

impl ScenePass {
    pub fn forward(
        name: impl Into<String>,
        kind: ScenePassKind,
        flags: ScenePassFlags,
        unlit_base: PassId,
        lit_base: Option<PassId>,
        light: Option<PassId>,
    ) -> Self {
        let name = name.into();
        if lit_base.is_some() && light.is_none() {
            error!("Scene pass '{}' has a lit base pass without a light pass", name);
            debug_assert!(false, "lit base pass requires a light pass");
        }
        Self {
            name,
            kind,
            flags,
            slots: PassSlots {
                deferred: None,
                unlit_base: Some(unlit_base),
                lit_base,
                light,
            },
            geometry_batches: Vec::new(),
        }
    }

    /// G-buffer pass drawing `pass` only. Materials without it are not added.
    pub fn deferred(name: impl Into<String>, flags: ScenePassFlags, pass: PassId) -> Self {
        Self {
            name: name.into(),
            kind: ScenePassKind::Unordered,
            flags,
            slots: PassSlots {
                deferred: Some(pass),
                ..PassSlots::default()
            },
            geometry_batches: Vec::new(),
        }
    }

    /// Adds forward slots to a deferred pass for materials that cannot be deferred.
    pub fn with_forward_fallback(mut self, unlit_base: PassId, lit_base: Option<PassId>, light: Option<PassId>) -> Self {
        if lit_base.is_some() && light.is_none() {
            error!("Scene pass '{}' has a lit base pass without a light pass", self.name);
            debug_assert!(false, "lit base pass requires a light pass");
        }
        self.slots.unlit_base = Some(unlit_base);
        self.slots.lit_base = lit_base;
        self.slots.light = light;
        self
    }

    pub fn outline(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ScenePassKind::Outline,
            flags: ScenePassFlags::empty(),
            slots: PassSlots {
                unlit_base: Some(PassId::OUTLINE),
                ..PassSlots::default()
            },
            geometry_batches: Vec::new(),
        }
    }

    /// Opaque forward pass with base, lit base and light passes.
    pub fn opaque_forward() -> Self {
        Self::forward(
            "opaque",
            ScenePassKind::Unordered,
            ScenePassFlags::HAS_AMBIENT_LIGHTING,
            PassId::BASE,
            Some(PassId::LIT_BASE),
            Some(PassId::LIGHT),
        )
    }

    /// Opaque G-buffer pass. Materials without a deferred pass are lit forward in it.
    pub fn opaque_deferred() -> Self {
        Self::deferred("deferred", ScenePassFlags::HAS_AMBIENT_LIGHTING, PassId::DEFERRED).with_forward_fallback(
            PassId::BASE,
            Some(PassId::LIT_BASE),
            Some(PassId::LIGHT),
        )
    }

    /// Alpha blended forward pass.
    pub fn transparent_forward() -> Self {
        Self::forward(
            "alpha",
            ScenePassKind::BackToFront,
            ScenePassFlags::HAS_AMBIENT_LIGHTING | ScenePassFlags::DISABLE_INSTANCING,
            PassId::ALPHA,
            Some(PassId::LIT_ALPHA),
            Some(PassId::LIGHT),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ScenePassKind {
        self.kind
    }

    pub fn flags(&self) -> ScenePassFlags {
        self.flags
    }

    pub fn is_deferred(&self) -> bool {
        self.slots.deferred.is_some()
    }

    /// Resolves the material passes `material` supports in this scene pass and
    /// appends a geometry batch to `out` when any apply.
    pub fn add_batch(
        &self,
        drawable_index: DrawableIndex,
        source_batch_index: usize,
        drawable: &Drawable,
        material: &Material,
        out: &mut Vec<GeometryBatch>,
    ) -> AddBatchResult {
        if self.kind == ScenePassKind::Outline && !(drawable.outlined && material.outline.is_some()) {
            return AddBatchResult::NOT_ADDED;
        }

        let Some(source) = drawable.source_batches.get(source_batch_index) else {
            return AddBatchResult::NOT_ADDED;
        };
        let supports = |id: PassId| material.pass(id).is_some();

        let slots = self.slots;
        let passes = if let Some(pass) = slots.deferred.filter(|&id| supports(id)) {
            GeometryBatchPasses::Deferred(pass)
        } else if let Some(unlit_base) = slots.unlit_base.filter(|&id| supports(id)) {
            let light = slots.light.filter(|&id| supports(id));
            let lit_base = if light.is_some() {
                slots.lit_base.filter(|&id| supports(id))
            } else {
                None
            };
            GeometryBatchPasses::Forward {
                unlit_base,
                lit_base,
                light,
            }
        } else {
            return AddBatchResult::NOT_ADDED;
        };

        out.push(GeometryBatch {
            drawable_index,
            source_batch_index,
            geometry: source.geometry,
            material: source.material,
            passes,
        });

        AddBatchResult {
            added: true,
            forward_lit: matches!(passes, GeometryBatchPasses::Forward { light: Some(_), .. }),
        }
    }

    pub fn geometry_batches(&self) -> &[GeometryBatch] {
        &self.geometry_batches
    }

    pub fn clear_batches(&mut self) {
        self.geometry_batches.clear();
    }

    pub fn append_batches(&mut self, batches: &mut Vec<GeometryBatch>) {
        self.geometry_batches.append(batches);
    }
}
