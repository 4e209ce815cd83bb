use wgpu::{CompareFunction, Face};

use crate::math::hash::{combine_hash, make_hash_u64};

/// Index into the frame's geometry table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct GeometryId(pub u32);

/// Index into a [`MaterialLibrary`]. Id 0 is always the default material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MaterialId(pub u32);

/// Technique pass slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PassId(pub u8);

impl PassId {
    pub const BASE: PassId = PassId(0);
    pub const LIT_BASE: PassId = PassId(1);
    pub const LIGHT: PassId = PassId(2);
    pub const DEFERRED: PassId = PassId(3);
    pub const ALPHA: PassId = PassId(4);
    pub const LIT_ALPHA: PassId = PassId(5);
    pub const OUTLINE: PassId = PassId(6);
    pub const SHADOW: PassId = PassId(7);

    pub const COUNT: usize = 8;

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    #[default]
    Replace,
    Add,
    Multiply,
    Alpha,
    AddAlpha,
    PremulAlpha,
}

impl BlendMode {
    pub fn is_transparent(self) -> bool {
        !matches!(self, BlendMode::Replace)
    }
}

/// One pass of a technique: shader plus the fixed-function state it needs.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialPass {
    pub shader: String,
    pub blend_mode: BlendMode,
    pub depth_write: bool,
    pub depth_compare: CompareFunction,
    pub alpha_to_coverage: bool,
}

impl MaterialPass {
    pub fn new(shader: impl Into<String>) -> Self {
        Self {
            shader: shader.into(),
            blend_mode: BlendMode::Replace,
            depth_write: true,
            depth_compare: CompareFunction::LessEqual,
            alpha_to_coverage: false,
        }
    }

    pub fn with_blend(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        if blend_mode.is_transparent() {
            self.depth_write = false;
        }
        self
    }

    pub fn with_depth_compare(mut self, compare: CompareFunction) -> Self {
        self.depth_compare = compare;
        self
    }

    pub fn shader_hash(&self) -> u32 {
        let mut hash = 0;
        for chunk in self.shader.as_bytes().chunks(8) {
            let mut bytes = [0u8; 8];
            bytes[..chunk.len()].copy_from_slice(chunk);
            combine_hash(&mut hash, make_hash_u64(u64::from_le_bytes(bytes)));
        }
        hash
    }
}

/// Set of optional passes a material can be rendered with.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Technique {
    passes: [Option<MaterialPass>; PassId::COUNT],
}

impl Technique {
    pub fn with_pass(mut self, id: PassId, pass: MaterialPass) -> Self {
        self.passes[id.index()] = Some(pass);
        self
    }

    pub fn pass(&self, id: PassId) -> Option<&MaterialPass> {
        self.passes[id.index()].as_ref()
    }

    pub fn has_pass(&self, id: PassId) -> bool {
        self.passes[id.index()].is_some()
    }

    /// Forward lit opaque: unlit base, lit base, additive light and shadow passes.
    pub fn forward_lit() -> Self {
        Self::default()
            .with_pass(PassId::BASE, MaterialPass::new("lit_solid_base"))
            .with_pass(PassId::LIT_BASE, MaterialPass::new("lit_solid_litbase"))
            .with_pass(
                PassId::LIGHT,
                MaterialPass::new("lit_solid_light")
                    .with_blend(BlendMode::Add)
                    .with_depth_compare(CompareFunction::Equal),
            )
            .with_pass(PassId::DEFERRED, MaterialPass::new("lit_solid_deferred"))
            .with_pass(PassId::SHADOW, MaterialPass::new("shadow"))
    }

    /// Unlit opaque, no lighting passes.
    pub fn unlit() -> Self {
        Self::default()
            .with_pass(PassId::BASE, MaterialPass::new("unlit_solid"))
            .with_pass(PassId::SHADOW, MaterialPass::new("shadow"))
    }

    /// Alpha blended, lit in forward passes only.
    pub fn lit_transparent() -> Self {
        Self::default()
            .with_pass(
                PassId::ALPHA,
                MaterialPass::new("lit_alpha_base").with_blend(BlendMode::Alpha),
            )
            .with_pass(
                PassId::LIT_ALPHA,
                MaterialPass::new("lit_alpha_litbase").with_blend(BlendMode::Alpha),
            )
            .with_pass(
                PassId::LIGHT,
                MaterialPass::new("lit_alpha_light").with_blend(BlendMode::AddAlpha),
            )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub technique: Technique,
    /// Primary sort order; lower values are drawn first.
    pub render_order: u8,
    pub cull_mode: Option<Face>,
    pub shadow_cull_mode: Option<Face>,
    pub outline: Option<MaterialPass>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            technique: Technique::forward_lit(),
            render_order: 128,
            cull_mode: Some(Face::Back),
            shadow_cull_mode: Some(Face::Back),
            outline: None,
        }
    }
}

impl Material {
    pub fn new(name: impl Into<String>, technique: Technique) -> Self {
        Self {
            name: name.into(),
            technique,
            ..Self::default()
        }
    }

    pub fn with_render_order(mut self, order: u8) -> Self {
        self.render_order = order;
        self
    }

    pub fn pass(&self, id: PassId) -> Option<&MaterialPass> {
        if id == PassId::OUTLINE {
            return self.outline.as_ref();
        }
        self.technique.pass(id)
    }
}

/// Materials referenced by drawables, addressed by [`MaterialId`].
#[derive(Clone, Debug)]
pub struct MaterialLibrary {
    materials: Vec<Material>,
}

impl Default for MaterialLibrary {
    fn default() -> Self {
        Self {
            materials: vec![Material::default()],
        }
    }
}

impl MaterialLibrary {
    pub fn add(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        MaterialId(self.materials.len() as u32 - 1)
    }

    /// Falls back to the default material for unknown ids.
    pub fn get(&self, id: MaterialId) -> &Material {
        self.materials
            .get(id.0 as usize)
            .unwrap_or(&self.materials[0])
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}
