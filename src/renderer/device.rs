use std::collections::HashSet;

use glam::UVec2;
use log::{debug, warn};

use crate::renderer::lights::LightShaderParamsRaw;
use crate::renderer::pipeline_state::PipelineStateDesc;
use crate::renderer::shadow_split::ShadowMapRegion;
use crate::scene::{DrawableIndex, GeometryId, MaterialId, MAX_CASCADE_SPLITS};

/// Texture handle issued by a [`GraphicsDevice`]. Zero is never a valid texture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

impl TextureId {
    pub const INVALID: TextureId = TextureId(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineStateId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceCapabilities {
    pub max_shadow_cascades: usize,
    pub max_texture_size: u32,
    pub supports_instancing: bool,
    pub max_shadow_atlas_pages: usize,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            max_shadow_cascades: MAX_CASCADE_SPLITS,
            max_texture_size: 8192,
            supports_instancing: true,
            max_shadow_atlas_pages: 4,
        }
    }
}

/// What subsequent draw commands render into.
#[derive(Clone, Debug, PartialEq)]
pub enum PassTarget {
    ShadowSplit { region: ShadowMapRegion },
    Scene { pass_name: String },
    LightVolumes,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawCommand {
    pub pipeline_state: PipelineStateId,
    pub geometry: GeometryId,
    pub material: MaterialId,
    pub drawable: DrawableIndex,
    /// Index into the light table uploaded with [`GraphicsDevice::upload_lights`].
    pub light: Option<u32>,
    pub vertex_lights: [u32; 4],
    pub start_instance: u32,
    pub num_instances: u32,
}

/// Everything the pipeline needs from the native graphics API.
pub trait GraphicsDevice: Send + Sync {
    fn capabilities(&self) -> DeviceCapabilities;

    /// Creates a depth texture page for the shadow atlas, or `TextureId::INVALID`.
    fn create_shadow_atlas_page(&mut self, size: UVec2) -> TextureId;

    fn create_pipeline_state(&mut self, desc: &PipelineStateDesc) -> Option<PipelineStateId>;

    fn begin_pass(&mut self, target: &PassTarget);

    fn upload_lights(&mut self, lights: &[LightShaderParamsRaw]);

    fn submit(&mut self, command: &DrawCommand);
}

/// Device that records every call instead of talking to a GPU.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    capabilities: DeviceCapabilities,
    rejected_shaders: HashSet<String>,
    pages: Vec<UVec2>,
    pipeline_states: Vec<PipelineStateDesc>,
    passes: Vec<PassTarget>,
    light_buffer: Vec<u8>,
    num_uploaded_lights: usize,
    commands: Vec<DrawCommand>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(capabilities: DeviceCapabilities) -> Self {
        Self {
            capabilities,
            ..Self::default()
        }
    }

    /// Makes pipeline state creation fail for `shader`.
    pub fn reject_shader(&mut self, shader: impl Into<String>) {
        self.rejected_shaders.insert(shader.into());
    }

    pub fn atlas_pages(&self) -> &[UVec2] {
        &self.pages
    }

    pub fn pipeline_states(&self) -> &[PipelineStateDesc] {
        &self.pipeline_states
    }

    pub fn passes(&self) -> &[PassTarget] {
        &self.passes
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn num_uploaded_lights(&self) -> usize {
        self.num_uploaded_lights
    }

    pub fn light_buffer(&self) -> &[u8] {
        &self.light_buffer
    }

    /// Forgets recorded passes and commands; created resources stay alive.
    pub fn clear_frame(&mut self) {
        self.passes.clear();
        self.commands.clear();
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn create_shadow_atlas_page(&mut self, size: UVec2) -> TextureId {
        if self.pages.len() >= self.capabilities.max_shadow_atlas_pages
            || size.max_element() > self.capabilities.max_texture_size
        {
            warn!("Cannot create {}x{} shadow atlas page", size.x, size.y);
            return TextureId::INVALID;
        }
        self.pages.push(size);
        debug!("Created shadow atlas page {} ({}x{})", self.pages.len(), size.x, size.y);
        TextureId(self.pages.len() as u32)
    }

    fn create_pipeline_state(&mut self, desc: &PipelineStateDesc) -> Option<PipelineStateId> {
        if self.rejected_shaders.contains(&desc.shader) {
            return None;
        }
        self.pipeline_states.push(desc.clone());
        Some(PipelineStateId(self.pipeline_states.len() as u32 - 1))
    }

    fn begin_pass(&mut self, target: &PassTarget) {
        self.passes.push(target.clone());
    }

    fn upload_lights(&mut self, lights: &[LightShaderParamsRaw]) {
        self.light_buffer.clear();
        self.light_buffer.extend_from_slice(bytemuck::cast_slice(lights));
        self.num_uploaded_lights = lights.len();
    }

    fn submit(&mut self, command: &DrawCommand) {
        self.commands.push(*command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::lights::CookedLightParams;

    #[test]
    fn atlas_pages_respect_capabilities() {
        let mut device = HeadlessDevice::with_capabilities(DeviceCapabilities {
            max_shadow_atlas_pages: 1,
            ..DeviceCapabilities::default()
        });
        let first = device.create_shadow_atlas_page(UVec2::splat(2048));
        let second = device.create_shadow_atlas_page(UVec2::splat(2048));
        assert!(first.is_valid());
        assert!(!second.is_valid());
        assert_eq!(device.atlas_pages().len(), 1);
    }

    #[test]
    fn rejected_shaders_fail_pipeline_creation() {
        let mut device = HeadlessDevice::new();
        device.reject_shader("Broken");
        let ok = PipelineStateDesc::new("LitSolid");
        let broken = PipelineStateDesc::new("Broken");
        assert_eq!(device.create_pipeline_state(&ok), Some(PipelineStateId(0)));
        assert_eq!(device.create_pipeline_state(&broken), None);
    }

    #[test]
    fn light_upload_keeps_raw_bytes() {
        let mut device = HeadlessDevice::new();
        let raw = [CookedLightParams::default().to_raw(false); 3];
        device.upload_lights(&raw);
        assert_eq!(device.num_uploaded_lights(), 3);
        assert_eq!(device.light_buffer().len(), 3 * std::mem::size_of::<LightShaderParamsRaw>());
    }
}
