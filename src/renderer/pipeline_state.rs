use std::collections::HashMap;

use log::{info, warn};
use wgpu::{CompareFunction, Face};

use crate::math::hash::{combine_hash, make_hash_f32};
use crate::renderer::device::{GraphicsDevice, PipelineStateId};
use crate::scene::{BlendMode, MaterialPass};

/// Hash of everything that selects a pipeline state for a batch.
pub type PipelineStateKey = u32;

/// Full description of a native pipeline state object.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineStateDesc {
    pub shader: String,
    pub defines: Vec<String>,
    pub blend_mode: BlendMode,
    pub depth_write: bool,
    pub depth_compare: CompareFunction,
    pub cull_mode: Option<Face>,
    pub alpha_to_coverage: bool,
    pub constant_depth_bias: f32,
    pub slope_scaled_depth_bias: f32,
}

impl PipelineStateDesc {
    pub fn new(shader: impl Into<String>) -> Self {
        Self {
            shader: shader.into(),
            defines: Vec::new(),
            blend_mode: BlendMode::Replace,
            depth_write: true,
            depth_compare: CompareFunction::LessEqual,
            cull_mode: Some(Face::Back),
            alpha_to_coverage: false,
            constant_depth_bias: 0.0,
            slope_scaled_depth_bias: 0.0,
        }
    }

    pub fn from_material_pass(pass: &MaterialPass, cull_mode: Option<Face>) -> Self {
        Self {
            shader: pass.shader.clone(),
            blend_mode: pass.blend_mode,
            depth_write: pass.depth_write,
            depth_compare: pass.depth_compare,
            cull_mode,
            alpha_to_coverage: pass.alpha_to_coverage,
            ..Self::new("")
        }
    }

    pub fn with_define(mut self, define: impl Into<String>) -> Self {
        self.defines.push(define.into());
        self
    }

    pub fn with_depth_bias(mut self, constant: f32, slope_scaled: f32) -> Self {
        self.constant_depth_bias = constant;
        self.slope_scaled_depth_bias = slope_scaled;
        self
    }

    /// Fixed-function state hash, excluding the shader and its defines.
    pub fn state_hash(&self) -> u32 {
        fixed_function_hash(
            self.blend_mode,
            self.depth_write,
            self.depth_compare,
            self.cull_mode,
            self.alpha_to_coverage,
            self.constant_depth_bias,
            self.slope_scaled_depth_bias,
        )
    }
}

/// Same value as `PipelineStateDesc::from_material_pass(pass, cull_mode).state_hash()`
/// without building the description.
pub fn material_pass_state_hash(pass: &MaterialPass, cull_mode: Option<Face>) -> u32 {
    fixed_function_hash(
        pass.blend_mode,
        pass.depth_write,
        pass.depth_compare,
        cull_mode,
        pass.alpha_to_coverage,
        0.0,
        0.0,
    )
}

fn fixed_function_hash(
    blend_mode: BlendMode,
    depth_write: bool,
    depth_compare: CompareFunction,
    cull_mode: Option<Face>,
    alpha_to_coverage: bool,
    constant_depth_bias: f32,
    slope_scaled_depth_bias: f32,
) -> u32 {
    let mut hash = 0;
    combine_hash(&mut hash, blend_mode as u32);
    combine_hash(&mut hash, depth_write as u32);
    combine_hash(&mut hash, depth_compare as u32);
    combine_hash(&mut hash, cull_mode.map_or(0, |face| face as u32 + 1));
    combine_hash(&mut hash, alpha_to_coverage as u32);
    combine_hash(&mut hash, make_hash_f32(constant_depth_bias));
    combine_hash(&mut hash, make_hash_f32(slope_scaled_depth_bias));
    hash
}

/// Pipeline states keyed by batch hash. Failed creations are cached too so they are
/// not retried every frame.
#[derive(Debug, Default)]
pub struct PipelineStateCache {
    states: HashMap<PipelineStateKey, Option<PipelineStateId>>,
    settings_hash: u32,
}

impl PipelineStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every cached state when pipeline-relevant settings changed.
    pub fn begin_frame(&mut self, settings_hash: u32) {
        if settings_hash != self.settings_hash {
            if !self.states.is_empty() {
                info!("Pipeline settings changed, dropping {} cached pipeline states", self.states.len());
            }
            self.states.clear();
            self.settings_hash = settings_hash;
        }
    }

    /// Read-only lookup, safe to call from worker threads.
    /// Outer `None` means the key was never seen.
    pub fn lookup(&self, key: PipelineStateKey) -> Option<Option<PipelineStateId>> {
        self.states.get(&key).copied()
    }

    pub fn get_or_create(
        &mut self,
        key: PipelineStateKey,
        desc: &PipelineStateDesc,
        device: &mut dyn GraphicsDevice,
    ) -> Option<PipelineStateId> {
        *self.states.entry(key).or_insert_with(|| {
            let state = device.create_pipeline_state(desc);
            if state.is_none() {
                warn!("Failed to create pipeline state for shader '{}' {:?}", desc.shader, desc.defines);
            }
            state
        })
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
