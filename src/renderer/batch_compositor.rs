use log::{debug, trace};
use rayon::prelude::*;
use wgpu::{CompareFunction, Face};

use crate::math::hash::combine_hash;
use crate::renderer::device::GraphicsDevice;
use crate::renderer::drawable_processor::{DrawableProcessor, FrameInfo, GeometryRenderFlags};
use crate::renderer::light_accumulator::{INVALID_LIGHT_INDEX, MAX_VERTEX_LIGHTS};
use crate::renderer::light_processor::LightProcessor;
use crate::renderer::pipeline_batch::{sort_batches_back_to_front, sort_batches_by_state, PipelineBatch, NO_DRAWABLE};
use crate::renderer::pipeline_state::{material_pass_state_hash, PipelineStateCache, PipelineStateDesc, PipelineStateKey};
use crate::renderer::scene_pass::{GeometryBatch, GeometryBatchPasses, ScenePass, ScenePassFlags, ScenePassKind};
use crate::renderer::shadow_split::ShadowMapRegion;
use crate::scene::{BlendMode, GeometryId, LightType, Material, MaterialId, PassId};
use crate::settings::LightingMode;

/// Pipeline batches of one render target, with their draw order.
#[derive(Clone, Debug, Default)]
pub struct SortedBatches {
    pub batches: Vec<PipelineBatch>,
    /// Indices into `batches` in submission order.
    pub order: Vec<usize>,
}

impl SortedBatches {
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    fn sort(&mut self, kind: ScenePassKind) {
        self.order = match kind {
            ScenePassKind::Unordered | ScenePassKind::Outline => sort_batches_by_state(&self.batches)
                .into_iter()
                .map(|key| key.batch_index)
                .collect(),
            ScenePassKind::BackToFront => sort_batches_back_to_front(&self.batches)
                .into_iter()
                .map(|key| key.batch_index)
                .collect(),
        };
    }
}

/// Shadow caster batches of one allocated shadow split.
#[derive(Clone, Debug)]
pub struct ShadowSplitBatches {
    /// Index into the frame's light processors.
    pub light_index: usize,
    pub split_index: usize,
    pub region: ShadowMapRegion,
    pub batches: SortedBatches,
}

/// Geometry used to draw deferred light volumes, one per light type.
pub fn light_volume_geometry(light_type: LightType) -> GeometryId {
    match light_type {
        LightType::Directional => GeometryId(u32::MAX),
        LightType::Spot => GeometryId(u32::MAX - 1),
        LightType::Point => GeometryId(u32::MAX - 2),
    }
}

fn light_type_define(light_type: LightType) -> &'static str {
    match light_type {
        LightType::Directional => "DIRLIGHT",
        LightType::Spot => "SPOTLIGHT",
        LightType::Point => "POINTLIGHT",
    }
}

/// Batches of one worker plus the pipeline states it could not find in the cache.
#[derive(Default)]
struct ComposeShard {
    batches: Vec<PipelineBatch>,
    misses: Vec<(PipelineStateKey, PipelineStateDesc)>,
}

impl ComposeShard {
    fn append(mut self, mut other: ComposeShard) -> ComposeShard {
        self.batches.append(&mut other.batches);
        self.misses.append(&mut other.misses);
        self
    }
}

/// Read-only inputs shared by the composition workers.
struct ComposeContext<'a, 'f> {
    frame: &'a FrameInfo<'f>,
    drawables: &'a DrawableProcessor,
    pipeline_states: &'a PipelineStateCache,
    instancing: bool,
}

impl ComposeContext<'_, '_> {
    fn light(&self, index: u32) -> Option<&LightProcessor> {
        self.drawables.light_processors().get(index as usize).map(|p| &**p)
    }

    /// Pushes `batch`, resolving its pipeline state from the cache or recording a miss.
    fn emit(&self, mut batch: PipelineBatch, describe: impl FnOnce() -> PipelineStateDesc, shard: &mut ComposeShard) {
        match self.pipeline_states.lookup(batch.pipeline_state_key) {
            Some(state) => batch.pipeline_state = state,
            None => shard.misses.push((batch.pipeline_state_key, describe())),
        }
        shard.batches.push(batch);
    }
}

/// Variant of a scene batch that selects its shader permutation.
#[derive(Clone, Copy)]
struct SceneBatchVariant {
    pass: PassId,
    pixel_light: Option<u32>,
    vertex_lights: [u32; MAX_VERTEX_LIGHTS],
    ambient: bool,
    instancing: bool,
}

impl SceneBatchVariant {
    fn num_vertex_lights(&self) -> u32 {
        self.vertex_lights.iter().filter(|&&index| index != INVALID_LIGHT_INDEX).count() as u32
    }
}

/// Turns scene pass geometry batches and light processor output into sorted
/// pipeline batches with resolved pipeline states.
pub struct BatchCompositor {
    lighting_mode: LightingMode,
    passes: Vec<ScenePass>,
    pipeline_states: PipelineStateCache,
    scene_batches: Vec<SortedBatches>,
    shadow_batches: Vec<ShadowSplitBatches>,
    light_volume_batches: SortedBatches,
}

impl BatchCompositor {
    pub fn new(lighting_mode: LightingMode, passes: Vec<ScenePass>) -> Self {
        Self {
            lighting_mode,
            scene_batches: vec![SortedBatches::default(); passes.len()],
            passes,
            pipeline_states: PipelineStateCache::new(),
            shadow_batches: Vec::new(),
            light_volume_batches: SortedBatches::default(),
        }
    }

    /// Scene passes for the lighting mode: deferred modes draw opaque geometry into the
    /// G-buffer where the material allows it, forward mode lights it per object.
    pub fn default_passes(lighting_mode: LightingMode) -> Vec<ScenePass> {
        let opaque = if lighting_mode.is_deferred() {
            ScenePass::opaque_deferred()
        } else {
            ScenePass::opaque_forward()
        };
        vec![opaque, ScenePass::transparent_forward(), ScenePass::outline("outline")]
    }

    pub fn lighting_mode(&self) -> LightingMode {
        self.lighting_mode
    }

    pub fn passes(&self) -> &[ScenePass] {
        &self.passes
    }

    pub fn passes_mut(&mut self) -> &mut [ScenePass] {
        &mut self.passes
    }

    pub fn pipeline_states(&self) -> &PipelineStateCache {
        &self.pipeline_states
    }

    /// Sorted batches of each scene pass, parallel to [`passes`](Self::passes).
    pub fn scene_batches(&self) -> &[SortedBatches] {
        &self.scene_batches
    }

    pub fn shadow_batches(&self) -> &[ShadowSplitBatches] {
        &self.shadow_batches
    }

    pub fn light_volume_batches(&self) -> &SortedBatches {
        &self.light_volume_batches
    }

    pub fn num_batches(&self) -> usize {
        self.scene_batches.iter().map(SortedBatches::len).sum::<usize>()
            + self.shadow_batches.iter().map(|split| split.batches.len()).sum::<usize>()
            + self.light_volume_batches.len()
    }

    /// Builds every pipeline batch of the frame.
    ///
    /// Batches are composed in parallel against a read-only view of the pipeline state
    /// cache; missing states are then created on the calling thread and resolved.
    pub fn compose(
        &mut self,
        frame: &FrameInfo<'_>,
        drawables: &DrawableProcessor,
        settings_hash: u32,
        instancing: bool,
        device: &mut dyn GraphicsDevice,
    ) {
        self.pipeline_states.begin_frame(settings_hash);

        let mut misses = Vec::new();
        {
            let ctx = ComposeContext {
                frame,
                drawables,
                pipeline_states: &self.pipeline_states,
                instancing,
            };

            self.scene_batches.resize_with(self.passes.len(), SortedBatches::default);
            for (pass, sorted) in self.passes.iter().zip(self.scene_batches.iter_mut()) {
                let shard = pass
                    .geometry_batches()
                    .par_iter()
                    .fold(ComposeShard::default, |mut shard, batch| {
                        compose_scene_batch(&ctx, pass, batch, &mut shard);
                        shard
                    })
                    .reduce(ComposeShard::default, ComposeShard::append);
                sorted.batches = shard.batches;
                misses.extend(shard.misses);
            }

            let shadow_shards: Vec<(Vec<ShadowSplitBatches>, Vec<_>)> = drawables
                .light_processors()
                .par_iter()
                .enumerate()
                .map(|(light_index, processor)| compose_shadow_batches(&ctx, light_index, processor))
                .collect();
            self.shadow_batches.clear();
            for (splits, split_misses) in shadow_shards {
                self.shadow_batches.extend(splits);
                misses.extend(split_misses);
            }

            let mut shard = ComposeShard::default();
            if self.lighting_mode.is_deferred() {
                for (light_index, processor) in drawables.light_processors().iter().enumerate() {
                    compose_light_volume_batch(&ctx, self.lighting_mode, light_index, processor, &mut shard);
                }
            }
            self.light_volume_batches.batches = shard.batches;
            misses.extend(shard.misses);
        }

        if !misses.is_empty() {
            debug!("Creating {} missing pipeline states", misses.len());
        }
        for (key, desc) in &misses {
            self.pipeline_states.get_or_create(*key, desc, device);
        }

        let pipeline_states = &self.pipeline_states;
        let resolve = |batches: &mut Vec<PipelineBatch>| {
            batches.par_iter_mut().for_each(|batch| {
                if batch.pipeline_state.is_none() {
                    batch.pipeline_state = pipeline_states.lookup(batch.pipeline_state_key).flatten();
                }
            });
        };
        for sorted in &mut self.scene_batches {
            resolve(&mut sorted.batches);
        }
        for split in &mut self.shadow_batches {
            resolve(&mut split.batches.batches);
        }
        resolve(&mut self.light_volume_batches.batches);

        for (pass, sorted) in self.passes.iter().zip(self.scene_batches.iter_mut()) {
            sorted.sort(pass.kind());
        }
        for split in &mut self.shadow_batches {
            split.batches.sort(ScenePassKind::Unordered);
        }
        self.light_volume_batches.sort(ScenePassKind::Unordered);

        trace!(
            "Composed {} batches ({} shadow splits)",
            self.num_batches(),
            self.shadow_batches.len()
        );
    }
}

fn compose_scene_batch(ctx: &ComposeContext<'_, '_>, pass: &ScenePass, batch: &GeometryBatch, shard: &mut ComposeShard) {
    let material = ctx.frame.materials.get(batch.material);
    let ambient = pass.flags().contains(ScenePassFlags::HAS_AMBIENT_LIGHTING);
    let instancing = ctx.instancing && !pass.flags().contains(ScenePassFlags::DISABLE_INSTANCING);
    let variant = |pass, pixel_light, vertex_lights, ambient| SceneBatchVariant {
        pass,
        pixel_light,
        vertex_lights,
        ambient,
        instancing,
    };

    match batch.passes {
        GeometryBatchPasses::Deferred(id) => {
            emit_scene_batch(ctx, batch, material, variant(id, None, [INVALID_LIGHT_INDEX; MAX_VERTEX_LIGHTS], ambient), shard);
        }
        GeometryBatchPasses::Forward {
            unlit_base,
            lit_base,
            light,
        } => {
            let flags = ctx.drawables.geometry_flags()[batch.drawable_index];
            let lighting = if flags.contains(GeometryRenderFlags::FORWARD_LIT) {
                ctx.drawables.geometry_lighting(batch.drawable_index)
            } else {
                None
            };
            let pixel_lights = lighting.map_or(&[][..], |lighting| lighting.get_pixel_lights());
            let vertex_lights = if ambient {
                lighting.map_or([INVALID_LIGHT_INDEX; MAX_VERTEX_LIGHTS], |lighting| lighting.get_vertex_lights())
            } else {
                [INVALID_LIGHT_INDEX; MAX_VERTEX_LIGHTS]
            };

            let remaining = match (lit_base, pixel_lights.split_first()) {
                (Some(lit_base), Some((&(_, first), rest))) => {
                    emit_scene_batch(ctx, batch, material, variant(lit_base, Some(first), vertex_lights, ambient), shard);
                    rest
                }
                _ => {
                    emit_scene_batch(ctx, batch, material, variant(unlit_base, None, vertex_lights, ambient), shard);
                    pixel_lights
                }
            };

            if let Some(light_pass) = light {
                for &(_, light_index) in remaining {
                    let additive = variant(light_pass, Some(light_index), [INVALID_LIGHT_INDEX; MAX_VERTEX_LIGHTS], false);
                    emit_scene_batch(ctx, batch, material, additive, shard);
                }
            }
        }
    }
}

fn emit_scene_batch(
    ctx: &ComposeContext<'_, '_>,
    batch: &GeometryBatch,
    material: &Material,
    variant: SceneBatchVariant,
    shard: &mut ComposeShard,
) {
    let Some(material_pass) = material.pass(variant.pass) else {
        return;
    };
    let light = variant.pixel_light.and_then(|index| ctx.light(index));

    let shader_hash = material_pass.shader_hash();
    let state_hash = material_pass_state_hash(material_pass, material.cull_mode);
    let mut key = shader_hash;
    combine_hash(&mut key, state_hash);
    combine_hash(&mut key, variant.pass.0 as u32);
    combine_hash(&mut key, light.map_or(0, LightProcessor::forward_lit_hash));
    combine_hash(&mut key, variant.num_vertex_lights());
    combine_hash(&mut key, variant.ambient as u32);
    combine_hash(&mut key, variant.instancing as u32);

    let pipeline_batch = PipelineBatch {
        source_batch_index: batch.source_batch_index,
        pixel_light: variant.pixel_light,
        vertex_lights: variant.vertex_lights,
        distance: ctx.drawables.geometry_distance(batch.drawable_index),
        render_order: material.render_order,
        shader_hash,
        state_hash,
        pipeline_state_key: key,
        ..PipelineBatch::new(batch.drawable_index, batch.geometry, batch.material, variant.pass)
    };

    ctx.emit(
        pipeline_batch,
        || {
            let mut desc = PipelineStateDesc::from_material_pass(material_pass, material.cull_mode);
            if let Some(light) = light {
                desc = desc.with_define("PERPIXEL").with_define(light_type_define(light.light().light_type()));
                if light.has_shadow() {
                    desc = desc.with_define("SHADOW");
                }
            }
            let num_vertex_lights = variant.num_vertex_lights();
            if num_vertex_lights > 0 {
                desc = desc.with_define(format!("NUMVERTEXLIGHTS={}", num_vertex_lights));
            }
            if variant.ambient {
                desc = desc.with_define("AMBIENT");
            }
            if variant.instancing {
                desc = desc.with_define("INSTANCED");
            }
            desc
        },
        shard,
    );
}

fn compose_shadow_batches(
    ctx: &ComposeContext<'_, '_>,
    light_index: usize,
    processor: &LightProcessor,
) -> (Vec<ShadowSplitBatches>, Vec<(PipelineStateKey, PipelineStateDesc)>) {
    let mut splits = Vec::new();
    let mut misses = Vec::new();
    if !processor.has_shadow() {
        return (splits, misses);
    }

    let light = processor.light();
    let light_type = light.light_type();
    let bias = light.light.bias;
    let cooked = processor.cooked_params();

    for (split_index, split) in processor.splits().iter().enumerate() {
        if !split.has_shadow_casters() || !split.shadow_map().is_valid() {
            continue;
        }

        let shadow_camera = split.shadow_camera();
        let bias_multiplier = cooked.shadow_depth_bias_multiplier.get(split_index).copied().unwrap_or(1.0);
        let constant_bias = bias.constant_bias * bias_multiplier;
        let mut shard = ComposeShard::default();

        for &caster in split.shadow_casters() {
            let data = ctx.frame.scene.drawable(caster);
            let distance = shadow_camera.distance(data.world_bounds.center());
            for (source_index, source) in data.drawable.source_batches.iter().enumerate() {
                let material = ctx.frame.materials.get(source.material);
                let Some(material_pass) = material.pass(PassId::SHADOW) else {
                    continue;
                };

                let shader_hash = material_pass.shader_hash();
                let state_hash = material_pass_state_hash(material_pass, material.shadow_cull_mode);
                let mut key = shader_hash;
                combine_hash(&mut key, state_hash);
                combine_hash(&mut key, processor.shadow_hash(split_index));
                combine_hash(&mut key, ctx.instancing as u32);

                let batch = PipelineBatch {
                    source_batch_index: source_index,
                    distance,
                    render_order: material.render_order,
                    shader_hash,
                    state_hash,
                    pipeline_state_key: key,
                    ..PipelineBatch::new(caster, source.geometry, source.material, PassId::SHADOW)
                };
                let instancing = ctx.instancing;
                ctx.emit(
                    batch,
                    || {
                        let desc = PipelineStateDesc::from_material_pass(material_pass, material.shadow_cull_mode)
                            .with_define(light_type_define(light_type))
                            .with_depth_bias(constant_bias, bias.slope_scaled_bias);
                        if instancing {
                            desc.with_define("INSTANCED")
                        } else {
                            desc
                        }
                    },
                    &mut shard,
                );
            }
        }

        misses.append(&mut shard.misses);
        splits.push(ShadowSplitBatches {
            light_index,
            split_index,
            region: *split.shadow_map(),
            batches: SortedBatches {
                batches: shard.batches,
                order: Vec::new(),
            },
        });
    }

    (splits, misses)
}

fn compose_light_volume_batch(
    ctx: &ComposeContext<'_, '_>,
    lighting_mode: LightingMode,
    light_index: usize,
    processor: &LightProcessor,
    shard: &mut ComposeShard,
) {
    if !processor.has_lit_geometries() {
        return;
    }

    let light = processor.light();
    let light_type = light.light_type();
    let shader = if lighting_mode == LightingMode::DeferredPbr {
        "deferred_light_pbr"
    } else {
        "deferred_light"
    };

    // Volumes containing the camera are drawn by their back faces without depth test
    let inside = processor.camera_inside_light_volume() || light_type == LightType::Directional;
    let (cull_mode, depth_compare) = if inside {
        (Some(Face::Front), CompareFunction::Always)
    } else {
        (Some(Face::Back), CompareFunction::LessEqual)
    };

    let mut key = processor.light_volume_hash();
    combine_hash(&mut key, lighting_mode as u32);
    combine_hash(&mut key, inside as u32);

    let mut desc = PipelineStateDesc::new(shader);
    desc.blend_mode = BlendMode::Add;
    desc.depth_write = false;
    desc.depth_compare = depth_compare;
    desc.cull_mode = cull_mode;
    let state_hash = desc.state_hash();
    let shader_hash = {
        let mut hash = 0;
        combine_hash(&mut hash, lighting_mode as u32);
        combine_hash(&mut hash, light_type as u32);
        hash
    };

    let batch = PipelineBatch {
        pixel_light: Some(light_index as u32),
        distance: light.distance,
        shader_hash,
        state_hash,
        pipeline_state_key: key,
        ..PipelineBatch::new(NO_DRAWABLE, light_volume_geometry(light_type), MaterialId::default(), PassId::LIGHT)
    };
    ctx.emit(
        batch,
        || {
            let desc = desc.with_define(light_type_define(light_type));
            if processor.has_shadow() {
                desc.with_define("SHADOW")
            } else {
                desc
            }
        },
        shard,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deferred_modes_use_gbuffer_pass() {
        let forward = BatchCompositor::default_passes(LightingMode::Forward);
        let deferred = BatchCompositor::default_passes(LightingMode::DeferredPbr);
        assert!(!forward[0].is_deferred());
        assert!(deferred[0].is_deferred());
        assert_eq!(forward.len(), deferred.len());
        assert_eq!(forward[2].kind(), ScenePassKind::Outline);
    }

    #[test]
    fn sorted_batches_follow_pass_kind() {
        let mut near = PipelineBatch::new(0, GeometryId(1), MaterialId(1), PassId::ALPHA);
        near.distance = 1.0;
        let mut far = near;
        far.distance = 10.0;
        far.shader_hash = 1;

        let mut sorted = SortedBatches {
            batches: vec![near, far],
            order: Vec::new(),
        };
        sorted.sort(ScenePassKind::BackToFront);
        assert_eq!(sorted.order, vec![1, 0]);
        sorted.sort(ScenePassKind::Unordered);
        assert_eq!(sorted.order, vec![0, 1]);
    }

    #[test]
    fn light_volume_geometry_is_distinct_per_type() {
        let ids = [
            light_volume_geometry(LightType::Directional),
            light_volume_geometry(LightType::Spot),
            light_volume_geometry(LightType::Point),
        ];
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
        assert_ne!(ids[0], ids[2]);
    }
}
