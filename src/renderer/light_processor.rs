use std::collections::HashMap;

use glam::{Mat4, UVec2, Vec2, Vec3, Vec4};
use log::{debug, trace};

use crate::math::hash::{combine_hash, make_hash_f32};
use crate::math::{snap_round, FloatRange, EPSILON, LARGE_VALUE};
use crate::renderer::drawable_processor::{DrawableUpdateFlags, GeometryRenderFlags};
use crate::renderer::light_accumulator::{linear_to_srgb, srgb_to_linear};
use crate::renderer::lights::{CookedLightParams, MAX_LIGHT_SPLITS, NUM_LIGHT_MATRICES};
use crate::renderer::shadow_split::{ShadowMapRegion, ShadowSplitProcessor, CUBE_SHADOW_MAP_PADDING};
use crate::scene::{
    CascadeParameters, Camera, DrawableIndex, LightData, LightId, LightType, SpatialQuery, MAX_CASCADE_SPLITS,
};
use crate::settings::LightProcessorCacheSettings;

/// Frames surplus split processors survive after the requested split count drops.
pub const NUM_SPLIT_FRAMES_TO_LIVE: u32 = 600;

/// Frame state shared by all light processors while they update in parallel.
#[derive(Clone, Copy)]
pub struct LightProcessorContext<'a> {
    pub cull_camera: &'a Camera,
    pub scene: &'a dyn SpatialQuery,
    /// Drawables visible in the cull camera.
    pub geometries: &'a [DrawableIndex],
    /// Per-drawable flags and view Z ranges, indexed by drawable index.
    pub geometry_flags: &'a [GeometryRenderFlags],
    pub geometry_z_ranges: &'a [FloatRange],
    pub scene_z_range: FloatRange,
    pub update_flags: &'a DrawableUpdateFlags,
    pub pcf_kernel_size: u32,
    pub normal_offset_scale: f32,
}

/// Shadow policy and shadow atlas access supplied by the owner of the pipeline.
pub trait LightProcessorCallback: Sync {
    fn is_light_shadowed(&self, light: &LightData) -> bool;

    /// Size of one split of the shadow map of `light`.
    fn shadow_map_size(&self, light: &LightData, num_active_splits: usize) -> u32;

    /// Returns an invalid region when the atlas is full.
    fn allocate_transient_shadow_map(&mut self, size: UVec2) -> ShadowMapRegion;
}

/// Grid the splits of one light are laid out in.
pub fn shadow_map_grid(num_splits: usize) -> UVec2 {
    match num_splits {
        0 | 1 => UVec2::new(1, 1),
        2 => UVec2::new(2, 1),
        3..=5 => UVec2::new(2, 2),
        _ => UVec2::new(3, 2),
    }
}

/// View depth ranges of the cascades of a directional light that fall inside `[near, far]`.
pub fn active_cascade_splits(cascade: &CascadeParameters, near: f32, far: f32) -> Vec<FloatRange> {
    let mut splits = Vec::with_capacity(MAX_CASCADE_SPLITS);
    let mut near_split = near;
    for i in 0..cascade.num_splits() {
        if near_split > far {
            break;
        }
        let far_split = far.min(cascade.splits[i]);
        if far_split <= near_split {
            break;
        }
        splits.push(FloatRange::new(near_split, far_split));
        near_split = far_split;
    }
    splits
}

/// Shadow splits, lit geometries and shader parameters of one light.
#[derive(Debug)]
pub struct LightProcessor {
    light: LightData,

    is_shadow_requested: bool,
    splits: Vec<ShadowSplitProcessor>,
    num_active_splits: usize,
    splits_time_to_live: u32,

    camera_inside_light_volume: bool,
    has_lit_geometries: bool,
    has_forward_lit_geometries: bool,
    lit_geometries: Vec<DrawableIndex>,
    shadow_caster_candidates: Vec<DrawableIndex>,
    query_buffer: Vec<DrawableIndex>,

    shadow_map: ShadowMapRegion,
    shadow_map_split_size: u32,
    shadow_map_size: UVec2,

    cooked_params: CookedLightParams,
    forward_lit_hash: u32,
    light_volume_hash: u32,
    shadow_hashes: [u32; MAX_LIGHT_SPLITS],
}

impl LightProcessor {
    pub fn new(light: &LightData) -> Self {
        Self {
            light: *light,
            is_shadow_requested: false,
            splits: Vec::new(),
            num_active_splits: 0,
            splits_time_to_live: NUM_SPLIT_FRAMES_TO_LIVE,
            camera_inside_light_volume: false,
            has_lit_geometries: false,
            has_forward_lit_geometries: false,
            lit_geometries: Vec::new(),
            shadow_caster_candidates: Vec::new(),
            query_buffer: Vec::new(),
            shadow_map: ShadowMapRegion::default(),
            shadow_map_split_size: 0,
            shadow_map_size: UVec2::ZERO,
            cooked_params: CookedLightParams::default(),
            forward_lit_hash: 0,
            light_volume_hash: 0,
            shadow_hashes: [0; MAX_LIGHT_SPLITS],
        }
    }

    /// Main thread. Captures the light state and the shadow request for this frame.
    pub fn begin_update(&mut self, light: &LightData, callback: &dyn LightProcessorCallback) {
        self.light = *light;
        self.lit_geometries.clear();
        self.shadow_caster_candidates.clear();
        self.shadow_map = ShadowMapRegion::default();
        self.shadow_map_split_size = 0;
        self.shadow_map_size = UVec2::ZERO;
        self.num_active_splits = 0;

        self.is_shadow_requested = callback.is_light_shadowed(light);
        let num_splits_requested = if self.is_shadow_requested {
            match light.light_type() {
                LightType::Directional => light.light.cascade.num_splits(),
                LightType::Spot => 1,
                LightType::Point => MAX_LIGHT_SPLITS,
            }
        } else {
            0
        };

        if self.splits.len() <= num_splits_requested {
            self.splits_time_to_live = NUM_SPLIT_FRAMES_TO_LIVE;
            while self.splits.len() < num_splits_requested {
                self.splits.push(ShadowSplitProcessor::new(self.splits.len()));
            }
        } else {
            self.splits_time_to_live = self.splits_time_to_live.saturating_sub(1);
            if self.splits_time_to_live == 0 {
                trace!("Releasing unused shadow splits of light {:?}", light.id);
                self.splits.truncate(num_splits_requested);
            }
        }
    }

    /// Worker thread. Collects lit geometries and shadow casters.
    pub fn update(&mut self, ctx: &LightProcessorContext<'_>, callback: &dyn LightProcessorCallback) {
        let cull_camera = ctx.cull_camera;
        self.camera_inside_light_volume =
            self.light.volume_distance(cull_camera.position) <= cull_camera.near * 2.0;

        self.has_lit_geometries = false;
        self.has_forward_lit_geometries = false;
        self.lit_geometries.clear();
        self.shadow_caster_candidates.clear();

        let light_mask = self.light.light.light_mask;
        match self.light.light_type() {
            LightType::Directional => {
                for &index in ctx.geometries {
                    let flags = ctx.geometry_flags[index];
                    self.has_lit_geometries |= flags.contains(GeometryRenderFlags::LIT);
                    self.has_forward_lit_geometries |= flags.contains(GeometryRenderFlags::FORWARD_LIT);
                    if flags.contains(GeometryRenderFlags::LIT)
                        && ctx.scene.drawable(index).drawable.light_mask & light_mask != 0
                    {
                        self.lit_geometries.push(index);
                    }
                }
            }
            LightType::Spot | LightType::Point => {
                self.query_buffer.clear();
                if self.light.light_type() == LightType::Point {
                    ctx.scene
                        .query_drawables_in_sphere(&self.light.sphere(), cull_camera.view_mask, &mut self.query_buffer);
                } else {
                    ctx.scene
                        .query_drawables(&self.light.frustum(), cull_camera.view_mask, &mut self.query_buffer);
                }

                for &index in &self.query_buffer {
                    let drawable = &ctx.scene.drawable(index).drawable;
                    let flags = ctx.geometry_flags[index];
                    if flags.contains(GeometryRenderFlags::LIT) && drawable.light_mask & light_mask != 0 {
                        self.has_lit_geometries = true;
                        if flags.contains(GeometryRenderFlags::FORWARD_LIT) {
                            self.lit_geometries.push(index);
                        }
                    }
                    if self.is_shadow_requested && drawable.cast_shadows && drawable.shadow_mask & light_mask != 0 {
                        self.shadow_caster_candidates.push(index);
                    }
                }
                self.has_forward_lit_geometries = !self.lit_geometries.is_empty();
            }
        }

        if !self.is_shadow_requested {
            self.num_active_splits = 0;
            return;
        }

        self.initialize_splits(ctx);
        if !self.splits[..self.num_active_splits]
            .iter()
            .any(ShadowSplitProcessor::has_shadow_casters)
        {
            self.num_active_splits = 0;
            return;
        }

        self.shadow_map_split_size = callback.shadow_map_size(&self.light, self.num_active_splits);
        self.shadow_map_size = self.shadow_map_split_size * shadow_map_grid(self.num_active_splits);
    }

    fn initialize_splits(&mut self, ctx: &LightProcessorContext<'_>) {
        let light = &self.light;
        match light.light_type() {
            LightType::Directional => {
                let cascades = active_cascade_splits(&light.light.cascade, ctx.cull_camera.near, ctx.cull_camera.far);
                self.num_active_splits = cascades.len().min(self.splits.len());
                for (split, z_range) in self.splits.iter_mut().zip(cascades) {
                    split.initialize_directional(ctx, light, z_range, &self.lit_geometries);
                    split.process_directional_shadow_casters(ctx, light);
                }
            }
            LightType::Spot => {
                self.num_active_splits = self.splits.len().min(1);
                if let Some(split) = self.splits.first_mut() {
                    split.initialize_spot(light);
                    split.process_spot_shadow_casters(ctx, &self.shadow_caster_candidates);
                }
            }
            LightType::Point => {
                self.num_active_splits = MAX_LIGHT_SPLITS.min(self.splits.len());
                for (face, split) in self.splits.iter_mut().enumerate().take(MAX_LIGHT_SPLITS) {
                    split.initialize_point(light, face);
                    split.process_point_shadow_casters(ctx, &self.shadow_caster_candidates);
                }
            }
        }
    }

    /// Main thread. Allocates the shadow map and cooks shader parameters.
    pub fn end_update(&mut self, ctx: &LightProcessorContext<'_>, callback: &mut dyn LightProcessorCallback) {
        self.shadow_map = ShadowMapRegion::default();
        if self.num_active_splits > 0 {
            self.shadow_map = callback.allocate_transient_shadow_map(self.shadow_map_size);
            if self.shadow_map.is_valid() {
                let light_type = self.light.light_type();
                let grid = shadow_map_grid(self.num_active_splits);
                for (i, split) in self.splits[..self.num_active_splits].iter_mut().enumerate() {
                    // Invisible cube faces keep no region
                    if light_type == LightType::Point && !split.has_shadow_casters() {
                        continue;
                    }
                    split.finalize_shadow(light_type, self.shadow_map.split(i, grid), ctx.pcf_kernel_size);
                }
            } else {
                debug!(
                    "No room for {}x{} shadow map of light {:?}",
                    self.shadow_map_size.x, self.shadow_map_size.y, self.light.id
                );
                self.num_active_splits = 0;
            }
        }

        self.cook_shader_parameters(ctx);
        self.update_hashes();
    }

    fn light_fade(&self) -> f32 {
        let fade_start = self.light.light.fade_distance;
        let fade_end = self.light.light.draw_distance;
        if self.light.light_type() != LightType::Directional
            && fade_end > 0.0
            && fade_start > 0.0
            && fade_start < fade_end
        {
            (1.0 - (self.light.distance - fade_start) / (fade_end - fade_start)).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }

    fn cook_shader_parameters(&mut self, ctx: &LightProcessorContext<'_>) {
        let light = &self.light.light;
        let light_type = self.light.light_type();
        let fade = self.light_fade();
        let color = self.light.light.effective_color().abs();

        let mut params = CookedLightParams {
            position: self.light.position,
            direction: self.light.direction(),
            inverse_range: match light_type {
                LightType::Directional => 0.0,
                LightType::Spot | LightType::Point => 1.0 / light.range.max(EPSILON),
            },
            fade,
            specular_intensity: fade * light.specular_intensity,
            ..CookedLightParams::default()
        };

        if light.use_physical_values {
            params.color_linear = fade * color;
            params.color_gamma = fade * linear_to_srgb(color);
        } else {
            params.color_gamma = fade * color;
            params.color_linear = fade * srgb_to_linear(color);
        }

        if light_type == LightType::Spot {
            let cutoff = (light.fov_radians * 0.5).cos();
            params.spot_cutoff = Vec2::new(cutoff, 1.0 / (1.0 - cutoff).max(EPSILON));
        }

        params.shape_matrix = match light_type {
            LightType::Directional => Mat4::IDENTITY,
            LightType::Spot => {
                let h = 1.005 / (light.fov_radians * 0.5).tan();
                let w = h / light.aspect_ratio.max(EPSILON);
                let spot_proj = Mat4::from_cols(
                    Vec4::new(w, 0.0, 0.0, 0.0),
                    Vec4::new(0.0, h, 0.0, 0.0),
                    Vec4::new(0.0, 0.0, -1.0 / light.range.max(EPSILON), -1.0),
                    Vec4::ZERO,
                );
                let tex_adjust = Mat4::from_translation(Vec3::new(0.5, 0.5, 0.0))
                    * Mat4::from_scale(Vec3::new(0.5, -0.5, 1.0));
                tex_adjust * spot_proj * self.light.world_transform().inverse()
            }
            LightType::Point => self.light.world_transform().inverse(),
        };

        if self.shadow_map.is_valid() {
            self.cook_shadow_parameters(ctx, &mut params);
        }

        self.cooked_params = params;
    }

    fn cook_shadow_parameters(&self, ctx: &LightProcessorContext<'_>, params: &mut CookedLightParams) {
        let light = &self.light.light;
        let light_type = self.light.light_type();
        let splits = &self.splits[..self.num_active_splits];
        let Some(first_split) = splits.first() else {
            return;
        };

        let sub_pixel_offset = if ctx.pcf_kernel_size % 2 == 0 { 0.5 } else { 0.0 };
        let texture_size = self.shadow_map.texture_size.as_vec2().max(Vec2::ONE);
        params.shadow_map_inv_size = Vec2::ONE / texture_size;

        match light_type {
            LightType::Directional => {
                // Directional shaders select the cascade from a full matrix array
                params.num_light_matrices = MAX_CASCADE_SPLITS.min(NUM_LIGHT_MATRICES);
                for (matrix, split) in params.light_matrices.iter_mut().zip(splits) {
                    *matrix = split.world_to_shadow_space_matrix(sub_pixel_offset);
                }
            }
            LightType::Spot => {
                params.num_light_matrices = 1;
                params.light_matrices[0] = first_split.world_to_shadow_space_matrix(sub_pixel_offset);
            }
            LightType::Point => {
                let face = self.shadow_map.split(0, shadow_map_grid(self.num_active_splits));
                let relative_size = face.size().as_vec2() / texture_size;
                let relative_offset = face.min.as_vec2() / texture_size;
                params.shadow_cube_uv_bias = Vec2::ONE
                    - 2.0 * CUBE_SHADOW_MAP_PADDING as f32 * params.shadow_map_inv_size / relative_size.max(Vec2::splat(EPSILON));
                params.shadow_cube_adjust = Vec4::new(relative_size.x, relative_size.y, relative_offset.x, relative_offset.y);
            }
        }

        let shadow_camera = first_split.shadow_camera();
        let near = shadow_camera.near;
        let far = shadow_camera.far;
        let q = far / (far - near).max(EPSILON);
        let r = -q * near;
        let view_far = ctx.cull_camera.far.max(EPSILON);
        let shadow_range = light.cascade.shadow_range();
        let fade_start = light.cascade.fade_start * shadow_range / view_far;
        let fade_end = shadow_range / view_far;
        params.shadow_depth_fade = Vec4::new(q, r, fade_start, 1.0 / (fade_end - fade_start).max(EPSILON));

        let mut intensity = light.shadow_intensity;
        let shadow_fade_start = light.shadow_fade_distance;
        let shadow_fade_end = light.shadow_distance;
        if shadow_fade_start > 0.0 && shadow_fade_end > 0.0 && shadow_fade_end > shadow_fade_start {
            let t = ((self.light.distance - shadow_fade_start) / (shadow_fade_end - shadow_fade_start)).clamp(0.0, 1.0);
            intensity += (1.0 - intensity) * t;
        }
        let samples = if ctx.pcf_kernel_size == 2 { 4.0 } else { 1.0 };
        params.shadow_intensity = Vec4::new((1.0 - intensity) / samples, intensity, 0.0, 0.0);

        params.shadow_splits = Vec4::splat(LARGE_VALUE);
        if light_type == LightType::Directional {
            for (i, split) in splits.iter().enumerate().take(4) {
                params.shadow_splits[i] = split.cascade_z_range().max / view_far;
            }

            let first_far = shadow_camera.far.max(EPSILON);
            for (i, split) in splits.iter().enumerate().skip(1) {
                let scale = (split.shadow_camera().far / first_far).max(1.0);
                params.shadow_depth_bias_multiplier[i] =
                    snap_round(1.0 + (scale - 1.0) * light.cascade.bias_auto_adjust, 0.1);
            }
        }

        for (bias, split) in params.shadow_normal_bias.iter_mut().zip(splits) {
            *bias = split.shadow_map_texel_size_in_world_space() * light.bias.normal_offset * ctx.normal_offset_scale;
        }
    }

    fn update_hashes(&mut self) {
        let light = &self.light.light;
        let mut common = 0;
        combine_hash(&mut common, self.light.light_type() as u32);
        combine_hash(&mut common, light.is_negative() as u32);
        combine_hash(&mut common, self.has_shadow() as u32);
        combine_hash(&mut common, (light.specular_intensity > 0.0) as u32);
        combine_hash(&mut common, (light.bias.normal_offset > 0.0) as u32);
        combine_hash(&mut common, make_hash_f32(light.bias.constant_bias));
        combine_hash(&mut common, make_hash_f32(light.bias.slope_scaled_bias));
        combine_hash(&mut common, light.light_mask);

        self.forward_lit_hash = common;

        self.light_volume_hash = common;
        combine_hash(&mut self.light_volume_hash, self.camera_inside_light_volume as u32);

        if self.light.light_type() == LightType::Directional {
            for (i, hash) in self.shadow_hashes.iter_mut().enumerate() {
                *hash = common;
                let multiplier = self.cooked_params.shadow_depth_bias_multiplier[i];
                combine_hash(hash, make_hash_f32(100.0 * multiplier));
            }
        } else {
            self.shadow_hashes = [common; MAX_LIGHT_SPLITS];
        }
    }

    pub fn light(&self) -> &LightData {
        &self.light
    }

    pub fn id(&self) -> LightId {
        self.light.id
    }

    pub fn is_shadow_requested(&self) -> bool {
        self.is_shadow_requested
    }

    pub fn has_shadow(&self) -> bool {
        self.num_active_splits > 0 && self.shadow_map.is_valid()
    }

    pub fn num_active_splits(&self) -> usize {
        self.num_active_splits
    }

    /// Allocated split processors, including surplus ones kept alive by the split TTL.
    pub fn num_allocated_splits(&self) -> usize {
        self.splits.len()
    }

    pub fn splits(&self) -> &[ShadowSplitProcessor] {
        &self.splits[..self.num_active_splits]
    }

    pub fn take_queued_updates(&mut self) -> Vec<DrawableIndex> {
        let mut queued = Vec::new();
        for split in &mut self.splits[..self.num_active_splits] {
            queued.append(&mut split.take_queued_updates());
        }
        queued
    }

    pub fn camera_inside_light_volume(&self) -> bool {
        self.camera_inside_light_volume
    }

    pub fn has_lit_geometries(&self) -> bool {
        self.has_lit_geometries
    }

    pub fn has_forward_lit_geometries(&self) -> bool {
        self.has_forward_lit_geometries
    }

    pub fn lit_geometries(&self) -> &[DrawableIndex] {
        &self.lit_geometries
    }

    pub fn shadow_map(&self) -> &ShadowMapRegion {
        &self.shadow_map
    }

    /// Requested size of the whole shadow map; zero when unshadowed.
    pub fn shadow_map_size(&self) -> UVec2 {
        self.shadow_map_size
    }

    pub fn shadow_map_split_size(&self) -> u32 {
        self.shadow_map_split_size
    }

    pub fn cooked_params(&self) -> &CookedLightParams {
        &self.cooked_params
    }

    pub fn forward_lit_hash(&self) -> u32 {
        self.forward_lit_hash
    }

    pub fn light_volume_hash(&self) -> u32 {
        self.light_volume_hash
    }

    pub fn shadow_hash(&self, split_index: usize) -> u32 {
        self.shadow_hashes.get(split_index).copied().unwrap_or(0)
    }
}

#[derive(Debug)]
struct CacheEntry {
    processor: Option<Box<LightProcessor>>,
    last_used_generation: u64,
}

/// Light processors kept across frames, keyed by light id.
///
/// Processors are taken out for the duration of a frame and restored at the start of
/// the next one. Entries unused for longer than the configured time to live are
/// evicted and their slots recycled.
#[derive(Debug)]
pub struct LightProcessorCache {
    settings: LightProcessorCacheSettings,
    entries: Vec<Option<CacheEntry>>,
    lookup: HashMap<LightId, usize>,
    free_slots: Vec<usize>,
    generation: u64,
    elapsed: f32,
}

impl LightProcessorCache {
    pub fn new(settings: LightProcessorCacheSettings) -> Self {
        Self {
            settings,
            entries: Vec::new(),
            lookup: HashMap::new(),
            free_slots: Vec::new(),
            generation: 0,
            elapsed: 0.0,
        }
    }

    pub fn set_settings(&mut self, settings: LightProcessorCacheSettings) {
        self.settings = settings;
    }

    /// Advances the generation once per accumulated second and evicts stale entries.
    pub fn update(&mut self, time_step: f32) {
        self.elapsed += time_step.max(0.0);
        let mut generation_changed = false;
        while self.elapsed >= 1.0 {
            self.elapsed -= 1.0;
            self.generation += 1;
            generation_changed = true;
        }
        if !generation_changed {
            return;
        }

        let max_age = if self.lookup.len() <= self.settings.budget {
            self.settings.normal_time_to_live
        } else {
            self.settings.aggressive_time_to_live
        } as u64;

        let generation = self.generation;
        let mut evicted = Vec::new();
        for (slot, entry) in self.entries.iter_mut().enumerate() {
            let expired = entry
                .as_ref()
                .is_some_and(|entry| generation - entry.last_used_generation > max_age);
            if expired {
                *entry = None;
                evicted.push(slot);
            }
        }

        if !evicted.is_empty() {
            self.lookup.retain(|_, slot| !evicted.contains(slot));
            debug!("Evicted {} light processors, {} remain", evicted.len(), self.lookup.len());
            self.free_slots.extend(evicted);
        }
    }

    fn slot_for(&mut self, light: &LightData) -> usize {
        if let Some(&slot) = self.lookup.get(&light.id) {
            return slot;
        }
        let entry = CacheEntry {
            processor: None,
            last_used_generation: self.generation,
        };
        let slot = match self.free_slots.pop() {
            Some(slot) => {
                self.entries[slot] = Some(entry);
                slot
            }
            None => {
                self.entries.push(Some(entry));
                self.entries.len() - 1
            }
        };
        self.lookup.insert(light.id, slot);
        slot
    }

    fn entry_mut(&mut self, light: &LightData) -> &mut CacheEntry {
        let slot = self.slot_for(light);
        let generation = self.generation;
        let entry = self.entries[slot].get_or_insert_with(|| CacheEntry {
            processor: None,
            last_used_generation: generation,
        });
        entry.last_used_generation = generation;
        entry
    }

    /// Processor of `light`, created on first access.
    pub fn get_light_processor(&mut self, light: &LightData) -> &mut LightProcessor {
        self.entry_mut(light)
            .processor
            .get_or_insert_with(|| Box::new(LightProcessor::new(light)))
    }

    /// Moves the processor of `light` out of the cache for one frame.
    pub fn take(&mut self, light: &LightData) -> Box<LightProcessor> {
        self.entry_mut(light)
            .processor
            .take()
            .unwrap_or_else(|| Box::new(LightProcessor::new(light)))
    }

    /// Returns a processor obtained with [`take`](Self::take). Dropped if its entry was evicted.
    pub fn restore(&mut self, processor: Box<LightProcessor>) {
        let Some(&slot) = self.lookup.get(&processor.id()) else {
            return;
        };
        if let Some(entry) = self.entries[slot].as_mut() {
            if entry.processor.is_none() {
                entry.processor = Some(processor);
            }
        }
    }

    pub fn contains(&self, id: LightId) -> bool {
        self.lookup.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
