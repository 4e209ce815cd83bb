use std::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;
use glam::Vec3;
use log::trace;
use rayon::prelude::*;

use crate::math::{BoundingBox, FloatRange, SphericalHarmonicsDot9, EPSILON, LARGE_EPSILON, LARGE_VALUE};
use crate::renderer::light_accumulator::{
    LightAccumulator, LightAccumulatorContext, LightDataForAccumulator, MAX_PIXEL_LIGHTS, MAX_VERTEX_LIGHTS,
};
use crate::renderer::light_processor::{LightProcessor, LightProcessorCache, LightProcessorCallback, LightProcessorContext};
use crate::renderer::scene_pass::{GeometryBatch, ScenePass, ScenePassFlags};
use crate::scene::{
    Camera, DrawableIndex, LightData, LightImportance, LightIndex, LightType, MaterialLibrary, OcclusionBuffer,
    SpatialQuery,
};
use crate::settings::{LightProcessorCacheSettings, PipelineSettings};

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct GeometryRenderFlags: u8 {
        const VISIBLE_IN_CULL_CAMERA = 1 << 0;
        /// Receives ambient lighting.
        const LIT = 1 << 1;
        /// Receives per-pixel forward lights.
        const FORWARD_LIT = 1 << 2;
    }
}

/// Per-drawable "updated this frame" flags.
///
/// Each slot stores the frame stamp it was last marked in, so nothing has to be
/// cleared between frames.
#[derive(Debug)]
pub struct DrawableUpdateFlags {
    stamps: Vec<AtomicU32>,
    frame: u32,
}

impl Default for DrawableUpdateFlags {
    fn default() -> Self {
        Self {
            stamps: Vec::new(),
            frame: 1,
        }
    }
}

impl DrawableUpdateFlags {
    pub fn begin_frame(&mut self, num_drawables: usize) {
        self.frame = self.frame.wrapping_add(1);
        if self.frame == 0 {
            for stamp in &mut self.stamps {
                *stamp.get_mut() = 0;
            }
            self.frame = 1;
        }
        self.stamps.resize_with(num_drawables, || AtomicU32::new(0));
    }

    /// Marks `index` as updated. Returns `true` only for the first call in a frame.
    pub fn mark(&self, index: DrawableIndex) -> bool {
        self.stamps
            .get(index)
            .is_some_and(|stamp| stamp.swap(self.frame, Ordering::Relaxed) != self.frame)
    }

    pub fn is_marked(&self, index: DrawableIndex) -> bool {
        self.stamps
            .get(index)
            .is_some_and(|stamp| stamp.load(Ordering::Relaxed) == self.frame)
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawableProcessorSettings {
    pub max_vertex_lights: usize,
    pub max_pixel_lights: usize,
    pub pcf_kernel_size: u32,
    pub normal_offset_scale: f32,
    pub linear_space_lighting: bool,
    pub max_occluder_triangles: u32,
    pub light_processor_cache: LightProcessorCacheSettings,
}

impl Default for DrawableProcessorSettings {
    fn default() -> Self {
        Self::from(&PipelineSettings::default())
    }
}

impl From<&PipelineSettings> for DrawableProcessorSettings {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            max_vertex_lights: settings.max_vertex_lights.min(MAX_VERTEX_LIGHTS),
            max_pixel_lights: settings.max_pixel_lights.min(MAX_PIXEL_LIGHTS),
            pcf_kernel_size: settings.pcf_kernel_size,
            normal_offset_scale: settings.normal_offset_scale,
            linear_space_lighting: settings.linear_space_lighting,
            max_occluder_triangles: settings.max_occluder_triangles,
            light_processor_cache: settings.light_processor_cache,
        }
    }
}

/// Inputs of one frame for one cull camera.
#[derive(Clone, Copy)]
pub struct FrameInfo<'a> {
    pub time_step: f32,
    pub cull_camera: &'a Camera,
    pub scene: &'a dyn SpatialQuery,
    pub materials: &'a MaterialLibrary,
    pub ambient_color: Vec3,
}

/// Penalty of `light` for geometry inside `bounds`. Lower is more important.
pub fn drawable_light_penalty(light: &LightData, importance: LightImportance, bounds: &BoundingBox) -> f32 {
    match importance {
        LightImportance::Important => {
            if light.light_type() == LightType::Directional && !light.light.is_negative() {
                -2.0
            } else {
                -1.0
            }
        }
        LightImportance::Auto | LightImportance::NotImportant => {
            let p = light.distance_to_box(bounds).max(LARGE_EPSILON) / light.light.intensity_divisor();
            let base = if p <= 1.0 { p } else { 2.0 - 1.0 / p };
            if importance == LightImportance::Auto {
                base
            } else {
                base + 3.0
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct VisibleGeometry {
    index: DrawableIndex,
    flags: GeometryRenderFlags,
    z_range: FloatRange,
    distance: f32,
    infinite: bool,
}

/// Results of one worker's slice of the visible drawables.
#[derive(Debug)]
struct VisibleShard {
    geometries: Vec<VisibleGeometry>,
    pass_batches: Vec<Vec<GeometryBatch>>,
}

impl VisibleShard {
    fn new(num_passes: usize) -> Self {
        Self {
            geometries: Vec::new(),
            pass_batches: vec![Vec::new(); num_passes],
        }
    }

    fn append(mut self, mut other: VisibleShard) -> VisibleShard {
        self.geometries.append(&mut other.geometries);
        for (dst, src) in self.pass_batches.iter_mut().zip(other.pass_batches.iter_mut()) {
            dst.append(src);
        }
        self
    }
}

/// Per-frame classification of visible drawables and their lights.
pub struct DrawableProcessor {
    settings: DrawableProcessorSettings,
    cache: LightProcessorCache,
    update_flags: DrawableUpdateFlags,

    geometry_flags: Vec<GeometryRenderFlags>,
    geometry_z_ranges: Vec<FloatRange>,
    geometry_distances: Vec<f32>,
    geometry_lighting: Vec<LightAccumulator>,
    visible_geometries: Vec<DrawableIndex>,
    scene_z_range: FloatRange,

    occluders: Vec<DrawableIndex>,

    light_processors: Vec<Box<LightProcessor>>,
    accumulator_lights: Vec<LightDataForAccumulator>,
    num_shadowed_lights: usize,
    queued_shadow_casters: Vec<DrawableIndex>,

    lighting_offsets: Vec<usize>,
    lighting_entries: Vec<(u32, LightImportance, f32)>,
}

impl DrawableProcessor {
    pub fn new(settings: DrawableProcessorSettings) -> Self {
        Self {
            settings,
            cache: LightProcessorCache::new(settings.light_processor_cache),
            update_flags: DrawableUpdateFlags::default(),
            geometry_flags: Vec::new(),
            geometry_z_ranges: Vec::new(),
            geometry_distances: Vec::new(),
            geometry_lighting: Vec::new(),
            visible_geometries: Vec::new(),
            scene_z_range: FloatRange::INVALID,
            occluders: Vec::new(),
            light_processors: Vec::new(),
            accumulator_lights: Vec::new(),
            num_shadowed_lights: 0,
            queued_shadow_casters: Vec::new(),
            lighting_offsets: Vec::new(),
            lighting_entries: Vec::new(),
        }
    }

    pub fn set_settings(&mut self, settings: DrawableProcessorSettings) {
        self.settings = settings;
        self.cache.set_settings(settings.light_processor_cache);
    }

    pub fn settings(&self) -> &DrawableProcessorSettings {
        &self.settings
    }

    /// Returns last frame's light processors to the cache and resets per-drawable state.
    pub fn on_update_begin(&mut self, frame: &FrameInfo<'_>) {
        for processor in self.light_processors.drain(..) {
            self.cache.restore(processor);
        }
        self.cache.update(frame.time_step);

        let num_drawables = frame.scene.num_drawables();
        self.update_flags.begin_frame(num_drawables);

        self.geometry_flags.clear();
        self.geometry_flags.resize(num_drawables, GeometryRenderFlags::empty());
        self.geometry_z_ranges.clear();
        self.geometry_z_ranges.resize(num_drawables, FloatRange::INVALID);
        self.geometry_distances.clear();
        self.geometry_distances.resize(num_drawables, 0.0);
        self.geometry_lighting.resize_with(num_drawables, LightAccumulator::default);

        self.visible_geometries.clear();
        self.scene_z_range = FloatRange::INVALID;
        self.occluders.clear();
        self.accumulator_lights.clear();
        self.num_shadowed_lights = 0;
        self.queued_shadow_casters.clear();
    }

    /// Keeps occluders large enough on screen, best first, within the triangle budget.
    pub fn process_occluders(&mut self, frame: &FrameInfo<'_>, candidates: &[DrawableIndex], size_threshold: f32) {
        let camera = frame.cull_camera;
        let half_view_size = camera.half_view_size();
        let inv_ortho_size = 1.0 / camera.ortho_size.max(EPSILON);

        let mut scored = Vec::with_capacity(candidates.len());
        for &index in candidates {
            let data = frame.scene.drawable(index);
            let bounds = &data.world_bounds;
            let distance = camera.distance(bounds.center());
            if data.drawable.draw_distance > 0.0 && distance > data.drawable.draw_distance {
                continue;
            }

            let diagonal = bounds.size().length();
            let relative_size = if camera.orthographic {
                diagonal * inv_ortho_size
            } else {
                let mut size = diagonal * half_view_size / (distance * (distance / camera.far)).max(EPSILON);
                if bounds.contains_point(camera.position) {
                    size *= diagonal;
                }
                size
            };

            if relative_size >= size_threshold {
                let triangles = data.drawable.num_triangles() as f32;
                let penalty = (triangles / diagonal.max(EPSILON)) / relative_size.max(EPSILON);
                scored.push((penalty, index));
            }
        }

        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut budget = self.settings.max_occluder_triangles;
        for (_, index) in scored {
            let triangles = frame.scene.drawable(index).drawable.num_triangles();
            if triangles > budget && !self.occluders.is_empty() {
                break;
            }
            budget = budget.saturating_sub(triangles);
            self.occluders.push(index);
        }
    }

    /// Classifies visible drawables, builds per-pass geometry batches and the scene Z range.
    pub fn process_visible_drawables(
        &mut self,
        frame: &FrameInfo<'_>,
        drawables: &[DrawableIndex],
        passes: &mut [ScenePass],
        occlusion: Option<&dyn OcclusionBuffer>,
    ) {
        for pass in passes.iter_mut() {
            pass.clear_batches();
        }

        let num_passes = passes.len();
        let passes_ref: &[ScenePass] = passes;
        let update_flags = &self.update_flags;

        let shard = drawables
            .par_iter()
            .fold(
                || VisibleShard::new(num_passes),
                |mut shard, &index| {
                    process_visible_drawable(frame, index, passes_ref, occlusion, update_flags, &mut shard);
                    shard
                },
            )
            .reduce(|| VisibleShard::new(num_passes), VisibleShard::append);

        let ambient = SphericalHarmonicsDot9::from_ambient(frame.ambient_color);
        for geometry in &shard.geometries {
            let index = geometry.index;
            self.geometry_flags[index] = geometry.flags;
            self.geometry_z_ranges[index] = geometry.z_range;
            self.geometry_distances[index] = geometry.distance;
            if !geometry.infinite {
                self.scene_z_range.merge(geometry.z_range);
            }

            let lighting = &mut self.geometry_lighting[index];
            lighting.reset_lights();
            lighting.spherical_harmonics = if geometry.flags.contains(GeometryRenderFlags::LIT) {
                ambient
            } else {
                SphericalHarmonicsDot9::ZERO
            };
            self.visible_geometries.push(index);
        }

        if self.scene_z_range.is_valid() && self.scene_z_range.length() < 1.0 {
            self.scene_z_range.max = self.scene_z_range.min + 1.0;
        }

        for (pass, mut batches) in passes.iter_mut().zip(shard.pass_batches) {
            pass.append_batches(&mut batches);
        }

        trace!(
            "{} visible geometries, scene z range [{}, {}]",
            self.visible_geometries.len(),
            self.scene_z_range.min,
            self.scene_z_range.max
        );
    }

    /// Drives all visible lights through begin, parallel update and end.
    pub fn process_lights(
        &mut self,
        frame: &FrameInfo<'_>,
        light_indices: &[LightIndex],
        callback: &mut dyn LightProcessorCallback,
    ) {
        let camera = frame.cull_camera;
        let mut lights: Vec<LightData> = light_indices
            .iter()
            .map(|&index| {
                let mut light = *frame.scene.light(index);
                light.distance = match light.light_type() {
                    LightType::Directional => 0.0,
                    LightType::Spot | LightType::Point => camera.distance(light.position),
                };
                light
            })
            .filter(|light| light.light.effective_color() != Vec3::ZERO && light.light.light_mask != 0)
            .filter(|light| light.light.draw_distance <= 0.0 || light.distance <= light.light.draw_distance)
            .collect();
        lights.sort_by_key(|light| (light.light.is_negative(), light.id));

        for light in &lights {
            let mut processor = self.cache.take(light);
            processor.begin_update(light, &*callback);
            self.light_processors.push(processor);
        }

        let ctx = LightProcessorContext {
            cull_camera: camera,
            scene: frame.scene,
            geometries: &self.visible_geometries,
            geometry_flags: &self.geometry_flags,
            geometry_z_ranges: &self.geometry_z_ranges,
            scene_z_range: self.scene_z_range,
            update_flags: &self.update_flags,
            pcf_kernel_size: self.settings.pcf_kernel_size,
            normal_offset_scale: self.settings.normal_offset_scale,
        };

        {
            let shared_callback: &dyn LightProcessorCallback = &*callback;
            self.light_processors
                .par_iter_mut()
                .for_each(|processor| processor.update(&ctx, shared_callback));
        }

        // Largest shadow maps are allocated first
        let mut order: Vec<usize> = (0..self.light_processors.len()).collect();
        order.sort_by(|&a, &b| {
            let pa = &self.light_processors[a];
            let pb = &self.light_processors[b];
            let size_a = pa.shadow_map_size().as_vec2().length();
            let size_b = pb.shadow_map_size().as_vec2().length();
            size_b.total_cmp(&size_a).then(pa.id().cmp(&pb.id()))
        });

        for index in order {
            let processor = &mut self.light_processors[index];
            processor.end_update(&ctx, callback);
            if processor.has_shadow() {
                self.num_shadowed_lights += 1;
            }
        }

        for processor in &mut self.light_processors {
            for index in processor.take_queued_updates() {
                let center = frame.scene.drawable(index).world_bounds.center();
                self.geometry_distances[index] = camera.distance(center);
                self.queued_shadow_casters.push(index);
            }
        }

        let linear = self.settings.linear_space_lighting;
        self.accumulator_lights
            .extend(self.light_processors.iter().map(|p| LightDataForAccumulator::from_light(p.light(), linear)));
    }

    /// Accumulates forward lights per geometry, then cooks every forward-lit accumulator.
    pub fn process_forward_lighting(&mut self, frame: &FrameInfo<'_>) {
        let num_drawables = self.geometry_lighting.len();

        // Counting sort of (drawable, light) pairs by drawable, lights stay in order
        self.lighting_offsets.clear();
        self.lighting_offsets.resize(num_drawables + 1, 0);
        for processor in &self.light_processors {
            for &index in lit_forward_geometries(processor, &self.geometry_flags) {
                self.lighting_offsets[index + 1] += 1;
            }
        }
        for i in 1..self.lighting_offsets.len() {
            self.lighting_offsets[i] += self.lighting_offsets[i - 1];
        }

        let num_entries = self.lighting_offsets[num_drawables];
        self.lighting_entries.clear();
        self.lighting_entries
            .resize(num_entries, (0, LightImportance::NotImportant, 0.0));
        let mut cursor = self.lighting_offsets.clone();
        for (light_index, processor) in self.light_processors.iter().enumerate() {
            let light = processor.light();
            let importance = if processor.has_shadow() {
                LightImportance::Important
            } else {
                light.light.importance
            };
            for &index in lit_forward_geometries(processor, &self.geometry_flags) {
                let bounds = &frame.scene.drawable(index).world_bounds;
                let penalty = drawable_light_penalty(light, importance, bounds);
                self.lighting_entries[cursor[index]] = (light_index as u32, importance, penalty);
                cursor[index] += 1;
            }
        }

        let ctx = LightAccumulatorContext {
            max_pixel_lights: self.settings.max_pixel_lights,
            max_vertex_lights: self.settings.max_vertex_lights,
            lights: &self.accumulator_lights,
        };
        let offsets = &self.lighting_offsets;
        let entries = &self.lighting_entries;
        let flags = &self.geometry_flags;
        let scene = frame.scene;

        self.geometry_lighting
            .par_iter_mut()
            .enumerate()
            .for_each(|(index, accumulator)| {
                if !flags[index].contains(GeometryRenderFlags::FORWARD_LIT) {
                    return;
                }
                let bounds = &scene.drawable(index).world_bounds;
                for &(light_index, importance, penalty) in &entries[offsets[index]..offsets[index + 1]] {
                    accumulator.accumulate_light(&ctx, bounds, importance, light_index, penalty);
                }
                accumulator.cook();
            });
    }

    pub fn geometry_flags(&self) -> &[GeometryRenderFlags] {
        &self.geometry_flags
    }

    pub fn geometry_z_ranges(&self) -> &[FloatRange] {
        &self.geometry_z_ranges
    }

    /// Distance from the cull camera, for visible drawables and queued shadow casters.
    pub fn geometry_distance(&self, index: DrawableIndex) -> f32 {
        self.geometry_distances.get(index).copied().unwrap_or(0.0)
    }

    pub fn geometry_lighting(&self, index: DrawableIndex) -> Option<&LightAccumulator> {
        self.geometry_lighting.get(index)
    }

    pub fn visible_geometries(&self) -> &[DrawableIndex] {
        &self.visible_geometries
    }

    pub fn scene_z_range(&self) -> FloatRange {
        self.scene_z_range
    }

    pub fn occluders(&self) -> &[DrawableIndex] {
        &self.occluders
    }

    pub fn light_processors(&self) -> &[Box<LightProcessor>] {
        &self.light_processors
    }

    pub fn num_shadowed_lights(&self) -> usize {
        self.num_shadowed_lights
    }

    /// Shadow casters outside the cull camera that were marked for update this frame.
    pub fn queued_shadow_casters(&self) -> &[DrawableIndex] {
        &self.queued_shadow_casters
    }

    pub fn update_flags(&self) -> &DrawableUpdateFlags {
        &self.update_flags
    }

    pub fn light_processor_cache(&self) -> &LightProcessorCache {
        &self.cache
    }
}

/// Geometries `processor` lights per pixel. Directional lights list every lit geometry.
fn lit_forward_geometries<'a>(
    processor: &'a LightProcessor,
    flags: &'a [GeometryRenderFlags],
) -> impl Iterator<Item = &'a DrawableIndex> + 'a {
    let directional = processor.light().light_type() == LightType::Directional;
    processor
        .lit_geometries()
        .iter()
        .filter(move |&&index| !directional || flags[index].contains(GeometryRenderFlags::FORWARD_LIT))
}

fn process_visible_drawable(
    frame: &FrameInfo<'_>,
    index: DrawableIndex,
    passes: &[ScenePass],
    occlusion: Option<&dyn OcclusionBuffer>,
    update_flags: &DrawableUpdateFlags,
    shard: &mut VisibleShard,
) {
    let data = frame.scene.drawable(index);
    let drawable = &data.drawable;
    let bounds = &data.world_bounds;
    let camera = frame.cull_camera;

    // Drawables reported by several cameras are processed once per frame
    if !update_flags.mark(index) {
        return;
    }

    let distance = camera.distance(bounds.center());
    if drawable.draw_distance > 0.0 && distance > drawable.draw_distance {
        return;
    }
    if drawable.occludee {
        if let Some(buffer) = occlusion {
            if !buffer.is_visible(bounds) {
                return;
            }
        }
    }

    let infinite = data.is_infinite();
    let z_range = if infinite {
        FloatRange::new(LARGE_VALUE, LARGE_VALUE)
    } else {
        let center_depth = camera.view_depth(bounds.center());
        let extent = camera.direction().abs().dot(bounds.half_size());
        FloatRange::new(center_depth - extent, center_depth + extent)
    };

    let mut forward_lit = false;
    let mut need_ambient = false;
    for (source_index, source) in drawable.source_batches.iter().enumerate() {
        let material = frame.materials.get(source.material);
        for (pass, batches) in passes.iter().zip(shard.pass_batches.iter_mut()) {
            let result = pass.add_batch(index, source_index, drawable, material, batches);
            forward_lit |= result.forward_lit;
            need_ambient |= result.added && pass.flags().contains(ScenePassFlags::HAS_AMBIENT_LIGHTING);
        }
    }

    let mut flags = GeometryRenderFlags::VISIBLE_IN_CULL_CAMERA;
    if need_ambient {
        flags |= GeometryRenderFlags::LIT;
    }
    if forward_lit {
        flags |= GeometryRenderFlags::FORWARD_LIT;
    }

    shard.geometries.push(VisibleGeometry {
        index,
        flags,
        z_range,
        distance,
        infinite,
    });
}
