use std::sync::Arc;

use glam::UVec2;
use log::{error, info, trace, warn};

use crate::error::PipelineError;
use crate::renderer::batch_compositor::BatchCompositor;
use crate::renderer::batch_renderer::{BatchRenderStats, BatchRenderer};
use crate::renderer::device::{GraphicsDevice, PassTarget};
use crate::renderer::drawable_processor::{DrawableProcessor, DrawableProcessorSettings, FrameInfo};
use crate::renderer::light_processor::LightProcessorCallback;
use crate::renderer::lights::LightShaderParamsRaw;
use crate::renderer::scene_pass::ScenePassFlags;
use crate::renderer::shadow_atlas::ShadowAtlas;
use crate::renderer::shadow_split::ShadowMapRegion;
use crate::scene::{Camera, LightData, LightImportance, LightType, OcclusionBuffer, SceneSnapshot, SpatialQuery};
use crate::settings::PipelineSettings;

pub const MAX_RENDER_CAMERAS: usize = 2;

/// Smallest shadow map split handed out, in texels.
pub const SHADOW_MIN_PIXELS: u32 = 64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderPipelineStats {
    pub num_lights: usize,
    pub num_shadowed_lights: usize,
    pub num_geometries: usize,
    pub num_occluders: usize,
    pub num_batches: usize,
    pub num_draw_calls: usize,
    pub num_batches_submitted: usize,
    pub num_batches_skipped: usize,
}

/// Shadow policy and atlas access for one frame.
struct FrameCallback<'a> {
    settings: &'a PipelineSettings,
    camera: &'a Camera,
    atlas: &'a mut ShadowAtlas,
    device: &'a mut dyn GraphicsDevice,
}

impl FrameCallback<'_> {
    /// Fraction of the screen covered by the light volume, 1 when the camera is inside.
    fn projected_light_size(&self, light: &LightData) -> f32 {
        let bounds = match light.light_type() {
            LightType::Directional => return 1.0,
            LightType::Spot => light.frustum().bounding_box(),
            LightType::Point => light.sphere().bounding_box(),
        };
        if bounds.contains_point(self.camera.position)
            || bounds.corners().iter().any(|&corner| self.camera.view_depth(corner) <= self.camera.near)
        {
            return 1.0;
        }

        let projected = bounds.projected(&self.camera.view_proj());
        let size = projected.size();
        (size.x.max(size.y) * 0.5).clamp(0.0, 1.0)
    }
}

impl LightProcessorCallback for FrameCallback<'_> {
    fn is_light_shadowed(&self, light: &LightData) -> bool {
        let params = &light.light;
        self.settings.enable_shadows
            && params.cast_shadows
            && params.importance != LightImportance::NotImportant
            && params.shadow_intensity < 1.0
            && (params.shadow_distance <= 0.0 || light.distance < params.shadow_distance)
    }

    fn shadow_map_size(&self, light: &LightData, num_active_splits: usize) -> u32 {
        let page_size = self.atlas.page_size();
        let max_size = match light.light_type() {
            LightType::Directional => {
                let page_limit = if num_active_splits > 1 { page_size / 2 } else { page_size };
                self.settings.directional_shadow_size.min(page_limit)
            }
            LightType::Spot => self.settings.spot_shadow_size.min(page_size),
            LightType::Point => self.settings.point_shadow_size.min(page_size / 4),
        };

        let mut size = max_size as f32 * light.light.shadow_resolution;
        if light.light.focus.auto_size {
            size *= self.projected_light_size(light);
        }

        (size.max(1.0) as u32).next_power_of_two().max(SHADOW_MIN_PIXELS).min(max_size)
    }

    fn allocate_transient_shadow_map(&mut self, size: UVec2) -> ShadowMapRegion {
        self.atlas.allocate(size, &mut *self.device)
    }
}

/// Runs the whole per-frame pipeline for one or two render cameras: drawable and
/// light processing, batch composition and submission.
pub struct SceneProcessor {
    settings: PipelineSettings,
    cameras: Vec<Camera>,
    thread_pool: Option<Arc<rayon::ThreadPool>>,
    occlusion_buffer: Option<Box<dyn OcclusionBuffer + Send>>,

    drawable_processor: DrawableProcessor,
    batch_compositor: BatchCompositor,
    batch_renderer: BatchRenderer,
    shadow_atlas: ShadowAtlas,
    instancing: bool,

    drawables: Vec<usize>,
    occluder_candidates: Vec<usize>,
    lights: Vec<usize>,
    stats: RenderPipelineStats,
}

impl SceneProcessor {
    pub fn new(settings: PipelineSettings) -> Self {
        let settings = settings.validate();
        info!("Scene processor using {:?} lighting", settings.lighting_mode);
        Self {
            drawable_processor: DrawableProcessor::new(DrawableProcessorSettings::from(&settings)),
            batch_compositor: BatchCompositor::new(
                settings.lighting_mode,
                BatchCompositor::default_passes(settings.lighting_mode),
            ),
            batch_renderer: BatchRenderer::new(),
            shadow_atlas: ShadowAtlas::new(settings.shadow_atlas_page_size, 1),
            instancing: settings.enable_instancing,
            settings,
            cameras: Vec::new(),
            thread_pool: None,
            occlusion_buffer: None,
            drawables: Vec::new(),
            occluder_candidates: Vec::new(),
            lights: Vec::new(),
            stats: RenderPipelineStats::default(),
        }
    }

    /// Runs the parallel phases on `pool` instead of the global rayon pool.
    pub fn with_thread_pool(mut self, pool: Arc<rayon::ThreadPool>) -> Self {
        self.thread_pool = Some(pool);
        self
    }

    pub fn set_occlusion_buffer(&mut self, buffer: Option<Box<dyn OcclusionBuffer + Send>>) {
        self.occlusion_buffer = buffer;
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: PipelineSettings) {
        let settings = settings.validate();
        if settings.lighting_mode != self.settings.lighting_mode {
            info!("Switching to {:?} lighting", settings.lighting_mode);
            self.batch_compositor = BatchCompositor::new(
                settings.lighting_mode,
                BatchCompositor::default_passes(settings.lighting_mode),
            );
        }
        self.drawable_processor
            .set_settings(DrawableProcessorSettings::from(&settings));
        self.shadow_atlas.set_page_size(settings.shadow_atlas_page_size);
        self.settings = settings;
    }

    /// Sets the render cameras. The first one is the cull camera; all of them must
    /// agree on projection type, reflection and clipping.
    pub fn define(&mut self, cameras: &[Camera]) -> Result<(), PipelineError> {
        let Some(first) = cameras.first() else {
            return Err(PipelineError::NoCamera);
        };
        if cameras.len() > MAX_RENDER_CAMERAS {
            return Err(PipelineError::TooManyCameras {
                count: cameras.len(),
                max: MAX_RENDER_CAMERAS,
            });
        }

        for (index, camera) in cameras.iter().enumerate().skip(1) {
            let reason = if camera.orthographic != first.orthographic {
                Some("orthographic flag differs")
            } else if camera.use_reflection != first.use_reflection {
                Some("reflection flag differs")
            } else if camera.use_clipping != first.use_clipping {
                Some("clipping flag differs")
            } else {
                None
            };
            if let Some(reason) = reason {
                error!("Render camera {} does not match the first camera: {}", index, reason);
                debug_assert!(false, "render cameras must share projection, reflection and clipping");
                return Err(PipelineError::CameraMismatch { index, reason });
            }
        }

        self.cameras.clear();
        self.cameras.extend_from_slice(cameras);
        Ok(())
    }

    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    pub fn drawable_processor(&self) -> &DrawableProcessor {
        &self.drawable_processor
    }

    pub fn batch_compositor(&self) -> &BatchCompositor {
        &self.batch_compositor
    }

    pub fn shadow_atlas(&self) -> &ShadowAtlas {
        &self.shadow_atlas
    }

    pub fn stats(&self) -> RenderPipelineStats {
        self.stats
    }

    /// Processes one frame of `scene` up to sorted pipeline batches. Shadow atlas pages
    /// and pipeline states are created on `device` as needed.
    pub fn update(&mut self, scene: &SceneSnapshot, time_step: f32, device: &mut dyn GraphicsDevice) {
        match self.thread_pool.clone() {
            Some(pool) => pool.install(|| self.update_frame(scene, time_step, device)),
            None => self.update_frame(scene, time_step, device),
        }
    }

    fn update_frame(&mut self, scene: &SceneSnapshot, time_step: f32, device: &mut dyn GraphicsDevice) {
        let Some(&camera) = self.cameras.first() else {
            warn!("Scene processor updated without a render camera");
            return;
        };

        let capabilities = device.capabilities();
        self.instancing = self.settings.enable_instancing && capabilities.supports_instancing;
        self.shadow_atlas.set_max_pages(capabilities.max_shadow_atlas_pages);
        self.shadow_atlas.reset();
        self.stats = RenderPipelineStats::default();

        let frame = FrameInfo {
            time_step,
            cull_camera: &camera,
            scene,
            materials: &scene.materials,
            ambient_color: scene.ambient_color,
        };
        self.drawable_processor.on_update_begin(&frame);

        self.drawables.clear();
        self.lights.clear();
        self.occluder_candidates.clear();
        for render_camera in &self.cameras {
            let frustum = render_camera.frustum();
            scene.query_drawables(&frustum, render_camera.view_mask, &mut self.drawables);
            scene.query_lights(&frustum, render_camera.view_mask, &mut self.lights);
        }
        if self.cameras.len() > 1 {
            self.drawables.sort_unstable();
            self.drawables.dedup();
            self.lights.sort_unstable();
            self.lights.dedup();
        }

        let occlusion = match &self.occlusion_buffer {
            Some(buffer) => {
                scene.query_occluders(&camera.frustum(), camera.view_mask, &mut self.occluder_candidates);
                self.drawable_processor.process_occluders(
                    &frame,
                    &self.occluder_candidates,
                    self.settings.occluder_size_threshold,
                );
                Some(buffer.as_ref() as &dyn OcclusionBuffer)
            }
            None => None,
        };

        self.drawable_processor.process_visible_drawables(
            &frame,
            &self.drawables,
            self.batch_compositor.passes_mut(),
            occlusion,
        );

        let mut callback = FrameCallback {
            settings: &self.settings,
            camera: &camera,
            atlas: &mut self.shadow_atlas,
            device: &mut *device,
        };
        self.drawable_processor
            .process_lights(&frame, &self.lights, &mut callback);
        self.drawable_processor.process_forward_lighting(&frame);

        self.batch_compositor.compose(
            &frame,
            &self.drawable_processor,
            self.settings.pipeline_state_hash(),
            self.instancing,
            device,
        );

        self.stats.num_lights = self.drawable_processor.light_processors().len();
        self.stats.num_shadowed_lights = self.drawable_processor.num_shadowed_lights();
        self.stats.num_geometries = self.drawable_processor.visible_geometries().len();
        self.stats.num_occluders = self.drawable_processor.occluders().len();
        self.stats.num_batches = self.batch_compositor.num_batches();

        trace!(
            "Frame: {} geometries, {} lights ({} shadowed), {} batches",
            self.stats.num_geometries,
            self.stats.num_lights,
            self.stats.num_shadowed_lights,
            self.stats.num_batches
        );
    }

    /// Uploads light parameters and submits the batches composed by the last
    /// [`update`](Self::update): shadow splits first, then scene passes in order, with
    /// light volumes right after the deferred pass.
    pub fn render(&mut self, device: &mut dyn GraphicsDevice) -> RenderPipelineStats {
        let linear = self.settings.linear_space_lighting;
        let lights: Vec<LightShaderParamsRaw> = self
            .drawable_processor
            .light_processors()
            .iter()
            .map(|processor| processor.cooked_params().to_raw(linear))
            .collect();
        device.upload_lights(&lights);

        let mut batch_stats = BatchRenderStats::default();
        for split in self.batch_compositor.shadow_batches() {
            let target = PassTarget::ShadowSplit { region: split.region };
            batch_stats.merge(
                self.batch_renderer
                    .render_batches(device, &target, &split.batches, self.instancing),
            );
        }

        let passes = self.batch_compositor.passes();
        for (pass, batches) in passes.iter().zip(self.batch_compositor.scene_batches()) {
            let instancing = self.instancing && !pass.flags().contains(ScenePassFlags::DISABLE_INSTANCING);
            let target = PassTarget::Scene {
                pass_name: pass.name().to_string(),
            };
            batch_stats.merge(self.batch_renderer.render_batches(device, &target, batches, instancing));

            if pass.is_deferred() {
                batch_stats.merge(self.batch_renderer.render_batches(
                    device,
                    &PassTarget::LightVolumes,
                    self.batch_compositor.light_volume_batches(),
                    false,
                ));
            }
        }

        self.stats.num_draw_calls = batch_stats.draw_calls;
        self.stats.num_batches_submitted = batch_stats.batches_submitted;
        self.stats.num_batches_skipped = batch_stats.batches_skipped;
        self.stats
    }
}
