use glam::{Mat4, Quat, UVec2, Vec2, Vec3};

use crate::math::{BoundingBox, FloatRange, Frustum, Polyhedron, Sphere, EPSILON};
use crate::renderer::device::TextureId;
use crate::renderer::drawable_processor::GeometryRenderFlags;
use crate::renderer::light_processor::LightProcessorContext;
use crate::scene::{Camera, DrawableIndex, FocusParameters, LightData, LightType};

/// Padding of each cube face inside a point light shadow map, in texels.
pub const CUBE_SHADOW_MAP_PADDING: u32 = 2;

/// Cube face directions, in the order faces are laid out in the shadow map grid.
pub const CUBE_FACE_DIRECTIONS: [Vec3; 6] = [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];

/// Rectangle of a shadow atlas page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShadowMapRegion {
    pub texture: TextureId,
    pub texture_size: UVec2,
    pub min: UVec2,
    pub max: UVec2,
}

impl ShadowMapRegion {
    pub fn is_valid(&self) -> bool {
        self.texture.is_valid() && self.max.x > self.min.x && self.max.y > self.min.y
    }

    pub fn size(&self) -> UVec2 {
        self.max - self.min
    }

    /// Cell `index` of a `grid` laid over this region, row-major.
    pub fn split(&self, index: usize, grid: UVec2) -> ShadowMapRegion {
        let grid = grid.max(UVec2::ONE);
        let cell_size = self.size() / grid;
        let index = index as u32;
        let cell = UVec2::new(index % grid.x, index / grid.x);
        let min = self.min + cell * cell_size;
        ShadowMapRegion {
            min,
            max: min + cell_size,
            ..*self
        }
    }
}

/// Quantized shadow camera view size; returns `size` unchanged when neither
/// non-uniform sizing nor focusing is requested.
pub fn calculate_view_size(size: Vec2, focus: &FocusParameters) -> Vec2 {
    let quantize = focus.quantize.max(EPSILON);
    let snap = |value: f32| {
        let steps = (value / quantize).sqrt().ceil();
        (steps * steps * quantize).max(focus.min_view)
    };

    if focus.non_uniform {
        Vec2::new(snap(size.x), snap(size.y))
    } else if focus.focus {
        Vec2::splat(snap(size.x.max(size.y)))
    } else {
        size
    }
}

/// Shadow camera and casters of one split of one light.
#[derive(Clone, Debug)]
pub struct ShadowSplitProcessor {
    index: usize,
    shadow_camera: Camera,
    cascade_z_range: FloatRange,
    focused_z_range: FloatRange,
    light_space_bounds: BoundingBox,
    shadow_casters: Vec<DrawableIndex>,
    queued_updates: Vec<DrawableIndex>,
    shadow_map: ShadowMapRegion,
    focus: FocusParameters,
}

impl ShadowSplitProcessor {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            shadow_camera: Camera::default(),
            cascade_z_range: FloatRange::INVALID,
            focused_z_range: FloatRange::INVALID,
            light_space_bounds: BoundingBox::UNDEFINED,
            shadow_casters: Vec::new(),
            queued_updates: Vec::new(),
            shadow_map: ShadowMapRegion::default(),
            focus: FocusParameters::default(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn shadow_camera(&self) -> &Camera {
        &self.shadow_camera
    }

    pub fn cascade_z_range(&self) -> FloatRange {
        self.cascade_z_range
    }

    pub fn focused_z_range(&self) -> FloatRange {
        self.focused_z_range
    }

    /// Light-space bounds the shadow camera was fitted to.
    pub fn light_space_bounds(&self) -> BoundingBox {
        self.light_space_bounds
    }

    pub fn shadow_casters(&self) -> &[DrawableIndex] {
        &self.shadow_casters
    }

    pub fn has_shadow_casters(&self) -> bool {
        !self.shadow_casters.is_empty()
    }

    /// Casters outside the cull camera that this split queued for update this frame.
    pub fn take_queued_updates(&mut self) -> Vec<DrawableIndex> {
        std::mem::take(&mut self.queued_updates)
    }

    pub fn shadow_map(&self) -> &ShadowMapRegion {
        &self.shadow_map
    }

    fn reset(&mut self, light: &LightData) {
        self.shadow_casters.clear();
        self.queued_updates.clear();
        self.shadow_map = ShadowMapRegion::default();
        self.light_space_bounds = BoundingBox::UNDEFINED;
        self.focus = light.light.focus;
        self.shadow_camera.zoom = 1.0;
    }

    pub fn initialize_directional(
        &mut self,
        ctx: &LightProcessorContext<'_>,
        light: &LightData,
        cascade_z_range: FloatRange,
        lit_geometries: &[DrawableIndex],
    ) {
        self.reset(light);
        let cull_camera = ctx.cull_camera;

        let extrusion = cull_camera.far.min(light.light.shadow_max_extrusion);
        self.shadow_camera.position = cull_camera.position - light.direction() * extrusion;
        self.shadow_camera.rotation = light.rotation;
        self.shadow_camera.orthographic = true;
        self.shadow_camera.aspect_ratio = 1.0;
        self.shadow_camera.near = 0.0;
        self.shadow_camera.far = cull_camera.far;

        self.cascade_z_range = cascade_z_range;
        self.focused_z_range = if self.focus.focus {
            ctx.scene_z_range.intersection(cascade_z_range)
        } else {
            cascade_z_range
        };
        let split_z_range = if self.focused_z_range.is_valid() {
            self.focused_z_range
        } else {
            cascade_z_range
        };

        let split_frustum = cull_camera.split_frustum(split_z_range.min, split_z_range.max);
        let mut volume = Polyhedron::from_frustum(&split_frustum);

        if self.focus.focus {
            let mut lit_bounds = BoundingBox::UNDEFINED;
            for &index in lit_geometries {
                if ctx.geometry_z_ranges[index].intersects(split_z_range) {
                    lit_bounds.merge(&ctx.scene.drawable(index).world_bounds);
                }
            }
            if lit_bounds.is_defined() {
                let mut clipped = volume.clone();
                clipped.clip_box(&lit_bounds);
                // Empty clip would produce a zero-size shadow volume
                if !clipped.is_empty() {
                    volume = clipped;
                }
            }
        }

        volume.transform(&self.shadow_camera.view());
        let mut light_space_box = volume.bounding_box();
        if !self.focus.non_uniform {
            light_space_box = Sphere::enclosing(volume.vertices()).bounding_box();
        }

        self.shadow_camera.far = (-light_space_box.min.z).max(EPSILON);
        self.light_space_bounds = light_space_box;
        self.adjust_directional_light_camera(&light_space_box, 0);
    }

    /// Fit the ortho view to `light_space_box`, snapping to whole texels once the
    /// shadow map width is known.
    fn adjust_directional_light_camera(&mut self, light_space_box: &BoundingBox, shadow_map_width: u32) {
        let center = light_space_box.center();
        let size = light_space_box.size();
        let view_size = calculate_view_size(Vec2::new(size.x, size.y), &self.focus);
        self.shadow_camera.set_ortho_size(view_size);

        let rotation = self.shadow_camera.rotation;
        self.shadow_camera.translate(rotation * Vec3::new(center.x, center.y, 0.0));

        if shadow_map_width > 2 {
            let view_position = rotation.inverse() * self.shadow_camera.position;
            // Shadow map border texels are never sampled
            let texel_size = view_size / (shadow_map_width - 2) as f32;
            let snap = Vec3::new(
                -(view_position.x % texel_size.x),
                -(view_position.y % texel_size.y),
                0.0,
            );
            self.shadow_camera.translate(rotation * snap);
        }
    }

    pub fn initialize_spot(&mut self, light: &LightData) {
        self.reset(light);
        let range = light.light.range.max(EPSILON);
        self.shadow_camera.position = light.position;
        self.shadow_camera.rotation = light.rotation;
        self.shadow_camera.orthographic = false;
        self.shadow_camera.near = light.light.shadow_near_far_ratio * range;
        self.shadow_camera.far = range;
        self.shadow_camera.fov_y_radians = light.light.fov_radians;
        self.shadow_camera.aspect_ratio = light.light.aspect_ratio;
    }

    /// Faces look along world axes regardless of light rotation.
    pub fn initialize_point(&mut self, light: &LightData, face: usize) {
        self.reset(light);
        let range = light.light.range.max(EPSILON);
        let direction = CUBE_FACE_DIRECTIONS[face % CUBE_FACE_DIRECTIONS.len()];
        self.shadow_camera.position = light.position;
        self.shadow_camera.rotation = Quat::from_rotation_arc(Vec3::NEG_Z, direction);
        self.shadow_camera.orthographic = false;
        self.shadow_camera.near = light.light.shadow_near_far_ratio * range;
        self.shadow_camera.far = range;
        self.shadow_camera.fov_y_radians = 90f32.to_radians();
        self.shadow_camera.aspect_ratio = 1.0;
    }

    pub fn process_directional_shadow_casters(&mut self, ctx: &LightProcessorContext<'_>, light: &LightData) {
        self.shadow_casters.clear();
        if !ctx.scene_z_range.intersects(self.cascade_z_range) {
            return;
        }

        let mut candidates = Vec::new();
        ctx.scene
            .query_drawables(&self.shadow_camera.frustum(), ctx.cull_camera.view_mask, &mut candidates);
        candidates.retain(|&index| {
            let drawable = &ctx.scene.drawable(index).drawable;
            drawable.cast_shadows && drawable.shadow_mask & light.light.light_mask != 0
        });

        let z_range = ctx.scene_z_range.intersection(self.cascade_z_range);
        self.process_shadow_casters(ctx, &candidates, z_range, None);
    }

    pub fn process_spot_shadow_casters(&mut self, ctx: &LightProcessorContext<'_>, candidates: &[DrawableIndex]) {
        self.shadow_casters.clear();
        self.process_shadow_casters(ctx, candidates, ctx.scene_z_range, None);
    }

    /// Skips the face entirely when its frustum cannot be seen by the cull camera.
    pub fn process_point_shadow_casters(&mut self, ctx: &LightProcessorContext<'_>, candidates: &[DrawableIndex]) {
        self.shadow_casters.clear();
        let face_frustum = self.shadow_camera.frustum();
        if !ctx.cull_camera.frustum().intersects_frustum(&face_frustum) {
            return;
        }
        self.process_shadow_casters(ctx, candidates, ctx.scene_z_range, Some(&face_frustum));
    }

    fn process_shadow_casters(
        &mut self,
        ctx: &LightProcessorContext<'_>,
        candidates: &[DrawableIndex],
        z_range: FloatRange,
        face_frustum: Option<&Frustum>,
    ) {
        if !z_range.is_valid() {
            return;
        }

        let light_view = self.shadow_camera.view();
        let light_space_frustum = ctx
            .cull_camera
            .split_frustum(z_range.min, z_range.max)
            .transformed(&light_view);
        if light_space_frustum.is_degenerate() {
            return;
        }
        let light_space_frustum_box = light_space_frustum.bounding_box();

        for &index in candidates {
            let bounds = &ctx.scene.drawable(index).world_bounds;
            if let Some(face) = face_frustum {
                if !face.intersects_box(bounds) {
                    continue;
                }
            }

            let visible_in_cull_camera = ctx.geometry_flags[index].contains(GeometryRenderFlags::VISIBLE_IN_CULL_CAMERA);
            if visible_in_cull_camera
                || self.is_shadow_caster_visible(bounds, &light_view, &light_space_frustum, &light_space_frustum_box)
            {
                self.shadow_casters.push(index);
                if ctx.update_flags.mark(index) {
                    self.queued_updates.push(index);
                }
            }
        }
    }

    /// Whether the shadow of a caster outside the cull camera can land inside it.
    fn is_shadow_caster_visible(
        &self,
        bounds: &BoundingBox,
        light_view: &Mat4,
        light_space_frustum: &Frustum,
        light_space_frustum_box: &BoundingBox,
    ) -> bool {
        let mut light_space_box = bounds.transformed(light_view);

        if self.shadow_camera.orthographic {
            // Extrude to the far edge of the visible volume
            light_space_box.min.z = light_space_box.min.z.min(light_space_frustum_box.min.z);
        } else {
            let center = light_space_box.center();
            let extrusion_distance = self.shadow_camera.far;
            let original_distance = center.length().clamp(EPSILON, extrusion_distance.max(EPSILON));
            let size_factor = extrusion_distance / original_distance;

            let new_center = center.normalize_or_zero() * extrusion_distance;
            let new_half_size = light_space_box.size() * size_factor * 0.5;
            light_space_box.merge(&BoundingBox::new(new_center - new_half_size, new_center + new_half_size));
        }

        light_space_frustum.intersects_box(&light_space_box)
    }

    pub fn finalize_shadow(&mut self, light_type: LightType, region: ShadowMapRegion, pcf_kernel_size: u32) {
        self.shadow_map = region;
        let width = region.size().x;

        if light_type == LightType::Directional {
            let half_extents = self.shadow_camera.ortho_extents() * 0.5;
            let shadow_box = BoundingBox::new(
                Vec3::new(-half_extents.x, -half_extents.y, 0.0),
                Vec3::new(half_extents.x, half_extents.y, 0.0),
            );
            self.adjust_directional_light_camera(&shadow_box, width);
        }

        let padding = if light_type == LightType::Point {
            CUBE_SHADOW_MAP_PADDING
        } else {
            (1 + pcf_kernel_size / 2).min(4)
        };
        if width > 2 * padding {
            self.shadow_camera.zoom = (width - 2 * padding) as f32 / width as f32;
        }
    }

    /// World to shadow map UV + depth, with optional sub-texel offset.
    pub fn world_to_shadow_space_matrix(&self, sub_pixel_offset: f32) -> Mat4 {
        if !self.shadow_map.is_valid() {
            return Mat4::IDENTITY;
        }

        let texture_size = self.shadow_map.texture_size.as_vec2();
        let viewport_min = self.shadow_map.min.as_vec2();
        let viewport_size = self.shadow_map.size().as_vec2();

        let scale = Vec2::new(0.5, -0.5) * viewport_size / texture_size;
        let offset = viewport_min / texture_size + viewport_size * 0.5 / texture_size - Vec2::splat(sub_pixel_offset) / texture_size;

        let tex_adjust = Mat4::from_translation(offset.extend(0.0)) * Mat4::from_scale(scale.extend(1.0));
        tex_adjust * self.shadow_camera.proj() * self.shadow_camera.view()
    }

    /// World-space size of one shadow map texel at the far plane.
    pub fn shadow_map_texel_size_in_world_space(&self) -> f32 {
        let width = self.shadow_map.size().x.max(1) as f32;
        if self.shadow_camera.orthographic {
            self.shadow_camera.ortho_size / self.shadow_camera.zoom / width
        } else {
            2.0 * (self.shadow_camera.fov_y_radians * 0.5).tan() * self.shadow_camera.far / width
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_size_is_quantized_and_stable() {
        let focus = FocusParameters::default();
        let size = calculate_view_size(Vec2::new(7.3, 1.0), &focus);
        // ceil(sqrt(7.3 / 0.5))^2 * 0.5 = 16 * 0.5
        assert_eq!(size, Vec2::new(8.0, 3.0));
        assert_eq!(calculate_view_size(Vec2::new(7.3, 1.0), &focus), size);
        assert_eq!(calculate_view_size(Vec2::new(8.0, 2.0), &focus), size);
    }

    #[test]
    fn uniform_focus_produces_square_view() {
        let focus = FocusParameters {
            non_uniform: false,
            ..FocusParameters::default()
        };
        assert_eq!(calculate_view_size(Vec2::new(7.3, 1.0), &focus), Vec2::splat(8.0));

        let unfocused = FocusParameters {
            non_uniform: false,
            focus: false,
            ..FocusParameters::default()
        };
        assert_eq!(calculate_view_size(Vec2::new(7.3, 1.0), &unfocused), Vec2::new(7.3, 1.0));
    }

    #[test]
    fn region_split_is_row_major() {
        let region = ShadowMapRegion {
            texture: TextureId(1),
            texture_size: UVec2::splat(2048),
            min: UVec2::new(512, 0),
            max: UVec2::new(512 + 768, 512),
        };
        let cell = region.split(4, UVec2::new(3, 2));
        assert_eq!(cell.min, UVec2::new(512 + 256, 256));
        assert_eq!(cell.size(), UVec2::splat(256));
        assert_eq!(region.split(0, UVec2::ONE), region);
    }

    #[test]
    fn spot_shadow_camera_uses_light_cone() {
        use crate::scene::{Light, LightId};
        let light = LightData::new(LightId(3), Light::spot(20.0, 45f32.to_radians()), Vec3::ONE, Quat::IDENTITY);
        let mut split = ShadowSplitProcessor::new(0);
        split.initialize_spot(&light);
        let camera = split.shadow_camera();
        assert!((camera.near - 0.04).abs() < 1e-6);
        assert_eq!(camera.far, 20.0);
        assert_eq!(camera.fov_y_radians, 45f32.to_radians());
        assert!(!camera.orthographic);
    }

    #[test]
    fn point_faces_follow_world_axes() {
        use crate::scene::{Light, LightId};
        let rotated = Quat::from_rotation_y(1.0);
        let light = LightData::new(LightId(4), Light::point(10.0), Vec3::ZERO, rotated);
        let mut split = ShadowSplitProcessor::new(0);
        for (face, direction) in CUBE_FACE_DIRECTIONS.iter().enumerate() {
            split.initialize_point(&light, face);
            assert!((split.shadow_camera().direction() - *direction).length() < 1e-5);
        }
    }

    #[test]
    fn shadow_matrix_maps_camera_center_into_region() {
        use crate::scene::{Light, LightId};
        let light = LightData::new(LightId(5), Light::spot(10.0, 60f32.to_radians()), Vec3::ZERO, Quat::IDENTITY);
        let mut split = ShadowSplitProcessor::new(0);
        split.initialize_spot(&light);
        let region = ShadowMapRegion {
            texture: TextureId(1),
            texture_size: UVec2::splat(1024),
            min: UVec2::new(512, 0),
            max: UVec2::new(1024, 512),
        };
        split.finalize_shadow(LightType::Spot, region, 1);

        let uv = split
            .world_to_shadow_space_matrix(0.0)
            .project_point3(Vec3::new(0.0, 0.0, -5.0));
        assert!((uv.x - 0.75).abs() < 1e-4);
        assert!((uv.y - 0.25).abs() < 1e-4);
        assert!(uv.z > 0.0 && uv.z < 1.0);
    }
}
