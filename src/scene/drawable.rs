use glam::{Mat4, Vec3};

use crate::math::{BoundingBox, LARGE_VALUE};
use crate::scene::material::{GeometryId, MaterialId};

/// Index of a drawable inside the frame's [`SceneSnapshot`](crate::scene::SceneSnapshot).
pub type DrawableIndex = usize;

/// One geometry + material pair of a drawable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceBatch {
    pub geometry: GeometryId,
    pub material: MaterialId,
    pub num_triangles: u32,
}

impl SourceBatch {
    pub fn new(geometry: GeometryId, material: MaterialId) -> Self {
        Self {
            geometry,
            material,
            num_triangles: 12,
        }
    }
}

/// Renderable component. Placement comes from the entity transform.
#[derive(Clone, Debug, PartialEq)]
pub struct Drawable {
    pub local_bounds: BoundingBox,
    pub source_batches: Vec<SourceBatch>,
    pub cast_shadows: bool,
    pub occluder: bool,
    pub occludee: bool,
    pub outlined: bool,
    /// 0 disables distance culling.
    pub draw_distance: f32,
    pub shadow_distance: f32,
    pub view_mask: u32,
    pub light_mask: u32,
    pub shadow_mask: u32,
}

impl Default for Drawable {
    fn default() -> Self {
        Self {
            local_bounds: BoundingBox::from_center_half_size(Vec3::ZERO, Vec3::splat(0.5)),
            source_batches: Vec::new(),
            cast_shadows: false,
            occluder: false,
            occludee: true,
            outlined: false,
            draw_distance: 0.0,
            shadow_distance: 0.0,
            view_mask: u32::MAX,
            light_mask: u32::MAX,
            shadow_mask: u32::MAX,
        }
    }
}

impl Drawable {
    pub fn new(local_bounds: BoundingBox) -> Self {
        Self {
            local_bounds,
            ..Self::default()
        }
    }

    pub fn with_batch(mut self, geometry: GeometryId, material: MaterialId) -> Self {
        self.source_batches.push(SourceBatch::new(geometry, material));
        self
    }

    pub fn with_shadows(mut self) -> Self {
        self.cast_shadows = true;
        self
    }

    pub fn as_occluder(mut self) -> Self {
        self.occluder = true;
        self
    }

    pub fn num_triangles(&self) -> u32 {
        self.source_batches.iter().map(|b| b.num_triangles).sum()
    }
}

/// Drawable resolved for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawableData {
    pub drawable: Drawable,
    pub world_transform: Mat4,
    pub world_bounds: BoundingBox,
}

impl DrawableData {
    pub fn new(drawable: Drawable, world_transform: Mat4) -> Self {
        let world_bounds = drawable.local_bounds.transformed(&world_transform);
        Self {
            drawable,
            world_transform,
            world_bounds,
        }
    }

    /// Skyboxes and similar drawables that should never be range culled.
    pub fn is_infinite(&self) -> bool {
        self.world_bounds.half_size().length() >= LARGE_VALUE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_bounds_follow_transform() {
        let data = DrawableData::new(
            Drawable::default(),
            Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)),
        );
        assert_eq!(data.world_bounds.center(), Vec3::new(5.0, 0.0, 0.0));
        assert!(!data.is_infinite());
    }

    #[test]
    fn huge_drawables_are_infinite() {
        let data = DrawableData::new(
            Drawable::new(BoundingBox::from_center_half_size(Vec3::ZERO, Vec3::splat(LARGE_VALUE))),
            Mat4::IDENTITY,
        );
        assert!(data.is_infinite());
    }
}
