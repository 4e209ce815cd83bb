use crate::math::{BoundingBox, Frustum, Sphere};
use crate::scene::drawable::{DrawableData, DrawableIndex};
use crate::scene::light::LightData;

/// Index of a light inside the frame's scene snapshot.
pub type LightIndex = usize;

/// Read-only spatial access to the drawables and lights of one frame.
pub trait SpatialQuery: Sync {
    /// Appends drawables whose bounds intersect `frustum` and whose view mask overlaps `view_mask`.
    fn query_drawables(&self, frustum: &Frustum, view_mask: u32, out: &mut Vec<DrawableIndex>);
    fn query_drawables_in_sphere(&self, sphere: &Sphere, view_mask: u32, out: &mut Vec<DrawableIndex>);
    fn query_lights(&self, frustum: &Frustum, view_mask: u32, out: &mut Vec<LightIndex>);
    fn query_occluders(&self, frustum: &Frustum, view_mask: u32, out: &mut Vec<DrawableIndex>);

    fn drawable(&self, index: DrawableIndex) -> &DrawableData;
    fn light(&self, index: LightIndex) -> &LightData;
    fn num_drawables(&self) -> usize;
}

/// Software occlusion buffer rendered from occluders.
pub trait OcclusionBuffer: Sync {
    fn is_visible(&self, bbox: &BoundingBox) -> bool;
}
