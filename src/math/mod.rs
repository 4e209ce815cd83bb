//! Geometry primitives shared by the culling, lighting and shadow code.

mod bounding_box;
mod frustum;
pub mod hash;
mod polyhedron;
mod range;
mod sphere;
mod spherical_harmonics;

pub use bounding_box::BoundingBox;
pub use frustum::{Frustum, Intersection, Plane};
pub use polyhedron::Polyhedron;
pub use range::FloatRange;
pub use sphere::Sphere;
pub use spherical_harmonics::SphericalHarmonicsDot9;

/// Extent that is treated as "infinite" by culling and Z range computation.
pub const LARGE_VALUE: f32 = 100_000_000.0;
pub const LARGE_EPSILON: f32 = 0.00005;
pub const EPSILON: f32 = 0.000001;

/// Round `value` to the closest multiple of `step`.
pub fn snap_round(value: f32, step: f32) -> f32 {
    (value / step).round() * step
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snap_round_uses_closest_multiple() {
        assert!((snap_round(1.26, 0.1) - 1.3).abs() < 1e-6);
        assert!((snap_round(1.24, 0.1) - 1.2).abs() < 1e-6);
        assert_eq!(snap_round(0.0, 0.1), 0.0);
    }
}
