use glam::Vec3;

use super::BoundingBox;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Sphere centered on the bounding box of `points`, large enough to contain all of them.
    pub fn enclosing<I>(points: I) -> Sphere
    where
        I: IntoIterator<Item = Vec3> + Clone,
    {
        let center = BoundingBox::from_points(points.clone()).center();
        let radius = points
            .into_iter()
            .map(|point| point.distance(center))
            .fold(0.0, f32::max);
        Sphere { center, radius }
    }

    /// Distance from the sphere surface to `point`, zero when the point is inside.
    pub fn distance(&self, point: Vec3) -> f32 {
        (point.distance(self.center) - self.radius).max(0.0)
    }

    pub fn intersects_box(&self, bbox: &BoundingBox) -> bool {
        bbox.distance_to_point(self.center) <= self.radius
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_center_half_size(self.center, Vec3::splat(self.radius))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enclosing_sphere_contains_all_points() {
        let points = [Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Vec3::new(1.0, 3.0, 0.0)];
        let sphere = Sphere::enclosing(points);
        for point in points {
            assert!(point.distance(sphere.center) <= sphere.radius + 1e-5);
        }
    }

    #[test]
    fn box_intersection_uses_closest_point() {
        let sphere = Sphere::new(Vec3::ZERO, 1.0);
        let near = BoundingBox::new(Vec3::new(0.5, -1.0, -1.0), Vec3::new(2.0, 1.0, 1.0));
        let far = BoundingBox::new(Vec3::new(1.5, 1.5, 1.5), Vec3::splat(2.0));
        assert!(sphere.intersects_box(&near));
        assert!(!sphere.intersects_box(&far));
    }
}
