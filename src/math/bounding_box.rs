use glam::{Mat4, Vec3};

/// Axis-aligned bounding box. An undefined box has `min > max` and merges as an identity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

impl BoundingBox {
    pub const UNDEFINED: Self = Self {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_center_half_size(center: Vec3, half_size: Vec3) -> Self {
        Self {
            min: center - half_size,
            max: center + half_size,
        }
    }

    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        let mut result = Self::UNDEFINED;
        for point in points {
            result.merge_point(point);
        }
        result
    }

    pub fn is_defined(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn half_size(&self) -> Vec3 {
        self.size() * 0.5
    }

    pub fn merge_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn merge(&mut self, other: &BoundingBox) {
        if other.is_defined() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    pub fn intersection(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        }
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Distance from the box surface to `point`, zero when the point is inside.
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        let offset = (self.min - point).max(point - self.max).max(Vec3::ZERO);
        offset.length()
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (min, max) = (self.min, self.max);
        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, max.z),
        ]
    }

    /// Box enclosing this box after an affine transform.
    pub fn transformed(&self, matrix: &Mat4) -> BoundingBox {
        if !self.is_defined() {
            return *self;
        }
        let center = matrix.transform_point3(self.center());
        let half = self.half_size();
        let x = matrix.x_axis.truncate().abs() * half.x;
        let y = matrix.y_axis.truncate().abs() * half.y;
        let z = matrix.z_axis.truncate().abs() * half.z;
        BoundingBox::from_center_half_size(center, x + y + z)
    }

    /// Box of the projected corners, in normalized device coordinates.
    pub fn projected(&self, projection: &Mat4) -> BoundingBox {
        BoundingBox::from_points(
            self.corners()
                .iter()
                .map(|corner| projection.project_point3(*corner)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_box_is_identity_for_merge() {
        let mut bbox = BoundingBox::UNDEFINED;
        assert!(!bbox.is_defined());
        bbox.merge(&BoundingBox::new(Vec3::ZERO, Vec3::ONE));
        assert_eq!(bbox, BoundingBox::new(Vec3::ZERO, Vec3::ONE));
    }

    #[test]
    fn disjoint_intersection_is_undefined() {
        let a = BoundingBox::new(Vec3::ZERO, Vec3::ONE);
        let b = BoundingBox::new(Vec3::splat(2.0), Vec3::splat(3.0));
        assert!(!a.intersects(&b));
        assert!(!a.intersection(&b).is_defined());
    }

    #[test]
    fn transformed_box_encloses_rotated_corners() {
        let bbox = BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let matrix = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_4);
        let result = bbox.transformed(&matrix);
        let expected = 2f32.sqrt();
        assert!((result.max.x - expected).abs() < 1e-5);
        assert!((result.max.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn distance_to_point_outside_and_inside() {
        let bbox = BoundingBox::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(bbox.distance_to_point(Vec3::splat(0.5)), 0.0);
        assert!((bbox.distance_to_point(Vec3::new(3.0, 0.5, 0.5)) - 2.0).abs() < 1e-6);
    }
}
