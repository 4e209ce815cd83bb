use glam::{Mat4, Vec3};

use super::{BoundingBox, Sphere};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intersection {
    Outside,
    Intersects,
    Inside,
}

/// Plane in the form `normal.dot(p) + d = 0`, with `normal` pointing to the positive half-space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    pub fn from_normal_point(normal: Vec3, point: Vec3) -> Self {
        Self {
            normal,
            d: -normal.dot(point),
        }
    }

    pub fn from_points(a: Vec3, b: Vec3, c: Vec3) -> Self {
        let normal = (b - a).cross(c - a).normalize_or_zero();
        Self::from_normal_point(normal, a)
    }

    pub fn distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }

    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            d: -self.d,
        }
    }
}

pub const NUM_FRUSTUM_PLANES: usize = 6;
pub const NUM_FRUSTUM_VERTICES: usize = 8;

/// Convex frustum described by inward-facing planes and its eight corners.
/// Vertices 0..4 lie on the near plane and 4..8 on the far plane, in matching order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; NUM_FRUSTUM_PLANES],
    pub vertices: [Vec3; NUM_FRUSTUM_VERTICES],
}

impl Frustum {
    /// Frustum with the given near and far half extents, looking down -Z in local space.
    pub fn from_extents(near: f32, near_half: (f32, f32), far: f32, far_half: (f32, f32), transform: &Mat4) -> Self {
        let (nw, nh) = near_half;
        let (fw, fh) = far_half;
        let local = [
            Vec3::new(nw, nh, -near),
            Vec3::new(nw, -nh, -near),
            Vec3::new(-nw, -nh, -near),
            Vec3::new(-nw, nh, -near),
            Vec3::new(fw, fh, -far),
            Vec3::new(fw, -fh, -far),
            Vec3::new(-fw, -fh, -far),
            Vec3::new(-fw, fh, -far),
        ];
        Self::from_vertices(local.map(|v| transform.transform_point3(v)))
    }

    pub fn perspective(fov_y_radians: f32, aspect: f32, zoom: f32, near: f32, far: f32, transform: &Mat4) -> Self {
        let half_h = (fov_y_radians * 0.5).tan() / zoom;
        let half_w = half_h * aspect;
        Self::from_extents(
            near,
            (near * half_w, near * half_h),
            far,
            (far * half_w, far * half_h),
            transform,
        )
    }

    pub fn orthographic(ortho_size: f32, aspect: f32, zoom: f32, near: f32, far: f32, transform: &Mat4) -> Self {
        let half_h = ortho_size * 0.5 / zoom;
        let half_w = half_h * aspect;
        Self::from_extents(near, (half_w, half_h), far, (half_w, half_h), transform)
    }

    pub fn from_vertices(vertices: [Vec3; NUM_FRUSTUM_VERTICES]) -> Self {
        let v = &vertices;
        let center = v.iter().copied().sum::<Vec3>() / NUM_FRUSTUM_VERTICES as f32;
        let facing_center = |plane: Plane| {
            if plane.distance(center) < 0.0 {
                plane.flipped()
            } else {
                plane
            }
        };
        // Side planes use two far corners so a collapsed near face still yields valid planes.
        let far = facing_center(Plane::from_points(v[4], v[5], v[6]));
        let near = facing_center(Plane::from_normal_point(-far.normal, v[0]));
        let sides = [(v[2], v[6], v[7]), (v[0], v[4], v[5]), (v[3], v[7], v[4]), (v[1], v[5], v[6])]
            .map(|(a, b, c)| facing_center(Plane::from_points(a, b, c)));
        Self {
            planes: [near, far, sides[0], sides[1], sides[2], sides[3]],
            vertices,
        }
    }

    pub fn transformed(&self, matrix: &Mat4) -> Frustum {
        Frustum::from_vertices(self.vertices.map(|v| matrix.transform_point3(v)))
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.vertices)
    }

    /// Whether the near and far faces collapsed into one.
    pub fn is_degenerate(&self) -> bool {
        self.vertices[0] == self.vertices[4]
    }

    pub fn is_inside_box(&self, bbox: &BoundingBox) -> Intersection {
        let mut all_inside = true;
        for plane in &self.planes {
            let positive = Vec3::select(plane.normal.cmpge(Vec3::ZERO), bbox.max, bbox.min);
            if plane.distance(positive) < 0.0 {
                return Intersection::Outside;
            }
            let negative = Vec3::select(plane.normal.cmpge(Vec3::ZERO), bbox.min, bbox.max);
            if plane.distance(negative) < 0.0 {
                all_inside = false;
            }
        }
        if all_inside {
            Intersection::Inside
        } else {
            Intersection::Intersects
        }
    }

    /// Conservative box test that never reports `Inside`.
    pub fn is_inside_box_fast(&self, bbox: &BoundingBox) -> Intersection {
        for plane in &self.planes {
            let positive = Vec3::select(plane.normal.cmpge(Vec3::ZERO), bbox.max, bbox.min);
            if plane.distance(positive) < 0.0 {
                return Intersection::Outside;
            }
        }
        Intersection::Intersects
    }

    pub fn intersects_box(&self, bbox: &BoundingBox) -> bool {
        self.is_inside_box_fast(bbox) != Intersection::Outside
    }

    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance(sphere.center) >= -sphere.radius)
    }

    /// Separating plane test between two convex frustums. Conservative: may report an
    /// intersection for frustums that are close but disjoint.
    pub fn intersects_frustum(&self, other: &Frustum) -> bool {
        let separated_by = |planes: &[Plane], vertices: &[Vec3]| {
            planes
                .iter()
                .any(|plane| vertices.iter().all(|v| plane.distance(*v) < 0.0))
        };
        !separated_by(&self.planes, &other.vertices) && !separated_by(&other.planes, &self.vertices)
    }

    /// Distance from the frustum to `point`, zero when the point is inside.
    pub fn distance(&self, point: Vec3) -> f32 {
        self.planes
            .iter()
            .map(|plane| -plane.distance(point))
            .fold(0.0, f32::max)
    }
}
