use glam::{Mat4, Vec3};

use super::{BoundingBox, Frustum, Plane};

/// Convex polyhedron stored as a list of planar polygon faces.
#[derive(Clone, Debug, Default)]
pub struct Polyhedron {
    pub faces: Vec<Vec<Vec3>>,
}

impl Polyhedron {
    pub fn from_frustum(frustum: &Frustum) -> Self {
        let v = &frustum.vertices;
        let faces = vec![
            vec![v[0], v[1], v[2], v[3]],
            vec![v[4], v[5], v[6], v[7]],
            vec![v[3], v[2], v[6], v[7]],
            vec![v[0], v[1], v[5], v[4]],
            vec![v[0], v[3], v[7], v[4]],
            vec![v[1], v[2], v[6], v[5]],
        ];
        Self { faces }
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn vertices(&self) -> impl Iterator<Item = Vec3> + Clone + '_ {
        self.faces.iter().flatten().copied()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.vertices())
    }

    pub fn transform(&mut self, matrix: &Mat4) {
        for vertex in self.faces.iter_mut().flatten() {
            *vertex = matrix.transform_point3(*vertex);
        }
    }

    /// Keep only the part on the positive side of `plane`, closing the cut with a new face.
    pub fn clip_plane(&mut self, plane: &Plane) {
        let mut cut_points: Vec<Vec3> = Vec::new();
        let mut clipped_faces = Vec::with_capacity(self.faces.len() + 1);

        for face in &self.faces {
            let mut clipped = Vec::with_capacity(face.len() + 1);
            let Some(&last) = face.last() else {
                continue;
            };
            let mut prev = last;
            let mut prev_distance = plane.distance(prev);
            for &current in face {
                let distance = plane.distance(current);
                if (distance >= 0.0) != (prev_distance >= 0.0) {
                    let t = prev_distance / (prev_distance - distance);
                    let point = prev.lerp(current, t);
                    clipped.push(point);
                    cut_points.push(point);
                }
                if distance >= 0.0 {
                    if distance == 0.0 {
                        cut_points.push(current);
                    }
                    clipped.push(current);
                }
                prev = current;
                prev_distance = distance;
            }
            if clipped.len() >= 3 {
                clipped_faces.push(clipped);
            }
        }

        dedup_points(&mut cut_points);
        if cut_points.len() >= 3 && !clipped_faces.is_empty() {
            sort_around_centroid(&mut cut_points, plane.normal);
            clipped_faces.push(cut_points);
        }

        self.faces = clipped_faces;
    }

    pub fn clip_box(&mut self, bbox: &BoundingBox) {
        let planes = [
            Plane::from_normal_point(Vec3::X, bbox.min),
            Plane::from_normal_point(Vec3::NEG_X, bbox.max),
            Plane::from_normal_point(Vec3::Y, bbox.min),
            Plane::from_normal_point(Vec3::NEG_Y, bbox.max),
            Plane::from_normal_point(Vec3::Z, bbox.min),
            Plane::from_normal_point(Vec3::NEG_Z, bbox.max),
        ];
        for plane in &planes {
            if self.is_empty() {
                break;
            }
            self.clip_plane(plane);
        }
    }
}

fn dedup_points(points: &mut Vec<Vec3>) {
    const WELD_DISTANCE_SQ: f32 = 1e-10;
    let mut unique: Vec<Vec3> = Vec::with_capacity(points.len());
    for &point in points.iter() {
        if !unique.iter().any(|u| u.distance_squared(point) < WELD_DISTANCE_SQ) {
            unique.push(point);
        }
    }
    *points = unique;
}

fn sort_around_centroid(points: &mut [Vec3], normal: Vec3) {
    let centroid = points.iter().copied().sum::<Vec3>() / points.len() as f32;
    let (tangent, bitangent) = normal.any_orthonormal_pair();
    points.sort_by(|a, b| {
        let da = *a - centroid;
        let db = *b - centroid;
        let angle_a = da.dot(bitangent).atan2(da.dot(tangent));
        let angle_b = db.dot(bitangent).atan2(db.dot(tangent));
        angle_a.total_cmp(&angle_b)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_cube_frustum() -> Frustum {
        Frustum::orthographic(2.0, 1.0, 1.0, 0.0, 2.0, &Mat4::from_translation(Vec3::new(0.0, 0.0, 1.0)))
    }

    #[test]
    fn frustum_polyhedron_matches_frustum_box() {
        let frustum = unit_cube_frustum();
        let poly = Polyhedron::from_frustum(&frustum);
        assert_eq!(poly.bounding_box(), frustum.bounding_box());
    }

    #[test]
    fn clip_by_box_shrinks_to_overlap() {
        let mut poly = Polyhedron::from_frustum(&unit_cube_frustum());
        poly.clip_box(&BoundingBox::new(Vec3::ZERO, Vec3::splat(5.0)));
        let bbox = poly.bounding_box();
        assert!(bbox.min.abs_diff_eq(Vec3::ZERO, 1e-5));
        assert!(bbox.max.abs_diff_eq(Vec3::ONE, 1e-5));
    }

    #[test]
    fn clip_by_disjoint_box_empties() {
        let mut poly = Polyhedron::from_frustum(&unit_cube_frustum());
        poly.clip_box(&BoundingBox::new(Vec3::splat(10.0), Vec3::splat(11.0)));
        assert!(poly.is_empty());
    }
}
