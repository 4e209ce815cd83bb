use glam::{Mat4, Quat, Vec2, Vec3};

use crate::math::Frustum;

use super::Transform;

pub const DEFAULT_VIEW_MASK: u32 = u32::MAX;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub rotation: Quat,
    pub fov_y_radians: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
    pub orthographic: bool,
    /// Vertical extent of an orthographic view.
    pub ortho_size: f32,
    pub zoom: f32,
    pub view_mask: u32,
    pub use_reflection: bool,
    pub use_clipping: bool,
}

impl Camera {
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Self {
        let transform = Transform::looking_at(eye, target, up);
        Self {
            position: transform.translation,
            rotation: transform.rotation,
            ..Self::default()
        }
    }

    pub fn from_transform(transform: &Transform) -> Self {
        Self {
            position: transform.translation,
            rotation: transform.rotation,
            ..Self::default()
        }
    }

    pub fn world_transform(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }

    pub fn view(&self) -> Mat4 {
        self.world_transform().inverse()
    }

    pub fn proj(&self) -> Mat4 {
        if self.orthographic {
            let half_h = self.ortho_size * 0.5 / self.zoom;
            let half_w = half_h * self.aspect_ratio;
            Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, self.near, self.far)
        } else {
            let fov = 2.0 * ((self.fov_y_radians * 0.5).tan() / self.zoom).atan();
            Mat4::perspective_rh(fov, self.aspect_ratio, self.near, self.far)
        }
    }

    pub fn view_proj(&self) -> Mat4 {
        self.proj() * self.view()
    }

    pub fn direction(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn frustum(&self) -> Frustum {
        self.split_frustum(self.near, self.far)
    }

    /// Frustum between the given view depths, clamped to the camera clip range.
    pub fn split_frustum(&self, near: f32, far: f32) -> Frustum {
        let near = near.max(self.near);
        let far = far.min(self.far).max(near);
        let transform = self.world_transform();
        if self.orthographic {
            Frustum::orthographic(self.ortho_size, self.aspect_ratio, self.zoom, near, far, &transform)
        } else {
            Frustum::perspective(self.fov_y_radians, self.aspect_ratio, self.zoom, near, far, &transform)
        }
    }

    /// Half of the vertical view extent at unit distance, or of the ortho view for orthographic cameras.
    pub fn half_view_size(&self) -> f32 {
        if self.orthographic {
            self.ortho_size * 0.5 / self.zoom
        } else {
            (self.fov_y_radians * 0.5).tan() / self.zoom
        }
    }

    /// Depth of `point` along the view direction.
    pub fn view_depth(&self, point: Vec3) -> f32 {
        (point - self.position).dot(self.direction())
    }

    pub fn distance(&self, point: Vec3) -> f32 {
        if self.orthographic {
            self.view_depth(point).abs()
        } else {
            point.distance(self.position)
        }
    }

    /// Set both ortho extents; the horizontal one becomes part of the aspect ratio.
    pub fn set_ortho_size(&mut self, size: Vec2) {
        self.ortho_size = size.y;
        self.aspect_ratio = size.x / size.y;
    }

    pub fn ortho_extents(&self) -> Vec2 {
        Vec2::new(self.ortho_size * self.aspect_ratio, self.ortho_size)
    }

    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            rotation: Quat::IDENTITY,
            fov_y_radians: 60f32.to_radians(),
            aspect_ratio: 16.0 / 9.0,
            near: 0.1,
            far: 100.0,
            orthographic: false,
            ortho_size: 20.0,
            zoom: 1.0,
            view_mask: DEFAULT_VIEW_MASK,
            use_reflection: false,
            use_clipping: false,
        }
    }
}
