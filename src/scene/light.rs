use glam::{Mat4, Quat, Vec3};

use crate::math::{BoundingBox, Frustum, Sphere, EPSILON};

pub const MAX_CASCADE_SPLITS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LightType {
    Directional,
    Spot,
    Point,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LightImportance {
    /// Always evaluated per pixel.
    Important,
    /// Per pixel while slots remain, otherwise per vertex.
    Auto,
    /// Per vertex or folded into ambient.
    NotImportant,
}

/// Stable identity of a light across frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LightId(pub u64);

/// Directional light cascade split distances, in view depth.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CascadeParameters {
    pub splits: [f32; MAX_CASCADE_SPLITS],
    /// Fraction of the shadow range where the shadow starts fading out.
    pub fade_start: f32,
    /// How strongly depth bias is scaled up for the farther cascades.
    pub bias_auto_adjust: f32,
}

impl Default for CascadeParameters {
    fn default() -> Self {
        Self {
            splits: [1000.0, 0.0, 0.0, 0.0],
            fade_start: 0.8,
            bias_auto_adjust: 1.0,
        }
    }
}

impl CascadeParameters {
    pub fn new(splits: [f32; MAX_CASCADE_SPLITS]) -> Self {
        Self {
            splits,
            ..Self::default()
        }
    }

    /// Number of leading splits with increasing distances.
    pub fn num_splits(&self) -> usize {
        let mut count = 1;
        while count < MAX_CASCADE_SPLITS && self.splits[count] > self.splits[count - 1] {
            count += 1;
        }
        count
    }

    pub fn shadow_range(&self) -> f32 {
        self.splits.iter().copied().fold(0.0, f32::max)
    }
}

/// Shadow camera focusing and quantization.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FocusParameters {
    pub focus: bool,
    pub non_uniform: bool,
    pub auto_size: bool,
    pub quantize: f32,
    pub min_view: f32,
}

impl Default for FocusParameters {
    fn default() -> Self {
        Self {
            focus: true,
            non_uniform: true,
            auto_size: true,
            quantize: 0.5,
            min_view: 3.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiasParameters {
    pub constant_bias: f32,
    pub slope_scaled_bias: f32,
    pub normal_offset: f32,
}

impl Default for BiasParameters {
    fn default() -> Self {
        Self {
            constant_bias: 0.0002,
            slope_scaled_bias: 0.5,
            normal_offset: 0.0,
        }
    }
}

/// Light component. Position and orientation come from the entity transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub light_type: LightType,
    pub color: Vec3,
    pub brightness: f32,
    pub specular_intensity: f32,
    pub range: f32,
    pub fov_radians: f32,
    pub aspect_ratio: f32,
    pub importance: LightImportance,
    pub cast_shadows: bool,
    /// Light left inside the shadow; 0 is fully dark, 1 disables the shadow.
    pub shadow_intensity: f32,
    pub shadow_distance: f32,
    pub shadow_fade_distance: f32,
    pub shadow_resolution: f32,
    pub shadow_near_far_ratio: f32,
    pub shadow_max_extrusion: f32,
    pub cascade: CascadeParameters,
    pub focus: FocusParameters,
    pub bias: BiasParameters,
    pub draw_distance: f32,
    pub fade_distance: f32,
    pub light_mask: u32,
    pub view_mask: u32,
    /// Color is given in linear space and brightness in physical units.
    pub use_physical_values: bool,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            light_type: LightType::Point,
            color: Vec3::ONE,
            brightness: 1.0,
            specular_intensity: 1.0,
            range: 10.0,
            fov_radians: 30f32.to_radians(),
            aspect_ratio: 1.0,
            importance: LightImportance::Auto,
            cast_shadows: false,
            shadow_intensity: 0.0,
            shadow_distance: 0.0,
            shadow_fade_distance: 0.0,
            shadow_resolution: 1.0,
            shadow_near_far_ratio: 0.002,
            shadow_max_extrusion: 1000.0,
            cascade: CascadeParameters::default(),
            focus: FocusParameters::default(),
            bias: BiasParameters::default(),
            draw_distance: 0.0,
            fade_distance: 0.0,
            light_mask: u32::MAX,
            view_mask: u32::MAX,
            use_physical_values: false,
        }
    }
}

impl Light {
    pub fn directional() -> Self {
        Self {
            light_type: LightType::Directional,
            ..Self::default()
        }
    }

    pub fn point(range: f32) -> Self {
        Self {
            light_type: LightType::Point,
            range,
            ..Self::default()
        }
    }

    pub fn spot(range: f32, fov_radians: f32) -> Self {
        Self {
            light_type: LightType::Spot,
            range,
            fov_radians,
            ..Self::default()
        }
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn with_brightness(mut self, brightness: f32) -> Self {
        self.brightness = brightness;
        self
    }

    pub fn with_shadows(mut self) -> Self {
        self.cast_shadows = true;
        self
    }

    pub fn with_importance(mut self, importance: LightImportance) -> Self {
        self.importance = importance;
        self
    }

    pub fn effective_color(&self) -> Vec3 {
        self.color * self.brightness
    }

    pub fn is_negative(&self) -> bool {
        self.effective_color().element_sum() < 0.0
    }

    /// Divisor applied to distances when ranking lights; brighter lights rank closer.
    pub fn intensity_divisor(&self) -> f32 {
        self.effective_color().element_sum().max(0.0) + EPSILON
    }
}

/// Light resolved for one frame: parameters plus world placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightData {
    pub id: LightId,
    pub light: Light,
    pub position: Vec3,
    pub rotation: Quat,
    /// Distance to the cull camera, filled in by the drawable processor.
    pub distance: f32,
}

impl LightData {
    pub fn new(id: LightId, light: Light, position: Vec3, rotation: Quat) -> Self {
        Self {
            id,
            light,
            position,
            rotation,
            distance: 0.0,
        }
    }

    pub fn light_type(&self) -> LightType {
        self.light.light_type
    }

    /// Direction the light shines towards.
    pub fn direction(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn world_transform(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }

    pub fn sphere(&self) -> Sphere {
        Sphere::new(self.position, self.light.range)
    }

    /// Spot light cone as a frustum.
    pub fn frustum(&self) -> Frustum {
        Frustum::perspective(
            self.light.fov_radians,
            self.light.aspect_ratio,
            1.0,
            0.0,
            self.light.range.max(EPSILON),
            &self.world_transform(),
        )
    }

    /// Distance from the light to a box, zero for directional lights.
    pub fn distance_to_box(&self, bbox: &BoundingBox) -> f32 {
        match self.light.light_type {
            LightType::Directional => 0.0,
            LightType::Spot | LightType::Point => bbox.distance_to_point(self.position),
        }
    }

    /// Rough distance from the light volume to a point, zero when inside.
    pub fn volume_distance(&self, point: Vec3) -> f32 {
        match self.light.light_type {
            LightType::Directional => 0.0,
            LightType::Point => Sphere::new(self.position, self.light.range * 1.25).distance(point),
            LightType::Spot => self.frustum().distance(point),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascade_split_count_stops_at_non_increasing_split() {
        assert_eq!(CascadeParameters::new([10.0, 50.0, 200.0, 1000.0]).num_splits(), 4);
        assert_eq!(CascadeParameters::new([10.0, 50.0, 20.0, 1000.0]).num_splits(), 2);
        assert_eq!(CascadeParameters::default().num_splits(), 1);
        assert_eq!(CascadeParameters::new([10.0, 50.0, 200.0, 0.0]).shadow_range(), 200.0);
    }

    #[test]
    fn negative_lights_have_tiny_divisor() {
        let light = Light::point(5.0).with_brightness(-1.0);
        assert!(light.is_negative());
        assert!(light.intensity_divisor() < 1e-3);
    }

    #[test]
    fn spot_frustum_follows_rotation() {
        let data = LightData::new(
            LightId(1),
            Light::spot(10.0, 60f32.to_radians()),
            Vec3::ZERO,
            Quat::from_rotation_arc(Vec3::NEG_Z, Vec3::NEG_Y),
        );
        let frustum = data.frustum();
        assert!(frustum.intersects_box(&BoundingBox::from_center_half_size(
            Vec3::new(0.0, -5.0, 0.0),
            Vec3::splat(0.5)
        )));
        assert!(!frustum.intersects_box(&BoundingBox::from_center_half_size(
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::splat(0.5)
        )));
    }
}
