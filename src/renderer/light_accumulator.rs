use glam::Vec3;

use crate::math::hash::combine_hash;
use crate::math::{BoundingBox, SphericalHarmonicsDot9};
use crate::scene::{LightData, LightImportance, LightType};

pub const MAX_PIXEL_LIGHTS: usize = 8;
pub const MAX_VERTEX_LIGHTS: usize = 4;
/// One spare slot so that a light can be inserted before the worst one is evicted.
pub const LIGHT_ACCUMULATOR_CAPACITY: usize = MAX_PIXEL_LIGHTS + MAX_VERTEX_LIGHTS + 1;

/// Marks an unused slot returned by [`LightAccumulator::get_vertex_lights`].
pub const INVALID_LIGHT_INDEX: u32 = u32::MAX;

/// Per-frame light snapshot used to fold evicted lights into ambient.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightDataForAccumulator {
    pub light_type: LightType,
    pub color: Vec3,
    pub position: Vec3,
    pub direction: Vec3,
    pub inv_range: f32,
    pub cutoff: f32,
    pub inv_cutoff: f32,
}

impl LightDataForAccumulator {
    pub fn from_light(light: &LightData, linear_space: bool) -> Self {
        let color = if linear_space {
            srgb_to_linear(light.light.color) * light.light.brightness
        } else {
            light.light.effective_color()
        };
        let cutoff = (light.light.fov_radians * 0.5).cos();
        Self {
            light_type: light.light_type(),
            color,
            position: light.position,
            direction: light.direction(),
            inv_range: if light.light.range > 0.0 {
                1.0 / light.light.range
            } else {
                0.0
            },
            cutoff,
            inv_cutoff: 1.0 / (1.0 - cutoff).max(f32::EPSILON),
        }
    }

    /// Contribution of this light at `position`, as if it were a distant directional light.
    pub fn to_spherical_harmonics(&self, position: Vec3) -> SphericalHarmonicsDot9 {
        match self.light_type {
            LightType::Directional => SphericalHarmonicsDot9::from_direction(-self.direction, self.color),
            LightType::Point | LightType::Spot => {
                let to_light = self.position - position;
                let distance = to_light.length();
                let normalized_distance = distance * self.inv_range;
                let mut attenuation = (1.0 - normalized_distance * normalized_distance).clamp(0.0, 1.0);
                if self.light_type == LightType::Spot && distance > 0.0 {
                    let spot = (-to_light / distance).dot(self.direction);
                    attenuation *= ((spot - self.cutoff) * self.inv_cutoff).clamp(0.0, 1.0);
                }
                SphericalHarmonicsDot9::from_direction(to_light, self.color * attenuation)
            }
        }
    }
}

pub fn srgb_to_linear(color: Vec3) -> Vec3 {
    let convert = |c: f32| {
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    Vec3::new(convert(color.x), convert(color.y), convert(color.z))
}

pub fn linear_to_srgb(color: Vec3) -> Vec3 {
    let convert = |c: f32| {
        if c <= 0.0031308 {
            c * 12.92
        } else {
            1.055 * c.powf(1.0 / 2.4) - 0.055
        }
    };
    Vec3::new(convert(color.x), convert(color.y), convert(color.z))
}

/// Limits and light table shared by every accumulator of a frame.
#[derive(Clone, Copy, Debug)]
pub struct LightAccumulatorContext<'a> {
    pub max_pixel_lights: usize,
    pub max_vertex_lights: usize,
    pub lights: &'a [LightDataForAccumulator],
}

/// Bounded, penalty-ordered list of the lights affecting one geometry.
/// Lights that do not fit are folded into `spherical_harmonics`.
#[derive(Clone, Debug)]
pub struct LightAccumulator {
    pub spherical_harmonics: SphericalHarmonicsDot9,
    lights: [(f32, u32); LIGHT_ACCUMULATOR_CAPACITY],
    num_lights: usize,
    num_important_lights: usize,
    num_automatic_lights: usize,
    first_vertex_light: usize,
    vertex_lights_hash: u32,
}

impl Default for LightAccumulator {
    fn default() -> Self {
        Self {
            spherical_harmonics: SphericalHarmonicsDot9::ZERO,
            lights: [(0.0, INVALID_LIGHT_INDEX); LIGHT_ACCUMULATOR_CAPACITY],
            num_lights: 0,
            num_important_lights: 0,
            num_automatic_lights: 0,
            first_vertex_light: 0,
            vertex_lights_hash: 0,
        }
    }
}

impl LightAccumulator {
    pub fn reset_lights(&mut self) {
        self.num_lights = 0;
        self.num_important_lights = 0;
        self.num_automatic_lights = 0;
        self.first_vertex_light = 0;
        self.vertex_lights_hash = 0;
    }

    pub fn accumulate_light(
        &mut self,
        ctx: &LightAccumulatorContext<'_>,
        bounds: &BoundingBox,
        importance: LightImportance,
        light_index: u32,
        penalty: f32,
    ) {
        debug_assert_eq!(self.vertex_lights_hash, 0, "accumulator is already cooked");

        match importance {
            LightImportance::Important => self.num_important_lights += 1,
            LightImportance::Auto => self.num_automatic_lights += 1,
            LightImportance::NotImportant => {}
        }

        // Upper bound keeps insertion order among equal penalties.
        let position = self.lights[..self.num_lights].partition_point(|(p, _)| *p <= penalty);
        self.lights.copy_within(position..self.num_lights, position + 1);
        self.lights[position] = (penalty, light_index);
        self.num_lights += 1;

        let max_pixel_lights = ctx.max_pixel_lights.min(MAX_PIXEL_LIGHTS);
        let max_vertex_lights = ctx.max_vertex_lights.min(MAX_VERTEX_LIGHTS);
        self.first_vertex_light = self
            .num_important_lights
            .max((self.num_important_lights + self.num_automatic_lights).min(max_pixel_lights));

        while self.num_lights > max_vertex_lights + self.first_vertex_light
            || self.num_lights == LIGHT_ACCUMULATOR_CAPACITY
        {
            self.num_lights -= 1;
            let (_, evicted) = self.lights[self.num_lights];
            let light = ctx.lights.get(evicted as usize);
            debug_assert!(light.is_some(), "evicted light {} is missing from the light table", evicted);
            if let Some(light) = light {
                self.spherical_harmonics += light.to_spherical_harmonics(bounds.center());
            }
        }
    }

    /// Sorts vertex lights by index and hashes them. Does nothing once cooked.
    pub fn cook(&mut self) {
        if self.vertex_lights_hash != 0 {
            return;
        }

        let first = self.first_vertex_light.min(self.num_lights);
        let vertex_lights = &mut self.lights[first..self.num_lights];
        vertex_lights.sort_by_key(|(_, index)| *index);

        let mut hash = 0;
        for (_, index) in vertex_lights.iter() {
            combine_hash(&mut hash, index.wrapping_add(1).wrapping_mul(2_654_435_761));
        }
        self.vertex_lights_hash = if hash == 0 { 1 } else { hash };
    }

    pub fn vertex_lights_hash(&self) -> u32 {
        self.vertex_lights_hash
    }

    pub fn num_lights(&self) -> usize {
        self.num_lights
    }

    pub fn num_important_lights(&self) -> usize {
        self.num_important_lights
    }

    pub fn first_vertex_light(&self) -> usize {
        self.first_vertex_light
    }

    pub fn lights(&self) -> &[(f32, u32)] {
        &self.lights[..self.num_lights]
    }

    pub fn get_pixel_lights(&self) -> &[(f32, u32)] {
        &self.lights[..self.first_vertex_light.min(self.num_lights)]
    }

    pub fn get_vertex_lights(&self) -> [u32; MAX_VERTEX_LIGHTS] {
        let mut result = [INVALID_LIGHT_INDEX; MAX_VERTEX_LIGHTS];
        let first = self.first_vertex_light.min(self.num_lights);
        for (slot, (_, index)) in result.iter_mut().zip(&self.lights[first..self.num_lights]) {
            *slot = *index;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Light, LightId};
    use glam::Quat;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn point_lights(count: usize) -> Vec<LightDataForAccumulator> {
        (0..count)
            .map(|i| {
                let data = LightData::new(
                    LightId(i as u64),
                    Light::point(20.0),
                    Vec3::new(i as f32, 2.0, 0.0),
                    Quat::IDENTITY,
                );
                LightDataForAccumulator::from_light(&data, false)
            })
            .collect()
    }

    fn unit_box() -> BoundingBox {
        BoundingBox::from_center_half_size(Vec3::ZERO, Vec3::splat(0.5))
    }

    #[test]
    fn important_lights_always_get_pixel_slots() {
        let lights = point_lights(6);
        let ctx = LightAccumulatorContext {
            max_pixel_lights: 1,
            max_vertex_lights: 4,
            lights: &lights,
        };
        let mut accumulator = LightAccumulator::default();
        for i in 0..3 {
            accumulator.accumulate_light(&ctx, &unit_box(), LightImportance::Important, i, -1.0);
        }
        accumulator.accumulate_light(&ctx, &unit_box(), LightImportance::Auto, 3, 0.5);
        assert_eq!(accumulator.first_vertex_light(), 3);
        assert_eq!(accumulator.get_pixel_lights().len(), 3);
        assert_eq!(accumulator.get_vertex_lights(), [3, INVALID_LIGHT_INDEX, INVALID_LIGHT_INDEX, INVALID_LIGHT_INDEX]);
    }

    #[test]
    fn eviction_invariant_holds_for_random_sequences() {
        let lights = point_lights(32);
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..200 {
            let ctx = LightAccumulatorContext {
                max_pixel_lights: rng.gen_range(0..=MAX_PIXEL_LIGHTS),
                max_vertex_lights: rng.gen_range(0..=MAX_VERTEX_LIGHTS),
                lights: &lights,
            };
            let mut accumulator = LightAccumulator::default();
            for _ in 0..rng.gen_range(1..32) {
                let importance = match rng.gen_range(0..3) {
                    0 => LightImportance::Important,
                    1 => LightImportance::Auto,
                    _ => LightImportance::NotImportant,
                };
                let index = rng.gen_range(0..lights.len() as u32);
                accumulator.accumulate_light(&ctx, &unit_box(), importance, index, rng.gen_range(-2.0..5.0));

                assert!(accumulator.num_lights() <= ctx.max_vertex_lights + accumulator.first_vertex_light());
                assert!(accumulator.first_vertex_light() >= accumulator.num_important_lights());
                assert!(accumulator.num_lights() < LIGHT_ACCUMULATOR_CAPACITY);
                let penalties: Vec<f32> = accumulator.lights().iter().map(|(p, _)| *p).collect();
                assert!(penalties.windows(2).all(|w| w[0] <= w[1]));
            }
        }
    }

    #[test]
    fn evicted_lights_become_ambient() {
        let lights = point_lights(3);
        let ctx = LightAccumulatorContext {
            max_pixel_lights: 1,
            max_vertex_lights: 0,
            lights: &lights,
        };
        let mut accumulator = LightAccumulator::default();
        accumulator.accumulate_light(&ctx, &unit_box(), LightImportance::Auto, 0, 0.1);
        let before = accumulator.spherical_harmonics.evaluate_average();
        accumulator.accumulate_light(&ctx, &unit_box(), LightImportance::Auto, 1, 0.2);
        let after = accumulator.spherical_harmonics.evaluate_average();

        assert_eq!(accumulator.num_lights(), 1);
        assert_eq!(accumulator.lights()[0].1, 0);
        assert!(after.x > before.x);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic)]
    fn evicting_unknown_light_index_fails_in_debug() {
        let ctx = LightAccumulatorContext {
            max_pixel_lights: 0,
            max_vertex_lights: 0,
            lights: &[],
        };
        let mut accumulator = LightAccumulator::default();
        accumulator.accumulate_light(&ctx, &unit_box(), LightImportance::Auto, 5, 0.5);
        assert_eq!(accumulator.num_lights(), 0);
        assert_eq!(accumulator.spherical_harmonics, SphericalHarmonicsDot9::ZERO);
    }

    #[test]
    fn cook_is_idempotent() {
        let lights = point_lights(6);
        let ctx = LightAccumulatorContext {
            max_pixel_lights: 1,
            max_vertex_lights: 4,
            lights: &lights,
        };
        let mut accumulator = LightAccumulator::default();
        for (index, penalty) in [(5, 0.9), (2, 0.1), (4, 0.5), (1, 0.7), (3, 0.3)] {
            accumulator.accumulate_light(&ctx, &unit_box(), LightImportance::Auto, index, penalty);
        }

        accumulator.cook();
        let hash = accumulator.vertex_lights_hash();
        let vertex_lights = accumulator.get_vertex_lights();
        accumulator.cook();

        assert_ne!(hash, 0);
        assert_eq!(accumulator.vertex_lights_hash(), hash);
        assert_eq!(accumulator.get_vertex_lights(), vertex_lights);
        assert_eq!(vertex_lights, [1, 3, 4, 5]);
        assert_eq!(accumulator.get_pixel_lights(), &[(0.1, 2)]);
    }

    #[test]
    fn reset_clears_cooked_hash() {
        let mut accumulator = LightAccumulator::default();
        accumulator.cook();
        assert_eq!(accumulator.vertex_lights_hash(), 1);
        accumulator.reset_lights();
        assert_eq!(accumulator.vertex_lights_hash(), 0);
        assert_eq!(accumulator.num_lights(), 0);
    }

    #[test]
    fn spot_contribution_is_zero_outside_cone() {
        let data = LightData::new(
            LightId(0),
            Light::spot(10.0, 30f32.to_radians()),
            Vec3::ZERO,
            Quat::IDENTITY,
        );
        let light = LightDataForAccumulator::from_light(&data, false);
        let inside = light.to_spherical_harmonics(Vec3::new(0.0, 0.0, -5.0));
        let outside = light.to_spherical_harmonics(Vec3::new(5.0, 0.0, 0.0));
        assert!(inside.evaluate_average().x > 0.0);
        assert_eq!(outside.evaluate_average(), Vec3::ZERO);
    }
}
