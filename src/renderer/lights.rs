use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::math::LARGE_VALUE;

/// Maximum number of shadow splits of one light (point light cube faces).
pub const MAX_LIGHT_SPLITS: usize = 6;
/// Shadow matrices uploaded per light; directional cascades use all of them.
pub const NUM_LIGHT_MATRICES: usize = 4;

/// Shader inputs of one light, computed once per frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CookedLightParams {
    pub position: Vec3,
    pub direction: Vec3,
    pub inverse_range: f32,
    /// `(cos(fov / 2), 1 / (1 - cos(fov / 2)))` for spot lights.
    pub spot_cutoff: Vec2,
    pub fade: f32,
    pub color_linear: Vec3,
    pub color_gamma: Vec3,
    pub specular_intensity: f32,
    /// World to light shape space: spot texture projection or inverse point transform.
    pub shape_matrix: Mat4,

    pub num_light_matrices: usize,
    pub light_matrices: [Mat4; NUM_LIGHT_MATRICES],
    pub shadow_map_inv_size: Vec2,
    pub shadow_cube_uv_bias: Vec2,
    pub shadow_cube_adjust: Vec4,
    pub shadow_depth_fade: Vec4,
    pub shadow_intensity: Vec4,
    pub shadow_splits: Vec4,
    pub shadow_depth_bias_multiplier: [f32; MAX_LIGHT_SPLITS],
    pub shadow_normal_bias: [f32; MAX_LIGHT_SPLITS],
}

impl Default for CookedLightParams {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            direction: Vec3::NEG_Z,
            inverse_range: 0.0,
            spot_cutoff: Vec2::new(-2.0, 1.0),
            fade: 1.0,
            color_linear: Vec3::ZERO,
            color_gamma: Vec3::ZERO,
            specular_intensity: 0.0,
            shape_matrix: Mat4::IDENTITY,
            num_light_matrices: 0,
            light_matrices: [Mat4::IDENTITY; NUM_LIGHT_MATRICES],
            shadow_map_inv_size: Vec2::ZERO,
            shadow_cube_uv_bias: Vec2::ZERO,
            shadow_cube_adjust: Vec4::ZERO,
            shadow_depth_fade: Vec4::ZERO,
            shadow_intensity: Vec4::ZERO,
            shadow_splits: Vec4::splat(LARGE_VALUE),
            shadow_depth_bias_multiplier: [1.0; MAX_LIGHT_SPLITS],
            shadow_normal_bias: [0.0; MAX_LIGHT_SPLITS],
        }
    }
}

impl CookedLightParams {
    pub fn color(&self, linear_space: bool) -> Vec3 {
        if linear_space {
            self.color_linear
        } else {
            self.color_gamma
        }
    }

    pub fn to_raw(&self, linear_space: bool) -> LightShaderParamsRaw {
        let color = self.color(linear_space);

        let mut light_matrices = [[[0.0; 4]; 4]; NUM_LIGHT_MATRICES];
        for (dst, src) in light_matrices.iter_mut().zip(self.light_matrices.iter()) {
            *dst = src.to_cols_array_2d();
        }

        let mut depth_bias_multiplier = [[0.0; 4]; 2];
        let mut normal_bias = [[0.0; 4]; 2];
        for i in 0..MAX_LIGHT_SPLITS {
            depth_bias_multiplier[i / 4][i % 4] = self.shadow_depth_bias_multiplier[i];
            normal_bias[i / 4][i % 4] = self.shadow_normal_bias[i];
        }

        LightShaderParamsRaw {
            position_inv_range: self.position.extend(self.inverse_range).to_array(),
            direction_specular: self.direction.extend(self.specular_intensity).to_array(),
            color_fade: color.extend(self.fade).to_array(),
            spot_cutoff_num_matrices: [
                self.spot_cutoff.x,
                self.spot_cutoff.y,
                self.num_light_matrices as f32,
                0.0,
            ],
            shape_matrix: self.shape_matrix.to_cols_array_2d(),
            light_matrices,
            shadow_map_inv_size_cube_uv_bias: [
                self.shadow_map_inv_size.x,
                self.shadow_map_inv_size.y,
                self.shadow_cube_uv_bias.x,
                self.shadow_cube_uv_bias.y,
            ],
            shadow_cube_adjust: self.shadow_cube_adjust.to_array(),
            shadow_depth_fade: self.shadow_depth_fade.to_array(),
            shadow_intensity: self.shadow_intensity.to_array(),
            shadow_splits: self.shadow_splits.to_array(),
            depth_bias_multiplier,
            normal_bias,
        }
    }
}

/// GPU layout of [`CookedLightParams`]. Every member is 16-byte aligned.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct LightShaderParamsRaw {
    pub position_inv_range: [f32; 4],
    pub direction_specular: [f32; 4],
    pub color_fade: [f32; 4],
    pub spot_cutoff_num_matrices: [f32; 4],
    pub shape_matrix: [[f32; 4]; 4],
    pub light_matrices: [[[f32; 4]; 4]; NUM_LIGHT_MATRICES],
    pub shadow_map_inv_size_cube_uv_bias: [f32; 4],
    pub shadow_cube_adjust: [f32; 4],
    pub shadow_depth_fade: [f32; 4],
    pub shadow_intensity: [f32; 4],
    pub shadow_splits: [f32; 4],
    pub depth_bias_multiplier: [[f32; 4]; 2],
    pub normal_bias: [[f32; 4]; 2],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_layout_has_no_padding() {
        assert_eq!(std::mem::size_of::<LightShaderParamsRaw>() % 16, 0);
        assert_eq!(std::mem::size_of::<LightShaderParamsRaw>(), 4 * 16 + 64 + 4 * 64 + 5 * 16 + 2 * 32);
    }

    #[test]
    fn raw_params_pick_color_space() {
        let params = CookedLightParams {
            color_linear: Vec3::new(0.2, 0.2, 0.2),
            color_gamma: Vec3::new(0.5, 0.5, 0.5),
            fade: 0.75,
            shadow_depth_bias_multiplier: [1.0, 1.1, 1.2, 1.3, 1.4, 1.5],
            ..CookedLightParams::default()
        };
        let linear = params.to_raw(true);
        let gamma = params.to_raw(false);
        assert_eq!(linear.color_fade, [0.2, 0.2, 0.2, 0.75]);
        assert_eq!(gamma.color_fade, [0.5, 0.5, 0.5, 0.75]);
        assert_eq!(linear.depth_bias_multiplier[1], [1.4, 1.5, 0.0, 0.0]);
        assert_eq!(bytemuck::bytes_of(&linear).len(), std::mem::size_of::<LightShaderParamsRaw>());
    }
}
