use std::ops::{Add, AddAssign, Mul};

use glam::Vec3;

const Y00: f32 = 0.282_095;
const Y1: f32 = 0.488_603;
const Y2_OFF_DIAGONAL: f32 = 1.092_548;
const Y20: f32 = 0.315_392;
const Y22: f32 = 0.546_274;

// Clamped cosine lobe convolution factors per band.
const A0: f32 = std::f32::consts::PI;
const A1: f32 = 2.0 * std::f32::consts::PI / 3.0;
const A2: f32 = std::f32::consts::PI / 4.0;

fn basis(n: Vec3) -> [f32; 9] {
    [
        Y00,
        Y1 * n.y,
        Y1 * n.z,
        Y1 * n.x,
        Y2_OFF_DIAGONAL * n.x * n.y,
        Y2_OFF_DIAGONAL * n.y * n.z,
        Y20 * (3.0 * n.z * n.z - 1.0),
        Y2_OFF_DIAGONAL * n.x * n.z,
        Y22 * (n.x * n.x - n.y * n.y),
    ]
}

/// Nine-coefficient RGB spherical harmonics, pre-convolved with the cosine lobe so that
/// evaluating at a normal yields diffuse irradiance with a single dot product per channel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SphericalHarmonicsDot9 {
    pub coefficients: [Vec3; 9],
}

impl SphericalHarmonicsDot9 {
    pub const ZERO: Self = Self {
        coefficients: [Vec3::ZERO; 9],
    };

    /// Uniform lighting from every direction.
    pub fn from_ambient(color: Vec3) -> Self {
        let mut result = Self::ZERO;
        result.coefficients[0] = color / Y00;
        result
    }

    /// Directional light of `color` arriving from `direction` (pointing towards the light).
    pub fn from_direction(direction: Vec3, color: Vec3) -> Self {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            return Self::ZERO;
        }
        let y = basis(direction);
        let bands = [A0, A1, A1, A1, A2, A2, A2, A2, A2];
        let mut result = Self::ZERO;
        for i in 0..9 {
            result.coefficients[i] = color * (y[i] * bands[i]);
        }
        result
    }

    pub fn evaluate(&self, normal: Vec3) -> Vec3 {
        let y = basis(normal.normalize_or_zero());
        self.coefficients
            .iter()
            .zip(y)
            .fold(Vec3::ZERO, |acc, (c, b)| acc + *c * b)
    }

    /// Irradiance averaged over all directions.
    pub fn evaluate_average(&self) -> Vec3 {
        self.coefficients[0] * Y00
    }
}

impl Add for SphericalHarmonicsDot9 {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for SphericalHarmonicsDot9 {
    fn add_assign(&mut self, rhs: Self) {
        for (lhs, rhs) in self.coefficients.iter_mut().zip(rhs.coefficients) {
            *lhs += rhs;
        }
    }
}

impl Mul<f32> for SphericalHarmonicsDot9 {
    type Output = Self;

    fn mul(mut self, rhs: f32) -> Self {
        for c in &mut self.coefficients {
            *c *= rhs;
        }
        self
    }
}
