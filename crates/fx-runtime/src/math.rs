//! Row-vector matrix types used at the runtime boundary.
//!
//! Points are row vectors multiplied from the left (`p' = p * M`), so the
//! translation lives in the last row. Hosts built on glam's column-vector
//! matrices convert through the bridge's coordinate mapper.

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Handedness the runtime simulates in. Effect files are authored
/// right-handed; a left-handed runtime mirrors them along Z on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSystem {
    #[default]
    LeftHanded,
    RightHanded,
}

impl CoordinateSystem {
    /// Sign applied to authored Z components.
    pub fn z_sign(self) -> f32 {
        match self {
            Self::LeftHanded => -1.0,
            Self::RightHanded => 1.0,
        }
    }
}

/// Affine transform as four rows of three (rotation/scale rows 0-2, translation row 3).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Matrix43 {
    pub value: [[f32; 3]; 4],
}

impl Default for Matrix43 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix43 {
    pub const IDENTITY: Self = Self {
        value: [
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, 0.0],
        ],
    };

    pub fn translation(t: Vec3) -> Self {
        let mut m = Self::IDENTITY;
        m.value[3] = t.to_array();
        m
    }

    pub fn scaling(s: Vec3) -> Self {
        let mut m = Self::IDENTITY;
        m.value[0][0] = s.x;
        m.value[1][1] = s.y;
        m.value[2][2] = s.z;
        m
    }

    /// Rotation of `angle` radians around `axis`. A degenerate axis yields identity.
    pub fn rotation_axis(axis: Vec3, angle: f32) -> Self {
        if axis.length_squared() <= f32::EPSILON {
            return Self::IDENTITY;
        }
        // Row i of the row-vector form is column i of glam's column-vector matrix.
        let m = Mat3::from_axis_angle(axis.normalize(), angle);
        Self {
            value: [
                m.x_axis.to_array(),
                m.y_axis.to_array(),
                m.z_axis.to_array(),
                [0.0; 3],
            ],
        }
    }

    /// Scale, then rotate, then translate.
    pub fn srt(scale: Vec3, axis: Vec3, angle: f32, translation: Vec3) -> Self {
        Self::scaling(scale)
            .multiply(&Self::rotation_axis(axis, angle))
            .multiply(&Self::translation(translation))
    }

    /// `self` applied first, then `rhs`.
    pub fn multiply(&self, rhs: &Self) -> Self {
        let a = &self.value;
        let b = &rhs.value;
        let mut out = [[0.0f32; 3]; 4];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
                if i == 3 {
                    *cell += b[3][j];
                }
            }
        }
        Self { value: out }
    }

    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let m = &self.value;
        Vec3::new(
            p.x * m[0][0] + p.y * m[1][0] + p.z * m[2][0] + m[3][0],
            p.x * m[0][1] + p.y * m[1][1] + p.z * m[2][1] + m[3][1],
            p.x * m[0][2] + p.y * m[1][2] + p.z * m[2][2] + m[3][2],
        )
    }

    pub fn translation_part(&self) -> Vec3 {
        Vec3::from_array(self.value[3])
    }
}

/// 4x4 matrix in row-vector layout (camera and projection matrices).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Matrix44 {
    pub values: [[f32; 4]; 4],
}

impl Default for Matrix44 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix44 {
    pub const IDENTITY: Self = Self {
        values: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        let mut m = Self::IDENTITY;
        m.values[3] = [x, y, z, 1.0];
        m
    }

    /// Left-handed orthographic projection centered on the origin.
    pub fn orthographic_lh(width: f32, height: f32, near: f32, far: f32) -> Self {
        let mut m = Self::IDENTITY;
        m.values[0][0] = 2.0 / width;
        m.values[1][1] = 2.0 / height;
        m.values[2][2] = 1.0 / (far - near);
        m.values[3][2] = near / (near - far);
        m
    }

    /// `self` applied first, then `rhs`.
    pub fn multiply(&self, rhs: &Self) -> Self {
        let mut out = [[0.0f32; 4]; 4];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.values[i][k] * rhs.values[k][j]).sum();
            }
        }
        Self { values: out }
    }

    pub fn transform(&self, p: Vec4) -> Vec4 {
        let v = p.to_array();
        let mut out = [0.0f32; 4];
        for (j, cell) in out.iter_mut().enumerate() {
            *cell = (0..4).map(|i| v[i] * self.values[i][j]).sum();
        }
        Vec4::from_array(out)
    }
}
