//! Conversions between host coordinates and runtime coordinates.
//!
//! The host works in screen pixels (Y down) for 2D and in glam's
//! column-vector matrices for 3D. The runtime works in world units (Y up)
//! and row-vector matrices. One world unit is [`SCALE_2D`] pixels.

use fx_runtime::{Matrix43, Matrix44};
use glam::{Affine2, Mat4, Vec2, Vec3};

/// Pixels per runtime world unit for 2D playback.
pub const SCALE_2D: f32 = 20.0;

/// Near plane of the 2D orthographic projection.
pub const NEAR_Z_2D: f32 = 0.00001;

/// Far plane of the 2D orthographic projection.
pub const FAR_Z_2D: f32 = 10000.0;

/// Screen position plus depth to runtime world space.
pub fn pos_to_pos3d(pos: Vec2, z: f32) -> Vec3 {
    let mut res = (pos / SCALE_2D).extend(z);
    res.y *= -1.0;
    res
}

/// Inverse of [`pos_to_pos3d`] for the XY part.
pub fn pos3d_to_pos(pos: Vec3) -> Vec2 {
    Vec2::new(pos.x * SCALE_2D, -pos.y * SCALE_2D)
}

/// Host 2D transform to the runtime's base matrix.
///
/// The 2x2 part is copied transposed into the row-vector layout; the
/// translation is scaled to world units with Y flipped.
pub fn to_effect_transform(transform: &Affine2) -> Matrix43 {
    let x = transform.matrix2.x_axis;
    let y = transform.matrix2.y_axis;
    let t = transform.translation;
    let mut res = Matrix43::IDENTITY;
    res.value[0][0] = x.x;
    res.value[0][1] = y.x;
    res.value[1][0] = x.y;
    res.value[1][1] = y.y;
    res.value[3][0] = t.x / SCALE_2D;
    res.value[3][1] = -t.y / SCALE_2D;
    res
}

/// Host 4x4 matrix to the runtime layout.
///
/// Column `i` of a column-vector matrix is row `i` of the equivalent
/// row-vector matrix, so this is a straight copy.
pub fn to_effect_matrix(mat: &Mat4) -> Matrix44 {
    Matrix44 {
        values: mat.to_cols_array_2d(),
    }
}

/// Camera matrix for 2D playback: puts the window's top-left pixel at the origin.
pub fn view_2d(window: Vec2) -> Matrix44 {
    let mut trans = window / 2.0 / SCALE_2D;
    trans.x *= -1.0;
    Matrix44::translation(trans.x, trans.y, 0.0)
}

/// Orthographic projection for 2D playback covering the whole window.
pub fn projection_2d(window: Vec2) -> Matrix44 {
    let mut proj = Matrix44::orthographic_lh(window.x, window.y, NEAR_Z_2D, FAR_Z_2D);
    proj.values[0][0] *= SCALE_2D;
    proj.values[1][1] *= SCALE_2D;
    proj.values[2][2] = 0.0;
    proj.values[3][2] = 1.0;
    proj
}
