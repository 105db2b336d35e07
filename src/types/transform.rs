//! Coordinate conversion between the Z-up source scene and the Y-up renderer.
//!
//! The remap keeps X, sends source Z to destination Y and negated source Y to
//! destination Z: `(x, y, z) -> (x, z, -y)`.

use glam::{DMat4, DVec3, DVec4};

use super::{MatrixRows, Vec3};

/// Axis remap from Z-up to Y-up as a homogeneous matrix.
pub const Z_UP_TO_Y_UP: DMat4 = DMat4::from_cols(
    DVec4::new(1.0, 0.0, 0.0, 0.0),
    DVec4::new(0.0, 0.0, -1.0, 0.0),
    DVec4::new(0.0, 1.0, 0.0, 0.0),
    DVec4::new(0.0, 0.0, 0.0, 1.0),
);

/// Build a matrix from row-major rows.
pub fn matrix_from_rows(rows: &MatrixRows) -> DMat4 {
    DMat4::from_cols_array_2d(rows).transpose()
}

/// Rows of a matrix, row-major.
pub fn matrix_rows(matrix: &DMat4) -> MatrixRows {
    matrix.transpose().to_cols_array_2d()
}

/// Remap a world transform into the Y-up frame.
pub fn to_y_up_matrix(matrix: &DMat4) -> DMat4 {
    Z_UP_TO_Y_UP * *matrix
}

/// Remap a direction into the Y-up frame.
pub fn to_y_up_vector(v: Vec3) -> Vec3 {
    Z_UP_TO_Y_UP.transform_vector3(DVec3::from_array(v)).to_array()
}

/// Remap a position into the Y-up frame.
pub fn to_y_up_point(p: Vec3) -> Vec3 {
    Z_UP_TO_Y_UP.transform_point3(DVec3::from_array(p)).to_array()
}

/// Inverse of [`to_y_up_point`]; also valid for directions.
pub fn from_y_up_point(p: Vec3) -> Vec3 {
    Z_UP_TO_Y_UP
        .inverse()
        .transform_point3(DVec3::from_array(p))
        .to_array()
}

/// Whether a placement matrix can be inverted.
pub fn is_invertible(matrix: &DMat4) -> bool {
    let det = matrix.determinant();
    det.is_finite() && det.abs() > 1e-12
}
