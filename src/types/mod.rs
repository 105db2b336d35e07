//! Shared types used throughout the library.

mod transform;

pub use transform::{
    from_y_up_point, matrix_from_rows, matrix_rows, to_y_up_matrix, to_y_up_point,
    to_y_up_vector, is_invertible, Z_UP_TO_Y_UP,
};

/// A linear RGB color.
pub type Color = [f64; 3];

/// A point or direction in 3D space.
pub type Vec3 = [f64; 3];

/// Row-major 4x4 matrix as it appears in scene descriptions.
pub type MatrixRows = [[f64; 4]; 4];

/// Identity matrix in row-major form.
pub const IDENTITY_ROWS: MatrixRows = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Scale a color by a scalar.
pub fn scale_color(color: Color, factor: f64) -> Color {
    [color[0] * factor, color[1] * factor, color[2] * factor]
}
