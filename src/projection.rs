// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Projection matrices.

Matrices are [`Matrix4`], column-major, and map into clip space with depth in `0..=1`.
[`matrix_bytes`] produces the 64-byte layout uniform blocks expect.

```
use batches_and_passes::projection::{self, Matrix4};
let m = projection::translation(1.0, 2.0, 3.0);
assert_eq!(*m.element_at(0, 3), 1.0);
assert_eq!(projection::matrix_bytes(&Matrix4::IDENTITY).len(), 64);
```
*/

use vectormatrix::matrix::Matrix;
use vectormatrix::vector::Vector;

use crate::resources::render_target::PixelSize;

pub type Matrix4 = Matrix<f32, 4, 4>;

/// Bytes of a matrix in a uniform block.
pub const MATRIX_SIZE: usize = 64;

/**
A right-handed perspective projection looking down -z.

`fov_y` is the vertical field of view in degrees.
*/
pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Matrix4 {
    let f = 1.0 / (fov_y.to_radians() / 2.0).tan();
    let range = near - far;
    Matrix::new_columns([
        Vector::new([f / aspect, 0.0, 0.0, 0.0]),
        Vector::new([0.0, f, 0.0, 0.0]),
        Vector::new([0.0, 0.0, far / range, -1.0]),
        Vector::new([0.0, 0.0, near * far / range, 0.0]),
    ])
}

pub fn translation(x: f32, y: f32, z: f32) -> Matrix4 {
    Matrix::new_columns([
        Vector::new([1.0, 0.0, 0.0, 0.0]),
        Vector::new([0.0, 1.0, 0.0, 0.0]),
        Vector::new([0.0, 0.0, 1.0, 0.0]),
        Vector::new([x, y, z, 1.0]),
    ])
}

/// `lhs * rhs`: applies `rhs` first.
pub fn multiply(lhs: Matrix4, rhs: Matrix4) -> Matrix4 {
    lhs.mul_matrix(rhs)
}

/// The projection a frame of `size` pixels renders with: a perspective of `fov_y` degrees,
/// looking at the origin from 4 units away.
pub fn frame_projection(size: PixelSize, fov_y: f32) -> Matrix4 {
    multiply(
        perspective(fov_y, size.aspect_ratio(), 0.01, 1000.0),
        translation(0.0, 0.0, -4.0),
    )
}

/// Column-major, native-endian.
pub fn matrix_bytes(matrix: &Matrix4) -> [u8; MATRIX_SIZE] {
    let mut bytes = [0; MATRIX_SIZE];
    let mut out = bytes.chunks_exact_mut(4);
    for column in matrix.columns() {
        for row in 0..4 {
            if let Some(chunk) = out.next() {
                chunk.copy_from_slice(&column[row].to_ne_bytes());
            }
        }
    }
    bytes
}
