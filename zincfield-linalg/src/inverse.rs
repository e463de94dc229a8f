use crate::LinalgError;
use nalgebra::{Matrix2, Matrix3};
use zincfield_traits::Real;

/// Inverts a 2x2 matrix by its adjugate.
///
/// Fails with [`LinalgError::Singular`] if `|det(m)| < tolerance`.
pub fn invert2x2<T: Real>(m: &Matrix2<T>, tolerance: T) -> Result<Matrix2<T>, LinalgError> {
    let det = m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)];
    if det.abs() < tolerance {
        return Err(LinalgError::Singular);
    }
    #[rustfmt::skip]
    let adjugate = Matrix2::new(
         m[(1, 1)], -m[(0, 1)],
        -m[(1, 0)],  m[(0, 0)]);
    Ok(adjugate / det)
}

/// Inverts a 3x3 matrix by cofactor expansion.
///
/// Fails with [`LinalgError::Singular`] if `|det(m)| < tolerance`. No partial result is
/// produced in that case, so callers can substitute their own fallback.
pub fn invert3x3<T: Real>(m: &Matrix3<T>, tolerance: T) -> Result<Matrix3<T>, LinalgError> {
    let c00 = m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)];
    let c01 = m[(1, 2)] * m[(2, 0)] - m[(1, 0)] * m[(2, 2)];
    let c02 = m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)];

    let det = m[(0, 0)] * c00 + m[(0, 1)] * c01 + m[(0, 2)] * c02;
    if det.abs() < tolerance {
        return Err(LinalgError::Singular);
    }

    let c10 = m[(0, 2)] * m[(2, 1)] - m[(0, 1)] * m[(2, 2)];
    let c11 = m[(0, 0)] * m[(2, 2)] - m[(0, 2)] * m[(2, 0)];
    let c12 = m[(0, 1)] * m[(2, 0)] - m[(0, 0)] * m[(2, 1)];
    let c20 = m[(0, 1)] * m[(1, 2)] - m[(0, 2)] * m[(1, 1)];
    let c21 = m[(0, 2)] * m[(1, 0)] - m[(0, 0)] * m[(1, 2)];
    let c22 = m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)];

    // The inverse is the transposed cofactor matrix divided by the determinant
    #[rustfmt::skip]
    let adjugate = Matrix3::new(
        c00, c10, c20,
        c01, c11, c21,
        c02, c12, c22);
    Ok(adjugate / det)
}
