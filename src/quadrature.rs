//! Gauss-Legendre quadrature on the unit interval `[0, 1]`.
//!
//! The rules are those of [`fenris_quadrature::univariate::gauss`] on `[-1, 1]`, mapped to the
//! unit interval.
use crate::error::{FieldError, Result};
use itertools::Itertools;

/// Weights and points of a one-dimensional quadrature rule.
pub type QuadraturePair1d = (Vec<f64>, Vec<f64>);

/// Gauss quadrature for the interval `[0, 1]`, with points in ascending order.
///
/// Given `n` points, the rule integrates polynomials of order up to `2 n - 1` exactly. The
/// weights sum to one.
pub fn gauss(num_points: usize) -> Result<QuadraturePair1d> {
    if num_points == 0 {
        return Err(FieldError::invalid_argument("a quadrature rule needs at least one point"));
    }

    let (weights, points) = fenris_quadrature::univariate::gauss(num_points);
    Ok(weights
        .into_iter()
        .zip(points)
        .map(|(w, [x])| (0.5 * w, 0.5 * (x + 1.0)))
        .sorted_by(|(_, a), (_, b)| a.total_cmp(b))
        .unzip())
}
