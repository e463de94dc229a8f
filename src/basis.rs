//! Reference basis functions on the unit interval, square and cube.
use crate::Real;
use nalgebra::{DMatrix, DVector, RowVector4};
use numeric_literals::replace_float_literals;

/// Number of nodes of a multilinear Lagrange cell of the given dimension.
pub fn multilinear_node_count(dimension: usize) -> usize {
    1 << dimension
}

/// Evaluates the multilinear Lagrange basis on `[0, 1]^d` at `xi`.
///
/// Node `n` sits at the corner whose coordinate in direction `k` is bit `k` of `n`, so the
/// first xi direction varies fastest.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn multilinear_basis<T: Real>(xi: &[T]) -> DVector<T> {
    let n = multilinear_node_count(xi.len());
    DVector::from_fn(n, |node, _| {
        xi.iter().enumerate().fold(1.0, |phi, (k, &xi_k)| {
            if node & (1 << k) != 0 {
                phi * xi_k
            } else {
                phi * (1.0 - xi_k)
            }
        })
    })
}

/// Gradients of the multilinear basis, one column per node and one row per xi direction.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn multilinear_gradients<T: Real>(xi: &[T]) -> DMatrix<T> {
    let dim = xi.len();
    let n = multilinear_node_count(dim);
    DMatrix::from_fn(dim, n, |direction, node| {
        xi.iter().enumerate().fold(1.0, |dphi, (k, &xi_k)| {
            let upper = node & (1 << k) != 0;
            match (k == direction, upper) {
                (true, true) => dphi,
                (true, false) => -dphi,
                (false, true) => dphi * xi_k,
                (false, false) => dphi * (1.0 - xi_k),
            }
        })
    })
}

/// Evaluates the 1-D cubic Hermite basis on `[0, 1]` at `xi`.
///
/// The functions are ordered as (value at 0, derivative at 0, value at 1, derivative at 1).
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn cubic_hermite_basis<T: Real>(xi: T) -> RowVector4<T> {
    let xi2 = xi * xi;
    let xi3 = xi2 * xi;
    RowVector4::new(
        2.0 * xi3 - 3.0 * xi2 + 1.0,
        xi3 - 2.0 * xi2 + xi,
        -2.0 * xi3 + 3.0 * xi2,
        xi3 - xi2,
    )
}

#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn cubic_hermite_second_derivatives<T: Real>(xi: T) -> RowVector4<T> {
    RowVector4::new(12.0 * xi - 6.0, 6.0 * xi - 4.0, 6.0 - 12.0 * xi, 6.0 * xi - 2.0)
}
