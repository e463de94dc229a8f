//! Assertion helpers shared by the workspace tests.

/// Poor man's approx assertion for matrices
#[macro_export]
macro_rules! assert_approx_matrix_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let diff = $x - $y;

        let max_absdiff = diff.abs().max();
        let approx_eq = max_absdiff <= $tol;

        if !approx_eq {
            println!("abstol: {:e}", $tol);
            println!("left: {}", $x);
            println!("right: {}", $y);
            println!("diff: {:e}", diff);
        }
        assert!(approx_eq);
    }};
}

/// Compares two sequences of `f64` entry by entry, e.g. evaluated field values against a literal.
#[macro_export]
macro_rules! assert_approx_values_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let left: Vec<f64> = $x.iter().copied().collect();
        let right: Vec<f64> = $y.iter().copied().collect();
        assert_eq!(left.len(), right.len(), "Length mismatch: {:?} vs. {:?}", left, right);
        let max_absdiff = $crate::max_abs_difference(&left, &right);
        if max_absdiff > $tol {
            println!("abstol: {:e}", $tol);
            println!("left: {:?}", left);
            println!("right: {:?}", right);
        }
        assert!(max_absdiff <= $tol);
    }};
}

pub fn max_abs_difference(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max)
}
