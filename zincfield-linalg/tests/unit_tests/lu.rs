use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector};
use proptest::prelude::*;
use zincfield_linalg::{lu_backsubstitute, lu_decompose, LinalgError};

/// Square matrices of dimension 1 to 6 whose diagonal dominates each row.
fn well_conditioned_system() -> impl Strategy<Value = (DMatrix<f64>, DVector<f64>)> {
    (1usize..=6).prop_flat_map(|n| {
        let entries = proptest::collection::vec(-1.0..1.0, n * n);
        let x = proptest::collection::vec(-10.0..10.0, n);
        (entries, x).prop_map(move |(entries, x)| {
            let mut a = DMatrix::from_row_slice(n, n, &entries);
            for i in 0..n {
                let sign = if a[(i, i)] < 0.0 { -1.0 } else { 1.0 };
                a[(i, i)] += sign * (n as f64 + 1.0);
            }
            (a, DVector::from_vec(x))
        })
    })
}

proptest! {
    #[test]
    fn lu_backsubstitute_recovers_solution((a, x) in well_conditioned_system()) {
        let mut b = &a * &x;
        let lu = lu_decompose(a, 1e-12).unwrap();
        lu_backsubstitute(&lu, &mut b).unwrap();
        assert_matrix_eq!(b, x, comp = abs, tol = 1e-9);
    }

    #[test]
    fn lu_determinant_matches_nalgebra((a, _x) in well_conditioned_system()) {
        let expected = a.determinant();
        let lu = lu_decompose(a, 1e-12).unwrap();
        prop_assert!((lu.determinant() - expected).abs() <= 1e-9 * expected.abs().max(1.0));
    }
}

#[test]
fn lu_decompose_pivots_on_zero_diagonal() {
    #[rustfmt::skip]
    let a = DMatrix::from_row_slice(3, 3, &[
        0.0, 1.0, 2.0,
        3.0, 0.0, 1.0,
        1.0, 4.0, 0.0]);
    let lu = lu_decompose(a.clone(), 1e-12).unwrap();
    assert_eq!(lu.pivots()[0], 1);

    let b = DVector::from_column_slice(&[3.0, 4.0, 5.0]);
    let x = lu.solve(&b).unwrap();
    assert_matrix_eq!(&a * x, b, comp = abs, tol = 1e-12);
}

#[test]
fn lu_decompose_singular_matrix_fails() {
    #[rustfmt::skip]
    let a = DMatrix::from_row_slice(3, 3, &[
        1.0, 2.0, 3.0,
        4.0, 5.0, 6.0,
        7.0, 8.0, 9.0]);
    assert_eq!(lu_decompose(a, 1e-12), Err(LinalgError::Singular));

    let zero_row = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 0.0, 0.0]);
    assert_eq!(lu_decompose(zero_row, 1e-12), Err(LinalgError::Singular));
}

#[test]
fn lu_rejects_mismatched_dimensions() {
    let rectangular = DMatrix::<f64>::zeros(2, 3);
    assert_eq!(
        lu_decompose(rectangular, 1e-12),
        Err(LinalgError::DimensionMismatch { expected: 2, actual: 3 })
    );

    let lu = lu_decompose(DMatrix::<f64>::identity(3, 3), 1e-12).unwrap();
    let mut b = DVector::zeros(2);
    assert_eq!(
        lu_backsubstitute(&lu, &mut b),
        Err(LinalgError::DimensionMismatch { expected: 3, actual: 2 })
    );
}

#[test]
fn lu_sign_tracks_row_interchanges() {
    let swap = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]);
    let lu = lu_decompose(swap, 1e-12).unwrap();
    assert_eq!(lu.sign(), -1.0);
    assert_eq!(lu.determinant(), -1.0);
}
