use matrixcompare::assert_scalar_eq;
use util::assert_approx_values_eq;
use zincfield::quadrature::gauss;
use zincfield::FieldError;

#[test]
fn gauss_four_points() {
    let (weights, points) = gauss(4).unwrap();
    assert_approx_values_eq!(
        points,
        [0.0694318442029737, 0.3300094782075719, 0.6699905217924281, 0.9305681557970263],
        abstol = 1e-14
    );
    assert_approx_values_eq!(
        weights,
        [0.1739274225687269, 0.3260725774312731, 0.3260725774312731, 0.1739274225687269],
        abstol = 1e-14
    );
}

#[test]
fn gauss_integrates_polynomials_exactly() {
    for n in 1..=8 {
        let (weights, points) = gauss(n).unwrap();
        assert_eq!(weights.len(), n);
        assert_eq!(points.len(), n);
        assert!(points.windows(2).all(|w| w[0] < w[1]));
        assert!(points.iter().all(|&x| 0.0 < x && x < 1.0));

        for k in 0..2 * n {
            let integral: f64 = weights
                .iter()
                .zip(&points)
                .map(|(w, x)| w * x.powi(k as i32))
                .sum();
            assert_scalar_eq!(integral, 1.0 / (k as f64 + 1.0), comp = abs, tol = 1e-14);
        }
    }
}

#[test]
fn gauss_needs_points() {
    assert!(matches!(gauss(0), Err(FieldError::InvalidArgument(_))));
}
