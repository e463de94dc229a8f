use crate::{box_fixture, element_location, element_location_with_derivatives};
use matrixcompare::assert_matrix_eq;
use nalgebra::DMatrix;
use proptest::prelude::*;
use util::assert_approx_values_eq;
use zincfield::cache::FieldCache;
use zincfield::coordinates::CoordinateSystem;
use zincfield::field::{FieldDefinition, FieldValues};
use zincfield::location::{FieldLocation, NodeLocation};
use zincfield::mesh::{ElementId, NodeId};
use zincfield::module::FieldModule;
use zincfield::FieldError;

fn node_location(node: usize) -> FieldLocation {
    NodeLocation::new(NodeId(node), 0.0).into()
}

proptest! {
    #[test]
    fn constant_is_independent_of_location(location in zincfield::proptest::field_location(8, 4, 3)) {
        let module = FieldModule::new();
        let constant = module.create_constant(&[2.0, -3.0, 5.5]).unwrap();
        let mut cache = FieldCache::new(&module);
        let values = cache.evaluate(&constant, &location).unwrap();
        prop_assert_eq!(values.values.as_slice(), &[2.0, -3.0, 5.5]);
        prop_assert!(values.derivatives.is_none());
    }

    #[test]
    fn derivative_of_linear_field_is_constant(location in zincfield::proptest::element_xi_location(ElementId(0), 3)) {
        let fixture = box_fixture(&[2.0, 1.0, 3.0], &[1, 1, 1]);
        let module = &fixture.module;
        let shifted = module.create_constant(&[1.0, -1.0, 0.5]).unwrap();
        let linear = module.create_add(&fixture.coordinates, &shifted, [-0.5, 2.0]).unwrap();
        let mut cache = FieldCache::new(module);
        let location: FieldLocation = location.into();
        for (xi_index, expected) in [[-1.0, 0.0, 0.0], [0.0, -0.5, 0.0], [0.0, 0.0, -1.5]].into_iter().enumerate() {
            let derivative = module.create_derivative(&linear, xi_index).unwrap();
            let values = cache.evaluate(&derivative, &location).unwrap();
            let error = values
                .values
                .iter()
                .zip(expected)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            prop_assert!(error <= 1e-12, "derivative {} at {:?} is off by {}", xi_index, location, error);
        }
    }
}

#[test]
fn constant_has_zero_derivatives() {
    let module = FieldModule::new();
    let constant = module.create_constant(&[1.0, 2.0]).unwrap();
    let mut cache = FieldCache::new(&module);
    let values = cache
        .evaluate(&constant, &element_location_with_derivatives(0, &[0.5, 0.5]))
        .unwrap();
    assert_eq!(values.derivatives, Some(DMatrix::zeros(2, 2)));

    assert!(matches!(module.create_constant(&[]), Err(FieldError::InvalidArgument(_))));
}

#[test]
fn xi_is_padded_with_identity_derivatives() {
    let module = FieldModule::new();
    let xi = module.create_xi().unwrap();
    assert_eq!(xi.number_of_components(), 3);
    let mut cache = FieldCache::new(&module);

    let values = cache
        .evaluate(&xi, &element_location_with_derivatives(0, &[0.2, 0.7]))
        .unwrap();
    assert_approx_values_eq!(values.values, [0.2, 0.7, 0.0], abstol = 0.0);
    assert_eq!(values.derivatives, Some(DMatrix::identity(3, 2)));

    assert!(!cache.is_defined(&xi, &node_location(0)));
    assert!(matches!(
        cache.evaluate(&xi, &node_location(0)),
        Err(FieldError::NotDefinedAtLocation { .. })
    ));
}

#[test]
fn component_and_magnitude() {
    let fixture = box_fixture(&[1.0, 1.0, 1.0], &[1, 1, 1]);
    let module = &fixture.module;
    let y = module.create_component(&fixture.coordinates, 1).unwrap();
    let magnitude = module.create_magnitude(&fixture.coordinates).unwrap();
    let mut cache = FieldCache::new(module);

    let location = element_location_with_derivatives(0, &[0.3, 0.4, 0.0]);
    let values = cache.evaluate(&y, &location).unwrap().clone();
    assert_approx_values_eq!(values.values, [0.4], abstol = 1e-14);
    assert_approx_values_eq!(values.derivatives.unwrap(), [0.0, 1.0, 0.0], abstol = 1e-14);

    let values = cache.evaluate(&magnitude, &location).unwrap();
    assert_approx_values_eq!(values.values, [0.5], abstol = 1e-14);
    assert_approx_values_eq!(values.derivatives.as_ref().unwrap(), [0.6, 0.8, 0.0], abstol = 1e-14);

    assert!(matches!(
        module.create_component(&fixture.coordinates, 3),
        Err(FieldError::InvalidArgument(_))
    ));
}

#[test]
fn magnitude_derivative_vanishes_at_origin() {
    let fixture = box_fixture(&[1.0, 1.0, 1.0], &[1, 1, 1]);
    let magnitude = fixture.module.create_magnitude(&fixture.coordinates).unwrap();
    let mut cache = FieldCache::new(&fixture.module);
    let values = cache
        .evaluate(&magnitude, &element_location_with_derivatives(0, &[0.0, 0.0, 0.0]))
        .unwrap();
    assert_eq!(values.values[0], 0.0);
    assert_eq!(values.derivatives, Some(DMatrix::zeros(1, 3)));
}

#[test]
fn add_and_multiply() {
    let fixture = box_fixture(&[1.0, 1.0, 1.0], &[1, 1, 1]);
    let module = &fixture.module;
    let ones = module.create_constant(&[1.0, 1.0, 1.0]).unwrap();
    let sum = module
        .create_add(&fixture.coordinates, &ones, [2.0, -1.0])
        .unwrap();
    let square = module
        .create_multiply(&fixture.coordinates, &fixture.coordinates)
        .unwrap();
    let mut cache = FieldCache::new(module);

    let location = element_location_with_derivatives(0, &[0.5, 0.25, 1.0]);
    let values = cache.evaluate(&sum, &location).unwrap().clone();
    assert_approx_values_eq!(values.values, [0.0, -0.5, 1.0], abstol = 1e-14);
    assert_matrix_eq!(values.derivatives.unwrap(), DMatrix::identity(3, 3) * 2.0, comp = abs, tol = 1e-14);

    let values = cache.evaluate(&square, &location).unwrap();
    assert_approx_values_eq!(values.values, [0.25, 0.0625, 1.0], abstol = 1e-14);
    let expected = DMatrix::from_diagonal(&nalgebra::DVector::from_column_slice(&[1.0, 0.5, 2.0]));
    assert_matrix_eq!(values.derivatives.clone().unwrap(), expected, comp = abs, tol = 1e-14);

    let scalar = module.create_constant(&[1.0]).unwrap();
    assert!(matches!(
        module.create_add(&fixture.coordinates, &scalar, [1.0, 1.0]),
        Err(FieldError::InvalidArgument(_))
    ));
    assert!(matches!(
        module.create_multiply(&scalar, &fixture.coordinates),
        Err(FieldError::InvalidArgument(_))
    ));
}

#[test]
fn add_inherits_coordinate_system_of_first_source() {
    let module = FieldModule::new();
    let polar = module
        .create_field(
            FieldDefinition::constant(&[1.0, 0.5])
                .unwrap()
                .with_coordinate_system(CoordinateSystem::CylindricalPolar),
        )
        .unwrap();
    let other = module.create_constant(&[0.0, 1.0]).unwrap();
    let sum = module.create_add(&polar, &other, [1.0, 1.0]).unwrap();
    assert_eq!(sum.coordinate_system(), CoordinateSystem::CylindricalPolar);
    assert_eq!(
        module
            .create_add(&other, &polar, [1.0, 1.0])
            .unwrap()
            .coordinate_system(),
        CoordinateSystem::RectangularCartesian
    );
}

#[test]
fn derivative_of_coordinates() {
    let fixture = box_fixture(&[2.0, 1.0, 1.0], &[1, 1, 1]);
    let module = &fixture.module;
    let d1 = module.create_derivative(&fixture.coordinates, 0).unwrap();
    let d3 = module.create_derivative(&fixture.coordinates, 2).unwrap();
    assert_eq!(d1.number_of_components(), 3);
    let mut cache = FieldCache::new(module);

    let location = element_location(0, &[0.3, 0.6, 0.9]);
    assert_approx_values_eq!(cache.evaluate(&d1, &location).unwrap().values, [2.0, 0.0, 0.0], abstol = 1e-14);
    assert_approx_values_eq!(cache.evaluate(&d3, &location).unwrap().values, [0.0, 0.0, 1.0], abstol = 1e-14);

    // Derivative fields provide no derivatives of their own
    let with_derivatives = element_location_with_derivatives(0, &[0.3, 0.6, 0.9]);
    assert!(matches!(
        cache.evaluate(&d1, &with_derivatives),
        Err(FieldError::DerivativesUnavailable { .. })
    ));

    assert!(!cache.is_defined(&d1, &node_location(0)));
    assert!(matches!(
        cache.evaluate(&d1, &node_location(0)),
        Err(FieldError::NotDefinedAtLocation { .. })
    ));
    assert!(matches!(
        module.create_derivative(&fixture.coordinates, 3),
        Err(FieldError::InvalidArgument(_))
    ));
}

#[test]
fn derivative_beyond_element_dimension_is_not_defined() {
    let fixture = box_fixture(&[1.0, 1.0], &[1, 1]);
    let d3 = fixture
        .module
        .create_derivative(&fixture.coordinates, 2)
        .unwrap();
    let mut cache = FieldCache::new(&fixture.module);
    let location = element_location(0, &[0.5, 0.5]);
    assert!(!cache.is_defined(&d3, &location));
    assert!(matches!(
        cache.evaluate(&d3, &location),
        Err(FieldError::NotDefinedAtLocation { .. })
    ));
}

#[test]
fn field_values_accessors() {
    let values = FieldValues::with_derivatives(
        nalgebra::DVector::from_column_slice(&[1.0, 2.0]),
        DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]),
    );
    assert_eq!(values.number_of_components(), 2);
    assert!(values.has_derivatives());
    assert_eq!(values.derivative(1, 0), Some(3.0));
    assert_eq!(values.derivative(2, 0), None);
    assert_eq!(FieldValues::zeros(3).derivative(0, 0), None);
}
