use crate::{box_fixture, element_location};
use util::assert_approx_values_eq;
use zincfield::cache::{evaluate_at_locations, FieldCache};
use zincfield::field::FieldDefinition;
use zincfield::location::{DifferentialOperator, FieldLocation, NodeLocation};
use zincfield::mesh::{ElementId, NodeId};
use zincfield::module::FieldModule;
use zincfield::FieldError;

#[test]
fn repeated_evaluation_hits_the_cache() {
    let fixture = box_fixture(&[1.0, 1.0, 1.0], &[1, 1, 1]);
    let mut cache = FieldCache::new(&fixture.module);
    let location = element_location(0, &[0.5, 0.25, 0.75]);
    assert!(cache.cached(&fixture.coordinates).is_none());

    let first = cache.evaluate(&fixture.coordinates, &location).unwrap().clone();
    let entry = cache.cached(&fixture.coordinates).unwrap();
    assert_eq!(entry.location(), &location);
    assert_eq!(entry.revision(), fixture.coordinates.revision());
    assert_eq!(entry.values(), &first);
    assert!(entry.is_valid_for(&location, fixture.coordinates.revision()));
    assert!(!entry.is_valid_for(&element_location(0, &[0.5, 0.25, 0.5]), fixture.coordinates.revision()));

    let second = cache.evaluate(&fixture.coordinates, &location).unwrap();
    assert_eq!(second, &first);

    cache.invalidate(&fixture.coordinates);
    assert!(cache.cached(&fixture.coordinates).is_none());
    cache.evaluate(&fixture.coordinates, &location).unwrap();
    cache.clear();
    assert!(cache.cached(&fixture.coordinates).is_none());
}

#[test]
fn data_changes_are_visible_after_notification() {
    let fixture = box_fixture(&[1.0, 1.0], &[1, 1]);
    let module = &fixture.module;
    let sum = module
        .create_add(&fixture.coordinates, &fixture.coordinates, [1.0, 1.0])
        .unwrap();
    let mut cache = FieldCache::new(module);
    let node = FieldLocation::from(NodeLocation::new(NodeId(3), 0.0));
    assert_approx_values_eq!(cache.evaluate(&sum, &node).unwrap().values, [2.0, 2.0], abstol = 0.0);

    fixture
        .interpolant
        .set_node_values(NodeId(3), &[5.0, 6.0])
        .unwrap();
    // Without a notification the cached values remain in use
    assert_approx_values_eq!(cache.evaluate(&sum, &node).unwrap().values, [2.0, 2.0], abstol = 0.0);

    let revision = sum.revision();
    module.notify_data_changed(&fixture.coordinates).unwrap();
    assert!(sum.revision() > revision);
    assert_approx_values_eq!(cache.evaluate(&sum, &node).unwrap().values, [10.0, 12.0], abstol = 0.0);
}

#[test]
fn redefinition_updates_dependents() {
    let module = FieldModule::new();
    let a = module.create_constant(&[1.0, 2.0]).unwrap();
    let b = module.create_constant(&[10.0, 20.0]).unwrap();
    let sum = module.create_add(&a, &b, [1.0, 1.0]).unwrap();
    let mut cache = FieldCache::new(&module);
    let location = element_location(0, &[0.5]);

    assert_approx_values_eq!(cache.evaluate(&sum, &location).unwrap().values, [11.0, 22.0], abstol = 0.0);
    module
        .redefine(&a, FieldDefinition::constant(&[5.0, 6.0]).unwrap())
        .unwrap();
    assert_approx_values_eq!(cache.evaluate(&sum, &location).unwrap().values, [15.0, 26.0], abstol = 0.0);
    assert_eq!(a.type_name(), "constant");
}

#[test]
fn failed_evaluation_leaves_no_cached_values() {
    let fixture = box_fixture(&[1.0, 1.0, 1.0], &[1, 1, 1]);
    let module = &fixture.module;
    let xi = module.create_xi().unwrap();
    let mut cache = FieldCache::new(module);

    cache.evaluate(&xi, &element_location(0, &[0.5, 0.5, 0.5])).unwrap();
    assert!(cache.cached(&xi).is_some());

    let node = FieldLocation::from(NodeLocation::new(NodeId(0), 0.0));
    assert!(cache.evaluate(&xi, &node).is_err());
    assert!(cache.cached(&xi).is_none());
    // Failing again is not served from the cache either
    assert!(cache.evaluate(&xi, &node).is_err());
}

#[test]
fn shared_sources_at_different_locations() {
    let fixture = box_fixture(&[2.0, 1.0, 1.0], &[1, 1, 1]);
    let module = &fixture.module;
    // The coordinates are needed both with and without derivatives
    let dx_dxi1 = module.create_derivative(&fixture.coordinates, 0).unwrap();
    let sum = module
        .create_add(&fixture.coordinates, &dx_dxi1, [1.0, 1.0])
        .unwrap();
    let mut cache = FieldCache::new(module);
    let values = cache
        .evaluate(&sum, &element_location(0, &[0.5, 0.5, 0.5]))
        .unwrap();
    assert_approx_values_eq!(values.values, [3.0, 0.5, 0.5], abstol = 1e-14);
}

#[test]
fn evaluation_at_the_current_location() {
    let fixture = box_fixture(&[2.0, 3.0], &[1, 1]);
    let mut cache = FieldCache::new(&fixture.module);
    let coordinates = &fixture.coordinates;

    assert!(matches!(cache.evaluate_real(coordinates), Err(FieldError::InvalidArgument(_))));
    assert!(cache.location().is_none());

    cache.set_element_xi(ElementId(0), &[0.5, 0.25]).unwrap();
    assert_approx_values_eq!(cache.evaluate_real(coordinates).unwrap(), [1.0, 0.75], abstol = 1e-14);
    let dx_dxi2 = cache
        .evaluate_derivative(coordinates, DifferentialOperator::first_order(2).unwrap())
        .unwrap();
    assert_approx_values_eq!(dx_dxi2, [0.0, 3.0], abstol = 1e-14);
    assert!(matches!(
        cache.evaluate_derivative(coordinates, DifferentialOperator::first_order(3).unwrap()),
        Err(FieldError::InvalidArgument(_))
    ));
    assert!(matches!(
        cache.set_element_xi(ElementId(5), &[0.5, 0.5]),
        Err(FieldError::InvalidArgument(_))
    ));

    cache.set_time(2.5);
    assert_eq!(cache.location().unwrap().time(), 2.5);
    cache.set_node(NodeId(3));
    assert_eq!(cache.location().unwrap().time(), 2.5);
    assert_approx_values_eq!(cache.evaluate_real(coordinates).unwrap(), [2.0, 3.0], abstol = 0.0);
    assert!(matches!(
        cache.evaluate_derivative(coordinates, DifferentialOperator::first_order(1).unwrap()),
        Err(FieldError::NotDefinedAtLocation { .. })
    ));
}

#[test]
fn fields_of_other_modules_are_rejected() {
    let module = FieldModule::new();
    let other = FieldModule::new();
    let foreign = other.create_constant(&[1.0]).unwrap();
    let mut cache = FieldCache::new(&module);
    let location = element_location(0, &[0.5]);

    assert!(matches!(cache.evaluate(&foreign, &location), Err(FieldError::InvalidArgument(_))));
    assert!(!cache.is_defined(&foreign, &location));
    assert!(matches!(
        module.create_magnitude(&foreign),
        Err(FieldError::InvalidArgument(_))
    ));
}

#[test]
fn is_defined_checks_all_sources() {
    let fixture = box_fixture(&[1.0, 1.0, 1.0], &[1, 1, 1]);
    let module = &fixture.module;
    let xi = module.create_xi().unwrap();
    let sum = module.create_add(&fixture.coordinates, &xi, [1.0, 1.0]).unwrap();
    let cache = FieldCache::new(module);

    let node = FieldLocation::from(NodeLocation::new(NodeId(0), 0.0));
    assert!(cache.is_defined(&fixture.coordinates, &node));
    assert!(!cache.is_defined(&sum, &node));
    assert!(cache.is_defined(&sum, &element_location(0, &[0.5, 0.5, 0.5])));
    assert!(!cache.is_defined(&sum, &element_location(1, &[0.5, 0.5, 0.5])));
}

#[test]
fn parallel_evaluation_matches_serial_evaluation() {
    let fixture = box_fixture(&[2.0, 1.0, 1.0], &[2, 1, 1]);
    let module = &fixture.module;
    let magnitude = module.create_magnitude(&fixture.coordinates).unwrap();
    let locations: Vec<FieldLocation> = (0..64)
        .map(|i| {
            let t = i as f64 / 63.0;
            element_location(i % 2, &[t, 1.0 - t, 0.5 * t])
        })
        .chain(std::iter::once(element_location(7, &[0.5, 0.5, 0.5])))
        .collect();

    let parallel = evaluate_at_locations(module, &magnitude, &locations);
    assert_eq!(parallel.len(), locations.len());

    let mut cache = FieldCache::new(module);
    for (location, result) in locations.iter().zip(&parallel) {
        match cache.evaluate(&magnitude, location) {
            Ok(values) => assert_eq!(result.as_ref().unwrap(), values),
            Err(error) => assert_eq!(result.as_ref().unwrap_err(), &error),
        }
    }
    assert!(parallel.last().unwrap().is_err());
}
