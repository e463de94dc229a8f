use zincfield::location::{DifferentialOperator, ElementXiLocation, FieldLocation, NodeLocation};
use zincfield::mesh::procedural::create_unit_cube_mesh;
use zincfield::mesh::{ElementId, NodeId};
use zincfield::FieldError;

#[test]
fn element_xi_location_rejects_bad_dimensions() {
    assert!(matches!(
        ElementXiLocation::new(ElementId(0), 0, &[], 0.0),
        Err(FieldError::InvalidArgument(_))
    ));
    assert!(matches!(
        ElementXiLocation::new(ElementId(0), 4, &[0.0; 4], 0.0),
        Err(FieldError::InvalidArgument(_))
    ));
    assert!(matches!(
        ElementXiLocation::new(ElementId(0), 2, &[0.5], 0.0),
        Err(FieldError::InvalidArgument(_))
    ));

    let location = ElementXiLocation::new(ElementId(3), 2, &[0.25, 0.75], 1.5).unwrap();
    assert_eq!(location.element(), ElementId(3));
    assert_eq!(location.xi(), &[0.25, 0.75]);
    assert_eq!(location.time(), 1.5);
    assert_eq!(location.number_of_derivatives(), 0);
    assert_eq!(location.top_level_element(), None);
}

#[test]
fn derivatives_are_none_or_all() {
    let location = ElementXiLocation::new(ElementId(0), 2, &[0.1, 0.2], 0.0).unwrap();
    assert_eq!(location.with_derivatives(2).unwrap().number_of_derivatives(), 2);
    assert_eq!(location.with_derivatives(0).unwrap().number_of_derivatives(), 0);
    assert!(location.with_derivatives(1).is_err());
    assert!(location.with_derivatives(3).is_err());
}

#[test]
fn node_locations_never_carry_derivatives() {
    let location = FieldLocation::from(NodeLocation::new(NodeId(4), 2.0));
    assert_eq!(location.number_of_derivatives(), 0);
    assert_eq!(location.time(), 2.0);
    assert_eq!(location.with_derivatives(0).unwrap(), location);
    assert!(matches!(location.with_derivatives(1), Err(FieldError::InvalidArgument(_))));
    assert!(location.element_xi().is_none());
    assert_eq!(location.node().map(|n| n.node()), Some(NodeId(4)));
}

#[test]
fn promote_face_location_to_cube() {
    let mut mesh = create_unit_cube_mesh().mesh;
    // The face z = 1 of the cube
    let face = mesh
        .add_face(ElementId(0), &[0.0, 0.0, 1.0], &[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]])
        .unwrap();

    let location = ElementXiLocation::new(face, 2, &[0.25, 0.5], 3.0).unwrap();
    let promoted = location.promote_to_top_level(&mesh).unwrap();
    assert_eq!(promoted.element(), ElementId(0));
    assert_eq!(promoted.dimension(), 3);
    assert_eq!(promoted.xi(), &[0.25, 0.5, 1.0]);
    assert_eq!(promoted.number_of_derivatives(), 3);
    assert_eq!(promoted.top_level_element(), Some(ElementId(0)));
    assert_eq!(promoted.time(), 3.0);
}

#[test]
fn promote_line_through_face_honours_hint() {
    let mut mesh = create_unit_cube_mesh().mesh;
    let face = mesh
        .add_face(ElementId(0), &[0.0, 1.0, 0.0], &[vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 1.0]])
        .unwrap();
    // The edge of the face at its second xi = 1, running along the first xi
    let line = mesh.add_face(face, &[0.0, 1.0], &[vec![1.0, 0.0]]).unwrap();

    let location = ElementXiLocation::new(line, 1, &[0.4], 0.0).unwrap();
    let promoted = location.promote_to_top_level(&mesh).unwrap();
    assert_eq!(promoted.element(), ElementId(0));
    assert_eq!(promoted.xi(), &[0.4, 1.0, 1.0]);

    // A hint naming the face stops the walk there
    let promoted_to_face = location
        .with_top_level_element(face)
        .promote_to_top_level(&mesh)
        .unwrap();
    assert_eq!(promoted_to_face.element(), face);
    assert_eq!(promoted_to_face.xi(), &[0.4, 1.0]);
    assert_eq!(promoted_to_face.number_of_derivatives(), 2);
}

#[test]
fn promoting_a_top_level_location_requests_derivatives() {
    let mesh = create_unit_cube_mesh().mesh;
    let location = ElementXiLocation::new(ElementId(0), 3, &[0.1, 0.2, 0.3], 0.0).unwrap();
    let promoted = location.promote_to_top_level(&mesh).unwrap();
    assert_eq!(promoted.xi(), location.xi());
    assert_eq!(promoted.number_of_derivatives(), 3);
}

#[test]
fn differential_operator_terms_are_one_based() {
    assert!(DifferentialOperator::first_order(0).is_err());
    assert!(DifferentialOperator::first_order(4).is_err());
    let operator = DifferentialOperator::first_order(2).unwrap();
    assert_eq!(operator.order(), 1);
    assert_eq!(operator.term(), 2);
    assert_eq!(operator.xi_index(), 1);
}
