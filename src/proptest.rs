use crate::location::{ElementXiLocation, FieldLocation, NodeLocation};
use crate::mesh::{ElementId, NodeId};
use ::proptest::collection::vec;
use ::proptest::prelude::*;

/// Chart coordinates in the closed unit box of the given dimension.
pub fn xi(dimension: usize) -> impl Strategy<Value = Vec<f64>> {
    vec(0.0..=1.0, dimension)
}

/// Element locations in `element`, without derivatives.
pub fn element_xi_location(element: ElementId, dimension: usize) -> impl Strategy<Value = ElementXiLocation> {
    xi(dimension).prop_map(move |xi| {
        ElementXiLocation::new(element, dimension, &xi, 0.0).expect("Chart coordinates must match the dimension")
    })
}

/// Element locations in `element` requesting all derivatives.
pub fn element_xi_location_with_derivatives(
    element: ElementId,
    dimension: usize,
) -> impl Strategy<Value = ElementXiLocation> {
    element_xi_location(element, dimension).prop_map(move |location| {
        location
            .with_derivatives(dimension)
            .expect("The element dimension is a valid derivative count")
    })
}

/// Locations at one of the first `number_of_nodes` nodes or in one of the first
/// `number_of_elements` elements, all of dimension `dimension`.
pub fn field_location(
    number_of_nodes: usize,
    number_of_elements: usize,
    dimension: usize,
) -> impl Strategy<Value = FieldLocation> {
    let nodes = (0..number_of_nodes).prop_map(|n| FieldLocation::from(NodeLocation::new(NodeId(n), 0.0)));
    let elements = (0..number_of_elements)
        .prop_flat_map(move |e| element_xi_location(ElementId(e), dimension))
        .prop_map(FieldLocation::from);
    prop_oneof![nodes, elements]
}
