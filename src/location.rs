//! Locations at which fields are evaluated.
use crate::error::{FieldError, Result};
use crate::mesh::{ElementId, MeshTopology, NodeId};
use serde::{Deserialize, Serialize};

/// The largest supported element dimension.
pub const MAXIMUM_ELEMENT_XI_DIMENSIONS: usize = 3;

/// A point inside a mesh element, given by its chart coordinates `xi`.
///
/// The location also records how many xi-derivatives the caller wants. The count is either zero
/// or equal to the element dimension, so a location in a 2-D element can never ask for a
/// derivative with respect to a third xi direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementXiLocation {
    element: ElementId,
    dimension: usize,
    xi: [f64; MAXIMUM_ELEMENT_XI_DIMENSIONS],
    top_level_element: Option<ElementId>,
    time: f64,
    number_of_derivatives: usize,
}

impl ElementXiLocation {
    pub fn new(element: ElementId, dimension: usize, xi: &[f64], time: f64) -> Result<Self> {
        if dimension == 0 || dimension > MAXIMUM_ELEMENT_XI_DIMENSIONS {
            return Err(FieldError::invalid_argument(format!(
                "element dimension {dimension} is not supported"
            )));
        }
        if xi.len() != dimension {
            return Err(FieldError::invalid_argument(format!(
                "expected {} xi coordinates, got {}",
                dimension,
                xi.len()
            )));
        }
        let mut padded = [0.0; MAXIMUM_ELEMENT_XI_DIMENSIONS];
        padded[..dimension].copy_from_slice(xi);
        Ok(Self {
            element,
            dimension,
            xi: padded,
            top_level_element: None,
            time,
            number_of_derivatives: 0,
        })
    }

    /// Requests `count` xi-derivatives, which must be zero or the element dimension.
    pub fn with_derivatives(mut self, count: usize) -> Result<Self> {
        if count != 0 && count != self.dimension {
            return Err(FieldError::invalid_argument(format!(
                "cannot request {} derivatives in an element of dimension {}",
                count, self.dimension
            )));
        }
        self.number_of_derivatives = count;
        Ok(self)
    }

    /// Prefers `element` whenever the location is promoted to a top-level element.
    pub fn with_top_level_element(mut self, element: ElementId) -> Self {
        self.top_level_element = Some(element);
        self
    }

    pub fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn xi(&self) -> &[f64] {
        &self.xi[..self.dimension]
    }

    pub fn top_level_element(&self) -> Option<ElementId> {
        self.top_level_element
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn number_of_derivatives(&self) -> usize {
        self.number_of_derivatives
    }

    /// Maps the location into the highest-dimensional element containing it.
    ///
    /// Parents are followed until an element without parents is reached. When the location
    /// carries a top-level element hint, the walk prefers parents on the way to that element.
    /// The promoted location requests all derivatives of the top-level element, and keeps the
    /// time of the original location.
    pub fn promote_to_top_level(&self, mesh: &dyn MeshTopology) -> Result<Self> {
        let mut element = self.element;
        let mut xi = self.xi().to_vec();
        loop {
            if self.top_level_element == Some(element) {
                break;
            }
            let parents = mesh.parent_elements(element);
            let preferred = self
                .top_level_element
                .and_then(|hint| {
                    parents
                        .iter()
                        .copied()
                        .find(|&parent| parent == hint || is_ancestor(mesh, hint, parent))
                });
            let parent = match preferred.or_else(|| parents.first().copied()) {
                Some(parent) => parent,
                None => break,
            };
            xi = mesh.parent_xi(element, parent, &xi).ok_or_else(|| {
                FieldError::invalid_argument(format!("element {element} cannot be mapped into parent {parent}"))
            })?;
            element = parent;
        }

        let dimension = mesh
            .element_dimension(element)
            .ok_or_else(|| FieldError::invalid_argument(format!("element {element} is not part of the mesh")))?;
        Ok(Self::new(element, dimension, &xi, self.time)?
            .with_top_level_element(element)
            .with_derivatives(dimension)?)
    }
}

fn is_ancestor(mesh: &dyn MeshTopology, ancestor: ElementId, element: ElementId) -> bool {
    mesh.parent_elements(element)
        .into_iter()
        .any(|parent| parent == ancestor || is_ancestor(mesh, ancestor, parent))
}

/// A mesh node at a given time. Node locations never carry derivatives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeLocation {
    node: NodeId,
    time: f64,
}

impl NodeLocation {
    pub fn new(node: NodeId, time: f64) -> Self {
        Self { node, time }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn time(&self) -> f64 {
        self.time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FieldLocation {
    ElementXi(ElementXiLocation),
    Node(NodeLocation),
}

impl FieldLocation {
    /// The number of requested xi-derivatives: zero, or the element dimension.
    pub fn number_of_derivatives(&self) -> usize {
        match self {
            FieldLocation::ElementXi(location) => location.number_of_derivatives(),
            FieldLocation::Node(_) => 0,
        }
    }

    pub fn time(&self) -> f64 {
        match self {
            FieldLocation::ElementXi(location) => location.time(),
            FieldLocation::Node(location) => location.time(),
        }
    }

    pub fn element_xi(&self) -> Option<&ElementXiLocation> {
        match self {
            FieldLocation::ElementXi(location) => Some(location),
            FieldLocation::Node(_) => None,
        }
    }

    pub fn node(&self) -> Option<&NodeLocation> {
        match self {
            FieldLocation::Node(location) => Some(location),
            FieldLocation::ElementXi(_) => None,
        }
    }

    /// The same location with `count` derivatives requested.
    ///
    /// Requesting derivatives at a node is an error; requesting none always succeeds.
    pub fn with_derivatives(&self, count: usize) -> Result<Self> {
        match self {
            FieldLocation::ElementXi(location) => Ok(location.with_derivatives(count)?.into()),
            FieldLocation::Node(_) if count == 0 => Ok(*self),
            FieldLocation::Node(_) => Err(FieldError::invalid_argument("derivatives cannot be requested at a node")),
        }
    }
}

impl From<ElementXiLocation> for FieldLocation {
    fn from(location: ElementXiLocation) -> Self {
        FieldLocation::ElementXi(location)
    }
}

impl From<NodeLocation> for FieldLocation {
    fn from(location: NodeLocation) -> Self {
        FieldLocation::Node(location)
    }
}

/// A first-order chart derivative `d/dxi_term`, with `term` counted from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DifferentialOperator {
    order: usize,
    term: usize,
}

impl DifferentialOperator {
    pub fn first_order(term: usize) -> Result<Self> {
        if term == 0 || term > MAXIMUM_ELEMENT_XI_DIMENSIONS {
            return Err(FieldError::invalid_argument(format!("derivative term {term} is out of range")));
        }
        Ok(Self { order: 1, term })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn term(&self) -> usize {
        self.term
    }

    /// The 0-based xi index this operator differentiates with respect to.
    pub fn xi_index(&self) -> usize {
        self.term - 1
    }
}
