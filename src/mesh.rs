//! Mesh topology consumed by field evaluation, and a small reference mesh.
//!
//! Field evaluation only needs to know element dimensions and how lower-dimensional elements
//! (faces and lines) sit inside their parents. Anything providing this information can implement
//! [`MeshTopology`]. The [`Mesh`] in this module is a minimal implementation made of
//! multilinear cells on `[0, 1]^d` plus faces mapped affinely into a parent element.
use crate::error::{FieldError, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;

pub mod procedural;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Element topology needed to promote locations to top-level elements.
pub trait MeshTopology: Send + Sync {
    fn element_dimension(&self, element: ElementId) -> Option<usize>;

    /// Elements of higher dimension that directly contain `element`.
    fn parent_elements(&self, element: ElementId) -> Vec<ElementId>;

    /// Maps xi coordinates of `element` to the coordinates of the same point in `parent`.
    fn parent_xi(&self, element: ElementId, parent: ElementId, xi: &[f64]) -> Option<Vec<f64>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum MeshElement {
    Cell {
        nodes: Vec<NodeId>,
        dimension: usize,
    },
    Face {
        parent: ElementId,
        dimension: usize,
        origin: Vec<f64>,
        // One column per face xi direction, one row per parent xi direction
        axes: DMatrix<f64>,
    },
}

/// A cell element resolved from an arbitrary element, together with the chain rule factor
/// `d(cell xi) / d(element xi)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCell<'a> {
    pub cell: ElementId,
    pub nodes: &'a [NodeId],
    pub xi: Vec<f64>,
    pub xi_jacobian: DMatrix<f64>,
}

/// Cells of dimension 1 to 3 with multilinear geometry, plus faces and lines that sit inside
/// them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    elements: Vec<MeshElement>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn number_of_elements(&self) -> usize {
        self.elements.len()
    }

    /// Adds a cell with `2^d` nodes, ordered with the first xi direction varying fastest.
    pub fn add_cell(&mut self, nodes: Vec<NodeId>) -> Result<ElementId> {
        let dimension = match nodes.len() {
            2 => 1,
            4 => 2,
            8 => 3,
            n => {
                return Err(FieldError::invalid_argument(format!(
                    "a multilinear cell needs 2, 4 or 8 nodes, got {n}"
                )))
            }
        };
        self.elements.push(MeshElement::Cell { nodes, dimension });
        Ok(ElementId(self.elements.len() - 1))
    }

    /// Adds a lower-dimensional element whose points map into `parent` by
    /// `parent_xi = origin + sum_k xi_k * axes[k]`.
    pub fn add_face(&mut self, parent: ElementId, origin: &[f64], axes: &[Vec<f64>]) -> Result<ElementId> {
        let parent_dimension = self
            .element_dimension(parent)
            .ok_or_else(|| FieldError::invalid_argument(format!("parent element {parent} does not exist")))?;
        let dimension = axes.len();
        if dimension == 0 || dimension >= parent_dimension {
            return Err(FieldError::invalid_argument(format!(
                "a face of a {parent_dimension}-D element must have dimension between 1 and {}",
                parent_dimension - 1
            )));
        }
        if origin.len() != parent_dimension || axes.iter().any(|axis| axis.len() != parent_dimension) {
            return Err(FieldError::invalid_argument(
                "face origin and axes must have the dimension of the parent",
            ));
        }

        let axes = DMatrix::from_fn(parent_dimension, dimension, |i, k| axes[k][i]);
        self.elements.push(MeshElement::Face {
            parent,
            dimension,
            origin: origin.to_vec(),
            axes,
        });
        Ok(ElementId(self.elements.len() - 1))
    }

    pub fn cell_nodes(&self, element: ElementId) -> Option<&[NodeId]> {
        match self.elements.get(element.0)? {
            MeshElement::Cell { nodes, .. } => Some(nodes),
            MeshElement::Face { .. } => None,
        }
    }

    /// Follows face mappings until a cell is reached.
    pub fn resolve_cell(&self, element: ElementId, xi: &[f64]) -> Option<ResolvedCell<'_>> {
        let dimension = self.element_dimension(element)?;
        if xi.len() != dimension {
            return None;
        }
        let mut current = element;
        let mut current_xi = xi.to_vec();
        let mut xi_jacobian = DMatrix::identity(dimension, dimension);
        loop {
            match self.elements.get(current.0)? {
                MeshElement::Cell { nodes, .. } => {
                    return Some(ResolvedCell {
                        cell: current,
                        nodes,
                        xi: current_xi,
                        xi_jacobian,
                    })
                }
                MeshElement::Face {
                    parent, origin, axes, ..
                } => {
                    current_xi = map_face_xi(origin, axes, &current_xi);
                    xi_jacobian = axes * xi_jacobian;
                    current = *parent;
                }
            }
        }
    }
}

fn map_face_xi(origin: &[f64], axes: &DMatrix<f64>, xi: &[f64]) -> Vec<f64> {
    (0..origin.len())
        .map(|i| origin[i] + xi.iter().enumerate().map(|(k, xi_k)| axes[(i, k)] * xi_k).sum::<f64>())
        .collect()
}

impl MeshTopology for Mesh {
    fn element_dimension(&self, element: ElementId) -> Option<usize> {
        self.elements.get(element.0).map(|e| match e {
            MeshElement::Cell { dimension, .. } => *dimension,
            MeshElement::Face { dimension, .. } => *dimension,
        })
    }

    fn parent_elements(&self, element: ElementId) -> Vec<ElementId> {
        match self.elements.get(element.0) {
            Some(MeshElement::Face { parent, .. }) => vec![*parent],
            _ => Vec::new(),
        }
    }

    fn parent_xi(&self, element: ElementId, parent: ElementId, xi: &[f64]) -> Option<Vec<f64>> {
        match self.elements.get(element.0)? {
            MeshElement::Face {
                parent: actual,
                origin,
                axes,
                dimension,
            } if *actual == parent && xi.len() == *dimension => Some(map_face_xi(origin, axes, xi)),
            _ => None,
        }
    }
}
