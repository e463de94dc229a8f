//! Raw finite element interpolation, the leaves of every field graph.
use crate::basis::{multilinear_basis, multilinear_gradients, multilinear_node_count};
use crate::error::{FieldError, Result};
use crate::field::FieldValues;
use crate::location::{ElementXiLocation, FieldLocation};
use crate::mesh::{ElementId, Mesh, NodeId, ResolvedCell};
use nalgebra::{DMatrix, DVector};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Interpolation of nodal or element data at mesh locations.
///
/// Implementations return `number_of_components()` values, plus a `components x dimension`
/// matrix of xi-derivatives whenever the location requests derivatives.
///
/// Implementations that store editable data should be paired with
/// [`FieldModule::notify_data_changed`](crate::module::FieldModule::notify_data_changed), so
/// that cached evaluations of dependent fields are discarded after an edit.
pub trait Interpolant: Debug + Send + Sync {
    fn number_of_components(&self) -> usize;

    fn is_defined_at(&self, location: &FieldLocation) -> bool;

    fn interpolate(&self, location: &FieldLocation) -> Result<FieldValues>;
}

fn not_defined(reason: impl Into<String>) -> FieldError {
    FieldError::NotDefinedAtLocation {
        field: "finite_element".to_string(),
        reason: reason.into(),
    }
}

fn resolve<'a>(mesh: &'a Mesh, location: &ElementXiLocation) -> Result<ResolvedCell<'a>> {
    mesh.resolve_cell(location.element(), location.xi())
        .ok_or_else(|| not_defined(format!("element {} is not part of the mesh", location.element())))
}

/// Node-based multilinear Lagrange interpolation over the cells of a [`Mesh`].
///
/// Node values can be edited after the interpolant has been wrapped in a field.
#[derive(Debug)]
pub struct NodalInterpolant {
    mesh: Arc<Mesh>,
    number_of_components: usize,
    node_values: RwLock<Vec<Option<DVector<f64>>>>,
}

impl NodalInterpolant {
    pub fn new(mesh: Arc<Mesh>, number_of_components: usize) -> Self {
        Self {
            mesh,
            number_of_components,
            node_values: RwLock::new(Vec::new()),
        }
    }

    /// Creates an interpolant with values at nodes `0 .. values.len()`.
    pub fn from_node_values(mesh: Arc<Mesh>, values: Vec<DVector<f64>>) -> Result<Self> {
        let number_of_components = values
            .first()
            .map(|v| v.len())
            .ok_or_else(|| FieldError::invalid_argument("at least one node value is required"))?;
        if number_of_components == 0 || values.iter().any(|v| v.len() != number_of_components) {
            return Err(FieldError::invalid_argument(
                "all node values must have the same, positive number of components",
            ));
        }
        Ok(Self {
            mesh,
            number_of_components,
            node_values: RwLock::new(values.into_iter().map(Some).collect()),
        })
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    pub fn node_values(&self, node: NodeId) -> Option<DVector<f64>> {
        self.node_values.read().get(node.0).cloned().flatten()
    }

    pub fn set_node_values(&self, node: NodeId, values: &[f64]) -> Result<()> {
        if values.len() != self.number_of_components {
            return Err(FieldError::invalid_argument(format!(
                "expected {} node values, got {}",
                self.number_of_components,
                values.len()
            )));
        }
        let mut node_values = self.node_values.write();
        if node_values.len() <= node.0 {
            node_values.resize(node.0 + 1, None);
        }
        node_values[node.0] = Some(DVector::from_column_slice(values));
        Ok(())
    }

    fn gather(&self, nodes: &[NodeId]) -> Option<DMatrix<f64>> {
        let node_values = self.node_values.read();
        let mut gathered = DMatrix::zeros(self.number_of_components, nodes.len());
        for (j, node) in nodes.iter().enumerate() {
            let values = node_values.get(node.0)?.as_ref()?;
            gathered.set_column(j, values);
        }
        Some(gathered)
    }
}

impl Interpolant for NodalInterpolant {
    fn number_of_components(&self) -> usize {
        self.number_of_components
    }

    fn is_defined_at(&self, location: &FieldLocation) -> bool {
        match location {
            FieldLocation::Node(node) => self.node_values(node.node()).is_some(),
            FieldLocation::ElementXi(element_xi) => self
                .mesh
                .resolve_cell(element_xi.element(), element_xi.xi())
                .and_then(|resolved| self.gather(resolved.nodes))
                .is_some(),
        }
    }

    fn interpolate(&self, location: &FieldLocation) -> Result<FieldValues> {
        match location {
            FieldLocation::Node(node) => self
                .node_values(node.node())
                .map(FieldValues::new)
                .ok_or_else(|| not_defined(format!("node {} has no values", node.node()))),
            FieldLocation::ElementXi(element_xi) => {
                let resolved = resolve(&self.mesh, element_xi)?;
                let u = self
                    .gather(resolved.nodes)
                    .ok_or_else(|| not_defined(format!("element {} has nodes without values", resolved.cell)))?;

                let phi = multilinear_basis(&resolved.xi);
                let values = &u * phi;
                if element_xi.number_of_derivatives() == 0 {
                    return Ok(FieldValues::new(values));
                }
                // Derivatives with respect to cell xi, then chain rule into the element's own xi
                let gradients = multilinear_gradients(&resolved.xi);
                let cell_derivatives = &u * gradients.transpose();
                Ok(FieldValues::with_derivatives(values, cell_derivatives * &resolved.xi_jacobian))
            }
        }
    }
}

/// Values on a regular grid of points covering a cell, interpolated multilinearly between
/// neighbouring grid points.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementGrid {
    divisions: Vec<usize>,
    // One column per grid point, with the first xi direction varying fastest
    values: DMatrix<f64>,
}

impl ElementGrid {
    pub fn new(divisions: Vec<usize>, values: DMatrix<f64>) -> Result<Self> {
        if divisions.is_empty() || divisions.len() > 3 || divisions.iter().any(|&n| n == 0) {
            return Err(FieldError::invalid_argument("grid divisions must be 1 to 3 positive counts"));
        }
        let number_of_points: usize = divisions.iter().map(|n| n + 1).product();
        if values.ncols() != number_of_points || values.nrows() == 0 {
            return Err(FieldError::invalid_argument(format!(
                "a grid with divisions {:?} needs {} point values, got {}",
                divisions,
                number_of_points,
                values.ncols()
            )));
        }
        Ok(Self { divisions, values })
    }

    /// Samples `f` at every grid point, given by its xi coordinates.
    pub fn sample(divisions: Vec<usize>, number_of_components: usize, mut f: impl FnMut(&[f64]) -> DVector<f64>) -> Result<Self> {
        let points_per_axis: Vec<usize> = divisions.iter().map(|n| n + 1).collect();
        let number_of_points: usize = points_per_axis.iter().product();
        let mut values = DMatrix::zeros(number_of_components, number_of_points);
        let mut xi = vec![0.0; divisions.len()];
        for point in 0..number_of_points {
            let mut remainder = point;
            for (k, &count) in points_per_axis.iter().enumerate() {
                xi[k] = (remainder % count) as f64 / divisions[k] as f64;
                remainder /= count;
            }
            let value = f(&xi);
            if value.len() != number_of_components {
                return Err(FieldError::invalid_argument("sampled value has the wrong number of components"));
            }
            values.set_column(point, &value);
        }
        Self::new(divisions, values)
    }

    pub fn divisions(&self) -> &[usize] {
        &self.divisions
    }

    pub fn number_of_components(&self) -> usize {
        self.values.nrows()
    }

    /// Interpolates the grid at cell coordinates `xi`.
    ///
    /// Returns the values and their derivatives with respect to the cell's xi. The derivatives
    /// of every component are computed independently and scaled by the number of divisions in
    /// each direction.
    pub fn interpolate(&self, xi: &[f64]) -> (DVector<f64>, DMatrix<f64>) {
        let dim = self.divisions.len();
        let mut lower = vec![0; dim];
        let mut local_xi = vec![0.0; dim];
        for k in 0..dim {
            let n = self.divisions[k];
            let scaled = xi[k] * n as f64;
            let index = (scaled.floor().max(0.0) as usize).min(n - 1);
            lower[k] = index;
            local_xi[k] = scaled - index as f64;
        }

        let mut stride = 1;
        let mut corner_offsets = vec![0; multilinear_node_count(dim)];
        let mut base = 0;
        for k in 0..dim {
            base += lower[k] * stride;
            for (corner, offset) in corner_offsets.iter_mut().enumerate() {
                if corner & (1 << k) != 0 {
                    *offset += stride;
                }
            }
            stride *= self.divisions[k] + 1;
        }

        let phi = multilinear_basis(&local_xi);
        let gradients = multilinear_gradients(&local_xi);
        let components = self.number_of_components();
        let mut values = DVector::zeros(components);
        let mut derivatives = DMatrix::zeros(components, dim);
        for (corner, offset) in corner_offsets.iter().enumerate() {
            let point_values = self.values.column(base + offset);
            values.axpy(phi[corner], &point_values, 1.0);
            for k in 0..dim {
                let scale = gradients[(k, corner)] * self.divisions[k] as f64;
                let mut column = derivatives.column_mut(k);
                column.axpy(scale, &point_values, 1.0);
            }
        }
        (values, derivatives)
    }
}

/// Element-based interpolation on regular grids, one grid per cell.
#[derive(Debug)]
pub struct GridInterpolant {
    mesh: Arc<Mesh>,
    number_of_components: usize,
    grids: RwLock<FxHashMap<ElementId, ElementGrid>>,
}

impl GridInterpolant {
    pub fn new(mesh: Arc<Mesh>, number_of_components: usize) -> Self {
        Self {
            mesh,
            number_of_components,
            grids: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn set_element_grid(&self, cell: ElementId, grid: ElementGrid) -> Result<()> {
        let nodes = self
            .mesh
            .cell_nodes(cell)
            .ok_or_else(|| FieldError::invalid_argument(format!("element {cell} is not a cell")))?;
        if multilinear_node_count(grid.divisions().len()) != nodes.len() {
            return Err(FieldError::invalid_argument("grid dimension does not match the cell dimension"));
        }
        if grid.number_of_components() != self.number_of_components {
            return Err(FieldError::invalid_argument(format!(
                "expected a grid with {} components, got {}",
                self.number_of_components,
                grid.number_of_components()
            )));
        }
        self.grids.write().insert(cell, grid);
        Ok(())
    }
}

impl Interpolant for GridInterpolant {
    fn number_of_components(&self) -> usize {
        self.number_of_components
    }

    fn is_defined_at(&self, location: &FieldLocation) -> bool {
        match location {
            FieldLocation::Node(_) => false,
            FieldLocation::ElementXi(element_xi) => self
                .mesh
                .resolve_cell(element_xi.element(), element_xi.xi())
                .map_or(false, |resolved| self.grids.read().contains_key(&resolved.cell)),
        }
    }

    fn interpolate(&self, location: &FieldLocation) -> Result<FieldValues> {
        let element_xi = location
            .element_xi()
            .ok_or_else(|| not_defined("grid fields are only defined in elements"))?;
        let resolved = resolve(&self.mesh, element_xi)?;
        let grids = self.grids.read();
        let grid = grids
            .get(&resolved.cell)
            .ok_or_else(|| not_defined(format!("element {} has no grid", resolved.cell)))?;

        let (values, cell_derivatives) = grid.interpolate(&resolved.xi);
        if element_xi.number_of_derivatives() == 0 {
            Ok(FieldValues::new(values))
        } else {
            Ok(FieldValues::with_derivatives(values, cell_derivatives * &resolved.xi_jacobian))
        }
    }
}
