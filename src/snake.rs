//! Least-squares fitting of a chain of 1-D cubic Hermite elements through ordered samples.
//!
//! Samples are placed on the chain by their cumulative arc length, optionally blended with
//! their sequence number. Each fitted component is then the weighted least-squares cubic
//! Hermite curve through the samples, optionally smoothed by a penalty on its second
//! derivative. All components share one stiffness matrix, which is factorized once.
use crate::basis::{cubic_hermite_basis, cubic_hermite_second_derivatives};
use crate::cache::FieldCache;
use crate::error::{FieldError, Result};
use crate::field::Field;
use crate::mesh::NodeId;
use crate::quadrature;
use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use zincfield_linalg::{lu_backsubstitute, lu_decompose, DEFAULT_SINGULAR_TOLERANCE};

const PENALTY_QUADRATURE_POINTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnakeSettings {
    pub number_of_elements: usize,
    /// Blends the placement of samples between arc length (0) and sample number (1).
    pub density_factor: f64,
    /// Weight of the second-derivative penalty. Zero disables smoothing.
    pub stiffness: f64,
    /// Pivot tolerance of the LU factorization of the stiffness matrix.
    pub singular_tolerance: f64,
}

impl Default for SnakeSettings {
    fn default() -> Self {
        Self {
            number_of_elements: 1,
            density_factor: 0.0,
            stiffness: 0.0,
            singular_tolerance: DEFAULT_SINGULAR_TOLERANCE,
        }
    }
}

/// Ordered samples to fit.
///
/// `positions` determine the arc length along the samples, `values` are the data fitted at
/// each sample, and `weights` scale the contribution of each sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SnakeData {
    pub positions: Vec<DVector<f64>>,
    pub weights: Vec<f64>,
    pub values: Vec<DVector<f64>>,
}

impl SnakeData {
    /// Samples with unit weights.
    pub fn new(positions: Vec<DVector<f64>>, values: Vec<DVector<f64>>) -> Self {
        let weights = vec![1.0; positions.len()];
        Self {
            positions,
            weights,
            values,
        }
    }

    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = weights;
        self
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// The number of fitted components, after checking that all samples agree on it.
    fn number_of_components(&self) -> Result<usize> {
        let n = self.len();
        if self.values.len() != n || self.weights.len() != n {
            return Err(FieldError::invalid_argument(format!(
                "got {} positions, {} weights and {} values",
                n,
                self.weights.len(),
                self.values.len()
            )));
        }
        let dimension = self.positions.first().map_or(0, |v| v.len());
        if self.positions.iter().any(|p| p.len() != dimension) {
            return Err(FieldError::invalid_argument("positions differ in their number of components"));
        }
        let components = self.values.first().map_or(0, |v| v.len());
        if components == 0 || self.values.iter().any(|v| v.len() != components) {
            return Err(FieldError::invalid_argument(
                "fitted values must have the same, non-zero number of components",
            ));
        }
        Ok(components)
    }

    /// Arc length from the first sample to every sample.
    fn cumulative_lengths(&self) -> Vec<f64> {
        let mut lengths = Vec::with_capacity(self.len());
        let mut total = 0.0;
        for (i, position) in self.positions.iter().enumerate() {
            if i > 0 {
                total += (position - &self.positions[i - 1]).norm();
            }
            lengths.push(total);
        }
        lengths
    }
}

/// Receives the nodes and elements of a fitted snake, for example to add them to a mesh.
pub trait SnakeMaterializer {
    /// `values` and `derivatives` hold all fitted components of node `index`.
    fn create_node(&mut self, index: usize, values: &DVector<f64>, derivatives: &DVector<f64>) -> eyre::Result<()>;

    fn create_element(&mut self, index: usize, nodes: [usize; 2]) -> eyre::Result<()>;
}

/// The solution of a snake fit: values and xi-derivatives at the `N + 1` nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct SnakeFit {
    number_of_elements: usize,
    total_length: f64,
    // One row per degree of freedom (value, derivative) of each node, one column per component
    solution: DMatrix<f64>,
}

impl SnakeFit {
    pub fn number_of_elements(&self) -> usize {
        self.number_of_elements
    }

    pub fn number_of_nodes(&self) -> usize {
        self.number_of_elements + 1
    }

    pub fn number_of_components(&self) -> usize {
        self.solution.ncols()
    }

    /// Arc length of the samples the snake was fitted to.
    pub fn total_length(&self) -> f64 {
        self.total_length
    }

    pub fn node_value(&self, node: usize) -> Option<DVector<f64>> {
        (node < self.number_of_nodes()).then(|| self.solution.row(2 * node).transpose())
    }

    /// Derivative with respect to the element xi at `node`.
    pub fn node_derivative(&self, node: usize) -> Option<DVector<f64>> {
        (node < self.number_of_nodes()).then(|| self.solution.row(2 * node + 1).transpose())
    }

    /// Interpolates all components at `xi` in `element`.
    pub fn evaluate(&self, element: usize, xi: f64) -> Result<DVector<f64>> {
        if element >= self.number_of_elements || !(0.0..=1.0).contains(&xi) {
            return Err(FieldError::invalid_argument(format!(
                "no point at xi {xi} in element {element} of a snake with {} elements",
                self.number_of_elements
            )));
        }
        let phi = cubic_hermite_basis(xi);
        let mut value = DVector::zeros(self.number_of_components());
        for m in 0..4 {
            value += self.solution.row(2 * element + m).transpose() * phi[m];
        }
        Ok(value)
    }

    /// Creates the nodes and then the elements of the snake through `materializer`.
    pub fn materialize(&self, materializer: &mut impl SnakeMaterializer) -> eyre::Result<()> {
        for node in 0..self.number_of_nodes() {
            let values = self.solution.row(2 * node).transpose();
            let derivatives = self.solution.row(2 * node + 1).transpose();
            materializer.create_node(node, &values, &derivatives)?;
        }
        for element in 0..self.number_of_elements {
            materializer.create_element(element, [element, element + 1])?;
        }
        Ok(())
    }
}

/// The element containing the reparametrized sample position `s`, and the xi within it.
fn element_xi(s: f64, number_of_elements: usize) -> (usize, f64) {
    let element = s.floor() as usize;
    if element >= number_of_elements {
        (number_of_elements - 1, 1.0)
    } else {
        (element, s - element as f64)
    }
}

/// Fits a chain of `settings.number_of_elements` cubic Hermite elements to `data`.
pub fn fit_snake(data: &SnakeData, settings: &SnakeSettings) -> Result<SnakeFit> {
    let SnakeSettings {
        number_of_elements,
        density_factor,
        stiffness,
        singular_tolerance,
    } = *settings;
    if !(0.0..=1.0).contains(&density_factor) {
        return Err(FieldError::invalid_argument(format!(
            "density factor {density_factor} is outside [0, 1]"
        )));
    }
    if !(stiffness >= 0.0) {
        return Err(FieldError::invalid_argument(format!("stiffness {stiffness} is negative")));
    }
    let number_of_components = data.number_of_components()?;
    let n = data.len();
    if n < 2 {
        return Err(FieldError::DegenerateInput(format!("need at least 2 samples, got {n}")));
    }
    if number_of_elements == 0 {
        return Err(FieldError::SingularSystem);
    }
    let lengths = data.cumulative_lengths();
    let total_length = lengths[n - 1];
    if !(total_length > 0.0) {
        return Err(FieldError::DegenerateInput("samples have zero total length".to_string()));
    }
    if stiffness <= 0.0 && n < 2 * number_of_elements + 2 {
        return Err(FieldError::DegenerateInput(format!(
            "{n} samples cannot determine {number_of_elements} elements without stiffness"
        )));
    }

    let length_multiplier = number_of_elements as f64 / total_length;
    let density_multiplier = number_of_elements as f64 / (n - 1) as f64;
    let number_of_rows = 2 * (number_of_elements + 1);
    let mut stiffness_matrix = DMatrix::zeros(number_of_rows, number_of_rows);
    let mut forces = DMatrix::zeros(number_of_rows, number_of_components);

    for (i, length) in lengths.iter().enumerate() {
        let s = (1.0 - density_factor) * length * length_multiplier + density_factor * i as f64 * density_multiplier;
        let (element, xi) = element_xi(s, number_of_elements);
        let start = 2 * element;
        let phi = cubic_hermite_basis(xi);
        let weight = data.weights[i];
        for m in 0..4 {
            for k in 0..4 {
                stiffness_matrix[(start + m, start + k)] += weight * phi[m] * phi[k];
            }
            for c in 0..number_of_components {
                forces[(start + m, c)] += weight * phi[m] * data.values[i][c];
            }
        }
    }

    if stiffness > 0.0 {
        let dxi_ds = number_of_elements as f64 / total_length;
        let dxi_ds_4 = dxi_ds.powi(4);
        let (weights, points) = quadrature::gauss(PENALTY_QUADRATURE_POINTS)?;
        for element in 0..number_of_elements {
            let start = 2 * element;
            for (w, xi) in weights.iter().zip(&points) {
                let weight = dxi_ds_4 * stiffness * w;
                let d2phi = cubic_hermite_second_derivatives(*xi);
                for m in 0..4 {
                    for k in 0..4 {
                        stiffness_matrix[(start + m, start + k)] += weight * d2phi[m] * d2phi[k];
                    }
                }
            }
        }
    }

    let lu = lu_decompose(stiffness_matrix, singular_tolerance)?;
    let mut solution = forces;
    for c in 0..number_of_components {
        let mut b = solution.column(c).into_owned();
        lu_backsubstitute(&lu, &mut b)?;
        solution.set_column(c, &b);
    }

    debug!(
        "Fitted {} elements to {} samples over length {} (density factor {}, stiffness {})",
        number_of_elements, n, total_length, density_factor, stiffness
    );
    Ok(SnakeFit {
        number_of_elements,
        total_length,
        solution,
    })
}

/// Gathers snake samples by evaluating fields at `nodes`, in order.
///
/// Positions come from `coordinate`, weights from the first component of `weight` (one when
/// absent), and the fitted values are the components of `fitting_fields` concatenated.
pub fn sample_snake_data(
    cache: &mut FieldCache,
    coordinate: &Field,
    weight: Option<&Field>,
    fitting_fields: &[Field],
    nodes: &[NodeId],
) -> Result<SnakeData> {
    if fitting_fields.is_empty() {
        return Err(FieldError::invalid_argument("at least one field must be fitted"));
    }
    let mut positions = Vec::with_capacity(nodes.len());
    let mut weights = Vec::with_capacity(nodes.len());
    let mut values = Vec::with_capacity(nodes.len());
    for &node in nodes {
        cache.set_node(node);
        positions.push(cache.evaluate_real(coordinate)?);
        weights.push(match weight {
            Some(field) => cache.evaluate_real(field)?[0],
            None => 1.0,
        });
        let mut node_values = Vec::new();
        for field in fitting_fields {
            node_values.extend(cache.evaluate_real(field)?.iter().copied());
        }
        values.push(DVector::from_vec(node_values));
    }
    Ok(SnakeData {
        positions,
        weights,
        values,
    })
}
