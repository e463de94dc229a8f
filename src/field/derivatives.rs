//! Kinds differentiating their sources: xi derivatives, curl, divergence and gradient.
//!
//! Curl, divergence and gradient evaluate their sources at the top-level element so that
//! faces and lines see the derivatives of the enclosing element. Where the coordinate
//! Jacobian cannot be inverted, for instance at a collapsed apex, they produce zeros and log a
//! warning instead of failing, so that the remainder of a mesh can still be evaluated.
//! None of them provides derivatives of its own.
use crate::coordinates::CoordinateSystem;
use crate::error::{FieldError, Result};
use crate::field::{EvaluationInput, Field, FieldValues};
use crate::location::{ElementXiLocation, FieldLocation};
use log::warn;
use nalgebra::{DMatrix, DVector};
use zincfield_linalg::{invert3x3, lu_backsubstitute, lu_decompose, LinalgError};

fn element_location<'a>(input: &EvaluationInput<'a>, type_name: &str) -> Result<&'a ElementXiLocation> {
    input
        .location
        .element_xi()
        .ok_or_else(|| input.not_defined(format!("{type_name} is only defined in elements")))
}

fn source_derivatives<'a>(input: &EvaluationInput<'a>, index: usize) -> Result<&'a DMatrix<f64>> {
    input.source_values[index]
        .derivatives
        .as_ref()
        .ok_or_else(|| FieldError::DerivativesUnavailable {
            field: input.sources[index].name(),
        })
}

/// The vector source of curl and divergence can be redefined after construction.
fn vector_is_rectangular_cartesian(sources: &[Field]) -> bool {
    sources[0].coordinate_system().is_rectangular_cartesian()
}

fn require_rectangular_cartesian_vector(input: &EvaluationInput, type_name: &str) -> Result<()> {
    if vector_is_rectangular_cartesian(input.sources) {
        Ok(())
    } else {
        Err(input.not_defined(format!(
            "the vector field of a {type_name} must be rectangular Cartesian, `{}` is {}",
            input.sources[0].name(),
            input.sources[0].coordinate_system()
        )))
    }
}

pub(super) fn derivative_is_defined(xi_index: usize, location: &FieldLocation) -> bool {
    location.element_xi().map_or(false, |l| xi_index < l.dimension())
}

/// `value[i] = d(source[i]) / d(xi[xi_index])` in the element of the location itself.
pub(super) fn evaluate_derivative(xi_index: usize, input: &EvaluationInput) -> Result<FieldValues> {
    let dimension = element_location(input, "derivative")?.dimension();
    if xi_index >= dimension {
        return Err(input.not_defined(format!(
            "derivative {} is not defined on an element of dimension {}",
            xi_index + 1,
            dimension
        )));
    }
    let derivatives = source_derivatives(input, 0)?;
    Ok(FieldValues::new(derivatives.column(xi_index).into_owned()))
}

pub(super) fn curl_is_defined(source_location: &FieldLocation, sources: &[Field]) -> bool {
    vector_is_rectangular_cartesian(sources) && source_location.element_xi().map_or(false, |l| l.dimension() == 3)
}

pub(super) fn evaluate_curl(input: &EvaluationInput) -> Result<FieldValues> {
    element_location(input, "curl")?;
    require_rectangular_cartesian_vector(input, "curl")?;
    let dimension = input.source_dimension();
    if dimension != 3 {
        return Err(input.not_defined(format!("curl needs 3-D elements, got dimension {dimension}")));
    }
    let dv_dxi = source_derivatives(input, 0)?;
    let coordinates = &input.source_values[1];
    let (_, dx_dxi) = input.sources[1]
        .coordinate_system()
        .to_rectangular_cartesian_with_jacobian(coordinates.values.as_slice(), source_derivatives(input, 1)?);

    let mut curl = DVector::zeros(3);
    match invert3x3(&dx_dxi, input.tolerances.jacobian_determinant) {
        Ok(dxi_dx) => {
            for i in 0..dimension {
                curl[0] += dv_dxi[(2, i)] * dxi_dx[(i, 1)] - dv_dxi[(1, i)] * dxi_dx[(i, 2)];
                curl[1] += dv_dxi[(0, i)] * dxi_dx[(i, 2)] - dv_dxi[(2, i)] * dxi_dx[(i, 0)];
                curl[2] += dv_dxi[(1, i)] * dxi_dx[(i, 0)] - dv_dxi[(0, i)] * dxi_dx[(i, 1)];
            }
        }
        Err(_) => warn!(
            "Could not invert coordinate derivatives; setting curl `{}` to 0",
            input.field_name
        ),
    }
    Ok(FieldValues::new(curl))
}

/// Whether `dx/dxi` can be made invertible for the given element dimension and coordinates.
fn divergence_supported(dimension: usize, coordinate_components: usize, system: CoordinateSystem) -> bool {
    (dimension == 3 && coordinate_components == 3)
        || (system.is_rectangular_cartesian() && coordinate_components == dimension)
        || (system == CoordinateSystem::CylindricalPolar && dimension == 2 && coordinate_components == 2)
}

pub(super) fn divergence_is_defined(source_location: &FieldLocation, sources: &[Field]) -> bool {
    let coordinates = &sources[1];
    vector_is_rectangular_cartesian(sources)
        && source_location.element_xi().map_or(false, |l| {
            divergence_supported(
                l.dimension(),
                coordinates.number_of_components(),
                coordinates.coordinate_system(),
            )
        })
}

pub(super) fn evaluate_divergence(input: &EvaluationInput) -> Result<FieldValues> {
    element_location(input, "divergence")?;
    require_rectangular_cartesian_vector(input, "divergence")?;
    let dimension = input.source_dimension();
    let coordinate_field = &input.sources[1];
    let system = coordinate_field.coordinate_system();
    if !divergence_supported(dimension, coordinate_field.number_of_components(), system) {
        return Err(input.not_defined(format!(
            "divergence is not supported for {} {} coordinates in elements of dimension {}",
            coordinate_field.number_of_components(),
            system,
            dimension
        )));
    }
    let dv_dxi = source_derivatives(input, 0)?;
    let coordinates = &input.source_values[1];
    let (_, mut dx_dxi) =
        system.to_rectangular_cartesian_with_jacobian(coordinates.values.as_slice(), source_derivatives(input, 1)?);

    // Unit diagonal entries in the missing directions keep lower-dimensional Jacobians invertible
    if dimension < 3 {
        dx_dxi[(2, 2)] = 1.0;
        if dimension < 2 {
            dx_dxi[(1, 1)] = 1.0;
        }
    }

    let mut divergence = 0.0;
    match invert3x3(&dx_dxi, input.tolerances.jacobian_determinant) {
        Ok(dxi_dx) => {
            for i in 0..dimension {
                for j in 0..dimension {
                    divergence += dv_dxi[(i, j)] * dxi_dx[(j, i)];
                }
            }
        }
        Err(_) => warn!(
            "Could not invert coordinate derivatives; setting divergence `{}` to 0",
            input.field_name
        ),
    }
    Ok(FieldValues::new(DVector::from_element(1, divergence)))
}

pub(super) fn gradient_is_defined(source_location: &FieldLocation, sources: &[Field]) -> bool {
    source_location
        .element_xi()
        .map_or(false, |l| l.dimension() == sources[1].number_of_components())
}

/// Solves `(dx/dxi)^T g = d(source)/dxi` for every source component.
fn solve_gradient(
    dsource_dxi: &DMatrix<f64>,
    dx_dxi: &DMatrix<f64>,
    singular_tolerance: f64,
) -> std::result::Result<DVector<f64>, LinalgError> {
    let n = dx_dxi.nrows();
    let lu = lu_decompose(dx_dxi.transpose(), singular_tolerance)?;
    let mut gradient = DVector::zeros(dsource_dxi.nrows() * n);
    for component in 0..dsource_dxi.nrows() {
        let mut b = dsource_dxi.row(component).transpose();
        lu_backsubstitute(&lu, &mut b)?;
        gradient.rows_mut(component * n, n).copy_from(&b);
    }
    Ok(gradient)
}

pub(super) fn evaluate_gradient(input: &EvaluationInput) -> Result<FieldValues> {
    if input.location.number_of_derivatives() > 0 {
        return Err(FieldError::DerivativesUnavailable {
            field: input.field_name.to_string(),
        });
    }
    element_location(input, "gradient")?;
    let dimension = input.source_dimension();
    let coordinate_components = input.sources[1].number_of_components();
    if dimension != coordinate_components {
        return Err(input.not_defined(format!(
            "cannot invert derivatives of {coordinate_components} coordinates in elements of dimension {dimension}"
        )));
    }
    let dsource_dxi = source_derivatives(input, 0)?;
    let dx_dxi = source_derivatives(input, 1)?;

    match solve_gradient(dsource_dxi, dx_dxi, input.tolerances.lu_singular) {
        Ok(gradient) => Ok(FieldValues::new(gradient)),
        Err(_) => {
            warn!(
                "Could not invert coordinate derivatives; setting gradient `{}` to 0",
                input.field_name
            );
            Ok(FieldValues::zeros(input.number_of_components))
        }
    }
}
