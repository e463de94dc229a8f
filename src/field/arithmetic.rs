//! Kinds combining source values point-wise.
use crate::error::Result;
use crate::field::{EvaluationInput, FieldValues};
use crate::location::MAXIMUM_ELEMENT_XI_DIMENSIONS;
use nalgebra::{DMatrix, DVector};

/// Constants have zero derivatives wherever derivatives are requested.
pub(super) fn evaluate_constant(values: &[f64], input: &EvaluationInput) -> FieldValues {
    let values = DVector::from_column_slice(values);
    match input.location.number_of_derivatives() {
        0 => FieldValues::new(values),
        n => FieldValues::with_derivatives(values, DMatrix::zeros(input.number_of_components, n)),
    }
}

pub(super) fn evaluate_xi(input: &EvaluationInput) -> Result<FieldValues> {
    let location = input
        .location
        .element_xi()
        .ok_or_else(|| input.not_defined("xi coordinates are only defined in elements"))?;
    let dim = location.dimension();
    let mut values = DVector::zeros(MAXIMUM_ELEMENT_XI_DIMENSIONS);
    values.rows_mut(0, dim).copy_from_slice(location.xi());
    match location.number_of_derivatives() {
        0 => Ok(FieldValues::new(values)),
        n => Ok(FieldValues::with_derivatives(
            values,
            DMatrix::identity(MAXIMUM_ELEMENT_XI_DIMENSIONS, n),
        )),
    }
}

pub(super) fn evaluate_component(index: usize, input: &EvaluationInput) -> FieldValues {
    let source = &input.source_values[0];
    FieldValues {
        values: DVector::from_element(1, source.values[index]),
        derivatives: source
            .derivatives
            .as_ref()
            .map(|d| d.rows(index, 1).into_owned()),
    }
}

/// Euclidean norm. The derivative is `v . dv / |v|`, taken as zero where `|v|` vanishes.
pub(super) fn evaluate_magnitude(input: &EvaluationInput) -> FieldValues {
    let source = &input.source_values[0];
    let magnitude = source.values.norm();
    let derivatives = source.derivatives.as_ref().map(|d| {
        if magnitude > 0.0 {
            let row = source.values.transpose() * d / magnitude;
            DMatrix::from_iterator(1, d.ncols(), row.iter().copied())
        } else {
            DMatrix::zeros(1, d.ncols())
        }
    });
    FieldValues {
        values: DVector::from_element(1, magnitude),
        derivatives,
    }
}

pub(super) fn evaluate_add(scale_factors: [f64; 2], input: &EvaluationInput) -> FieldValues {
    let [s1, s2] = scale_factors;
    let (a, b) = (&input.source_values[0], &input.source_values[1]);
    let derivatives = match (&a.derivatives, &b.derivatives) {
        (Some(da), Some(db)) => Some(da * s1 + db * s2),
        _ => None,
    };
    FieldValues {
        values: &a.values * s1 + &b.values * s2,
        derivatives,
    }
}

pub(super) fn evaluate_multiply(input: &EvaluationInput) -> FieldValues {
    let (a, b) = (&input.source_values[0], &input.source_values[1]);
    let derivatives = match (&a.derivatives, &b.derivatives) {
        (Some(da), Some(db)) => {
            let mut d = DMatrix::zeros(da.nrows(), da.ncols());
            for i in 0..da.nrows() {
                let row = da.row(i) * b.values[i] + db.row(i) * a.values[i];
                d.set_row(i, &row);
            }
            Some(d)
        }
        _ => None,
    };
    FieldValues {
        values: a.values.component_mul(&b.values),
        derivatives,
    }
}
