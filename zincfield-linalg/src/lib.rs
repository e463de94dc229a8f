//! Dense linear algebra for small systems.
//!
//! The routines here back the derivative operators of `zincfield` (inverting coordinate
//! Jacobians) and the least-squares curve fitting. Every routine reports singular input through
//! [`LinalgError`] instead of producing non-finite results.

use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// Closed-form inverses of 2x2 and 3x3 matrices
pub mod inverse;
/// LU decomposition with implicit scaling and partial pivoting
pub mod lu;

pub use inverse::{invert2x2, invert3x3};
pub use lu::{lu_backsubstitute, lu_decompose, LuDecomposition};

/// Absolute tolerance used when callers have no better estimate of the scale of their data.
pub const DEFAULT_SINGULAR_TOLERANCE: f64 = 1.0e-12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinalgError {
    /// The matrix is singular with respect to the requested tolerance.
    Singular,
    /// The operands do not have compatible dimensions.
    DimensionMismatch { expected: usize, actual: usize },
}

impl Display for LinalgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            LinalgError::Singular => write!(f, "Matrix is singular."),
            LinalgError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {}, got {}.", expected, actual)
            }
        }
    }
}

impl Error for LinalgError {}
