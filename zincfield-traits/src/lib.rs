use nalgebra::RealField;

pub use nalgebra;

/// Scalar type used by the numeric kernels.
///
/// Field values are stored as `f64`, but the kernels are written against this trait so that
/// they can be exercised with other real types in tests.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}
