//! Coordinate systems of field values, and conversion to rectangular Cartesian coordinates.
use nalgebra::{DMatrix, Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;

/// The coordinate system in which the components of a field are expressed.
///
/// Spheroidal systems carry their focus distance.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum CoordinateSystem {
    #[default]
    RectangularCartesian,
    /// `(r, theta, z)`
    CylindricalPolar,
    /// `(r, theta, phi)` with `phi` the elevation from the x-y plane
    SphericalPolar,
    /// `(lambda, mu, theta)`
    ProlateSpheroidal { focus: f64 },
    /// `(lambda, mu, theta)`
    OblateSpheroidal { focus: f64 },
}

impl CoordinateSystem {
    pub fn is_rectangular_cartesian(&self) -> bool {
        matches!(self, CoordinateSystem::RectangularCartesian)
    }

    /// Converts up to three coordinates to rectangular Cartesian coordinates.
    ///
    /// Missing coordinates are treated as zero.
    pub fn to_rectangular_cartesian(&self, coordinates: &[f64]) -> Vector3<f64> {
        self.convert(coordinates).0
    }

    /// Converts coordinates and their xi-derivatives to rectangular Cartesian coordinates.
    ///
    /// `derivatives` has one row per coordinate and one column per xi direction. The returned
    /// Jacobian `dx/dxi` is always 3x3, with zero rows and columns for missing coordinates and
    /// xi directions.
    pub fn to_rectangular_cartesian_with_jacobian(
        &self,
        coordinates: &[f64],
        derivatives: &DMatrix<f64>,
    ) -> (Vector3<f64>, Matrix3<f64>) {
        let (x, dx_dq) = self.convert(coordinates);
        let mut dq_dxi = Matrix3::zeros();
        for i in 0..derivatives.nrows().min(3) {
            for j in 0..derivatives.ncols().min(3) {
                dq_dxi[(i, j)] = derivatives[(i, j)];
            }
        }
        (x, dx_dq * dq_dxi)
    }

    /// Position and `dx/dq` for the coordinates `q` of this system.
    fn convert(&self, coordinates: &[f64]) -> (Vector3<f64>, Matrix3<f64>) {
        let q = Vector3::from_fn(|i, _| coordinates.get(i).copied().unwrap_or(0.0));
        match *self {
            CoordinateSystem::RectangularCartesian => (q, Matrix3::identity()),
            CoordinateSystem::CylindricalPolar => {
                let (r, theta, z) = (q[0], q[1], q[2]);
                let (sin_t, cos_t) = theta.sin_cos();
                #[rustfmt::skip]
                let jacobian = Matrix3::new(
                    cos_t, -r * sin_t, 0.0,
                    sin_t,  r * cos_t, 0.0,
                    0.0,    0.0,       1.0);
                (Vector3::new(r * cos_t, r * sin_t, z), jacobian)
            }
            CoordinateSystem::SphericalPolar => {
                let (r, theta, phi) = (q[0], q[1], q[2]);
                let (sin_t, cos_t) = theta.sin_cos();
                let (sin_p, cos_p) = phi.sin_cos();
                #[rustfmt::skip]
                let jacobian = Matrix3::new(
                    cos_t * cos_p, -r * sin_t * cos_p, -r * cos_t * sin_p,
                    sin_t * cos_p,  r * cos_t * cos_p, -r * sin_t * sin_p,
                    sin_p,          0.0,                r * cos_p);
                (Vector3::new(r * cos_t * cos_p, r * sin_t * cos_p, r * sin_p), jacobian)
            }
            CoordinateSystem::ProlateSpheroidal { focus } => {
                let (lambda, mu, theta) = (q[0], q[1], q[2]);
                let (sinh_l, cosh_l) = (lambda.sinh(), lambda.cosh());
                let (sin_m, cos_m) = mu.sin_cos();
                let (sin_t, cos_t) = theta.sin_cos();
                let a = focus;
                #[rustfmt::skip]
                let jacobian = Matrix3::new(
                    a * sinh_l * cos_m,         -a * cosh_l * sin_m,          0.0,
                    a * cosh_l * sin_m * cos_t,  a * sinh_l * cos_m * cos_t, -a * sinh_l * sin_m * sin_t,
                    a * cosh_l * sin_m * sin_t,  a * sinh_l * cos_m * sin_t,  a * sinh_l * sin_m * cos_t);
                let x = Vector3::new(
                    a * cosh_l * cos_m,
                    a * sinh_l * sin_m * cos_t,
                    a * sinh_l * sin_m * sin_t,
                );
                (x, jacobian)
            }
            CoordinateSystem::OblateSpheroidal { focus } => {
                let (lambda, mu, theta) = (q[0], q[1], q[2]);
                let (sinh_l, cosh_l) = (lambda.sinh(), lambda.cosh());
                let (sin_m, cos_m) = mu.sin_cos();
                let (sin_t, cos_t) = theta.sin_cos();
                let a = focus;
                #[rustfmt::skip]
                let jacobian = Matrix3::new(
                    a * sinh_l * cos_m * cos_t, -a * cosh_l * sin_m * cos_t, -a * cosh_l * cos_m * sin_t,
                    a * cosh_l * sin_m,          a * sinh_l * cos_m,          0.0,
                    a * sinh_l * cos_m * sin_t, -a * cosh_l * sin_m * sin_t,  a * cosh_l * cos_m * cos_t);
                let x = Vector3::new(
                    a * cosh_l * cos_m * cos_t,
                    a * sinh_l * sin_m,
                    a * cosh_l * cos_m * sin_t,
                );
                (x, jacobian)
            }
        }
    }
}

impl Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinateSystem::RectangularCartesian => write!(f, "rectangular_cartesian"),
            CoordinateSystem::CylindricalPolar => write!(f, "cylindrical_polar"),
            CoordinateSystem::SphericalPolar => write!(f, "spherical_polar"),
            CoordinateSystem::ProlateSpheroidal { focus } => write!(f, "prolate_spheroidal focus {focus}"),
            CoordinateSystem::OblateSpheroidal { focus } => write!(f, "oblate_spheroidal focus {focus}"),
        }
    }
}
