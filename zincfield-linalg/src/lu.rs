use crate::LinalgError;
use nalgebra::{DMatrix, DVector};
use numeric_literals::replace_float_literals;
use zincfield_traits::Real;

/// Compact LU factors of a square matrix together with the row interchanges applied to it.
///
/// The strictly lower triangle of `lu` holds the multipliers of `L` (whose unit diagonal is
/// implicit) and the upper triangle holds `U`. Row `j` was interchanged with row `pivots[j]`
/// at step `j` of the elimination.
#[derive(Debug, Clone, PartialEq)]
pub struct LuDecomposition<T: Real> {
    lu: DMatrix<T>,
    pivots: Vec<usize>,
    sign: T,
}

impl<T: Real> LuDecomposition<T> {
    pub fn dim(&self) -> usize {
        self.lu.nrows()
    }

    pub fn factors(&self) -> &DMatrix<T> {
        &self.lu
    }

    pub fn pivots(&self) -> &[usize] {
        &self.pivots
    }

    /// `+1` for an even number of row interchanges, `-1` for an odd number.
    pub fn sign(&self) -> T {
        self.sign
    }

    pub fn determinant(&self) -> T {
        self.lu.diagonal().iter().fold(self.sign, |det, &u_jj| det * u_jj)
    }

    /// Solves `A x = b` and returns `x`, leaving `b` untouched.
    pub fn solve(&self, b: &DVector<T>) -> Result<DVector<T>, LinalgError> {
        let mut x = b.clone();
        lu_backsubstitute(self, &mut x)?;
        Ok(x)
    }
}

/// Computes the LU decomposition of a square matrix by Crout's method.
///
/// Pivots are chosen by the largest entry relative to the largest magnitude in its original row
/// (implicit scaling). The decomposition fails with [`LinalgError::Singular`] if some row has no
/// entry of magnitude at least `singular_tolerance`, or if a pivot falls below it.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn lu_decompose<T: Real>(mut a: DMatrix<T>, singular_tolerance: T) -> Result<LuDecomposition<T>, LinalgError> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(LinalgError::DimensionMismatch {
            expected: n,
            actual: a.ncols(),
        });
    }

    let mut scale = Vec::with_capacity(n);
    for i in 0..n {
        let row_max = a.row(i).iter().fold(0.0, |max: T, a_ij| max.max(a_ij.abs()));
        if row_max < singular_tolerance {
            return Err(LinalgError::Singular);
        }
        scale.push(1.0 / row_max);
    }

    let mut pivots = vec![0; n];
    let mut sign = 1.0;
    for j in 0..n {
        for i in 0..j {
            let mut sum = a[(i, j)];
            for k in 0..i {
                sum -= a[(i, k)] * a[(k, j)];
            }
            a[(i, j)] = sum;
        }

        let mut largest = 0.0;
        let mut pivot_row = j;
        for i in j..n {
            let mut sum = a[(i, j)];
            for k in 0..j {
                sum -= a[(i, k)] * a[(k, j)];
            }
            a[(i, j)] = sum;
            let scaled = scale[i] * sum.abs();
            if scaled >= largest {
                largest = scaled;
                pivot_row = i;
            }
        }

        if pivot_row != j {
            a.swap_rows(pivot_row, j);
            sign = -sign;
            scale[pivot_row] = scale[j];
        }
        pivots[j] = pivot_row;

        let pivot = a[(j, j)];
        if pivot.abs() < singular_tolerance {
            return Err(LinalgError::Singular);
        }
        for i in (j + 1)..n {
            a[(i, j)] /= pivot;
        }
    }

    Ok(LuDecomposition { lu: a, pivots, sign })
}

/// Solves `A x = b` in place, given the decomposition of `A`.
///
/// Leading zeros of the permuted right-hand side are skipped during forward substitution, which
/// makes repeated solves with sparse right-hand sides cheap.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn lu_backsubstitute<T: Real>(decomposition: &LuDecomposition<T>, b: &mut DVector<T>) -> Result<(), LinalgError> {
    let lu = &decomposition.lu;
    let n = lu.nrows();
    if b.len() != n {
        return Err(LinalgError::DimensionMismatch {
            expected: n,
            actual: b.len(),
        });
    }

    let mut first_nonzero = None;
    for i in 0..n {
        let p = decomposition.pivots[i];
        let mut sum = b[p];
        b[p] = b[i];
        if let Some(start) = first_nonzero {
            for j in start..i {
                sum -= lu[(i, j)] * b[j];
            }
        } else if sum != 0.0 {
            first_nonzero = Some(i);
        }
        b[i] = sum;
    }

    for i in (0..n).rev() {
        let mut sum = b[i];
        for j in (i + 1)..n {
            sum -= lu[(i, j)] * b[j];
        }
        b[i] = sum / lu[(i, i)];
    }

    Ok(())
}
