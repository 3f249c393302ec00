//! Conversion of a mixed variance/correlation matrix into a covariance matrix.
//!
//! The input carries variances on the diagonal and correlations off it. Each
//! off-diagonal entry becomes `r_ij * sqrt(var_i * var_j)`; the diagonal is
//! left alone. Applying the conversion twice treats covariances as
//! correlations, so callers convert each matrix exactly once.

use log::debug;

use crate::error::{PopsimError, Result};
use crate::matrix::LabeledMatrix;

/// Returns the covariance form of `matrix`, leaving the input untouched.
pub fn correlation_to_covariance(matrix: &LabeledMatrix) -> Result<LabeledMatrix> {
    let mut out = matrix.clone();
    expand_correlations_in_place(&mut out)?;
    Ok(out)
}

/// Rewrites `matrix` in place. Nothing is written unless every check passes.
pub fn expand_correlations_in_place(matrix: &mut LabeledMatrix) -> Result<()> {
    let n = matrix.require_square("correlation expansion")?;
    matrix.require_finite("correlation expansion")?;

    let values = matrix.values();
    for i in 0..n {
        let variance = values[(i, i)];
        if variance < 0.0 {
            return Err(PopsimError::NegativeVariance {
                index: i,
                value: variance,
            });
        }
    }
    debug!("expanding {}x{} correlation matrix", n, n);

    let diag: Vec<f64> = (0..n).map(|i| values[(i, i)]).collect();
    let values = matrix.values_mut();
    for i in 0..n {
        for j in 0..n {
            if i != j {
                values[(i, j)] *= (diag[i] * diag[j]).sqrt();
            }
        }
    }
    Ok(())
}
