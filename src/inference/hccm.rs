//! Heteroscedasticity-consistent covariance matrices.
//!
//! Purpose
//! -------
//! Estimate the covariance of a least-squares estimate from its Jacobian and
//! residuals without assuming homoscedastic noise, using the sandwich
//! estimators HC0 through HC3.
//!
//! Key behaviors
//! -------------
//! - All variants share the bread `pinv(JᵀJ)` and differ only in the
//!   residual weighting of the meat `Jᵀ diag(w) J`:
//!   - HC0: `w_i = e_i²`
//!   - HC1: `w_i = e_i² · n/(n-k)`
//!   - HC2: `w_i = e_i² / (1-h_i)`
//!   - HC3: `w_i = e_i² / (1-h_i)²`
//!   with `h_i` the leverage `diag(J · pinv(JᵀJ) · Jᵀ)`.
//! - The pseudo-inverse tolerates the rank deficiency a regularized Jacobian
//!   can exhibit; a failed decomposition maps to `CovarianceBreakdown`.
//!
//! Conventions
//! -----------
//! - `n` is the residual length, `k` the column count of `J`; when
//!   `n <= k` the HC1 factor degrades to 1 rather than a negative scale.
//!
//! Downstream usage
//! ----------------
//! - [`crate::fitting::regfit`] applies HC1 to the penalty-augmented system.

use crate::inference::errors::{InferenceError, InferenceResult};
use crate::linalg::pinv;
use ndarray::{Array1, Array2, Axis};

/// Sandwich-estimator flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HcKind {
    /// Raw squared residuals.
    Hc0,
    /// Degrees-of-freedom corrected.
    Hc1,
    /// Leverage-adjusted.
    Hc2,
    /// Doubly leverage-adjusted (jackknife approximation).
    Hc3,
}

/// Heteroscedasticity-consistent covariance of a least-squares estimate.
///
/// Parameters
/// ----------
/// - `jac`: `n x k` Jacobian of the residual with respect to the estimate.
/// - `residuals`: length-`n` residual vector at the estimate.
/// - `kind`: sandwich flavor.
///
/// Returns
/// -------
/// The `k x k` covariance matrix.
///
/// Errors
/// ------
/// - [`InferenceError::ResidualDimMismatch`] when `residuals` and `jac`
///   disagree on `n`.
/// - [`InferenceError::CovarianceBreakdown`] when `pinv(JᵀJ)` cannot be
///   computed.
pub fn hccm(jac: &Array2<f64>, residuals: &Array1<f64>, kind: HcKind) -> InferenceResult<Array2<f64>> {
    let (n, k) = jac.dim();
    if residuals.len() != n {
        return Err(InferenceError::ResidualDimMismatch { residuals: residuals.len(), rows: n });
    }

    let jtj = jac.t().dot(jac);
    let bread = pinv(&jtj, "inverting the Jacobian Gram matrix")
        .map_err(|_| InferenceError::CovarianceBreakdown {
            reason: "pseudo-inverse of the Jacobian Gram matrix failed",
        })?;

    let weights = match kind {
        HcKind::Hc0 => residuals.mapv(|e| e * e),
        HcKind::Hc1 => {
            let scale = if n > k { n as f64 / (n - k) as f64 } else { 1.0 };
            residuals.mapv(|e| scale * e * e)
        }
        HcKind::Hc2 | HcKind::Hc3 => {
            let leverage = leverages(jac, &bread);
            let exponent = if kind == HcKind::Hc2 { 1 } else { 2 };
            Array1::from_iter(residuals.iter().zip(leverage.iter()).map(|(e, h)| {
                let denom = (1.0 - h).max(f64::EPSILON);
                e * e / denom.powi(exponent)
            }))
        }
    };

    // meat = Jᵀ diag(w) J, built row-wise to avoid materializing diag(w).
    let weighted = jac * &weights.view().insert_axis(Axis(1));
    let meat = jac.t().dot(&weighted);
    Ok(bread.dot(&meat).dot(&bread))
}

/// Leverages `diag(J · pinv(JᵀJ) · Jᵀ)` without forming the full hat matrix.
fn leverages(jac: &Array2<f64>, bread: &Array2<f64>) -> Array1<f64> {
    let half = jac.dot(bread);
    (&half * jac).sum_axis(Axis(1))
}
