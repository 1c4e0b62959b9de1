//! Covariance-based uncertainty quantification.
//!
//! Purpose
//! -------
//! Package a point estimate and its covariance into a queryable structure
//! that produces confidence bands at arbitrary coverage, honoring box
//! constraints on the estimate and any later renormalization of the
//! distribution.
//!
//! Key behaviors
//! -------------
//! - `augment_residuals` stacks the weighted data residual on top of the
//!   penalty residual (and likewise for the Jacobians) so the covariance of
//!   a regularized fit reflects both terms.
//! - `ci` converts coverage to a two-sided standard-normal quantile, scales
//!   the per-component standard deviations, clips the band to the box
//!   constraints, and divides by the renormalization scale.
//! - Renormalization is a pure rebinding: `renormalized(scale)` leaves the
//!   stored covariance untouched and only changes how queries are reported.
//!
//! Invariants & assumptions
//! ------------------------
//! - The covariance is square and matches the estimate length; constructors
//!   reject anything else so queries never re-validate.
//! - Negative diagonal entries (possible through rounding in the sandwich
//!   product) are clamped to zero before the square root.
//!
//! Downstream usage
//! ----------------
//! - [`crate::fitting::regfit`] attaches one of these to every fit with
//!   uncertainty enabled.

use crate::dataset::GlobalSignal;
use crate::inference::errors::{InferenceError, InferenceResult};
use crate::regularization::penalty::{penalty_terms, RegKind};
use ndarray::{concatenate, Array1, Array2, Axis};
use statrs::distribution::{ContinuousCDF, Normal};

/// Stack the weighted data residual/Jacobian with the penalty term.
///
/// Parameters
/// ----------
/// - `data`: stacked signal/kernel/weights.
/// - `p`: fitted distribution.
/// - `l`: regularization operator.
/// - `kind`, `alpha`, `huber_param`: penalty functional at the fit.
///
/// Returns
/// -------
/// `(residual, jacobian)` of the augmented system; the data block of the
/// residual is the per-sample weighted misfit `w ⊙ (V − K·P)`.
pub fn augment_residuals(
    data: &GlobalSignal, p: &Array1<f64>, l: &Array2<f64>, kind: RegKind, alpha: f64,
    huber_param: f64,
) -> InferenceResult<(Array1<f64>, Array2<f64>)> {
    let data_res = &data.weights * &(&data.signal - &data.kernel.dot(p));
    let data_jac = &data.kernel * &data.weights.view().insert_axis(Axis(1));

    let (pen_res, pen_jac) = penalty_terms(kind, l, p, alpha, huber_param);

    let residual = concatenate(Axis(0), &[data_res.view(), pen_res.view()])
        .map_err(|_| InferenceError::UnknownError)?;
    let jacobian = concatenate(Axis(0), &[data_jac.view(), pen_jac.view()])
        .map_err(|_| InferenceError::UnknownError)?;
    Ok((residual, jacobian))
}

/// A two-sided confidence band.
#[derive(Debug, Clone)]
pub struct ConfidenceBand {
    pub lower: Array1<f64>,
    pub upper: Array1<f64>,
}

/// Point estimate with covariance, box constraints, and a report scale.
#[derive(Debug, Clone)]
pub struct UncertaintyQuantification {
    estimate: Array1<f64>,
    covariance: Array2<f64>,
    lower_bound: Array1<f64>,
    upper_bound: Array1<f64>,
    scale_factor: f64,
}

impl UncertaintyQuantification {
    /// Build a validated uncertainty structure with report scale 1.
    ///
    /// Errors
    /// ------
    /// - [`InferenceError::CovarianceDimMismatch`] for a non-square or
    ///   wrong-sized covariance.
    /// - [`InferenceError::BoundDimMismatch`] for bound vectors that do not
    ///   match the estimate length.
    pub fn new(
        estimate: Array1<f64>, covariance: Array2<f64>, lower_bound: Array1<f64>,
        upper_bound: Array1<f64>,
    ) -> InferenceResult<Self> {
        let m = estimate.len();
        if covariance.nrows() != m || covariance.ncols() != m {
            return Err(InferenceError::CovarianceDimMismatch {
                estimate: m,
                covariance: covariance.dim(),
            });
        }
        for bound in [&lower_bound, &upper_bound] {
            if bound.len() != m {
                return Err(InferenceError::BoundDimMismatch { estimate: m, bound: bound.len() });
            }
        }
        Ok(UncertaintyQuantification {
            estimate,
            covariance,
            lower_bound,
            upper_bound,
            scale_factor: 1.0,
        })
    }

    /// Point estimate in the reported (scaled) units.
    pub fn mean(&self) -> Array1<f64> {
        self.estimate.mapv(|x| x / self.scale_factor)
    }

    /// Covariance of the unscaled estimate.
    pub fn covariance(&self) -> &Array2<f64> {
        &self.covariance
    }

    /// Rebind the report scale; the stored covariance is untouched.
    pub fn renormalized(&self, scale: f64) -> Self {
        UncertaintyQuantification { scale_factor: scale, ..self.clone() }
    }

    /// Two-sided confidence band at the given coverage percentage.
    ///
    /// Parameters
    /// ----------
    /// - `coverage`: percentage in the open interval (0, 100), e.g. `95.0`.
    ///
    /// Returns
    /// -------
    /// The band in reported units, clipped to the box constraints before
    /// scaling.
    ///
    /// Errors
    /// ------
    /// - [`InferenceError::InvalidCoverage`] for coverage outside (0, 100).
    pub fn ci(&self, coverage: f64) -> InferenceResult<ConfidenceBand> {
        if !coverage.is_finite() || coverage <= 0.0 || coverage >= 100.0 {
            return Err(InferenceError::InvalidCoverage { coverage });
        }
        let standard_normal =
            Normal::new(0.0, 1.0).map_err(|_| InferenceError::UnknownError)?;
        let z = standard_normal.inverse_cdf(1.0 - (1.0 - coverage / 100.0) / 2.0);

        let m = self.estimate.len();
        let mut lower = Array1::<f64>::zeros(m);
        let mut upper = Array1::<f64>::zeros(m);
        for i in 0..m {
            let sd = self.covariance[[i, i]].max(0.0).sqrt();
            lower[i] = (self.estimate[i] - z * sd).max(self.lower_bound[i]) / self.scale_factor;
            upper[i] = (self.estimate[i] + z * sd).min(self.upper_bound[i]) / self.scale_factor;
        }
        Ok(ConfidenceBand { lower, upper })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regularization::operator::reg_operator;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Augmented residual stacking and its sign convention.
    // - Constructor dimension validation.
    // - Confidence-band nesting across coverage levels.
    // - Box-constraint clipping and renormalization scaling.
    // - Invalid coverage rejection.
    // -------------------------------------------------------------------------

    fn simple_uq() -> UncertaintyQuantification {
        let estimate = array![1.0, 0.0, 2.0];
        let covariance = Array2::from_diag(&array![0.04, 0.01, 0.09]);
        let lower = array![0.0, 0.0, 0.0];
        let upper = array![f64::INFINITY, f64::INFINITY, f64::INFINITY];
        UncertaintyQuantification::new(estimate, covariance, lower, upper).unwrap()
    }

    #[test]
    // Purpose
    // -------
    // Pin the data block of the augmented residual to the signed weighted
    // misfit `w ⊙ (V − K·P)`, stacked over the penalty term.
    //
    // Given
    // -----
    // - A 3×2 kernel with unit weights, a known distribution, and a
    //   first-order Tikhonov penalty with alpha 2.
    //
    // Expect
    // ------
    // - The residual is `[V − K·P, alpha·L·P]` and the Jacobian stacks the
    //   weighted kernel over `alpha·L`.
    fn augmented_residual_stacks_signed_misfit() {
        // Arrange
        let k = array![[1.0, 0.0], [0.0, 2.0], [1.0, 1.0]];
        let v = array![1.0, 1.0, 1.0];
        let data = GlobalSignal::from_single(v, k).unwrap();
        let p = array![0.5, 0.25];
        let l = reg_operator(2, 1).unwrap();

        // Act
        let (res, jac) = augment_residuals(&data, &p, &l, RegKind::Tikhonov, 2.0, 1.35).unwrap();

        // Assert
        let expected_res = array![0.5, 0.5, 0.25, -0.5];
        assert_eq!(res.len(), 4);
        for i in 0..4 {
            assert!((res[i] - expected_res[i]).abs() < 1e-12, "residual[{i}] = {}", res[i]);
        }
        assert!((jac[[0, 0]] - 1.0).abs() < 1e-12);
        assert!((jac[[1, 1]] - 2.0).abs() < 1e-12);
        assert!((jac[[3, 0]] + 2.0).abs() < 1e-12);
        assert!((jac[[3, 1]] - 2.0).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Ensure constructors reject mismatched covariance and bound shapes.
    //
    // Given / Expect
    // --------------
    // - A 2x2 covariance against a length-3 estimate fails with
    //   `CovarianceDimMismatch`; a length-2 bound fails with
    //   `BoundDimMismatch`.
    fn constructor_rejects_mismatched_shapes() {
        let est = array![1.0, 2.0, 3.0];
        let bad_cov = Array2::<f64>::zeros((2, 2));
        let good_cov = Array2::<f64>::zeros((3, 3));
        let bounds = array![0.0, 0.0, 0.0];

        assert!(matches!(
            UncertaintyQuantification::new(est.clone(), bad_cov, bounds.clone(), bounds.clone()),
            Err(InferenceError::CovarianceDimMismatch { .. })
        ));
        assert!(matches!(
            UncertaintyQuantification::new(est, good_cov, array![0.0, 0.0], bounds),
            Err(InferenceError::BoundDimMismatch { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Verify that wider coverage produces a strictly containing band.
    //
    // Given
    // -----
    // - A diagonal covariance with positive variances.
    //
    // Expect
    // ------
    // - The 95% band contains the 50% band component-wise.
    fn wider_coverage_nests_narrower() {
        // Arrange
        let uq = simple_uq();

        // Act
        let narrow = uq.ci(50.0).unwrap();
        let wide = uq.ci(95.0).unwrap();

        // Assert
        for i in 0..3 {
            assert!(wide.lower[i] <= narrow.lower[i]);
            assert!(wide.upper[i] >= narrow.upper[i]);
        }
    }

    #[test]
    // Purpose
    // -------
    // Check the non-negativity clip and the renormalization scale.
    //
    // Given
    // -----
    // - An estimate with a zero component bounded below by zero, and a
    //   renormalized copy with scale 2.
    //
    // Expect
    // ------
    // - Lower bounds never drop below zero; scaled bands are halved.
    fn bands_are_clipped_and_scaled() {
        // Arrange
        let uq = simple_uq();

        // Act
        let band = uq.ci(95.0).unwrap();
        let scaled = uq.renormalized(2.0).ci(95.0).unwrap();

        // Assert
        assert!(band.lower.iter().all(|x| *x >= 0.0));
        for i in 0..3 {
            assert!((scaled.upper[i] - band.upper[i] / 2.0).abs() < 1e-12);
        }
    }

    #[test]
    // Purpose
    // -------
    // Reject degenerate coverage requests.
    //
    // Given / Expect
    // --------------
    // - 0, 100, and NaN coverages all fail with `InvalidCoverage`.
    fn invalid_coverage_is_rejected() {
        let uq = simple_uq();
        for coverage in [0.0, 100.0, f64::NAN] {
            assert!(matches!(uq.ci(coverage), Err(InferenceError::InvalidCoverage { .. })));
        }
    }
}
