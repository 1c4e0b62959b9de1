//! Fit configuration.
//!
//! Purpose
//! -------
//! Collect every knob of the regularized fit into one validated options
//! struct so the driver signature stays small and defaults live in one
//! place.
//!
//! Conventions
//! -----------
//! - Defaults mirror common practice for dipolar signals: second-order
//!   Tikhonov with AIC-selected alpha, interior-point NNLS, Huber shape
//!   1.35, non-negativity on, renormalization on, uncertainty on.
//! - `validate` is called once at the top of the driver; all downstream code
//!   may assume a validated options struct.

use crate::fitting::errors::{FitError, FitResult};
use crate::fitting::solvers::SolverKind;
use crate::regularization::operator::MAX_REG_ORDER;
use crate::regularization::penalty::RegKind;
use crate::regularization::selection::SelectionCriterion;

/// How the regularization parameter is obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlphaChoice {
    /// Use a caller-supplied value as-is.
    Fixed(f64),
    /// Select from a logarithmic grid by the given criterion.
    Select(SelectionCriterion),
}

/// Options for [`crate::fitting::regfit::fit_regularized`].
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Regularization functional.
    pub reg_kind: RegKind,
    /// Regularization parameter policy.
    pub alpha: AlphaChoice,
    /// Order of the finite-difference operator (0 to [`MAX_REG_ORDER`]).
    pub reg_order: usize,
    /// NNLS back-end.
    pub solver: SolverKind,
    /// Pseudo-Huber shape parameter.
    pub huber_param: f64,
    /// Constrain the distribution to be non-negative.
    pub nonnegativity: bool,
    /// Refine the solution with Osher-Bregman iterations.
    pub obir: bool,
    /// Compute the covariance-based uncertainty quantification.
    pub uncertainty: bool,
    /// Rescale the distribution to unit integral over the axis.
    pub renormalize: bool,
    /// OBIR noise target; estimated from the signal when `None`.
    pub noise_target: Option<f64>,
    /// OBIR outer-iteration cap.
    pub max_obir_iterations: usize,
    /// Halt OBIR when the residual deviation starts growing.
    pub stop_on_divergence: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            reg_kind: RegKind::Tikhonov,
            alpha: AlphaChoice::Select(SelectionCriterion::Aic),
            reg_order: 2,
            solver: SolverKind::InteriorPoint,
            huber_param: 1.35,
            nonnegativity: true,
            obir: false,
            uncertainty: true,
            renormalize: true,
            noise_target: None,
            max_obir_iterations: 5000,
            stop_on_divergence: false,
        }
    }
}

impl FitOptions {
    /// Check every numeric knob once, up front.
    ///
    /// Errors
    /// ------
    /// - [`FitError::InvalidAlpha`] for a fixed alpha that is not finite and
    ///   positive.
    /// - [`FitError::InvalidRegOrder`], [`FitError::InvalidHuberParam`],
    ///   [`FitError::InvalidIterationCap`], [`FitError::InvalidNoiseTarget`]
    ///   for the respective out-of-range fields.
    pub fn validate(&self) -> FitResult<()> {
        if let AlphaChoice::Fixed(alpha) = self.alpha {
            if !alpha.is_finite() || alpha <= 0.0 {
                return Err(FitError::InvalidAlpha {
                    alpha,
                    reason: "must be finite and strictly positive",
                });
            }
        }
        if self.reg_order > MAX_REG_ORDER {
            return Err(FitError::InvalidRegOrder {
                order: self.reg_order,
                reason: "supported orders are 0 through 3",
            });
        }
        if !self.huber_param.is_finite() || self.huber_param <= 0.0 {
            return Err(FitError::InvalidHuberParam {
                param: self.huber_param,
                reason: "must be finite and strictly positive",
            });
        }
        if self.obir && self.max_obir_iterations == 0 {
            return Err(FitError::InvalidIterationCap { cap: self.max_obir_iterations });
        }
        if let Some(target) = self.noise_target {
            if !target.is_finite() || target < 0.0 {
                return Err(FitError::InvalidNoiseTarget {
                    target,
                    reason: "must be finite and non-negative",
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Default options passing validation.
    // - Each rejected field producing its dedicated error variant.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Ensure the defaults are internally consistent.
    //
    // Given / Expect
    // --------------
    // - `FitOptions::default()` validates cleanly.
    fn defaults_are_valid() {
        assert!(FitOptions::default().validate().is_ok());
    }

    #[test]
    // Purpose
    // -------
    // Check that each out-of-range knob maps to its own error variant.
    //
    // Given
    // -----
    // - Defaults with one field broken at a time.
    //
    // Expect
    // ------
    // - The matching `FitError` variant for every broken field.
    fn each_invalid_field_is_rejected() {
        // Arrange / Act / Assert
        let mut opts = FitOptions { alpha: AlphaChoice::Fixed(-1.0), ..Default::default() };
        assert!(matches!(opts.validate(), Err(FitError::InvalidAlpha { .. })));

        opts = FitOptions { reg_order: MAX_REG_ORDER + 1, ..Default::default() };
        assert!(matches!(opts.validate(), Err(FitError::InvalidRegOrder { .. })));

        opts = FitOptions { huber_param: 0.0, ..Default::default() };
        assert!(matches!(opts.validate(), Err(FitError::InvalidHuberParam { .. })));

        opts = FitOptions { obir: true, max_obir_iterations: 0, ..Default::default() };
        assert!(matches!(opts.validate(), Err(FitError::InvalidIterationCap { .. })));

        opts = FitOptions { noise_target: Some(f64::NAN), ..Default::default() };
        assert!(matches!(opts.validate(), Err(FitError::InvalidNoiseTarget { .. })));
    }
}
