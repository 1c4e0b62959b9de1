//! Uncertainty quantification for regularized fits.
//!
//! Purpose
//! -------
//! Turn a fitted distribution, its penalty-augmented residual system, and a
//! heteroscedasticity-consistent covariance estimate into confidence bands a
//! caller can query at arbitrary coverage.
//!
//! Modules
//! -------
//! - [`errors`]: `InferenceError` and the `InferenceResult` alias.
//! - [`hccm`]: HC0 through HC3 sandwich covariance estimators.
//! - [`uncertainty`]: residual augmentation and the queryable
//!   [`uncertainty::UncertaintyQuantification`] structure.

pub mod errors;
pub mod hccm;
pub mod uncertainty;
