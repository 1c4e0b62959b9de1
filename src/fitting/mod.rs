//! Regularized fitting of non-negative distributions.
//!
//! Purpose
//! -------
//! The pipeline that turns one or more signals and their kernel matrices
//! into a regularized, optionally non-negative, optionally
//! Bregman-iterated distribution estimate with uncertainty and
//! goodness-of-fit reporting.
//!
//! Modules
//! -------
//! - [`errors`]: `FitError` and the `FitResult` alias.
//! - [`options`]: validated fit configuration with defaults.
//! - [`problem`]: normal-equation assembly and problem classification.
//! - [`solvers`]: the three NNLS back-ends.
//! - [`obir`]: Osher-Bregman iterated regularization.
//! - [`regfit`]: the top-level driver, [`regfit::fit_regularized`].

pub mod errors;
pub mod obir;
pub mod options;
pub mod problem;
pub mod regfit;
pub mod solvers;
