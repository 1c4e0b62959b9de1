//! rust_dipolarfit — regularized inversion of dipolar signals.
//!
//! Purpose
//! -------
//! Recover a non-negative distance distribution P(r) from one or more measured
//! dipolar signals V = K·P + noise, where K is a known (ill-conditioned)
//! forward kernel. The inversion is stabilized by penalized least squares with
//! a choice of regularization functional (Tikhonov, total variation,
//! pseudo-Huber), solved under a non-negativity constraint, optionally refined
//! by Osher–Bregman iterated regularization (OBIR), and accompanied by a
//! covariance-based uncertainty quantification of the fitted distribution.
//!
//! Key behaviors
//! -------------
//! - Assemble the penalized normal equations for a given regularization
//!   functional and parameter, including the iteratively re-weighted variants
//!   needed by total-variation and pseudo-Huber penalties.
//! - Select the regularization parameter automatically from a model-selection
//!   criterion (AIC, AICc, BIC, GCV, L-curve radius) when no fixed value is
//!   supplied.
//! - Solve the constrained problem with one of three NNLS back-ends (fast
//!   NNLS, block principal pivoting, interior-point QP) or a direct solve for
//!   the unconstrained case.
//! - Propagate uncertainty through the augmented residual/Jacobian system via
//!   a heteroscedasticity-consistent covariance estimate and expose clipped
//!   confidence intervals on the distribution.
//! - Renormalize the fitted distribution to unit area and rescale its
//!   uncertainty consistently.
//!
//! Invariants & assumptions
//! ------------------------
//! - Signals, kernels, the distance axis, and weights are validated at the
//!   API boundary; shape mismatches and unknown configuration tags fail fast
//!   with structured errors rather than propagating into linear algebra.
//! - Regularization parameters are strictly positive; fitted distributions
//!   returned from constrained problems are entrywise non-negative up to
//!   solver tolerance.
//! - All computation is synchronous and single-threaded; every fit owns its
//!   matrices exclusively.
//!
//! Conventions
//! -----------
//! - `ndarray` types carry all signal/kernel/distribution data; `nalgebra` is
//!   used internally for factorizations and pseudo-inverses.
//! - Multi-dataset (global) fits concatenate signals and stack kernels; each
//!   dataset contributes a normalized weight and an index range within the
//!   concatenation.
//!
//! Downstream usage
//! ----------------
//! - The main entry point is [`fitting::regfit::fit_regularized`], configured
//!   through [`fitting::options::FitOptions`].
//! - Lower-level building blocks (penalty models, NNLS solvers, the OBIR
//!   iterator, covariance estimators) are public for callers that compose
//!   their own pipelines.
//!
//! Testing notes
//! -------------
//! - Numerical building blocks are unit-tested in their modules; end-to-end
//!   recovery, global fits, and scale/normalization properties live in
//!   `tests/integration_regfit_pipeline.rs`.

pub mod dataset;
pub mod fitting;
pub mod inference;
pub mod linalg;
pub mod regularization;
pub mod stats;
