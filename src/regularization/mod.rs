//! regularization — penalty functionals, operators, and parameter selection.
//!
//! Purpose
//! -------
//! House everything that shapes the regularization side of the penalized
//! least-squares problem:
//!
//! - [`operator`] builds the finite-difference regularization operator L of a
//!   chosen order acting on the distance distribution.
//! - [`penalty`] evaluates the penalty residual and its analytic Jacobian for
//!   the Tikhonov, total-variation, and pseudo-Huber functionals.
//! - [`selection`] chooses the regularization parameter alpha from a
//!   model-selection criterion when the caller does not fix it.
//!
//! Conventions
//! -----------
//! - L has shape `(m − order, m)` for a distribution of `m` support points
//!   and is built on a unit grid; the distance axis enters only through its
//!   length.
//! - Penalty residuals and Jacobians are returned already scaled by alpha,
//!   matching what the residual/Jacobian augmentation and the normal-equation
//!   assembly expect.

pub mod operator;
pub mod penalty;
pub mod selection;
