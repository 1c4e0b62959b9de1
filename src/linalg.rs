//! linalg — dense linear-algebra bridge between `ndarray` and `nalgebra`.
//!
//! Purpose
//! -------
//! Centralize the small set of factorizations the fitting and inference code
//! needs: solving symmetric systems (Cholesky with an LU fallback) and
//! Moore–Penrose pseudo-inverses (SVD with relative truncation). All data
//! plumbing in the crate uses `ndarray`; these helpers copy into
//! `nalgebra::DMatrix`/`DVector`, factorize, and copy back.
//!
//! Conventions
//! -----------
//! - Copies are explicit; no zero-copy views are attempted across the two
//!   libraries.
//! - Singular values below `s_max · max(dim) · f64::EPSILON` are truncated to
//!   zero when forming pseudo-inverses, so near-singular normal matrices
//!   produce finite (deflated) inverses instead of noise amplification.
//! - Failures surface as [`FitError::LinearSolveFailure`] naming the calling
//!   context; these helpers never panic on singular input.

use crate::fitting::errors::{FitError, FitResult};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};

/// Copy an `ndarray` matrix into a freshly allocated `nalgebra::DMatrix`.
///
/// Writes proceed column by column to match `DMatrix`'s column-major storage.
pub fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    let (rows, cols) = a.dim();
    let mut out = DMatrix::<f64>::zeros(rows, cols);
    for j in 0..cols {
        for i in 0..rows {
            out[(i, j)] = a[[i, j]];
        }
    }
    out
}

/// Copy an `ndarray` vector into a `nalgebra::DVector`.
pub fn to_dvector(v: &Array1<f64>) -> DVector<f64> {
    DVector::from_iterator(v.len(), v.iter().copied())
}

/// Copy a `nalgebra::DMatrix` back into an `ndarray` matrix.
pub fn to_array2(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

/// Copy a `nalgebra::DVector` back into an `ndarray` vector.
pub fn to_array1(v: &DVector<f64>) -> Array1<f64> {
    Array1::from_iter(v.iter().copied())
}

/// Solve the symmetric system `A·x = b`.
///
/// Attempts a Cholesky factorization first (the penalized normal matrices are
/// symmetric positive definite in the well-posed case) and falls back to LU
/// when the matrix is indefinite up to rounding. The `context` string names
/// the calling site in the error.
///
/// Errors
/// ------
/// - [`FitError::LinearSolveFailure`] if both factorizations fail or the
///   right-hand side length does not match.
pub fn solve_sym(a: &Array2<f64>, b: &Array1<f64>, context: &'static str) -> FitResult<Array1<f64>> {
    if a.nrows() != b.len() {
        return Err(FitError::LinearSolveFailure { context });
    }
    let a_nalg = to_dmatrix(a);
    let b_nalg = to_dvector(b);
    if let Some(chol) = a_nalg.clone().cholesky() {
        return Ok(to_array1(&chol.solve(&b_nalg)));
    }
    match a_nalg.lu().solve(&b_nalg) {
        Some(x) => Ok(to_array1(&x)),
        None => Err(FitError::LinearSolveFailure { context }),
    }
}

/// Moore–Penrose pseudo-inverse via SVD with relative truncation.
///
/// Errors
/// ------
/// - [`FitError::LinearSolveFailure`] if the SVD does not converge.
pub fn pinv(a: &Array2<f64>, context: &'static str) -> FitResult<Array2<f64>> {
    let m = to_dmatrix(a);
    let max_dim = m.nrows().max(m.ncols()) as f64;
    let svd = m.svd(true, true);
    let s_max = svd.singular_values.iter().cloned().fold(0.0_f64, f64::max);
    let eps = s_max * max_dim * f64::EPSILON;
    match svd.pseudo_inverse(eps) {
        Ok(inv) => Ok(to_array2(&inv)),
        Err(_) => Err(FitError::LinearSolveFailure { context }),
    }
}

/// Trace of the hat matrix `K · A · Kᵀ` without materializing it.
///
/// Uses `tr(K A Kᵀ) = Σ_ij K_ij (K A)_ij` for symmetric `A`; the fit and the
/// parameter-selection criteria call this with `A = pinv(KtKreg)`.
pub fn hat_trace(k: &Array2<f64>, a: &Array2<f64>) -> f64 {
    let ka = k.dot(a);
    (&ka * k).sum()
}
