//! Finite-difference regularization operators.
//!
//! The operator of order `d` is the `(m − d) × m` banded matrix whose rows
//! carry the alternating-sign binomial stencil of the d-th difference:
//! order 0 is the identity, order 1 rows are `[-1, 1]`, order 2 rows are
//! `[1, -2, 1]`, order 3 rows are `[-1, 3, -3, 1]`. Orders above 3 offer no
//! practical smoothing benefit for distance distributions and are rejected.

use crate::fitting::errors::{FitError, FitResult};
use ndarray::Array2;

/// Highest supported derivative order.
pub const MAX_REG_ORDER: usize = 3;

/// Build the finite-difference regularization operator of the given order.
///
/// # Arguments
/// - `m`: number of distribution support points (columns of the operator).
/// - `order`: derivative order in `0..=3`.
///
/// # Errors
/// - [`FitError::InvalidRegOrder`] if `order > 3` or the operator would have
///   no rows (`m <= order`).
pub fn reg_operator(m: usize, order: usize) -> FitResult<Array2<f64>> {
    if order > MAX_REG_ORDER {
        return Err(FitError::InvalidRegOrder {
            order,
            reason: "operator orders above 3 are not supported",
        });
    }
    if m <= order {
        return Err(FitError::InvalidRegOrder {
            order,
            reason: "distribution has too few points for this order",
        });
    }

    // Alternating-sign binomial stencil, highest-index coefficient positive.
    let mut stencil = vec![0.0; order + 1];
    for (j, slot) in stencil.iter_mut().enumerate() {
        let sign = if (order - j) % 2 == 0 { 1.0 } else { -1.0 };
        *slot = sign * binomial(order, j);
    }

    let mut l = Array2::<f64>::zeros((m - order, m));
    for i in 0..(m - order) {
        for (j, &c) in stencil.iter().enumerate() {
            l[[i, i + j]] = c;
        }
    }
    Ok(l)
}

fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let mut out = 1.0;
    for i in 0..k {
        out = out * (n - i) as f64 / (i + 1) as f64;
    }
    out
}
