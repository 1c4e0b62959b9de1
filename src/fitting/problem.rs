//! Problem classification and penalized normal-equation assembly.
//!
//! Purpose
//! -------
//! Map the caller's constraint flags onto one of three solution strategies
//! and build the components of the penalized least-squares problem: the
//! regularized normal matrix `KtKreg = Kᵀ·diag(w)·K + R(alpha)` and the
//! right-hand side `KtV = Kᵀ·(w ⊙ V)`. For the quadratic Tikhonov penalty
//! `R = alpha²·LᵀL` in closed form; the total-variation and pseudo-Huber
//! penalties are handled by a fixed-point re-weighting loop that alternates
//! NNLS solves with re-evaluation of the weighted operator until the solution
//! stops moving.
//!
//! Invariants & assumptions
//! ------------------------
//! - The classifier is a pure function of the two flags; OBIR takes
//!   precedence over plain non-negativity when both are requested.
//! - The re-weighting loop is bounded (500 passes) and its diagonal weights
//!   carry the same ε offsets as the penalty model, so assembly never
//!   divides by an exact zero.
//! - Assembled matrices are owned by the caller; nothing is cached between
//!   fits.

use crate::dataset::GlobalSignal;
use crate::fitting::errors::FitResult;
use crate::fitting::solvers::fnnls;
use crate::regularization::penalty::RegKind;
use ndarray::{Array1, Array2, Axis};

/// Solution strategy for the regularized problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemKind {
    /// Direct solve of the penalized normal equations.
    Unconstrained,
    /// Non-negative least squares on the penalized normal equations.
    Nnls,
    /// Osher–Bregman iterated regularization (implies non-negativity).
    Obir,
}

impl ProblemKind {
    /// Classify the problem from the constraint flags.
    ///
    /// OBIR takes precedence over plain non-negativity when both are set.
    pub fn classify(nonnegativity: bool, obir: bool) -> ProblemKind {
        if obir {
            ProblemKind::Obir
        } else if nonnegativity {
            ProblemKind::Nnls
        } else {
            ProblemKind::Unconstrained
        }
    }
}

/// Number of fixed-point passes allowed for the re-weighted penalties.
const REWEIGHT_MAX_PASSES: usize = 500;

/// Fixed-point step threshold ‖P − Pprev‖₂ below which re-weighting stops.
const REWEIGHT_THRESHOLD: f64 = 0.1;

/// Assemble the penalized normal equations for the given alpha.
///
/// Parameters
/// ----------
/// - `data`: stacked signal, kernel, and per-sample weights.
/// - `l`: regularization operator.
/// - `alpha`: regularization parameter (> 0).
/// - `kind`: regularization functional; selects the closed-form or
///   re-weighted regularization term.
/// - `huber_param`: shape parameter η for [`RegKind::PseudoHuber`].
///
/// Returns
/// -------
/// `(KtKreg, KtV)` with `KtKreg` of shape `(m, m)` and `KtV` of length `m`.
///
/// Errors
/// ------
/// - Propagates solver failures from the inner NNLS solves of the
///   re-weighting loop (total variation and pseudo-Huber only).
pub fn lsq_components(
    data: &GlobalSignal, l: &Array2<f64>, alpha: f64, kind: RegKind, huber_param: f64,
) -> FitResult<(Array2<f64>, Array1<f64>)> {
    let k = &data.kernel;
    let w_col = data.weights.clone().insert_axis(Axis(1));
    let kw = k * &w_col;
    let ktk = k.t().dot(&kw);
    let ktv = k.t().dot(&(&data.weights * &data.signal));

    let regterm = match kind {
        RegKind::Tikhonov => l.t().dot(l).mapv(|x| alpha * alpha * x),
        RegKind::TotalVariation => {
            reweighted_term(&ktk, &ktv, l, |lp| {
                let eps = f64::EPSILON;
                alpha * alpha / (lp * lp + eps).sqrt()
            })?
        }
        RegKind::PseudoHuber => {
            let eta = huber_param;
            reweighted_term(&ktk, &ktv, l, move |lp| {
                alpha * alpha / (eta * eta) / ((lp / eta).powi(2) + 1.0).sqrt()
            })?
        }
    };

    Ok((ktk + regterm, ktv))
}

/// Fixed-point evaluation of a re-weighted regularization term `Lᵀ·W(P)·L`.
///
/// Starting from P = 0, alternately assembles the term with the current
/// diagonal weights, solves the resulting NNLS problem, and re-weights, until
/// the solution moves less than [`REWEIGHT_THRESHOLD`] or the pass budget is
/// exhausted. The last assembled term is returned.
fn reweighted_term<F>(
    ktk: &Array2<f64>, ktv: &Array1<f64>, l: &Array2<f64>, weight: F,
) -> FitResult<Array2<f64>>
where
    F: Fn(f64) -> f64,
{
    let m = l.ncols();
    let mut p = Array1::<f64>::zeros(m);
    let mut regterm = weighted_operator(l, &p, &weight);
    for _ in 0..REWEIGHT_MAX_PASSES {
        let p_next = fnnls(&(ktk + &regterm), ktv)?;
        let change = (&p_next - &p).mapv(|x| x * x).sum().sqrt();
        p = p_next;
        if change < REWEIGHT_THRESHOLD {
            break;
        }
        regterm = weighted_operator(l, &p, &weight);
    }
    Ok(regterm)
}

/// Assemble `Lᵀ·diag(weight((L·P)_i))·L`.
fn weighted_operator<F>(l: &Array2<f64>, p: &Array1<f64>, weight: &F) -> Array2<f64>
where
    F: Fn(f64) -> f64,
{
    let lp = l.dot(p);
    let mut lw = l.clone();
    for (mut row, &x) in lw.axis_iter_mut(Axis(0)).zip(lp.iter()) {
        let w = weight(x);
        row.mapv_inplace(|v| w * v);
    }
    l.t().dot(&lw)
}
