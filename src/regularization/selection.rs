//! Regularization-parameter selection.
//!
//! Purpose
//! -------
//! Pick the regularization parameter alpha for a penalized least-squares fit
//! by scanning a fixed logarithmic grid with a model-selection criterion, and
//! refine pointwise criteria with a golden-section search around the grid
//! minimum.
//!
//! Key behaviors
//! -------------
//! - Grid: `10^-9` to `10^3`, 61 points, uniform in `log10(alpha)`.
//! - Pointwise criteria (AIC, AICc, BIC, GCV) evaluate a full assemble/solve
//!   per alpha; their grid minimum is refined with
//!   `argmin`'s `GoldenSectionSearch` over `log10(alpha)` bracketed by the
//!   neighboring grid points.
//! - The L-curve radius criterion is inherently a property of the whole grid
//!   (residual and penalty norms are normalized across it), so it is never
//!   refined; the grid winner is returned as-is.
//! - Effective parameter count per alpha is the influence-matrix trace
//!   `tr(K · pinv(KtKreg) · Kᵀ)`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Alphas whose criterion evaluates to a non-finite value are skipped; the
//!   search fails only when the whole grid is unusable.
//!
//! Downstream usage
//! ----------------
//! - Called by [`crate::fitting::regfit`] when the options request selection
//!   instead of a fixed alpha.

use crate::dataset::GlobalSignal;
use crate::fitting::errors::{FitError, FitResult};
use crate::fitting::problem::{lsq_components, ProblemKind};
use crate::fitting::solvers::{solve_nnls, SolverKind};
use crate::linalg::{hat_trace, pinv, solve_sym};
use crate::regularization::penalty::RegKind;
use argmin::core::{CostFunction, Error, Executor, State};
use argmin::solver::goldensectionsearch::GoldenSectionSearch;
use ndarray::Array2;
use std::str::FromStr;

/// Grid bounds and density in `log10(alpha)`.
const LOG_ALPHA_MIN: f64 = -9.0;
const LOG_ALPHA_MAX: f64 = 3.0;
const GRID_POINTS: usize = 61;

/// Golden-section refinement budget.
const REFINE_MAX_ITERS: u64 = 100;
const REFINE_TOLERANCE: f64 = 1e-4;

/// Model-selection criteria for the regularization parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionCriterion {
    /// Akaike information criterion.
    Aic,
    /// Small-sample-corrected AIC.
    Aicc,
    /// Bayesian information criterion.
    Bic,
    /// Generalized cross-validation.
    Gcv,
    /// L-curve radius (grid-only).
    LCurveRadius,
}

impl FromStr for SelectionCriterion {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aic" => Ok(SelectionCriterion::Aic),
            "aicc" => Ok(SelectionCriterion::Aicc),
            "bic" => Ok(SelectionCriterion::Bic),
            "gcv" => Ok(SelectionCriterion::Gcv),
            "lr" => Ok(SelectionCriterion::LCurveRadius),
            other => Err(FitError::UnknownCriterion { name: other.to_string() }),
        }
    }
}

impl std::fmt::Display for SelectionCriterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            SelectionCriterion::Aic => "aic",
            SelectionCriterion::Aicc => "aicc",
            SelectionCriterion::Bic => "bic",
            SelectionCriterion::Gcv => "gcv",
            SelectionCriterion::LCurveRadius => "lr",
        };
        write!(f, "{}", tag)
    }
}

/// Everything a single-alpha evaluation needs, bundled for reuse between the
/// grid scan and the golden-section refinement.
struct AlphaEvaluator<'a> {
    data: &'a GlobalSignal,
    l: &'a Array2<f64>,
    kind: RegKind,
    huber_param: f64,
    solver: SolverKind,
    problem: ProblemKind,
    criterion: SelectionCriterion,
}

/// Per-alpha quantities shared by every criterion.
struct AlphaPoint {
    residual_norm_sq: f64,
    penalty_norm_sq: f64,
    trace: f64,
}

impl<'a> AlphaEvaluator<'a> {
    /// Assemble, solve, and summarize the fit at one alpha.
    fn evaluate(&self, alpha: f64) -> FitResult<AlphaPoint> {
        let (ktkreg, ktv) = lsq_components(self.data, self.l, alpha, self.kind, self.huber_param)?;
        let p = match self.problem {
            ProblemKind::Unconstrained => {
                solve_sym(&ktkreg, &ktv, "solving the unconstrained normal equations")?
            }
            _ => solve_nnls(self.solver, &ktkreg, &ktv)?,
        };

        let residual = self.data.kernel.dot(&p) - &self.data.signal;
        let residual_norm_sq =
            residual.iter().zip(self.data.weights.iter()).map(|(r, w)| w * r * r).sum();
        let lp = self.l.dot(&p);
        let penalty_norm_sq = lp.dot(&lp);

        let inv = pinv(&ktkreg, "inverting the regularized normal matrix")?;
        let trace = hat_trace(&self.data.kernel, &inv);

        Ok(AlphaPoint { residual_norm_sq, penalty_norm_sq, trace })
    }

    /// Pointwise criterion value at one alpha.
    fn pointwise_cost(&self, alpha: f64) -> FitResult<f64> {
        let point = self.evaluate(alpha)?;
        let n = self.data.n_samples() as f64;
        let rss = point.residual_norm_sq;
        let t = point.trace;
        let value = match self.criterion {
            SelectionCriterion::Aic => n * (rss / n).ln() + 2.0 * t,
            SelectionCriterion::Aicc => {
                n * (rss / n).ln() + 2.0 * t + 2.0 * t * (t + 1.0) / (n - t - 1.0)
            }
            SelectionCriterion::Bic => n * (rss / n).ln() + t * n.ln(),
            SelectionCriterion::Gcv => (rss / n) / (1.0 - t / n).powi(2),
            SelectionCriterion::LCurveRadius => {
                unreachable!("the L-curve radius is evaluated on the grid only")
            }
        };
        Ok(value)
    }
}

impl CostFunction for AlphaEvaluator<'_> {
    type Param = f64;
    type Output = f64;

    fn cost(&self, log_alpha: &f64) -> Result<f64, Error> {
        self.pointwise_cost(10f64.powf(*log_alpha))
            .map_err(|err| Error::msg(err.to_string()))
    }
}

/// Select the regularization parameter on the standard logarithmic grid.
///
/// Parameters
/// ----------
/// - `data`: stacked signal/kernel/weights.
/// - `l`: regularization operator.
/// - `kind`, `huber_param`: penalty functional forwarded to the assembler.
/// - `solver`, `problem`: back-end for the per-alpha solve.
/// - `criterion`: model-selection criterion.
///
/// Returns
/// -------
/// The selected alpha.
///
/// Errors
/// ------
/// - [`FitError::AlphaSearchFailure`] when no grid point yields a finite
///   criterion value.
/// - Propagates assembler and solver failures and, for pointwise criteria,
///   golden-section failures (as [`FitError::Anyhow`]).
pub fn select_alpha(
    data: &GlobalSignal, l: &Array2<f64>, kind: RegKind, huber_param: f64, solver: SolverKind,
    problem: ProblemKind, criterion: SelectionCriterion,
) -> FitResult<f64> {
    let evaluator = AlphaEvaluator { data, l, kind, huber_param, solver, problem, criterion };
    let step = (LOG_ALPHA_MAX - LOG_ALPHA_MIN) / (GRID_POINTS - 1) as f64;
    let log_grid: Vec<f64> =
        (0..GRID_POINTS).map(|i| LOG_ALPHA_MIN + step * i as f64).collect();

    if criterion == SelectionCriterion::LCurveRadius {
        return lcurve_radius(&evaluator, &log_grid);
    }

    // Grid scan; unusable alphas are skipped rather than aborting the search.
    let mut best: Option<(usize, f64)> = None;
    for (i, log_alpha) in log_grid.iter().enumerate() {
        let value = match evaluator.pointwise_cost(10f64.powf(*log_alpha)) {
            Ok(v) if v.is_finite() => v,
            _ => continue,
        };
        if best.map_or(true, |(_, best_value)| value < best_value) {
            best = Some((i, value));
        }
    }
    let (best_index, _) = best.ok_or(FitError::AlphaSearchFailure {
        reason: "no grid point produced a finite criterion value",
    })?;

    // Bracket the refinement by the neighboring grid points.
    let lower = log_grid[best_index.saturating_sub(1)];
    let upper = log_grid[(best_index + 1).min(log_grid.len() - 1)];
    if lower >= upper {
        return Ok(10f64.powf(log_grid[best_index]));
    }

    let gss = GoldenSectionSearch::new(lower, upper)
        .map_err(FitError::from)?
        .with_tolerance(REFINE_TOLERANCE)
        .map_err(FitError::from)?;
    let result = Executor::new(evaluator, gss)
        .configure(|state| state.param(log_grid[best_index]).max_iters(REFINE_MAX_ITERS))
        .run()
        .map_err(FitError::from)?;

    let log_alpha = result
        .state()
        .get_best_param()
        .copied()
        .unwrap_or(log_grid[best_index]);
    Ok(10f64.powf(log_alpha))
}

/// Grid-only L-curve radius selection.
///
/// Residual and penalty log-norms are normalized to `[0, 1]` across the grid
/// and the alpha minimizing their squared distance to the origin wins.
fn lcurve_radius(evaluator: &AlphaEvaluator<'_>, log_grid: &[f64]) -> FitResult<f64> {
    let mut points: Vec<(f64, f64, f64)> = Vec::with_capacity(log_grid.len());
    for log_alpha in log_grid {
        let alpha = 10f64.powf(*log_alpha);
        if let Ok(point) = evaluator.evaluate(alpha) {
            let rho = point.residual_norm_sq.sqrt().ln();
            let eta = point.penalty_norm_sq.sqrt().ln();
            if rho.is_finite() && eta.is_finite() {
                points.push((alpha, rho, eta));
            }
        }
    }
    if points.is_empty() {
        return Err(FitError::AlphaSearchFailure {
            reason: "no grid point produced finite L-curve coordinates",
        });
    }

    let (rho_min, rho_max) = min_max(points.iter().map(|p| p.1));
    let (eta_min, eta_max) = min_max(points.iter().map(|p| p.2));
    let rho_span = (rho_max - rho_min).max(f64::EPSILON);
    let eta_span = (eta_max - eta_min).max(f64::EPSILON);

    let mut best = (points[0].0, f64::INFINITY);
    for (alpha, rho, eta) in &points {
        let rho_n = (rho - rho_min) / rho_span;
        let eta_n = (eta - eta_min) / eta_span;
        let radius = rho_n * rho_n + eta_n * eta_n;
        if radius < best.1 {
            best = (*alpha, radius);
        }
    }
    Ok(best.0)
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}
