//! Signal statistics and goodness-of-fit summaries.
//!
//! Purpose
//! -------
//! House the small numerical statistics shared across the fitting pipeline:
//! the successive-difference noise estimator, population residual deviation,
//! trapezoidal integration over a non-uniform axis, and the per-fit
//! goodness-of-fit table.
//!
//! Key behaviors
//! -------------
//! - `noise_level` estimates the noise standard deviation of a smooth signal
//!   as `std(diff(V)) / sqrt(2)`; differencing cancels the smooth trend and
//!   the `sqrt(2)` undoes the variance doubling of the difference.
//! - `goodness_of_fit` reports reduced chi-square, RMSD, R², and the AIC /
//!   AICc / BIC information criteria from a residual sum of squares and an
//!   effective degrees-of-freedom count.
//! - All deviations are population deviations (denominator `n`), matching
//!   the residual checks in the OBIR stopping policy.
//!
//! Conventions
//! -----------
//! - Effective parameter count is `n - ndof`; the criteria penalize it the
//!   usual way (`2k`, small-sample corrected `2k(k+1)/(n-k-1)`, `k·ln n`).
//!
//! Downstream usage
//! ----------------
//! - [`crate::fitting::regfit`] builds one [`GofStats`] per dataset subset;
//!   [`crate::fitting::obir`] uses `residual_std` for its stopping policy.

use ndarray::{Array1, ArrayView1};

/// Population standard deviation (denominator `n`).
pub fn residual_std(x: &Array1<f64>) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let mean = x.mean().unwrap_or(0.0);
    (x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / x.len() as f64).sqrt()
}

/// Estimate the noise standard deviation of a smooth signal.
///
/// Parameters
/// ----------
/// - `v`: signal samples; smoothness is assumed, not checked.
///
/// Returns
/// -------
/// `std(diff(v)) / sqrt(2)`, or `0.0` for signals shorter than two samples.
pub fn noise_level(v: &Array1<f64>) -> f64 {
    if v.len() < 2 {
        return 0.0;
    }
    let diffs = Array1::from_iter(v.windows(2).into_iter().map(|w| w[1] - w[0]));
    residual_std(&diffs) / 2f64.sqrt()
}

/// Trapezoidal integral of `y` over the (possibly non-uniform) axis `x`.
///
/// Panics
/// ------
/// - Never; mismatched or short inputs integrate to `0.0`.
pub fn trapz(y: ArrayView1<f64>, x: ArrayView1<f64>) -> f64 {
    if y.len() != x.len() || y.len() < 2 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 1..y.len() {
        acc += 0.5 * (x[i] - x[i - 1]) * (y[i] + y[i - 1]);
    }
    acc
}

/// Goodness-of-fit summary for one dataset.
#[derive(Debug, Clone, Copy)]
pub struct GofStats {
    /// Reduced chi-square, `rss / ndof`.
    pub chi2red: f64,
    /// Root-mean-square deviation.
    pub rmsd: f64,
    /// Coefficient of determination.
    pub r2: f64,
    /// Akaike information criterion.
    pub aic: f64,
    /// Small-sample-corrected AIC.
    pub aicc: f64,
    /// Bayesian information criterion.
    pub bic: f64,
}

/// Goodness-of-fit statistics for a fitted signal.
///
/// Parameters
/// ----------
/// - `x`: observed samples.
/// - `xfit`: fitted samples, same length.
/// - `ndof`: effective residual degrees of freedom (observations minus
///   effective parameters).
///
/// Returns
/// -------
/// A [`GofStats`] table; degenerate inputs (zero `ndof`, constant `x`)
/// produce infinities rather than panics.
pub fn goodness_of_fit(x: ArrayView1<f64>, xfit: ArrayView1<f64>, ndof: f64) -> GofStats {
    let n = x.len() as f64;
    let rss: f64 = x.iter().zip(xfit.iter()).map(|(a, b)| (a - b).powi(2)).sum();
    let mean = x.mean().unwrap_or(0.0);
    let tss: f64 = x.iter().map(|a| (a - mean).powi(2)).sum();

    let k = n - ndof;
    let log_term = n * (rss / n).ln();
    let aic = log_term + 2.0 * k;
    let aicc = if n - k - 1.0 > 0.0 { aic + 2.0 * k * (k + 1.0) / (n - k - 1.0) } else { f64::INFINITY };

    GofStats {
        chi2red: if ndof > 0.0 { rss / ndof } else { f64::INFINITY },
        rmsd: (rss / n).sqrt(),
        r2: if tss > 0.0 { 1.0 - rss / tss } else { f64::NEG_INFINITY },
        aic,
        aicc,
        bic: log_term + k * n.ln(),
    }
}

/// Goodness-of-fit report attached to a fit result.
///
/// Single-dataset fits collapse to the scalar variant so callers are not
/// forced through a one-element vector.
#[derive(Debug, Clone)]
pub enum GofReport {
    /// One dataset.
    Single(GofStats),
    /// One entry per dataset, in input order.
    PerDataset(Vec<GofStats>),
}

impl GofReport {
    /// Statistics of the first (or only) dataset.
    pub fn first(&self) -> &GofStats {
        match self {
            GofReport::Single(stats) => stats,
            GofReport::PerDataset(all) => &all[0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - The noise estimator on a known-noise synthetic signal.
    // - Trapezoidal integration against a closed form.
    // - Goodness-of-fit identities on a perfect and an imperfect fit.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Verify that the successive-difference estimator recovers the
    // deviation of an alternating perturbation on a linear trend.
    //
    // Given
    // -----
    // - A linear signal with a ±e alternating perturbation, whose first
    //   difference is the trend slope ±2e.
    //
    // Expect
    // ------
    // - The estimate equals 2e/sqrt(2) = e·sqrt(2) to within rounding.
    fn noise_level_matches_alternating_perturbation() {
        // Arrange
        let e = 0.01;
        let v = Array1::from_iter((0..200).map(|i| {
            0.5 * i as f64 + if i % 2 == 0 { e } else { -e }
        }));

        // Act
        let sigma = noise_level(&v);

        // Assert
        assert!((sigma - e * 2f64.sqrt()).abs() < 1e-12, "sigma = {sigma}");
    }

    #[test]
    // Purpose
    // -------
    // Check the trapezoidal rule against the exact integral of a linear
    // function on a non-uniform grid.
    //
    // Given
    // -----
    // - y = 2x on x = [0, 0.5, 2, 3]; exact integral is x² evaluated at 3.
    //
    // Expect
    // ------
    // - trapz returns 9 exactly (the rule is exact for linear integrands).
    fn trapz_is_exact_for_linear_integrand() {
        // Arrange
        let x = array![0.0, 0.5, 2.0, 3.0];
        let y = x.mapv(|v| 2.0 * v);

        // Act / Assert
        assert!((trapz(y.view(), x.view()) - 9.0).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Verify the goodness-of-fit identities on a hand-computed residual.
    //
    // Given
    // -----
    // - x = [1, 2, 3, 4], xfit off by 0.1 everywhere, ndof = 3.
    //
    // Expect
    // ------
    // - rss = 0.04, chi2red = rss/3, rmsd = 0.1, r2 = 1 - 0.04/5.
    fn goodness_of_fit_matches_hand_computation() {
        // Arrange
        let x = array![1.0, 2.0, 3.0, 4.0];
        let xfit = x.mapv(|v| v + 0.1);

        // Act
        let stats = goodness_of_fit(x.view(), xfit.view(), 3.0);

        // Assert
        assert!((stats.chi2red - 0.04 / 3.0).abs() < 1e-12);
        assert!((stats.rmsd - 0.1).abs() < 1e-12);
        assert!((stats.r2 - (1.0 - 0.04 / 5.0)).abs() < 1e-12);
        assert!((stats.bic - (4.0 * (0.04f64 / 4.0).ln() + 4f64.ln())).abs() < 1e-9);
    }
}
