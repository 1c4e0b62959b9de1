//! dataset — validated container for single and global (multi-dataset) fits.
//!
//! Purpose
//! -------
//! Concatenate one or more dipolar signals and their kernels into the single
//! stacked system the fitting engine operates on, while recording the index
//! range (`subset`) each dataset occupies and expanding normalized dataset
//! weights into a per-sample weight vector. All shape, finiteness, and weight
//! checks happen here so downstream code can assume conformable arrays.
//!
//! Key behaviors
//! -------------
//! - Validate that signal/kernel counts match, every kernel's rows match its
//!   signal, and all kernels agree on the distribution length.
//! - Normalize dataset weights to unit sum (equal weights by default) and
//!   expand them across each dataset's samples.
//! - Record per-dataset index ranges used later to split fitted signals for
//!   goodness-of-fit statistics.
//!
//! Invariants & assumptions
//! ------------------------
//! - `signal.len() == kernel.nrows()` and `weights.len() == signal.len()`
//!   after construction.
//! - `subsets` partitions `0..signal.len()` in dataset order.
//! - Weights are strictly positive and sum to one across datasets.
//!
//! Downstream usage
//! ----------------
//! - [`crate::fitting::regfit::fit_regularized`] consumes a `GlobalSignal`;
//!   the OBIR iterator and the parameter-selection grid reuse the stacked
//!   arrays and per-sample weights directly.

use crate::fitting::errors::{FitError, FitResult};
use ndarray::{concatenate, Array1, Array2, Axis};
use std::ops::Range;

/// Stacked multi-dataset signal with kernels, weights, and subset ranges.
///
/// Constructed through [`GlobalSignal::new`] (global fits) or
/// [`GlobalSignal::from_single`] (the common one-dataset case). Once built,
/// the container is immutable; every fit borrows it read-only.
#[derive(Debug, Clone)]
pub struct GlobalSignal {
    /// Concatenated signal samples.
    pub signal: Array1<f64>,
    /// Vertically stacked kernel (rows = samples, columns = distribution points).
    pub kernel: Array2<f64>,
    /// Per-sample weights (dataset weights normalized to unit sum, expanded).
    pub weights: Array1<f64>,
    /// Index range of each dataset within the concatenation.
    pub subsets: Vec<Range<usize>>,
}

impl GlobalSignal {
    /// Build a global dataset from per-dataset signals and kernels.
    ///
    /// Parameters
    /// ----------
    /// - `signals`: one signal per dataset, each non-empty and finite.
    /// - `kernels`: one kernel per dataset; kernel `i` must have
    ///   `signals[i].len()` rows, and all kernels must share a column count.
    /// - `weights`: optional per-dataset weights, strictly positive and
    ///   finite; `None` weights all datasets equally. Weights are normalized
    ///   to unit sum before being expanded per sample.
    ///
    /// Errors
    /// ------
    /// - [`FitError::DatasetCountMismatch`], [`FitError::KernelRowMismatch`],
    ///   [`FitError::KernelColumnMismatch`], [`FitError::EmptyInput`],
    ///   [`FitError::NonFiniteInput`], [`FitError::WeightCountMismatch`],
    ///   [`FitError::InvalidWeight`] on the corresponding violations. All are
    ///   raised before any numeric work.
    pub fn new(
        signals: Vec<Array1<f64>>, kernels: Vec<Array2<f64>>, weights: Option<Vec<f64>>,
    ) -> FitResult<GlobalSignal> {
        if signals.is_empty() {
            return Err(FitError::EmptyInput { name: "signals" });
        }
        if signals.len() != kernels.len() {
            return Err(FitError::DatasetCountMismatch {
                signals: signals.len(),
                kernels: kernels.len(),
            });
        }

        let n_points = kernels[0].ncols();
        for (idx, (v, k)) in signals.iter().zip(kernels.iter()).enumerate() {
            if v.is_empty() {
                return Err(FitError::EmptyInput { name: "signal" });
            }
            if k.nrows() != v.len() {
                return Err(FitError::KernelRowMismatch {
                    dataset: idx,
                    rows: k.nrows(),
                    samples: v.len(),
                });
            }
            if k.ncols() != n_points {
                return Err(FitError::KernelColumnMismatch {
                    dataset: idx,
                    columns: k.ncols(),
                    expected: n_points,
                });
            }
            if let Some((pos, &bad)) = v.iter().enumerate().find(|(_, x)| !x.is_finite()) {
                return Err(FitError::NonFiniteInput { name: "signal", index: pos, value: bad });
            }
            if let Some((pos, &bad)) = k.iter().enumerate().find(|(_, x)| !x.is_finite()) {
                return Err(FitError::NonFiniteInput { name: "kernel", index: pos, value: bad });
            }
        }

        let raw_weights = match weights {
            Some(w) => {
                if w.len() != signals.len() {
                    return Err(FitError::WeightCountMismatch {
                        weights: w.len(),
                        datasets: signals.len(),
                    });
                }
                for (idx, &wi) in w.iter().enumerate() {
                    if !wi.is_finite() || wi <= 0.0 {
                        return Err(FitError::InvalidWeight { dataset: idx, weight: wi });
                    }
                }
                w
            }
            None => vec![1.0; signals.len()],
        };
        let weight_sum: f64 = raw_weights.iter().sum();

        let mut subsets = Vec::with_capacity(signals.len());
        let mut offset = 0;
        for v in &signals {
            subsets.push(offset..offset + v.len());
            offset += v.len();
        }

        let mut per_sample = Array1::<f64>::zeros(offset);
        for (subset, &w) in subsets.iter().zip(raw_weights.iter()) {
            for i in subset.clone() {
                per_sample[i] = w / weight_sum;
            }
        }

        let signal_views: Vec<_> = signals.iter().map(|v| v.view()).collect();
        let kernel_views: Vec<_> = kernels.iter().map(|k| k.view()).collect();
        let signal = concatenate(Axis(0), &signal_views)
            .map_err(|_| FitError::EmptyInput { name: "signals" })?;
        let kernel = concatenate(Axis(0), &kernel_views)
            .map_err(|_| FitError::EmptyInput { name: "kernels" })?;

        Ok(GlobalSignal { signal, kernel, weights: per_sample, subsets })
    }

    /// Convenience constructor for the single-dataset case with equal weight.
    pub fn from_single(signal: Array1<f64>, kernel: Array2<f64>) -> FitResult<GlobalSignal> {
        GlobalSignal::new(vec![signal], vec![kernel], None)
    }

    /// Number of concatenated samples.
    pub fn n_samples(&self) -> usize {
        self.signal.len()
    }

    /// Number of distribution support points the kernels map from.
    pub fn n_points(&self) -> usize {
        self.kernel.ncols()
    }

    /// Number of datasets in the global fit.
    pub fn n_datasets(&self) -> usize {
        self.subsets.len()
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
    // - Concatenation, subset bookkeeping, and weight expansion for global
    //   datasets.
    // - Entry validation for the documented shape and weight violations.
    //
    // They intentionally DO NOT cover:
    // - Fitting behavior on the stacked system (integration tests).
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Verify that two datasets concatenate in order with correct subsets and
    // unit-sum per-sample weights.
    //
    // Given
    // -----
    // - Signals of lengths 2 and 3 with kernels of 2 columns, equal weights.
    //
    // Expect
    // ------
    // - Stacked signal of length 5, subsets 0..2 and 2..5, and every sample
    //   weighted 0.5.
    fn new_concatenates_datasets_and_expands_weights() {
        // Arrange
        let v1 = array![1.0, 2.0];
        let v2 = array![3.0, 4.0, 5.0];
        let k1 = Array2::<f64>::ones((2, 2));
        let k2 = Array2::<f64>::ones((3, 2));

        // Act
        let data = GlobalSignal::new(vec![v1, v2], vec![k1, k2], None).unwrap();

        // Assert
        assert_eq!(data.n_samples(), 5);
        assert_eq!(data.n_points(), 2);
        assert_eq!(data.subsets, vec![0..2, 2..5]);
        assert!(data.weights.iter().all(|&w| (w - 0.5).abs() < 1e-12));
        assert_eq!(data.signal, array![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    // Purpose
    // -------
    // Check that supplied weights are normalized to unit sum before
    // expansion.
    //
    // Given
    // -----
    // - Two one-sample datasets with weights [1, 3].
    //
    // Expect
    // ------
    // - Per-sample weights [0.25, 0.75].
    fn new_normalizes_supplied_weights_to_unit_sum() {
        // Arrange
        let v = array![1.0];
        let k = Array2::<f64>::ones((1, 2));

        // Act
        let data =
            GlobalSignal::new(vec![v.clone(), v], vec![k.clone(), k], Some(vec![1.0, 3.0]))
                .unwrap();

        // Assert
        assert!((data.weights[0] - 0.25).abs() < 1e-12);
        assert!((data.weights[1] - 0.75).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Verify the documented configuration errors for shape and weight
    // violations.
    //
    // Given
    // -----
    // - Mismatched kernel rows, mismatched column counts, a bad weight
    //   count, and a non-positive weight.
    //
    // Expect
    // ------
    // - The corresponding `FitError` variant for each violation.
    fn new_rejects_shape_and_weight_violations() {
        let v = array![1.0, 2.0];
        let k = Array2::<f64>::ones((2, 3));

        // Kernel rows vs signal samples.
        let bad_rows = Array2::<f64>::ones((3, 3));
        assert!(matches!(
            GlobalSignal::new(vec![v.clone()], vec![bad_rows], None),
            Err(FitError::KernelRowMismatch { .. })
        ));

        // Column disagreement across kernels.
        let other_cols = Array2::<f64>::ones((2, 4));
        assert!(matches!(
            GlobalSignal::new(vec![v.clone(), v.clone()], vec![k.clone(), other_cols], None),
            Err(FitError::KernelColumnMismatch { .. })
        ));

        // Weight count.
        assert!(matches!(
            GlobalSignal::new(vec![v.clone()], vec![k.clone()], Some(vec![1.0, 2.0])),
            Err(FitError::WeightCountMismatch { .. })
        ));

        // Non-positive weight.
        assert!(matches!(
            GlobalSignal::new(vec![v], vec![k], Some(vec![0.0])),
            Err(FitError::InvalidWeight { .. })
        ));
    }
}
