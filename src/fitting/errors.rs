//! Unified error handling for regularized fits.
//!
//! This module defines `FitError`, the central error type used by dataset
//! parsing, problem assembly, solver dispatch, OBIR iteration, and the
//! top-level fit. It separates configuration errors (unknown tags, invalid
//! parameters, shape mismatches), which fail fast before any numeric work,
//! from numerical failures inside the linear algebra. An alias `FitResult<T>`
//! standardizes the return type across fitting code.

use crate::inference::errors::InferenceError;

/// Crate-wide result alias for fitting operations.
pub type FitResult<T> = Result<T, FitError>;

/// Unified error type for regularized fitting.
///
/// Configuration variants name the offending value so that callers can see
/// immediately which input was rejected. Numerical variants indicate a
/// breakdown inside a factorization or solver. Designed to integrate with
/// `anyhow::Error` via `From`, and to provide readable diagnostics through
/// `Display`.
#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    // ---- Configuration: tags ----
    /// Solver selector is not one of the known NNLS back-ends.
    UnknownSolver {
        name: String,
    },

    /// Regularization functional tag is not recognized.
    UnknownRegularization {
        name: String,
    },

    /// Selection-criterion tag is not recognized.
    UnknownCriterion {
        name: String,
    },

    // ---- Configuration: parameters ----
    /// Regularization parameter must be strictly positive and finite.
    InvalidAlpha {
        alpha: f64,
        reason: &'static str,
    },

    /// Huber shape parameter must be strictly positive and finite.
    InvalidHuberParam {
        param: f64,
        reason: &'static str,
    },

    /// Regularization operator order outside the supported range.
    InvalidRegOrder {
        order: usize,
        reason: &'static str,
    },

    /// OBIR iteration cap must be at least one.
    InvalidIterationCap {
        cap: usize,
    },

    /// Noise target must be non-negative and finite when supplied.
    InvalidNoiseTarget {
        target: f64,
        reason: &'static str,
    },

    // ---- Configuration: data shapes ----
    /// Number of signals and kernels differ in a global fit.
    DatasetCountMismatch {
        signals: usize,
        kernels: usize,
    },

    /// A kernel's row count does not match its signal length.
    KernelRowMismatch {
        dataset: usize,
        rows: usize,
        samples: usize,
    },

    /// Kernels in a global fit disagree on the distribution length.
    KernelColumnMismatch {
        dataset: usize,
        columns: usize,
        expected: usize,
    },

    /// The distance axis length does not match the kernel column count.
    AxisLengthMismatch {
        axis: usize,
        columns: usize,
    },

    /// The distance axis must be strictly increasing.
    AxisNotIncreasing {
        index: usize,
    },

    /// A dataset weight is invalid (non-finite or non-positive).
    InvalidWeight {
        dataset: usize,
        weight: f64,
    },

    /// Wrong number of dataset weights supplied.
    WeightCountMismatch {
        weights: usize,
        datasets: usize,
    },

    /// An input array contains a non-finite entry.
    NonFiniteInput {
        name: &'static str,
        index: usize,
        value: f64,
    },

    /// An input array is empty where data is required.
    EmptyInput {
        name: &'static str,
    },

    // ---- Numerical ----
    /// A factorization or pseudo-inverse could not be computed.
    LinearSolveFailure {
        context: &'static str,
    },

    /// An NNLS back-end produced a non-finite iterate.
    SolverBreakdown {
        solver: &'static str,
    },

    /// The fitted distribution integrates to a non-positive area and cannot
    /// be renormalized.
    NonNormalizableDistribution {
        scale: f64,
    },

    /// The alpha search bracket is degenerate or the criterion could not be
    /// evaluated anywhere on the grid.
    AlphaSearchFailure {
        reason: &'static str,
    },

    // ---- Wrappers ----
    /// Wrapper for uncertainty-quantification failures.
    Inference(InferenceError),

    // ---- Anyhow catchall ----
    Anyhow(String),
}

impl From<InferenceError> for FitError {
    fn from(err: InferenceError) -> Self {
        FitError::Inference(err)
    }
}

impl From<anyhow::Error> for FitError {
    fn from(err: anyhow::Error) -> Self {
        FitError::Anyhow(err.to_string())
    }
}

impl std::fmt::Display for FitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Configuration: tags ----
            FitError::UnknownSolver { name } => {
                write!(f, "Fit Error: '{}' is not a known non-negative least squares solver", name)
            }
            FitError::UnknownRegularization { name } => {
                write!(f, "Fit Error: '{}' is not a known regularization functional", name)
            }
            FitError::UnknownCriterion { name } => {
                write!(f, "Fit Error: '{}' is not a known selection criterion", name)
            }

            // ---- Configuration: parameters ----
            FitError::InvalidAlpha { alpha, reason } => {
                write!(f, "Fit Error: Invalid regularization parameter {} ({})", alpha, reason)
            }
            FitError::InvalidHuberParam { param, reason } => {
                write!(f, "Fit Error: Invalid Huber parameter {} ({})", param, reason)
            }
            FitError::InvalidRegOrder { order, reason } => {
                write!(f, "Fit Error: Invalid regularization order {} ({})", order, reason)
            }
            FitError::InvalidIterationCap { cap } => {
                write!(f, "Fit Error: OBIR iteration cap {} must be at least 1", cap)
            }
            FitError::InvalidNoiseTarget { target, reason } => {
                write!(f, "Fit Error: Invalid noise target {} ({})", target, reason)
            }

            // ---- Configuration: data shapes ----
            FitError::DatasetCountMismatch { signals, kernels } => write!(
                f,
                "Fit Error: {} signals supplied with {} kernels; counts must match",
                signals, kernels
            ),
            FitError::KernelRowMismatch { dataset, rows, samples } => write!(
                f,
                "Fit Error: Kernel {} has {} rows but its signal has {} samples",
                dataset, rows, samples
            ),
            FitError::KernelColumnMismatch { dataset, columns, expected } => write!(
                f,
                "Fit Error: Kernel {} has {} columns; expected {} from the first kernel",
                dataset, columns, expected
            ),
            FitError::AxisLengthMismatch { axis, columns } => write!(
                f,
                "Fit Error: Distance axis has {} points but the kernel has {} columns",
                axis, columns
            ),
            FitError::AxisNotIncreasing { index } => write!(
                f,
                "Fit Error: Distance axis must be strictly increasing (violated at index {})",
                index
            ),
            FitError::InvalidWeight { dataset, weight } => write!(
                f,
                "Fit Error: Weight {} for dataset {} must be finite and positive",
                weight, dataset
            ),
            FitError::WeightCountMismatch { weights, datasets } => write!(
                f,
                "Fit Error: {} weights supplied for {} datasets",
                weights, datasets
            ),
            FitError::NonFiniteInput { name, index, value } => write!(
                f,
                "Fit Error: Non-finite value {} in '{}' at index {}",
                value, name, index
            ),
            FitError::EmptyInput { name } => {
                write!(f, "Fit Error: Input '{}' must not be empty", name)
            }

            // ---- Numerical ----
            FitError::LinearSolveFailure { context } => {
                write!(f, "Fit Error: Linear solve failed while {}", context)
            }
            FitError::SolverBreakdown { solver } => {
                write!(f, "Fit Error: {} produced a non-finite iterate", solver)
            }
            FitError::NonNormalizableDistribution { scale } => write!(
                f,
                "Fit Error: Distribution area {} is not positive; cannot renormalize",
                scale
            ),
            FitError::AlphaSearchFailure { reason } => {
                write!(f, "Fit Error: Regularization parameter search failed ({})", reason)
            }

            // ---- Wrappers ----
            FitError::Inference(err) => write!(f, "Fit Error: {}", err),

            // ---- Anyhow catchall ----
            FitError::Anyhow(msg) => write!(f, "Fit Error: {}", msg),
        }
    }
}

impl std::error::Error for FitError {}
