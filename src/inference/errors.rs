//! Unified error handling for uncertainty quantification.
//!
//! This module defines `InferenceError`, the central error type used by the
//! heteroscedasticity-consistent covariance estimator, the residual/Jacobian
//! augmentation, and the confidence-interval queries of the uncertainty
//! structure. It groups domain-specific failures (dimension mismatches,
//! covariance breakdowns, invalid coverage requests) with catch-all and
//! fallback variants. An alias `InferenceResult<T>` standardizes the return
//! type across inference code.

/// Unified error type for uncertainty quantification.
///
/// Covers covariance-estimation failures, residual/Jacobian dimension
/// mismatches, and invalid confidence-interval requests. Designed to
/// integrate seamlessly with `anyhow::Error` via `From`, and to provide
/// readable diagnostics through `Display`.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceError {
    // ---- Covariance estimation ----
    /// The Jacobian pseudo-inverse could not be computed.
    CovarianceBreakdown {
        reason: &'static str,
    },

    /// Residual length does not match the Jacobian row count.
    ResidualDimMismatch {
        residuals: usize,
        rows: usize,
    },

    // ---- Confidence intervals ----
    /// Requested coverage percentage outside the open interval (0, 100).
    InvalidCoverage {
        coverage: f64,
    },

    /// Covariance dimensions do not match the point estimate.
    CovarianceDimMismatch {
        estimate: usize,
        covariance: (usize, usize),
    },

    /// Bound vector length does not match the point estimate.
    BoundDimMismatch {
        estimate: usize,
        bound: usize,
    },

    // ---- Anyhow catchall ----
    Anyhow(String),

    // ---- Fallback ----
    UnknownError,
}

pub type InferenceResult<T> = Result<T, InferenceError>;

impl From<anyhow::Error> for InferenceError {
    fn from(err: anyhow::Error) -> Self {
        InferenceError::Anyhow(err.to_string())
    }
}

impl std::fmt::Display for InferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Covariance estimation ----
            InferenceError::CovarianceBreakdown { reason } => {
                write!(f, "Inference Error: Covariance estimation failed ({})", reason)
            }
            InferenceError::ResidualDimMismatch { residuals, rows } => write!(
                f,
                "Inference Error: {} residuals do not match {} Jacobian rows",
                residuals, rows
            ),

            // ---- Confidence intervals ----
            InferenceError::InvalidCoverage { coverage } => write!(
                f,
                "Inference Error: Coverage {}% must lie strictly between 0 and 100",
                coverage
            ),
            InferenceError::CovarianceDimMismatch { estimate, covariance } => write!(
                f,
                "Inference Error: Covariance shape {:?} does not match estimate length {}",
                covariance, estimate
            ),
            InferenceError::BoundDimMismatch { estimate, bound } => write!(
                f,
                "Inference Error: Bound length {} does not match estimate length {}",
                bound, estimate
            ),

            // ---- Anyhow catchall ----
            InferenceError::Anyhow(msg) => write!(f, "Inference Error: {}", msg),

            // ---- Fallback ----
            InferenceError::UnknownError => write!(f, "Inference Error: Unknown error occurred"),
        }
    }
}

impl std::error::Error for InferenceError {}
