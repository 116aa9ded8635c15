//! Error taxonomy for fitting, inversion and robust estimation.
//!
//! All of these are caller-recoverable:
//! - [`FitError::NotEnoughDataPoints`] signals "supply more correspondences
//!   or reduce model order",
//! - [`FitError::IllDefinedDataPoints`] signals degenerate geometry (e.g.
//!   collinear points for an affine fit); discard the sample and retry,
//!   which is exactly what the RANSAC inner loop does,
//! - [`NoninvertibleModelError`] signals a zero determinant; the forward
//!   transform remains usable, the inverse does not.

use thiserror::Error;

/// Failure modes of a weighted least-squares model fit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FitError {
    /// Fewer correspondences than the model's minimum requirement.
    #[error("not enough data points: {required} required, {given} given")]
    NotEnoughDataPoints {
        /// Minimum number of correspondences required by the model.
        required: usize,
        /// Number of correspondences actually supplied.
        given: usize,
    },
    /// The normal/covariance matrix of the fit is singular.
    #[error("ill-defined data points: {0}")]
    IllDefinedDataPoints(&'static str),
}

/// The forward transform has a zero determinant; no inverse exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("model is not invertible")]
pub struct NoninvertibleModelError;

/// Failure modes of the robust-estimation wrappers.
///
/// Per-sample fit failures are handled internally ("this sample is bad, try
/// another"); an error surfaces only when no valid model could be produced
/// at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RobustError {
    /// Not even the minimal sample could be drawn or fit.
    #[error(transparent)]
    Fit(#[from] FitError),
    /// No candidate model satisfied the acceptance thresholds.
    #[error("no consensus model found")]
    NoConsensus,
}
