//! Estimator error types
//!
//! An estimator error is fatal to one period's estimate only. The caller
//! records the cause on the emitted record and moves on.

use thiserror::Error;

/// Estimator failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EstimatorError {
    /// A rate or balance outside its valid domain
    #[error("invalid parameter {parameter}={value}: {reason}")]
    InvalidParameter {
        parameter: &'static str,
        value: String,
        reason: &'static str,
    },

    /// An input the model needs is absent (series boundary)
    #[error("missing input {0}")]
    MissingInput(&'static str),
}

impl EstimatorError {
    pub(crate) fn invalid(parameter: &'static str, value: impl ToString, reason: &'static str) -> Self {
        Self::InvalidParameter {
            parameter,
            value: value.to_string(),
            reason,
        }
    }

    /// Short machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",
            Self::MissingInput(_) => "MISSING_INPUT",
        }
    }
}

/// Result type for estimation
pub type EstimatorResult<T> = Result<T, EstimatorError>;
