//! Normalizer errors
//!
//! Only structural problems are errors. A single bad row is an issue that is
//! recorded and carried along, never a reason to abort the run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::PeriodId;

/// Structural normalization failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("period ids out of order: {found} follows {previous}")]
    OutOfOrder { previous: PeriodId, found: PeriodId },

    #[error("period {0} appears more than once")]
    DuplicatePeriod(PeriodId),
}

/// Result type for normalization
pub type NormalizeResult<T> = Result<T, NormalizeError>;

/// A per-row problem that was isolated during normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeIssue {
    pub period_id: PeriodId,
    pub reason: String,
}

impl NormalizeIssue {
    pub fn new(period_id: PeriodId, reason: impl Into<String>) -> Self {
        Self {
            period_id,
            reason: reason.into(),
        }
    }
}
