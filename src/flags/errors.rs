//! Flag engine errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlagError {
    /// Green is reachable only through a clearing evaluation
    #[error("rule {rule_id} produced a green candidate; green requires a clearing evaluation")]
    GreenWithoutClearing { rule_id: String },

    #[error("flag {flag_id} is cleared; green is terminal")]
    AlreadyCleared { flag_id: String },

    #[error("flag {flag_id} is still open and cannot be superseded")]
    StillOpen { flag_id: String },

    #[error("flag {flag_id}: heuristic flags cannot carry {confidence} confidence")]
    HeuristicConfidence { flag_id: String, confidence: String },

    #[error("flag {flag_id}: clearing requires at least one evidence reference")]
    ClearingWithoutEvidence { flag_id: String },

    #[error("prior flag set contains '{0}' twice")]
    DuplicatePrior(String),

    #[error("duplicate rule id '{0}' registered")]
    DuplicateRule(String),
}

pub type FlagResult<T> = Result<T, FlagError>;
