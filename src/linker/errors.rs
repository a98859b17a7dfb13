//! Linker errors

use thiserror::Error;

use super::link::LinkBasis;

#[derive(Debug, Error)]
pub enum LinkError {
    /// Exactly one soft attribute overlaps; not enough to merge
    #[error("ambiguous evidence linking {left} and {right}: only {basis:?} overlaps")]
    AmbiguousEvidence {
        left: String,
        right: String,
        basis: LinkBasis,
        value: String,
    },

    #[error("duplicate entity id '{0}' in index input")]
    DuplicateEntity(String),

    #[error("invalid match pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type LinkResult<T> = Result<T, LinkError>;
