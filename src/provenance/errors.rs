//! Provenance errors

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvenanceError {
    #[error("input network '{found}' is not '{expected}'; pass allow_non_mainnet to override")]
    NetworkMismatch { found: String, expected: String },

    #[error("manifest I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProvenanceError {
    pub(crate) fn io_at(path: &Path, source: io::Error) -> Self {
        ProvenanceError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type ProvenanceResult<T> = Result<T, ProvenanceError>;
