//! Pipeline errors
//!
//! Everything here aborts the run. Per-row and per-period problems never
//! reach this type; they travel with the output as issues and markers.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::flags::FlagError;
use crate::linker::LinkError;
use crate::provenance::ProvenanceError;
use crate::snapshot::NormalizeError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input bundle has period data in {0}; give exactly one of ledger_rows, api_snapshots, snapshots")]
    MixedSources(String),

    #[error("input bundle has flows but no canonical snapshots")]
    OrphanFlows,

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Provenance(#[from] ProvenanceError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Flag(#[from] FlagError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
