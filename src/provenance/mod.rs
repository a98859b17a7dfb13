//! Provenance
//!
//! Every published batch carries a `ProvenanceStub` (network, data tip,
//! grade, input digest) and a manifest checksumming each output file.

mod checksum;
mod errors;
mod manifest;
mod types;

pub use checksum::{crc32, file_crc32, format_crc32, sha256};
pub use errors::{ProvenanceError, ProvenanceResult};
pub use manifest::{OutputManifest, MANIFEST_FILE};
pub use types::{check_network, DataTip, Grade, InputSource, ProvenanceStub};

pub(crate) use types::hex;
