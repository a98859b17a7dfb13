//! Provenance stub published with every batch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{ProvenanceError, ProvenanceResult};

/// The chain position the batch was computed against
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DataTip {
    pub block_no: Option<u64>,
    pub tip_time: Option<DateTime<Utc>>,
}

impl DataTip {
    pub fn new(block_no: u64, tip_time: DateTime<Utc>) -> Self {
        Self {
            block_no: Some(block_no),
            tip_time: Some(tip_time),
        }
    }
}

/// Kind of upstream the batch was normalized from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    LedgerIndex,
    ApiSnapshot,
    OffchainRegistry,
}

impl InputSource {
    /// Ledger-index extracts are exact; everything else is approximate
    pub fn default_grade(&self) -> Grade {
        match self {
            InputSource::LedgerIndex => Grade::AuditGrade,
            InputSource::ApiSnapshot | InputSource::OffchainRegistry => Grade::Approximate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    AuditGrade,
    Approximate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceStub {
    pub network_name: String,
    pub data_tip: DataTip,
    pub generated_at: DateTime<Utc>,
    pub source_kind: InputSource,
    pub grade: Grade,
    pub batch_id: Uuid,
    pub input_sha256: String,
    pub notes: Vec<String>,
}

impl ProvenanceStub {
    /// Build the stub for one batch.
    ///
    /// The batch id is derived from the input digest, so republishing the
    /// same input yields the same id.
    pub fn new(
        network_name: impl Into<String>,
        data_tip: DataTip,
        generated_at: DateTime<Utc>,
        source_kind: InputSource,
        input_digest: &[u8; 32],
    ) -> Self {
        let mut seed = [0u8; 16];
        seed.copy_from_slice(&input_digest[..16]);
        Self {
            network_name: network_name.into(),
            data_tip,
            generated_at,
            source_kind,
            grade: source_kind.default_grade(),
            batch_id: uuid::Builder::from_random_bytes(seed).into_uuid(),
            input_sha256: hex(input_digest),
            notes: Vec::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl IntoIterator<Item = String>) -> Self {
        self.notes.extend(notes);
        self
    }

    /// Downgrade to approximate, recording why
    pub fn downgrade(&mut self, reason: impl Into<String>) {
        self.grade = Grade::Approximate;
        self.notes.push(reason.into());
    }
}

/// Refuse inputs from an unexpected network unless explicitly allowed.
///
/// Returns the notes to attach to provenance when an override was used.
pub fn check_network(
    network_name: &str,
    expected: &str,
    allow_non_mainnet: bool,
) -> ProvenanceResult<Vec<String>> {
    let found = network_name.trim().to_ascii_lowercase();
    let wanted = expected.trim().to_ascii_lowercase();
    if found == wanted {
        return Ok(Vec::new());
    }
    if allow_non_mainnet {
        return Ok(vec![format!(
            "network '{}' differs from expected '{}'; output is not evidence about {}",
            found, wanted, wanted
        )]);
    }
    Err(ProvenanceError::NetworkMismatch {
        found,
        expected: wanted,
    })
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
