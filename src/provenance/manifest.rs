//! Output bundle manifest
//!
//! ```json
//! {
//!   "batch_id": "…",
//!   "generated_at": "2024-05-01T00:00:00Z",
//!   "input_sha256": "…",
//!   "files": { "epochs.json": "crc32:deadbeef" },
//!   "format_version": 1
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::checksum::{file_crc32, format_crc32};
use super::errors::{ProvenanceError, ProvenanceResult};
use super::types::ProvenanceStub;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputManifest {
    pub batch_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub input_sha256: String,
    /// File name to formatted CRC32
    pub files: BTreeMap<String, String>,
    pub format_version: u8,
}

impl OutputManifest {
    pub fn for_batch(stub: &ProvenanceStub) -> Self {
        Self {
            batch_id: stub.batch_id,
            generated_at: stub.generated_at,
            input_sha256: stub.input_sha256.clone(),
            files: BTreeMap::new(),
            format_version: 1,
        }
    }

    /// Checksum `dir/name` and record it
    pub fn record_file(&mut self, dir: &Path, name: &str) -> ProvenanceResult<()> {
        let checksum = file_crc32(&dir.join(name))?;
        self.files.insert(name.to_string(), format_crc32(checksum));
        Ok(())
    }

    pub fn to_json(&self) -> ProvenanceResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> ProvenanceResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn write_to(&self, dir: &Path) -> ProvenanceResult<()> {
        let path = dir.join(MANIFEST_FILE);
        fs::write(&path, self.to_json()?).map_err(|e| ProvenanceError::io_at(&path, e))
    }

    pub fn read_from(dir: &Path) -> ProvenanceResult<Self> {
        let path = dir.join(MANIFEST_FILE);
        let text = fs::read_to_string(&path).map_err(|e| ProvenanceError::io_at(&path, e))?;
        Self::from_json(&text)
    }

    /// Names of recorded files whose current checksum differs
    pub fn verify(&self, dir: &Path) -> ProvenanceResult<Vec<String>> {
        let mut mismatched = Vec::new();
        for (name, expected) in &self.files {
            let actual = format_crc32(file_crc32(&dir.join(name))?);
            if &actual != expected {
                mismatched.push(name.clone());
            }
        }
        Ok(mismatched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::types::{DataTip, InputSource};
    use chrono::TimeZone;

    fn stub() -> ProvenanceStub {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        ProvenanceStub::new("mainnet", DataTip::default(), at, InputSource::LedgerIndex, &[3u8; 32])
    }

    #[test]
    fn test_manifest_write_read_verify() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("epochs.json"), b"[]").unwrap();

        let mut manifest = OutputManifest::for_batch(&stub());
        manifest.record_file(dir.path(), "epochs.json").unwrap();
        manifest.write_to(dir.path()).unwrap();

        let loaded = OutputManifest::read_from(dir.path()).unwrap();
        assert_eq!(loaded, manifest);
        assert!(loaded.verify(dir.path()).unwrap().is_empty());

        fs::write(dir.path().join("epochs.json"), b"[1]").unwrap();
        assert_eq!(loaded.verify(dir.path()).unwrap(), vec!["epochs.json"]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = OutputManifest::for_batch(&stub());
        assert!(matches!(
            manifest.record_file(dir.path(), "nope.json"),
            Err(ProvenanceError::Io { .. })
        ));
    }
}
