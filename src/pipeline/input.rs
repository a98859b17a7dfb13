//! Input bundle
//!
//! One JSON document carrying a period source (exactly one of ledger-index
//! rows, API tip readings or canonical snapshots), the entity indices and
//! any reviewer clearances.

use serde::{Deserialize, Serialize};

use super::errors::{PipelineError, PipelineResult};
use crate::flags::ReviewClearance;
use crate::linker::EntityRecord;
use crate::provenance::{DataTip, InputSource};
use crate::snapshot::{
    normalize_api_snapshots, normalize_canonical, normalize_ledger_rows, ApiSnapshotRow,
    ExplicitFlow, LedgerIndexRow, NormalizedSeries, PeriodSnapshot,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputBundle {
    pub network_name: String,
    #[serde(default)]
    pub data_tip: DataTip,

    #[serde(default)]
    pub ledger_rows: Vec<LedgerIndexRow>,
    #[serde(default)]
    pub api_snapshots: Vec<ApiSnapshotRow>,
    #[serde(default)]
    pub snapshots: Vec<PeriodSnapshot>,
    /// Explicit flows accompanying canonical snapshots
    #[serde(default)]
    pub flows: Vec<ExplicitFlow>,

    #[serde(default)]
    pub entities: Vec<EntityRecord>,
    #[serde(default)]
    pub clearances: Vec<ReviewClearance>,
}

impl InputBundle {
    pub fn from_json(json: &str) -> PipelineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Which upstream the period data came from
    pub fn source_kind(&self) -> PipelineResult<InputSource> {
        let present: Vec<&str> = [
            ("ledger_rows", !self.ledger_rows.is_empty()),
            ("api_snapshots", !self.api_snapshots.is_empty()),
            ("snapshots", !self.snapshots.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, has)| has.then_some(name))
        .collect();

        if present.len() > 1 {
            return Err(PipelineError::MixedSources(present.join(", ")));
        }
        if self.snapshots.is_empty() && !self.flows.is_empty() {
            return Err(PipelineError::OrphanFlows);
        }
        Ok(match present.first() {
            Some(&"ledger_rows") => InputSource::LedgerIndex,
            Some(&"api_snapshots") => InputSource::ApiSnapshot,
            // canonical snapshots come from an upstream ledger index
            Some(_) => InputSource::LedgerIndex,
            None => InputSource::OffchainRegistry,
        })
    }

    /// Normalize whichever period source is present
    pub fn normalize(&self) -> PipelineResult<NormalizedSeries> {
        let series = match self.source_kind()? {
            InputSource::LedgerIndex if self.snapshots.is_empty() => {
                normalize_ledger_rows(&self.ledger_rows)?
            }
            InputSource::LedgerIndex => {
                normalize_canonical(self.snapshots.clone(), self.flows.clone())?
            }
            InputSource::ApiSnapshot => normalize_api_snapshots(&self.api_snapshots)?,
            InputSource::OffchainRegistry => NormalizedSeries::default(),
        };
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_bundle() {
        let bundle = InputBundle::from_json(r#"{"network_name": "mainnet"}"#).unwrap();
        assert_eq!(bundle.source_kind().unwrap(), InputSource::OffchainRegistry);
        assert!(bundle.normalize().unwrap().snapshots.is_empty());
    }

    #[test]
    fn test_mixed_sources_rejected() {
        let bundle = InputBundle::from_json(
            r#"{
                "network_name": "mainnet",
                "ledger_rows": [{"epoch_no": 1, "start_time": "2024-01-01T00:00:00Z", "end_time": "2024-01-06T00:00:00Z"}],
                "api_snapshots": [{"epoch_no": 1, "tip_time": "2024-01-01T00:00:00Z"}]
            }"#,
        )
        .unwrap();
        match bundle.source_kind() {
            Err(PipelineError::MixedSources(which)) => assert_eq!(which, "ledger_rows, api_snapshots"),
            other => panic!("expected MixedSources, got {:?}", other),
        }
    }

    #[test]
    fn test_api_source_kind() {
        let bundle = InputBundle::from_json(
            r#"{"network_name": "preprod", "api_snapshots": [{"epoch_no": 1, "tip_time": "2024-01-01T00:00:00Z"}]}"#,
        )
        .unwrap();
        assert_eq!(bundle.source_kind().unwrap(), InputSource::ApiSnapshot);
    }
}
