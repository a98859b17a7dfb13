//! Flag record model
//!
//! Severity and source kind are independent axes: an on-chain residual can
//! be yellow and a heuristic match can be orange. Confidence is capped at
//! `low` for heuristic flags, enforced wherever a record is built or
//! re-evaluated.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{FlagError, FlagResult};
pub use crate::linker::Confidence;
use crate::money::Rate;
use crate::provenance::DataTip;
use crate::snapshot::PeriodId;

/// Triage severity. `Green` means cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Red,
    Orange,
    Yellow,
    Green,
}

impl Severity {
    pub fn is_open(&self) -> bool {
        !matches!(self, Severity::Green)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Red => "red",
            Severity::Orange => "orange",
            Severity::Yellow => "yellow",
            Severity::Green => "green",
        }
    }
}

/// Where the evidence behind a flag comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Onchain,
    Offchain,
    Heuristic,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Onchain => "onchain",
            SourceKind::Offchain => "offchain",
            SourceKind::Heuristic => "heuristic",
        }
    }

    /// Highest confidence a flag of this kind may carry
    pub fn confidence_cap(&self) -> Confidence {
        match self {
            SourceKind::Heuristic => Confidence::Low,
            SourceKind::Onchain | SourceKind::Offchain => Confidence::High,
        }
    }

    pub fn cap(&self, confidence: Confidence) -> Confidence {
        confidence.min(self.confidence_cap())
    }
}

/// What would clear a flag.
///
/// Every variant except `HumanReview` is checked mechanically on each run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClearCondition {
    /// The period's residual ratio is back at or under the threshold
    ResidualWithinTolerance { period_id: PeriodId, threshold: Rate },
    /// The period carries an explicit flow, or no longer flips sign
    SignFlipExplained { period_id: PeriodId },
    /// Completed / funded reaches the ratio, or funded drops under the minimum
    CompletionRatioAtLeast { ratio: Rate, min_funded: u64 },
    /// Off-chain distributed and on-chain withdrawn agree within the ratio
    PayoutWithinRatio { unit_code: String, max_ratio: Rate },
    /// Fewer than two distinct usernames share the avatar
    AvatarNoLongerShared { avatar: String },
    /// The pair merged on stronger evidence, or no longer overlaps at all
    LinkResolved { left: String, right: String },
    HumanReview { instructions: String },
}

impl ClearCondition {
    pub fn is_machine_checkable(&self) -> bool {
        !matches!(self, ClearCondition::HumanReview { .. })
    }
}

/// Rule text plus the numbers that made it fire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagDefinition {
    pub rule: String,
    pub thresholds: BTreeMap<String, String>,
    pub observed: BTreeMap<String, String>,
}

impl FlagDefinition {
    pub fn new(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            ..Self::default()
        }
    }

    pub fn threshold(mut self, key: &str, value: impl ToString) -> Self {
        self.thresholds.insert(key.to_string(), value.to_string());
        self
    }

    pub fn observed(mut self, key: &str, value: impl ToString) -> Self {
        self.observed.insert(key.to_string(), value.to_string());
        self
    }
}

/// One lifecycle step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionKind {
    Opened {
        severity: Severity,
        confidence: Confidence,
    },
    Reevaluated {
        from_severity: Severity,
        to_severity: Severity,
        from_confidence: Confidence,
        to_confidence: Confidence,
    },
    EvidenceAdded {
        evidence: Vec<String>,
    },
    Cleared {
        from_severity: Severity,
        evidence: Vec<String>,
        note: String,
    },
    /// Opened as the successor of a cleared flag
    Reopened {
        supersedes: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagTransition {
    pub at: DateTime<Utc>,
    pub data_tip: DataTip,
    #[serde(flatten)]
    pub kind: TransitionKind,
}

/// A rule's output before lifecycle bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagCandidate {
    pub rule_id: String,
    pub entity_id: String,
    /// Disambiguates several flags of one rule on one entity
    pub scope: String,
    pub related_entity_ids: Vec<String>,
    pub severity: Severity,
    pub source_kind: SourceKind,
    pub confidence: Confidence,
    pub definition: FlagDefinition,
    pub evidence: Vec<String>,
    pub false_positive_notes: Vec<String>,
    pub clears_if: ClearCondition,
}

/// The published flag record. Every field is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRecord {
    pub flag_id: String,
    pub rule_id: String,
    pub entity_id: String,
    pub scope: String,
    pub related_entity_ids: Vec<String>,
    pub severity: Severity,
    pub source_kind: SourceKind,
    pub confidence: Confidence,
    pub definition: FlagDefinition,
    pub evidence: Vec<String>,
    pub false_positive_notes: Vec<String>,
    pub clears_if: ClearCondition,
    pub observed_at: DateTime<Utc>,
    pub data_tip: DataTip,
    pub supersedes: Option<String>,
    pub history: Vec<FlagTransition>,
}

impl FlagRecord {
    pub fn is_open(&self) -> bool {
        self.severity.is_open()
    }

    /// Structural checks for records read back from a prior publication
    pub fn validate(&self) -> FlagResult<()> {
        if self.confidence > self.source_kind.confidence_cap() {
            return Err(FlagError::HeuristicConfidence {
                flag_id: self.flag_id.clone(),
                confidence: self.confidence.to_string(),
            });
        }
        Ok(())
    }
}
