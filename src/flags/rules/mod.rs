//! Built-in flag rules
//!
//! A rule is a pure function over the current view: reconciled periods,
//! tolerance signals and the Unified Flow Ledger. Rules never see prior
//! flags; lifecycle bookkeeping belongs to the engine.

mod heuristic;
mod offchain;
mod onchain;

pub use heuristic::{AmbiguousLinkRule, DuplicateAvatarRule, SimilarNameRule};
pub use offchain::{HeavyRecipientRule, HighVolumeRule, LowCompletionRule};
pub use onchain::{PayoutMismatchRule, ResidualRule, SignFlipRule};

pub(crate) use heuristic::{avatar_holders, distinct_usernames};
pub(crate) use onchain::{payout_comparison, period_ref, PayoutComparison};

use serde::{Deserialize, Serialize};

use super::types::{FlagCandidate, FlagRecord, SourceKind};
use crate::linker::UnifiedFlowLedger;
use crate::money::Rate;
use crate::reconcile::{ReconciledRecord, ToleranceSignal};
use crate::snapshot::PeriodId;

/// Entity id carried by flags about the treasury series itself
pub const TREASURY_ENTITY: &str = "treasury";

pub trait FlagRule: Send + Sync {
    /// Stable rule id, the prefix of every flag id it produces
    fn id(&self) -> &'static str;

    /// Kind stamped on every candidate; caps its confidence
    fn source_kind(&self) -> SourceKind;

    /// Candidates for the current view, in a deterministic order
    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<FlagCandidate>;

    /// True when `candidate` restates the finding behind `prior` under a
    /// different flag id.
    ///
    /// Group rules anchor a flag on the group's smallest member, which moves
    /// when a lower id joins. They override this so the engine carries the
    /// prior flag forward instead of opening a second one.
    fn continues(&self, _prior: &FlagRecord, _candidate: &FlagCandidate) -> bool {
        false
    }
}

/// Entity ids named by a flag or candidate, anchor included
fn group_members<'a>(entity_id: &'a str, related: &'a [String]) -> impl Iterator<Item = &'a str> {
    std::iter::once(entity_id).chain(related.iter().map(String::as_str))
}

/// Same scope and at least one member in common
pub(crate) fn overlaps(prior: &FlagRecord, candidate: &FlagCandidate) -> bool {
    prior.scope == candidate.scope
        && group_members(&candidate.entity_id, &candidate.related_entity_ids)
            .any(|m| group_members(&prior.entity_id, &prior.related_entity_ids).any(|p| p == m))
}

/// Tunable rule thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleThresholds {
    /// Residual ratio at which a residual flag turns red
    #[serde(default = "default_residual_red_ratio")]
    pub residual_red_ratio: Rate,

    /// Percentile of distributed totals at which a recipient is heavy
    #[serde(default = "default_heavy_recipient_percentile")]
    pub heavy_recipient_percentile: u32,

    /// Unit the heavy-recipient percentile is computed in
    #[serde(default = "default_heavy_recipient_unit")]
    pub heavy_recipient_unit: String,

    /// Funded projects needed before completion is judged
    #[serde(default = "default_low_completion_min_funded")]
    pub low_completion_min_funded: u64,

    /// Completed over funded below which completion is low
    #[serde(default = "default_low_completion_ratio")]
    pub low_completion_ratio: Rate,

    /// Project count at which one proposer is high volume
    #[serde(default = "default_high_volume_projects")]
    pub high_volume_projects: u64,

    /// Allowed `|distributed − withdrawn| / distributed` inside a cluster
    #[serde(default = "default_payout_mismatch_ratio")]
    pub payout_mismatch_ratio: Rate,
}

fn default_residual_red_ratio() -> Rate {
    Rate::percent(100)
}

fn default_heavy_recipient_percentile() -> u32 {
    99
}

fn default_heavy_recipient_unit() -> String {
    "USD".to_string()
}

fn default_low_completion_min_funded() -> u64 {
    5
}

fn default_low_completion_ratio() -> Rate {
    Rate::percent(50)
}

fn default_high_volume_projects() -> u64 {
    50
}

fn default_payout_mismatch_ratio() -> Rate {
    Rate::percent(10)
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            residual_red_ratio: default_residual_red_ratio(),
            heavy_recipient_percentile: default_heavy_recipient_percentile(),
            heavy_recipient_unit: default_heavy_recipient_unit(),
            low_completion_min_funded: default_low_completion_min_funded(),
            low_completion_ratio: default_low_completion_ratio(),
            high_volume_projects: default_high_volume_projects(),
            payout_mismatch_ratio: default_payout_mismatch_ratio(),
        }
    }
}

/// Read-only view handed to every rule
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// Reconciled periods in period order
    pub records: &'a [ReconciledRecord],
    /// Tolerance signals in period order
    pub signals: &'a [ToleranceSignal],
    pub ledger: &'a UnifiedFlowLedger,
    pub thresholds: &'a RuleThresholds,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        records: &'a [ReconciledRecord],
        signals: &'a [ToleranceSignal],
        ledger: &'a UnifiedFlowLedger,
        thresholds: &'a RuleThresholds,
    ) -> Self {
        Self {
            records,
            signals,
            ledger,
            thresholds,
        }
    }

    /// Reconciled record for a period; records are in period order
    pub fn record(&self, period_id: PeriodId) -> Option<&'a ReconciledRecord> {
        self.records
            .binary_search_by_key(&period_id, |r| r.period_id())
            .ok()
            .map(|i| &self.records[i])
    }
}

/// Every built-in rule, in registration order
pub fn builtin_rules() -> Vec<Box<dyn FlagRule>> {
    vec![
        Box::new(ResidualRule),
        Box::new(SignFlipRule),
        Box::new(PayoutMismatchRule),
        Box::new(HeavyRecipientRule),
        Box::new(LowCompletionRule),
        Box::new(HighVolumeRule),
        Box::new(DuplicateAvatarRule),
        Box::new(AmbiguousLinkRule),
        Box::new(SimilarNameRule),
    ]
}
