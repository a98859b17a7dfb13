//! Rules over off-chain registry records

use super::{FlagRule, RuleContext};
use crate::flags::types::{
    ClearCondition, Confidence, FlagCandidate, FlagDefinition, Severity, SourceKind,
};
use crate::linker::{EntityRecord, IndexKind};
use crate::registry::{heavy_recipient_threshold, UnitSeries};

fn offchain<'a>(ctx: &RuleContext<'a>) -> impl Iterator<Item = &'a EntityRecord> + 'a {
    ctx.ledger
        .entities()
        .iter()
        .filter(|e| e.index.kind == IndexKind::Offchain)
}

fn review(instructions: &str) -> ClearCondition {
    ClearCondition::HumanReview {
        instructions: instructions.to_string(),
    }
}

/// Distributed total at or above the configured percentile
pub struct HeavyRecipientRule;

impl FlagRule for HeavyRecipientRule {
    fn id(&self) -> &'static str {
        "F-HEAVY-RECIPIENT"
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Offchain
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<FlagCandidate> {
        let percentile = ctx.thresholds.heavy_recipient_percentile;
        let series = UnitSeries::distributed(ctx.ledger.entities(), &ctx.thresholds.heavy_recipient_unit);
        let Some(threshold) = heavy_recipient_threshold(&series, percentile) else {
            return Vec::new();
        };

        series
            .values
            .iter()
            .filter(|(_, v)| *v > 0 && *v >= threshold)
            .filter_map(|(id, v)| {
                let entity = ctx.ledger.entity(id)?;
                Some(FlagCandidate {
                    rule_id: self.id().to_string(),
                    entity_id: id.clone(),
                    scope: format!("unit:{}", series.unit_code),
                    related_entity_ids: vec![],
                    severity: Severity::Yellow,
                    source_kind: self.source_kind(),
                    confidence: Confidence::High,
                    definition: FlagDefinition::new(
                        "distributed total at or above the percentile of all positive recipients",
                    )
                    .threshold("percentile", percentile)
                    .threshold("cutoff", series.display(threshold))
                    .observed("distributed", series.display(*v))
                    .observed("unit", &series.unit_code),
                    evidence: vec![entity.evidence_ref()],
                    false_positive_notes: vec![
                        "large multi-year programs legitimately concentrate funding".into(),
                    ],
                    clears_if: review("confirm the recipient's delivery record covers the funding received"),
                })
            })
            .collect()
    }
}

/// Few completed projects for the number funded
pub struct LowCompletionRule;

impl FlagRule for LowCompletionRule {
    fn id(&self) -> &'static str {
        "F-LOW-COMPLETION"
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Offchain
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<FlagCandidate> {
        let min_funded = ctx.thresholds.low_completion_min_funded;
        let ratio = ctx.thresholds.low_completion_ratio;

        offchain(ctx)
            .filter(|e| e.funded_projects >= min_funded)
            .filter(|e| {
                !ratio.is_reached_by(e.completed_projects as u128, e.funded_projects as u128)
            })
            .map(|e| FlagCandidate {
                rule_id: self.id().to_string(),
                entity_id: e.entity_id.clone(),
                scope: "registry".to_string(),
                related_entity_ids: vec![],
                severity: Severity::Orange,
                source_kind: self.source_kind(),
                confidence: Confidence::High,
                definition: FlagDefinition::new("completed / funded below the ratio")
                    .threshold("min_funded", min_funded)
                    .threshold("ratio", ratio)
                    .observed("funded_projects", e.funded_projects)
                    .observed("completed_projects", e.completed_projects),
                evidence: vec![e.evidence_ref()],
                false_positive_notes: vec![
                    "projects from recent funds are still inside their delivery window".into(),
                ],
                clears_if: ClearCondition::CompletionRatioAtLeast { ratio, min_funded },
            })
            .collect()
    }
}

/// Unusually many projects under one proposer
pub struct HighVolumeRule;

impl FlagRule for HighVolumeRule {
    fn id(&self) -> &'static str {
        "F-HIGH-VOLUME"
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Offchain
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<FlagCandidate> {
        let limit = ctx.thresholds.high_volume_projects;
        offchain(ctx)
            .filter(|e| e.total_projects >= limit)
            .map(|e| FlagCandidate {
                rule_id: self.id().to_string(),
                entity_id: e.entity_id.clone(),
                scope: "registry".to_string(),
                related_entity_ids: vec![],
                severity: Severity::Yellow,
                source_kind: self.source_kind(),
                confidence: Confidence::High,
                definition: FlagDefinition::new("project count at or above the volume limit")
                    .threshold("projects", limit)
                    .observed("total_projects", e.total_projects),
                evidence: vec![e.evidence_ref()],
                false_positive_notes: vec![
                    "organisations proposing on behalf of many teams register under one account".into(),
                ],
                clears_if: review("confirm the proposer's capacity to deliver the project count"),
            })
            .collect()
    }
}
