//! Rules over reconciled periods and on-chain payments

use super::{overlaps, FlagRule, RuleContext, TREASURY_ENTITY};
use crate::flags::types::{
    ClearCondition, Confidence, FlagCandidate, FlagDefinition, FlagRecord, Severity, SourceKind,
};
use crate::linker::{Cluster, IndexKind, ScaledSum, TotalKind, UnifiedFlowLedger};
use crate::money::{DisplayUnit, Rate};
use crate::reconcile::SignalKind;
use crate::snapshot::PeriodId;

/// Evidence pointer into the published epoch records
pub(crate) fn period_ref(period_id: PeriodId) -> String {
    format!("epochs.json#period={}", period_id)
}

/// Residual ratio above the review tolerance
pub struct ResidualRule;

impl FlagRule for ResidualRule {
    fn id(&self) -> &'static str {
        "F-RECON-RESIDUAL"
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Onchain
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<FlagCandidate> {
        let red = ctx.thresholds.residual_red_ratio;
        ctx.signals
            .iter()
            .filter(|s| s.kind == SignalKind::RatioExceeded)
            .map(|signal| {
                let part = signal.implied_outflow_other.unsigned_abs() as u128;
                let whole = (signal.treasury_delta.unsigned_abs() as u128).max(1);
                let severity = if red.is_reached_by(part, whole) {
                    Severity::Red
                } else {
                    Severity::Orange
                };

                let mut evidence = vec![period_ref(signal.period_id)];
                evidence.extend(signal.evidence_refs.iter().cloned());

                FlagCandidate {
                    rule_id: self.id().to_string(),
                    entity_id: TREASURY_ENTITY.to_string(),
                    scope: format!("period:{}", signal.period_id),
                    related_entity_ids: vec![],
                    severity,
                    source_kind: self.source_kind(),
                    confidence: Confidence::High,
                    definition: FlagDefinition::new(
                        "|implied_outflow_other| / max(1, |treasury_delta|) exceeds the tolerance",
                    )
                    .threshold("tolerance", signal.threshold)
                    .threshold("red_at", red)
                    .observed("implied_outflow_other", signal.implied_outflow_other)
                    .observed("treasury_delta", signal.treasury_delta)
                    .observed("residual_ratio", &signal.residual_ratio),
                    evidence,
                    false_positive_notes: vec![
                        "ρ and τ are per-period protocol values; a late parameter change shifts the estimate".into(),
                        "flows missing from the explicit series land in the residual".into(),
                    ],
                    clears_if: ClearCondition::ResidualWithinTolerance {
                        period_id: signal.period_id,
                        threshold: signal.threshold,
                    },
                }
            })
            .collect()
    }
}

/// Residual sign flip with no explicit flow to explain it
pub struct SignFlipRule;

impl FlagRule for SignFlipRule {
    fn id(&self) -> &'static str {
        "F-RESIDUAL-SIGN-FLIP"
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Onchain
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<FlagCandidate> {
        ctx.signals
            .iter()
            .filter(|s| s.kind == SignalKind::SignFlip)
            .map(|signal| {
                let mut definition =
                    FlagDefinition::new("residual changed sign against the prior period with no explicit flow")
                        .observed("implied_outflow_other", signal.implied_outflow_other);
                if let Some(prior) = signal.prior_implied_outflow_other {
                    definition = definition.observed("prior_implied_outflow_other", prior);
                }
                let mut evidence = vec![period_ref(signal.period_id.saturating_sub(1))];
                evidence.push(period_ref(signal.period_id));

                FlagCandidate {
                    rule_id: self.id().to_string(),
                    entity_id: TREASURY_ENTITY.to_string(),
                    scope: format!("period:{}", signal.period_id),
                    related_entity_ids: vec![],
                    severity: Severity::Yellow,
                    source_kind: self.source_kind(),
                    confidence: Confidence::Medium,
                    definition,
                    evidence,
                    false_positive_notes: vec![
                        "small residuals near zero flip sign on rounding alone".into(),
                    ],
                    clears_if: ClearCondition::SignFlipExplained {
                        period_id: signal.period_id,
                    },
                }
            })
            .collect()
    }
}

/// Off-chain distributed against on-chain withdrawn for one linked cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PayoutComparison {
    pub unit_code: String,
    pub distributed: i128,
    pub withdrawn: i128,
    pub exponent: u32,
}

impl PayoutComparison {
    pub(crate) fn difference(&self) -> u128 {
        self.distributed.abs_diff(self.withdrawn)
    }

    /// True when the difference exceeds `ratio × max(distributed, 1)`
    pub(crate) fn exceeds(&self, ratio: Rate) -> bool {
        let whole = (self.distributed.max(1)) as u128;
        ratio.is_exceeded_by(self.difference(), whole)
    }

    pub(crate) fn display(&self, amount: i128) -> String {
        DisplayUnit::new(self.unit_code.clone(), self.exponent).format_wide(amount)
    }
}

fn cluster_sum(
    ledger: &UnifiedFlowLedger,
    cluster: &Cluster,
    index: IndexKind,
    kind: TotalKind,
    unit_code: &str,
) -> Option<ScaledSum> {
    ledger
        .members(cluster)
        .filter(|e| e.index.kind == index)
        .filter_map(|e| e.total_in(kind, unit_code))
        .try_fold(None::<ScaledSum>, |acc, s| match acc {
            None => Some(Some(s)),
            Some(prev) => prev.checked_add(s).map(Some),
        })
        .flatten()
}

/// Compare both sides of a cluster in one unit; `None` unless both exist
pub(crate) fn payout_comparison(
    ledger: &UnifiedFlowLedger,
    cluster: &Cluster,
    unit_code: &str,
) -> Option<PayoutComparison> {
    let distributed = cluster_sum(ledger, cluster, IndexKind::Offchain, TotalKind::Distributed, unit_code)?;
    let withdrawn = cluster_sum(ledger, cluster, IndexKind::Onchain, TotalKind::Withdrawn, unit_code)?;
    let (distributed, withdrawn, exponent) = ScaledSum::aligned(distributed, withdrawn)?;
    Some(PayoutComparison {
        unit_code: unit_code.trim().to_ascii_uppercase(),
        distributed,
        withdrawn,
        exponent,
    })
}

/// Registry payouts that on-chain payments to the same linked cluster do
/// not match
pub struct PayoutMismatchRule;

impl FlagRule for PayoutMismatchRule {
    fn id(&self) -> &'static str {
        "F-PAYOUT-MISMATCH"
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Onchain
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<FlagCandidate> {
        let ledger = ctx.ledger;
        let ratio = ctx.thresholds.payout_mismatch_ratio;
        let mut out = Vec::new();

        for cluster in ledger.clusters().iter().filter(|c| c.members.len() > 1) {
            let mut units: Vec<String> = ledger
                .members(cluster)
                .flat_map(|e| e.units_of(TotalKind::Distributed))
                .collect();
            units.sort();
            units.dedup();

            let weakest = ledger
                .links_within(cluster)
                .map(|l| l.confidence)
                .min()
                .unwrap_or(Confidence::Medium);

            for unit in units {
                let Some(cmp) = payout_comparison(ledger, cluster, &unit) else {
                    continue;
                };
                if !cmp.exceeds(ratio) {
                    continue;
                }

                let mut evidence: Vec<String> = ledger.members(cluster).map(|e| e.evidence_ref()).collect();
                evidence.extend(
                    ledger
                        .links_within(cluster)
                        .flat_map(|l| l.evidence.iter().map(|ev| format!("link:{}", ev))),
                );

                out.push(FlagCandidate {
                    rule_id: self.id().to_string(),
                    entity_id: cluster.cluster_id.clone(),
                    scope: format!("unit:{}", cmp.unit_code),
                    related_entity_ids: cluster
                        .members
                        .iter()
                        .filter(|m| **m != cluster.cluster_id)
                        .cloned()
                        .collect(),
                    severity: Severity::Orange,
                    source_kind: self.source_kind(),
                    confidence: weakest,
                    definition: FlagDefinition::new(
                        "|distributed − withdrawn| / distributed exceeds the allowed ratio within one linked cluster",
                    )
                    .threshold("max_ratio", ratio)
                    .observed("unit", &cmp.unit_code)
                    .observed("distributed", cmp.display(cmp.distributed))
                    .observed("withdrawn", cmp.display(cmp.withdrawn))
                    .observed("difference", cmp.display(cmp.difference() as i128)),
                    evidence,
                    false_positive_notes: vec![
                        "registry totals can include payments made from addresses outside the cluster".into(),
                        "currency conversion between registry and on-chain values is not modelled".into(),
                    ],
                    clears_if: ClearCondition::PayoutWithinRatio {
                        unit_code: cmp.unit_code.clone(),
                        max_ratio: ratio,
                    },
                });
            }
        }
        out
    }

    /// A cluster keeps its flag while any member stays in it
    fn continues(&self, prior: &FlagRecord, candidate: &FlagCandidate) -> bool {
        overlaps(prior, candidate)
    }
}
