//! Clearing checks
//!
//! Each machine-checkable `clears_if` is re-tested against the current view.
//! A satisfied check names the evidence that satisfied it; that evidence is
//! what the `Cleared` transition records.

use super::rules::{avatar_holders, distinct_usernames, payout_comparison, period_ref, RuleContext};
use super::types::{ClearCondition, FlagRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearCheck {
    Satisfied { evidence: Vec<String>, note: String },
    Unsatisfied,
    /// Only a reviewer can clear this flag
    NeedsReview,
}

pub fn check_clear(flag: &FlagRecord, ctx: &RuleContext<'_>) -> ClearCheck {
    match &flag.clears_if {
        ClearCondition::ResidualWithinTolerance {
            period_id,
            threshold,
        } => {
            let Some(record) = ctx.record(*period_id) else {
                return ClearCheck::Unsatisfied;
            };
            let (Some(implied), Some(delta)) = (record.implied_outflow_other, record.treasury_delta)
            else {
                return ClearCheck::Unsatisfied;
            };
            let whole = (delta.unsigned_abs() as u128).max(1);
            if threshold.is_exceeded_by(implied.unsigned_abs() as u128, whole) {
                return ClearCheck::Unsatisfied;
            }
            ClearCheck::Satisfied {
                evidence: vec![period_ref(*period_id)],
                note: format!(
                    "residual ratio {} within {}",
                    record.tolerance.residual_ratio.as_deref().unwrap_or("0"),
                    threshold
                ),
            }
        }

        ClearCondition::SignFlipExplained { period_id } => {
            let Some(record) = ctx.record(*period_id) else {
                return ClearCheck::Unsatisfied;
            };
            if !record.tolerance.evaluated || record.tolerance.sign_flip {
                return ClearCheck::Unsatisfied;
            }
            let mut evidence = vec![period_ref(*period_id)];
            evidence.extend(record.evidence_refs.iter().cloned());
            let note = if record.has_explicit_flows() {
                "explicit flows recorded for the period"
            } else {
                "residual keeps the prior period's sign"
            };
            ClearCheck::Satisfied {
                evidence,
                note: note.to_string(),
            }
        }

        ClearCondition::CompletionRatioAtLeast { ratio, min_funded } => {
            let Some(entity) = ctx.ledger.entity(&flag.entity_id) else {
                return ClearCheck::Unsatisfied;
            };
            let funded = entity.funded_projects;
            let completed = entity.completed_projects;
            if funded >= *min_funded && !ratio.is_reached_by(completed as u128, funded as u128) {
                return ClearCheck::Unsatisfied;
            }
            ClearCheck::Satisfied {
                evidence: vec![entity.evidence_ref()],
                note: format!("{} of {} funded projects completed", completed, funded),
            }
        }

        ClearCondition::PayoutWithinRatio {
            unit_code,
            max_ratio,
        } => {
            let Some(cluster) = ctx.ledger.cluster_of(&flag.entity_id) else {
                return ClearCheck::Unsatisfied;
            };
            let Some(cmp) = payout_comparison(ctx.ledger, cluster, unit_code) else {
                return ClearCheck::Unsatisfied;
            };
            if cmp.exceeds(*max_ratio) {
                return ClearCheck::Unsatisfied;
            }
            ClearCheck::Satisfied {
                evidence: ctx.ledger.members(cluster).map(|e| e.evidence_ref()).collect(),
                note: format!(
                    "withdrawn {} against distributed {} {}",
                    cmp.display(cmp.withdrawn),
                    cmp.display(cmp.distributed),
                    cmp.unit_code
                ),
            }
        }

        ClearCondition::AvatarNoLongerShared { avatar } => {
            let holders = avatar_holders(ctx.ledger, avatar);
            if distinct_usernames(ctx.ledger, &holders) >= 2 {
                return ClearCheck::Unsatisfied;
            }
            let mut evidence = vec![format!("ledger#avatar={}", avatar)];
            evidence.extend(
                std::iter::once(&flag.entity_id)
                    .chain(flag.related_entity_ids.iter())
                    .filter_map(|id| ctx.ledger.entity(id))
                    .map(|e| e.evidence_ref()),
            );
            ClearCheck::Satisfied {
                evidence,
                note: format!("{} holder(s) of the avatar remain", holders.len()),
            }
        }

        ClearCondition::LinkResolved { left, right } => {
            let ledger = ctx.ledger;
            let (left, right) = (left.as_str(), right.as_str());
            let pair = |l: &str, r: &str| (l == left && r == right) || (l == right && r == left);
            let merged = ledger.same_cluster(left, right);
            let still_weak = ledger.ambiguous_links().iter().any(|a| pair(&a.left, &a.right))
                || ledger.similar_links().iter().any(|s| pair(&s.left, &s.right));
            if !merged && still_weak {
                return ClearCheck::Unsatisfied;
            }
            let mut evidence = vec![format!("ledger#pair={},{}", left, right)];
            if merged {
                evidence.extend(
                    ledger
                        .links()
                        .iter()
                        .filter(|l| pair(&l.left, &l.right))
                        .flat_map(|l| l.evidence.iter().map(|ev| format!("link:{}", ev))),
                );
            }
            let note = if merged {
                "pair linked on stronger evidence"
            } else {
                "pair no longer overlaps"
            };
            ClearCheck::Satisfied {
                evidence,
                note: note.to_string(),
            }
        }

        ClearCondition::HumanReview { .. } => ClearCheck::NeedsReview,
    }
}
