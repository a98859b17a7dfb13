//! Similarity rules
//!
//! Everything here is heuristic: confidence is capped at low and no flag
//! from this file merges entities.

use std::collections::{BTreeMap, BTreeSet};

use super::{FlagRule, RuleContext};
use crate::flags::types::{
    ClearCondition, Confidence, FlagCandidate, FlagDefinition, FlagRecord, Severity, SourceKind,
};
use crate::linker::{identifier, IndexKind, LinkBasis, UnifiedFlowLedger};

fn username_key(raw: &str) -> Option<String> {
    identifier(raw).map(|u| u.trim_start_matches('@').to_string())
}

/// Off-chain entities sharing `avatar` through a low link, sorted
pub(crate) fn avatar_holders(ledger: &UnifiedFlowLedger, avatar: &str) -> BTreeSet<String> {
    let offchain = |id: &str| {
        ledger
            .entity(id)
            .is_some_and(|e| e.index.kind == IndexKind::Offchain)
    };
    ledger
        .similar_links()
        .iter()
        .filter(|l| {
            l.evidence
                .iter()
                .any(|ev| ev.basis == LinkBasis::Avatar && ev.value == avatar)
        })
        .filter(|l| offchain(&l.left) && offchain(&l.right))
        .flat_map(|l| [l.left.clone(), l.right.clone()])
        .collect()
}

/// Distinct usernames among `members`; a member without one counts alone
pub(crate) fn distinct_usernames(ledger: &UnifiedFlowLedger, members: &BTreeSet<String>) -> usize {
    members
        .iter()
        .filter_map(|id| ledger.entity(id))
        .map(|e| {
            e.username
                .as_deref()
                .and_then(username_key)
                .unwrap_or_else(|| format!("#{}", e.entity_id))
        })
        .collect::<BTreeSet<_>>()
        .len()
}

/// Registry rows sharing a non-default avatar under different usernames
pub struct DuplicateAvatarRule;

impl FlagRule for DuplicateAvatarRule {
    fn id(&self) -> &'static str {
        "F-DUP-AVATAR"
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Heuristic
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<FlagCandidate> {
        let ledger = ctx.ledger;
        let avatars: BTreeSet<&str> = ledger
            .similar_links()
            .iter()
            .flat_map(|l| l.evidence.iter())
            .filter(|ev| ev.basis == LinkBasis::Avatar)
            .map(|ev| ev.value.as_str())
            .collect();

        let mut out = Vec::new();
        for avatar in avatars {
            let holders = avatar_holders(ledger, avatar);
            let usernames = distinct_usernames(ledger, &holders);
            if usernames < 2 {
                continue;
            }
            let mut members = holders.into_iter();
            let Some(entity_id) = members.next() else {
                continue;
            };
            let related: Vec<String> = members.collect();

            let mut evidence = Vec::with_capacity(related.len() + 1);
            evidence.extend(ledger.entity(&entity_id).map(|e| e.evidence_ref()));
            evidence.extend(related.iter().filter_map(|id| ledger.entity(id)).map(|e| e.evidence_ref()));

            out.push(FlagCandidate {
                rule_id: self.id().to_string(),
                entity_id,
                scope: format!("avatar:{}", avatar),
                related_entity_ids: related,
                severity: Severity::Yellow,
                source_kind: self.source_kind(),
                confidence: Confidence::Low,
                definition: FlagDefinition::new(
                    "registry rows share a non-default avatar under different usernames",
                )
                .observed("avatar", avatar)
                .observed("distinct_usernames", usernames),
                evidence,
                false_positive_notes: vec![
                    "team members often reuse an organisation logo".into(),
                    "avatar ids are not proof of shared control".into(),
                ],
                clears_if: ClearCondition::AvatarNoLongerShared {
                    avatar: avatar.to_string(),
                },
            });
        }
        out
    }

    /// One avatar is one finding, whoever currently holds it
    fn continues(&self, prior: &FlagRecord, candidate: &FlagCandidate) -> bool {
        prior.scope == candidate.scope
    }
}

/// Link attempts resting on a single overlapping attribute
pub struct AmbiguousLinkRule;

impl FlagRule for AmbiguousLinkRule {
    fn id(&self) -> &'static str {
        "F-AMBIGUOUS-LINK"
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Heuristic
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<FlagCandidate> {
        let ledger = ctx.ledger;
        ledger
            .ambiguous_links()
            .iter()
            .filter(|a| !ledger.same_cluster(&a.left, &a.right))
            .map(|a| FlagCandidate {
                rule_id: self.id().to_string(),
                entity_id: a.left.clone(),
                scope: format!("pair:{}", a.right),
                related_entity_ids: vec![a.right.clone()],
                severity: Severity::Yellow,
                source_kind: self.source_kind(),
                confidence: Confidence::Low,
                definition: FlagDefinition::new(
                    "one attribute overlaps across indices; two are needed to link",
                )
                .threshold("attributes_required", 2)
                .observed("basis", a.basis.as_str())
                .observed("value", &a.value),
                evidence: pair_refs(ledger, &a.left, &a.right),
                false_positive_notes: vec!["common names and shared project sites collide".into()],
                clears_if: ClearCondition::LinkResolved {
                    left: a.left.clone(),
                    right: a.right.clone(),
                },
            })
            .collect()
    }
}

/// Different display names built from the same name tokens
pub struct SimilarNameRule;

impl FlagRule for SimilarNameRule {
    fn id(&self) -> &'static str {
        "F-SIMILAR-NAME"
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Heuristic
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<FlagCandidate> {
        let ledger = ctx.ledger;
        let mut pairs: BTreeMap<(&str, &str), &str> = BTreeMap::new();
        for link in ledger.similar_links() {
            if ledger.same_cluster(&link.left, &link.right) {
                continue;
            }
            if let Some(ev) = link.evidence.iter().find(|ev| ev.basis == LinkBasis::NameTokens) {
                pairs.insert((link.left.as_str(), link.right.as_str()), ev.value.as_str());
            }
        }

        pairs
            .into_iter()
            .map(|((left, right), tokens)| FlagCandidate {
                rule_id: self.id().to_string(),
                entity_id: left.to_string(),
                scope: format!("pair:{}", right),
                related_entity_ids: vec![right.to_string()],
                severity: Severity::Yellow,
                source_kind: self.source_kind(),
                confidence: Confidence::Low,
                definition: FlagDefinition::new("display names differ only in token order or punctuation")
                    .observed("name_tokens", tokens),
                evidence: pair_refs(ledger, left, right),
                false_positive_notes: vec!["unrelated people share names".into()],
                clears_if: ClearCondition::LinkResolved {
                    left: left.to_string(),
                    right: right.to_string(),
                },
            })
            .collect()
    }
}

fn pair_refs(ledger: &UnifiedFlowLedger, left: &str, right: &str) -> Vec<String> {
    [left, right]
        .iter()
        .filter_map(|id| ledger.entity(id))
        .map(|e| e.evidence_ref())
        .collect()
}
