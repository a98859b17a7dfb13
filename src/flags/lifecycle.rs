//! Flag lifecycle
//!
//! ```text
//! OPEN(sev) ──reevaluate──▶ OPEN(sev')      sev, sev' ∈ {red, orange, yellow}
//! OPEN(sev) ──clear──────▶ CLEARED(green)  terminal
//! CLEARED   ──contradicting evidence──▶ new flag, supersedes = cleared id
//! ```
//!
//! History is append-only: every operation here only pushes transitions.

use chrono::{DateTime, Utc};

use super::errors::{FlagError, FlagResult};
use super::id::{flag_id, successor_id};
use super::types::{FlagCandidate, FlagRecord, FlagTransition, Severity, TransitionKind};
use crate::provenance::DataTip;

fn check_candidate(candidate: &FlagCandidate) -> FlagResult<()> {
    if !candidate.severity.is_open() {
        return Err(FlagError::GreenWithoutClearing {
            rule_id: candidate.rule_id.clone(),
        });
    }
    Ok(())
}

fn build(
    flag_id: String,
    candidate: FlagCandidate,
    observed_at: DateTime<Utc>,
    data_tip: &DataTip,
    supersedes: Option<String>,
) -> FlagRecord {
    let confidence = candidate.source_kind.cap(candidate.confidence);
    let mut history = Vec::with_capacity(2);
    if let Some(prior) = &supersedes {
        history.push(FlagTransition {
            at: observed_at,
            data_tip: data_tip.clone(),
            kind: TransitionKind::Reopened {
                supersedes: prior.clone(),
            },
        });
    }
    history.push(FlagTransition {
        at: observed_at,
        data_tip: data_tip.clone(),
        kind: TransitionKind::Opened {
            severity: candidate.severity,
            confidence,
        },
    });

    FlagRecord {
        flag_id,
        rule_id: candidate.rule_id,
        entity_id: candidate.entity_id,
        scope: candidate.scope,
        related_entity_ids: candidate.related_entity_ids,
        severity: candidate.severity,
        source_kind: candidate.source_kind,
        confidence,
        definition: candidate.definition,
        evidence: candidate.evidence,
        false_positive_notes: candidate.false_positive_notes,
        clears_if: candidate.clears_if,
        observed_at,
        data_tip: data_tip.clone(),
        supersedes,
        history,
    }
}

/// Append the items of `extra` not yet in `list`, keeping first-seen order
pub(crate) fn union_into(list: &mut Vec<String>, extra: &[String]) -> Vec<String> {
    let mut added = Vec::new();
    for item in extra {
        if !list.contains(item) {
            list.push(item.clone());
            added.push(item.clone());
        }
    }
    added
}

impl FlagRecord {
    /// Open a fresh flag from a rule candidate
    ///
    /// # Errors
    ///
    /// Returns `FlagError::GreenWithoutClearing` for a green candidate.
    pub fn open(
        candidate: FlagCandidate,
        observed_at: DateTime<Utc>,
        data_tip: &DataTip,
    ) -> FlagResult<Self> {
        check_candidate(&candidate)?;
        let id = flag_id(&candidate.rule_id, &candidate.entity_id, &candidate.scope);
        Ok(build(id, candidate, observed_at, data_tip, None))
    }

    /// Open the successor of a cleared flag on contradicting evidence
    ///
    /// # Errors
    ///
    /// Returns `FlagError::StillOpen` if `prior` has not cleared, and
    /// `FlagError::GreenWithoutClearing` for a green candidate.
    pub fn reopen(
        prior: &FlagRecord,
        candidate: FlagCandidate,
        observed_at: DateTime<Utc>,
        data_tip: &DataTip,
    ) -> FlagResult<Self> {
        check_candidate(&candidate)?;
        if prior.is_open() {
            return Err(FlagError::StillOpen {
                flag_id: prior.flag_id.clone(),
            });
        }
        let id = successor_id(&candidate.rule_id, &prior.flag_id);
        Ok(build(
            id,
            candidate,
            observed_at,
            data_tip,
            Some(prior.flag_id.clone()),
        ))
    }

    /// Fold a fresh candidate for the same flag into an open record.
    ///
    /// Severity and confidence follow the candidate; evidence and related
    /// entities are unioned. Returns true when severity or confidence moved.
    ///
    /// # Errors
    ///
    /// Returns `FlagError::AlreadyCleared` on a green record, and
    /// `FlagError::GreenWithoutClearing` for a green candidate.
    pub fn reevaluate(
        &mut self,
        candidate: &FlagCandidate,
        observed_at: DateTime<Utc>,
        data_tip: &DataTip,
    ) -> FlagResult<bool> {
        check_candidate(candidate)?;
        if !self.is_open() {
            return Err(FlagError::AlreadyCleared {
                flag_id: self.flag_id.clone(),
            });
        }

        let confidence = self.source_kind.cap(candidate.confidence);
        let moved = self.severity != candidate.severity || self.confidence != confidence;
        if moved {
            self.history.push(FlagTransition {
                at: observed_at,
                data_tip: data_tip.clone(),
                kind: TransitionKind::Reevaluated {
                    from_severity: self.severity,
                    to_severity: candidate.severity,
                    from_confidence: self.confidence,
                    to_confidence: confidence,
                },
            });
            self.severity = candidate.severity;
            self.confidence = confidence;
        }

        let added = union_into(&mut self.evidence, &candidate.evidence);
        if !added.is_empty() {
            self.history.push(FlagTransition {
                at: observed_at,
                data_tip: data_tip.clone(),
                kind: TransitionKind::EvidenceAdded { evidence: added },
            });
        }
        union_into(&mut self.related_entity_ids, &candidate.related_entity_ids);
        self.definition = candidate.definition.clone();
        self.false_positive_notes = candidate.false_positive_notes.clone();
        self.observed_at = observed_at;
        self.data_tip = data_tip.clone();
        Ok(moved)
    }

    /// Move an open flag to green, recording the evidence that satisfied
    /// its clearing condition.
    ///
    /// # Errors
    ///
    /// Returns `FlagError::AlreadyCleared` on a green record and
    /// `FlagError::ClearingWithoutEvidence` when `evidence` is empty.
    pub fn clear(
        &mut self,
        evidence: Vec<String>,
        note: impl Into<String>,
        observed_at: DateTime<Utc>,
        data_tip: &DataTip,
    ) -> FlagResult<()> {
        if !self.is_open() {
            return Err(FlagError::AlreadyCleared {
                flag_id: self.flag_id.clone(),
            });
        }
        if evidence.is_empty() {
            return Err(FlagError::ClearingWithoutEvidence {
                flag_id: self.flag_id.clone(),
            });
        }
        union_into(&mut self.evidence, &evidence);
        self.history.push(FlagTransition {
            at: observed_at,
            data_tip: data_tip.clone(),
            kind: TransitionKind::Cleared {
                from_severity: self.severity,
                evidence,
                note: note.into(),
            },
        });
        self.severity = Severity::Green;
        self.observed_at = observed_at;
        self.data_tip = data_tip.clone();
        Ok(())
    }

    /// True when `self.history` starts with all of `prior.history`
    pub fn extends_history_of(&self, prior: &FlagRecord) -> bool {
        self.history.len() >= prior.history.len()
            && self.history[..prior.history.len()] == prior.history[..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::types::{ClearCondition, Confidence, FlagDefinition, SourceKind};
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn candidate(severity: Severity, source_kind: SourceKind, confidence: Confidence) -> FlagCandidate {
        FlagCandidate {
            rule_id: "F-TEST".into(),
            entity_id: "e-1".into(),
            scope: "registry".into(),
            related_entity_ids: vec![],
            severity,
            source_kind,
            confidence,
            definition: FlagDefinition::new("test rule"),
            evidence: vec!["ref:1".into()],
            false_positive_notes: vec![],
            clears_if: ClearCondition::HumanReview {
                instructions: "review".into(),
            },
        }
    }

    #[test]
    fn test_open_caps_heuristic_confidence() {
        let flag = FlagRecord::open(
            candidate(Severity::Orange, SourceKind::Heuristic, Confidence::High),
            at(1),
            &DataTip::default(),
        )
        .unwrap();
        assert_eq!(flag.confidence, Confidence::Low);
        assert_eq!(flag.history.len(), 1);
        assert!(flag.validate().is_ok());
    }

    #[test]
    fn test_green_candidate_rejected() {
        let err = FlagRecord::open(
            candidate(Severity::Green, SourceKind::Onchain, Confidence::High),
            at(1),
            &DataTip::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FlagError::GreenWithoutClearing { .. }));
    }

    #[test]
    fn test_reevaluate_appends_history() {
        let tip = DataTip::default();
        let mut flag = FlagRecord::open(
            candidate(Severity::Yellow, SourceKind::Onchain, Confidence::High),
            at(1),
            &tip,
        )
        .unwrap();
        let before = flag.clone();

        let mut next = candidate(Severity::Red, SourceKind::Onchain, Confidence::Medium);
        next.evidence = vec!["ref:1".into(), "ref:2".into()];
        assert!(flag.reevaluate(&next, at(2), &tip).unwrap());

        assert_eq!(flag.severity, Severity::Red);
        assert_eq!(flag.confidence, Confidence::Medium);
        assert_eq!(flag.evidence, vec!["ref:1", "ref:2"]);
        assert_eq!(flag.history.len(), 3);
        assert!(flag.extends_history_of(&before));
    }

    #[test]
    fn test_reevaluate_same_state_is_quiet() {
        let tip = DataTip::default();
        let c = candidate(Severity::Yellow, SourceKind::Offchain, Confidence::High);
        let mut flag = FlagRecord::open(c.clone(), at(1), &tip).unwrap();
        assert!(!flag.reevaluate(&c, at(2), &tip).unwrap());
        assert_eq!(flag.history.len(), 1);
        assert_eq!(flag.observed_at, at(2));
    }

    #[test]
    fn test_clear_is_terminal_and_reopen_supersedes() {
        let tip = DataTip::default();
        let c = candidate(Severity::Orange, SourceKind::Offchain, Confidence::High);
        let mut flag = FlagRecord::open(c.clone(), at(1), &tip).unwrap();

        assert!(matches!(
            flag.clear(vec![], "nothing", at(2), &tip),
            Err(FlagError::ClearingWithoutEvidence { .. })
        ));
        flag.clear(vec!["review:ok".into()], "reviewed", at(2), &tip).unwrap();
        assert_eq!(flag.severity, Severity::Green);
        assert!(matches!(
            flag.reevaluate(&c, at(3), &tip),
            Err(FlagError::AlreadyCleared { .. })
        ));
        assert!(matches!(
            flag.clear(vec!["x".into()], "again", at(3), &tip),
            Err(FlagError::AlreadyCleared { .. })
        ));

        let successor = FlagRecord::reopen(&flag, c.clone(), at(3), &tip).unwrap();
        assert_ne!(successor.flag_id, flag.flag_id);
        assert_eq!(successor.supersedes.as_deref(), Some(flag.flag_id.as_str()));
        assert!(successor.is_open());

        assert!(matches!(
            FlagRecord::reopen(&successor, c, at(4), &tip),
            Err(FlagError::StillOpen { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_high_heuristic() {
        let mut flag = FlagRecord::open(
            candidate(Severity::Yellow, SourceKind::Heuristic, Confidence::Low),
            at(1),
            &DataTip::default(),
        )
        .unwrap();
        flag.confidence = Confidence::High;
        assert!(matches!(
            flag.validate(),
            Err(FlagError::HeuristicConfidence { .. })
        ));
    }
}
