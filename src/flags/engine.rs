//! Flag Engine
//!
//! Runs every registered rule over the current view, folds the candidates
//! into the prior flag set and re-tests clearing conditions. Rules run in
//! parallel; their output is merged in registration order, so the result
//! does not depend on scheduling.
//!
//! Nothing is ever removed from the flag set. A run only opens, re-evaluates,
//! clears or supersedes.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::clearing::{check_clear, ClearCheck};
use super::errors::{FlagError, FlagResult};
use super::id::flag_id;
use super::lifecycle::union_into;
use super::rules::{builtin_rules, FlagRule, RuleContext};
use super::types::{ClearCondition, FlagCandidate, FlagRecord};
use crate::observability::{log_event, Event, MetricsRegistry};
use crate::provenance::DataTip;

/// A reviewer's sign-off on a human-review flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewClearance {
    pub flag_id: String,
    pub reviewer: String,
    pub note: String,
    #[serde(default)]
    pub evidence: Vec<String>,
}

/// Counts for one engine run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagSummary {
    pub total: u64,
    pub open: u64,
    pub opened: u64,
    pub reevaluated: u64,
    pub cleared: u64,
    pub reopened: u64,
    pub clearances_ignored: u64,
    /// Open flags by severity
    pub by_severity: BTreeMap<String, u64>,
    /// Open flags by source kind
    pub by_source_kind: BTreeMap<String, u64>,
}

/// Result of one engine run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagRun {
    /// Every flag, prior and new, ordered by `(rule_id, entity_id, scope, flag_id)`
    pub flags: Vec<FlagRecord>,
    pub summary: FlagSummary,
}

/// Registered rules plus the lifecycle pass over their candidates
pub struct FlagEngine {
    rules: Vec<Box<dyn FlagRule>>,
    parallel: bool,
}

impl FlagEngine {
    pub fn new(parallel: bool) -> Self {
        Self {
            rules: Vec::new(),
            parallel,
        }
    }

    /// Engine with every built-in rule registered
    ///
    /// # Errors
    ///
    /// Returns `FlagError::DuplicateRule` if two built-in rules share an id.
    pub fn with_builtin_rules(parallel: bool) -> FlagResult<Self> {
        let mut engine = Self::new(parallel);
        for rule in builtin_rules() {
            engine.register(rule)?;
        }
        Ok(engine)
    }

    /// Add a rule after those already registered
    ///
    /// # Errors
    ///
    /// Returns `FlagError::DuplicateRule` if a rule with the same id is
    /// already registered.
    pub fn register(&mut self, rule: Box<dyn FlagRule>) -> FlagResult<()> {
        if self.rules.iter().any(|r| r.id() == rule.id()) {
            return Err(FlagError::DuplicateRule(rule.id().to_string()));
        }
        self.rules.push(rule);
        Ok(())
    }

    pub fn rule_ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    /// Candidates from every rule, deduplicated by flag id.
    ///
    /// Rule id and source kind are stamped from the rule itself and
    /// confidence is capped for the source kind.
    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<FlagCandidate> {
        let eval = |rule: &Box<dyn FlagRule>| -> Vec<FlagCandidate> {
            rule.evaluate(ctx)
                .into_iter()
                .map(|mut c| {
                    c.rule_id = rule.id().to_string();
                    c.source_kind = rule.source_kind();
                    c.confidence = c.source_kind.cap(c.confidence);
                    c
                })
                .collect()
        };

        // collect() on an indexed parallel iterator keeps registration order
        let batches: Vec<Vec<FlagCandidate>> = if self.parallel {
            self.rules.par_iter().map(eval).collect()
        } else {
            self.rules.iter().map(eval).collect()
        };
        dedupe_candidates(batches.into_iter().flatten())
    }

    /// Evaluate the rules and advance the lifecycle of `prior`.
    ///
    /// # Errors
    ///
    /// Returns `FlagError` if:
    /// - a prior record fails validation
    /// - two prior records share a flag id (`DuplicatePrior`)
    /// - a rule emits a green candidate (`GreenWithoutClearing`)
    pub fn run(
        &self,
        ctx: &RuleContext<'_>,
        prior: &[FlagRecord],
        clearances: &[ReviewClearance],
        observed_at: DateTime<Utc>,
        data_tip: &DataTip,
        metrics: &MetricsRegistry,
    ) -> FlagResult<FlagRun> {
        let mut flags: BTreeMap<String, FlagRecord> = BTreeMap::new();
        for record in prior {
            record.validate()?;
            if flags.insert(record.flag_id.clone(), record.clone()).is_some() {
                return Err(FlagError::DuplicatePrior(record.flag_id.clone()));
            }
        }
        let mut successor: HashMap<String, String> = flags
            .values()
            .filter_map(|f| f.supersedes.clone().map(|s| (s, f.flag_id.clone())))
            .collect();

        let mut summary = FlagSummary::default();
        let mut touched: BTreeSet<String> = BTreeSet::new();

        for mut candidate in self.evaluate(ctx) {
            let root = flag_id(&candidate.rule_id, &candidate.entity_id, &candidate.scope);
            let head = if flags.contains_key(&root) {
                head_of(&successor, &root, flags.len())
            } else if let Some(head) = self.continued_head(&flags, &successor, &touched, &candidate) {
                log_event(
                    Event::FlagCarried,
                    &[("flag_id", head.as_str()), ("entity_id", candidate.entity_id.as_str())],
                );
                head
            } else {
                let record = FlagRecord::open(candidate, observed_at, data_tip)?;
                summary.opened += 1;
                touched.insert(record.flag_id.clone());
                flags.insert(record.flag_id.clone(), record);
                continue;
            };

            let Some(current) = flags.get_mut(&head) else {
                continue;
            };
            if current.is_open() {
                rebase(&mut candidate, &current.entity_id);
                if current.reevaluate(&candidate, observed_at, data_tip)? {
                    summary.reevaluated += 1;
                }
                touched.insert(head);
            } else if contradicts(current, &candidate) {
                let next = FlagRecord::reopen(current, candidate, observed_at, data_tip)?;
                summary.reopened += 1;
                metrics.increment_flags_reopened();
                log_event(
                    Event::FlagReopened,
                    &[("flag_id", next.flag_id.as_str()), ("supersedes", head.as_str())],
                );
                successor.insert(head, next.flag_id.clone());
                touched.insert(next.flag_id.clone());
                flags.insert(next.flag_id.clone(), next);
            } else {
                touched.insert(head);
            }
        }

        // open flags whose rule stayed quiet get their clearing condition re-tested
        let idle: Vec<String> = flags
            .values()
            .filter(|f| f.is_open() && !touched.contains(&f.flag_id))
            .map(|f| f.flag_id.clone())
            .collect();
        for id in idle {
            let Some(flag) = flags.get(&id) else {
                continue;
            };
            if let ClearCheck::Satisfied { evidence, note } = check_clear(flag, ctx) {
                if let Some(flag) = flags.get_mut(&id) {
                    flag.clear(evidence, note.as_str(), observed_at, data_tip)?;
                    summary.cleared += 1;
                    metrics.increment_flags_cleared();
                    log_event(Event::FlagCleared, &[("flag_id", id.as_str()), ("note", note.as_str())]);
                }
            }
        }

        for clearance in clearances {
            let head = head_of(&successor, &clearance.flag_id, flags.len());
            let reason = match flags.get_mut(&head) {
                None => Some("unknown flag"),
                Some(flag) if !flag.is_open() => Some("flag already cleared"),
                Some(flag) if !matches!(flag.clears_if, ClearCondition::HumanReview { .. }) => {
                    Some("flag clears on machine evidence")
                }
                Some(flag) => {
                    let mut evidence = vec![format!("review:{}", clearance.reviewer)];
                    union_into(&mut evidence, &clearance.evidence);
                    flag.clear(evidence, clearance.note.as_str(), observed_at, data_tip)?;
                    summary.cleared += 1;
                    metrics.increment_flags_cleared();
                    log_event(
                        Event::FlagCleared,
                        &[("flag_id", head.as_str()), ("reviewer", clearance.reviewer.as_str())],
                    );
                    None
                }
            };
            if let Some(reason) = reason {
                summary.clearances_ignored += 1;
                log_event(
                    Event::ClearanceIgnored,
                    &[("flag_id", clearance.flag_id.as_str()), ("reason", reason)],
                );
            }
        }

        let mut flags: Vec<FlagRecord> = flags.into_values().collect();
        flags.sort_by(|a, b| {
            (&a.rule_id, &a.entity_id, &a.scope, &a.flag_id).cmp(&(
                &b.rule_id,
                &b.entity_id,
                &b.scope,
                &b.flag_id,
            ))
        });

        summary.total = flags.len() as u64;
        for flag in flags.iter().filter(|f| f.is_open()) {
            summary.open += 1;
            *summary
                .by_severity
                .entry(flag.severity.as_str().to_string())
                .or_insert(0) += 1;
            *summary
                .by_source_kind
                .entry(flag.source_kind.as_str().to_string())
                .or_insert(0) += 1;
        }
        metrics.add_flags_emitted(summary.total);

        let total = summary.total.to_string();
        let open = summary.open.to_string();
        let cleared = summary.cleared.to_string();
        log_event(
            Event::FlagsEvaluated,
            &[("cleared", cleared.as_str()), ("open", open.as_str()), ("total", total.as_str())],
        );

        Ok(FlagRun { flags, summary })
    }
}

impl FlagEngine {
    /// Head of an existing chain that `candidate` continues under a new id.
    ///
    /// Only chain heads not yet matched this run qualify; open heads are
    /// preferred over cleared ones, then flag id order.
    fn continued_head(
        &self,
        flags: &BTreeMap<String, FlagRecord>,
        successor: &HashMap<String, String>,
        touched: &BTreeSet<String>,
        candidate: &FlagCandidate,
    ) -> Option<String> {
        let rule = self.rules.iter().find(|r| r.id() == candidate.rule_id)?;
        flags
            .values()
            .filter(|f| f.rule_id == candidate.rule_id)
            .filter(|f| !successor.contains_key(&f.flag_id) && !touched.contains(&f.flag_id))
            .filter(|f| rule.continues(f, candidate))
            .min_by_key(|f| (!f.is_open(), f.flag_id.as_str()))
            .map(|f| f.flag_id.clone())
    }
}

/// Re-anchor a carried candidate on the flag's entity; the candidate's own
/// anchor becomes a related entity
fn rebase(candidate: &mut FlagCandidate, anchor: &str) {
    if candidate.entity_id == anchor {
        return;
    }
    let previous = std::mem::replace(&mut candidate.entity_id, anchor.to_string());
    candidate.related_entity_ids.retain(|id| id != anchor);
    if !candidate.related_entity_ids.contains(&previous) {
        candidate.related_entity_ids.push(previous);
    }
    candidate.related_entity_ids.sort();
}

/// Latest flag in the supersede chain starting at `id`
fn head_of(successor: &HashMap<String, String>, id: &str, limit: usize) -> String {
    let mut current = id.to_string();
    for _ in 0..limit {
        match successor.get(&current) {
            Some(next) => current = next.clone(),
            None => break,
        }
    }
    current
}

/// True when a fresh candidate contradicts a cleared flag.
///
/// Machine conditions were satisfied when the flag cleared, so the rule
/// firing again is itself contradicting. A reviewed flag reopens only on
/// changed observations or new evidence.
fn contradicts(cleared: &FlagRecord, candidate: &FlagCandidate) -> bool {
    if candidate.clears_if.is_machine_checkable() {
        return true;
    }
    cleared.definition.observed != candidate.definition.observed
        || candidate.evidence.iter().any(|e| !cleared.evidence.contains(e))
}

/// Merge candidates sharing a flag id, first-seen order. Later candidates
/// win for severity, confidence, definition and clearing condition; lists
/// are unioned.
fn dedupe_candidates(all: impl IntoIterator<Item = FlagCandidate>) -> Vec<FlagCandidate> {
    let mut order: Vec<String> = Vec::new();
    let mut by_id: HashMap<String, FlagCandidate> = HashMap::new();
    for candidate in all {
        let id = flag_id(&candidate.rule_id, &candidate.entity_id, &candidate.scope);
        match by_id.get_mut(&id) {
            Some(existing) => {
                existing.severity = candidate.severity;
                existing.confidence = candidate.confidence;
                existing.definition = candidate.definition;
                existing.clears_if = candidate.clears_if;
                union_into(&mut existing.evidence, &candidate.evidence);
                union_into(&mut existing.related_entity_ids, &candidate.related_entity_ids);
                union_into(&mut existing.false_positive_notes, &candidate.false_positive_notes);
            }
            None => {
                order.push(id.clone());
                by_id.insert(id, candidate);
            }
        }
    }
    order.into_iter().filter_map(|id| by_id.remove(&id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::rules::fixtures::{entity, ledger, series_run, total};
    use crate::flags::rules::{DuplicateAvatarRule, PayoutMismatchRule, RuleThresholds};
    use crate::flags::types::{Confidence, FlagDefinition, Severity, SourceKind, TransitionKind};
    use crate::linker::{EntityRecord, IndexKind, TotalKind, UnifiedFlowLedger};
    use chrono::TimeZone;

    struct Fixed(&'static str, SourceKind, Vec<FlagCandidate>);

    impl FlagRule for Fixed {
        fn id(&self) -> &'static str {
            self.0
        }
        fn source_kind(&self) -> SourceKind {
            self.1
        }
        fn evaluate(&self, _ctx: &RuleContext<'_>) -> Vec<FlagCandidate> {
            self.2.clone()
        }
    }

    fn candidate(rule: &str, entity: &str, severity: Severity, evidence: &str) -> FlagCandidate {
        FlagCandidate {
            rule_id: rule.into(),
            entity_id: entity.into(),
            scope: "s".into(),
            related_entity_ids: vec![],
            severity,
            source_kind: SourceKind::Offchain,
            confidence: Confidence::High,
            definition: FlagDefinition::new("r"),
            evidence: vec![evidence.into()],
            false_positive_notes: vec![],
            clears_if: ClearCondition::HumanReview {
                instructions: "check".into(),
            },
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_duplicate_rule_rejected() {
        let mut engine = FlagEngine::new(false);
        engine.register(Box::new(Fixed("F-A", SourceKind::Onchain, vec![]))).unwrap();
        assert!(matches!(
            engine.register(Box::new(Fixed("F-A", SourceKind::Onchain, vec![]))),
            Err(FlagError::DuplicateRule(_))
        ));
    }

    #[test]
    fn test_dedupe_last_wins_and_unions() {
        let mut engine = FlagEngine::new(true);
        engine
            .register(Box::new(Fixed(
                "F-A",
                SourceKind::Offchain,
                vec![
                    candidate("F-A", "e1", Severity::Yellow, "ev1"),
                    candidate("F-A", "e1", Severity::Orange, "ev2"),
                ],
            )))
            .unwrap();
        let ledger = ledger(vec![]);
        let thresholds = RuleThresholds::default();
        let ctx = RuleContext::new(&[], &[], &ledger, &thresholds);

        let out = engine.evaluate(&ctx);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].severity, Severity::Orange);
        assert_eq!(out[0].evidence, vec!["ev1", "ev2"]);
    }

    #[test]
    fn test_heuristic_rule_capped_at_low() {
        let mut engine = FlagEngine::new(false);
        let mut c = candidate("F-H", "e1", Severity::Yellow, "ev");
        c.confidence = Confidence::High;
        engine.register(Box::new(Fixed("F-H", SourceKind::Heuristic, vec![c]))).unwrap();
        let ledger = ledger(vec![]);
        let thresholds = RuleThresholds::default();
        let ctx = RuleContext::new(&[], &[], &ledger, &thresholds);

        let out = engine.evaluate(&ctx);
        assert_eq!(out[0].source_kind, SourceKind::Heuristic);
        assert_eq!(out[0].confidence, Confidence::Low);
    }

    #[test]
    fn test_builtin_residual_clears_when_period_recovers() {
        let engine = FlagEngine::with_builtin_rules(false).unwrap();
        let ledger = ledger(vec![]);
        let thresholds = RuleThresholds::default();
        let metrics = MetricsRegistry::new();

        let run = series_run();
        let ctx = RuleContext::new(&run.records, &run.signals, &ledger, &thresholds);
        let first = engine.run(&ctx, &[], &[], at(1), &DataTip::default(), &metrics).unwrap();
        assert_eq!(first.summary.opened, 3);
        assert!(first.flags.iter().all(|f| f.is_open()));

        // same input, nothing signals: every machine condition is re-tested
        let mut quiet = series_run();
        for record in &mut quiet.records {
            record.tolerance.sign_flip = false;
            record.tolerance.exceeded = false;
        }
        let ctx = RuleContext::new(&quiet.records, &[], &ledger, &thresholds);
        let second = engine
            .run(&ctx, &first.flags, &[], at(2), &DataTip::default(), &metrics)
            .unwrap();

        assert_eq!(second.flags.len(), 3);
        let flip = second
            .flags
            .iter()
            .find(|f| f.rule_id == "F-RESIDUAL-SIGN-FLIP")
            .unwrap();
        let opened_flip = first
            .flags
            .iter()
            .find(|f| f.rule_id == "F-RESIDUAL-SIGN-FLIP")
            .unwrap();
        assert_eq!(flip.severity, Severity::Green);
        assert_eq!(flip.flag_id, opened_flip.flag_id);
        assert!(flip.extends_history_of(opened_flip));
        // residual ratios are unchanged, so those flags stay open
        assert!(second
            .flags
            .iter()
            .filter(|f| f.rule_id == "F-RECON-RESIDUAL")
            .all(|f| f.is_open()));
    }

    #[test]
    fn test_review_clearance_and_reopen() {
        let mut engine = FlagEngine::new(false);
        engine
            .register(Box::new(Fixed(
                "F-R",
                SourceKind::Offchain,
                vec![candidate("F-R", "e1", Severity::Yellow, "ev1")],
            )))
            .unwrap();
        let ledger = ledger(vec![entity("e1", IndexKind::Offchain)]);
        let thresholds = RuleThresholds::default();
        let ctx = RuleContext::new(&[], &[], &ledger, &thresholds);
        let metrics = MetricsRegistry::new();
        let tip = DataTip::default();

        let first = engine.run(&ctx, &[], &[], at(1), &tip, &metrics).unwrap();
        let id = first.flags[0].flag_id.clone();

        let clearance = ReviewClearance {
            flag_id: id.clone(),
            reviewer: "ops".into(),
            note: "delivery confirmed".into(),
            evidence: vec!["ticket-7".into()],
        };
        let second = engine
            .run(&ctx, &first.flags, &[clearance], at(2), &tip, &metrics)
            .unwrap();
        assert_eq!(second.flags.len(), 1);
        assert_eq!(second.flags[0].severity, Severity::Green);
        assert!(second.flags[0].extends_history_of(&first.flags[0]));

        // unchanged observation: stays green
        let third = engine.run(&ctx, &second.flags, &[], at(3), &tip, &metrics).unwrap();
        assert_eq!(third.flags, second.flags);

        // new evidence reopens under a successor id
        let mut reopening = FlagEngine::new(false);
        reopening
            .register(Box::new(Fixed(
                "F-R",
                SourceKind::Offchain,
                vec![candidate("F-R", "e1", Severity::Orange, "ev9")],
            )))
            .unwrap();
        let fourth = reopening
            .run(&ctx, &third.flags, &[], at(4), &tip, &metrics)
            .unwrap();
        assert_eq!(fourth.flags.len(), 2);
        let successor = fourth.flags.iter().find(|f| f.flag_id != id).unwrap();
        assert_eq!(successor.supersedes.as_deref(), Some(id.as_str()));
        assert!(matches!(
            successor.history[0].kind,
            TransitionKind::Reopened { .. }
        ));
        assert_eq!(fourth.summary.reopened, 1);
        let metrics = metrics.snapshot();
        assert_eq!(metrics.flags_reopened, 1);
        assert_eq!(metrics.flags_cleared, 1);
    }

    fn holder(id: &str, username: &str, avatar: &str) -> EntityRecord {
        let mut e = entity(id, IndexKind::Offchain);
        e.username = Some(username.into());
        e.avatar_id = Some(avatar.into());
        e
    }

    fn run_rule(
        rule: Box<dyn FlagRule>,
        ledger: &UnifiedFlowLedger,
        prior: &[FlagRecord],
        day: u32,
    ) -> FlagRun {
        let mut engine = FlagEngine::new(false);
        engine.register(rule).unwrap();
        let thresholds = RuleThresholds::default();
        let ctx = RuleContext::new(&[], &[], ledger, &thresholds);
        engine
            .run(&ctx, prior, &[], at(day), &DataTip::default(), &MetricsRegistry::new())
            .unwrap()
    }

    #[test]
    fn test_avatar_flag_survives_lower_id_joining() {
        let before = ledger(vec![holder("cat-1", "alice", "avatar-42"), holder("cat-2", "alicia", "avatar-42")]);
        let first = run_rule(Box::new(DuplicateAvatarRule), &before, &[], 1);
        assert_eq!(first.flags.len(), 1);
        let id = first.flags[0].flag_id.clone();

        let after = ledger(vec![
            holder("cat-0", "al", "avatar-42"),
            holder("cat-1", "alice", "avatar-42"),
            holder("cat-2", "alicia", "avatar-42"),
        ]);
        let second = run_rule(Box::new(DuplicateAvatarRule), &after, &first.flags, 2);

        assert_eq!(second.flags.len(), 1);
        assert_eq!(second.summary.opened, 0);
        let flag = &second.flags[0];
        assert_eq!(flag.flag_id, id);
        assert!(flag.is_open());
        assert_eq!(flag.entity_id, "cat-1");
        // the newcomer is appended; the anchor stays where it was
        assert_eq!(flag.related_entity_ids, vec!["cat-2", "cat-0"]);
        assert!(flag.evidence.contains(&"catalyst/cat-0".to_string()));
        assert!(flag.extends_history_of(&first.flags[0]));
    }

    #[test]
    fn test_payout_flag_survives_cluster_growth() {
        let mut registry = entity("cat-1", IndexKind::Offchain);
        registry.payment_addresses = vec!["addr1xyz".into()];
        registry.tx_hashes = vec!["tx-9".into()];
        registry.totals = vec![total(TotalKind::Distributed, 100_000, 0, "ADA")];
        let mut chain = entity("chain-1", IndexKind::Onchain);
        chain.payment_addresses = vec!["addr1xyz".into()];
        chain.totals = vec![total(TotalKind::Withdrawn, 80_000, 0, "ADA")];

        let before = ledger(vec![registry.clone(), chain.clone()]);
        let first = run_rule(Box::new(PayoutMismatchRule), &before, &[], 1);
        assert_eq!(first.flags.len(), 1);
        assert_eq!(first.flags[0].entity_id, "cat-1");

        // a lower-sorted on-chain record joins through a shared transaction
        let mut joiner = entity("a-chain", IndexKind::Onchain);
        joiner.tx_hashes = vec!["tx-9".into()];
        let after = ledger(vec![joiner, registry, chain]);
        assert_eq!(after.cluster_of("cat-1").unwrap().cluster_id, "a-chain");

        let second = run_rule(Box::new(PayoutMismatchRule), &after, &first.flags, 2);
        assert_eq!(second.flags.len(), 1);
        assert_eq!(second.flags[0].flag_id, first.flags[0].flag_id);
        assert_eq!(second.flags[0].entity_id, "cat-1");
        assert_eq!(second.flags[0].related_entity_ids, vec!["chain-1", "a-chain"]);
        assert_eq!(second.summary.open, 1);
    }

    #[test]
    fn test_duplicate_prior_rejected() {
        let engine = FlagEngine::new(false);
        let ledger = ledger(vec![]);
        let thresholds = RuleThresholds::default();
        let ctx = RuleContext::new(&[], &[], &ledger, &thresholds);
        let record = FlagRecord::open(
            candidate("F-R", "e1", Severity::Yellow, "ev1"),
            at(1),
            &DataTip::default(),
        )
        .unwrap();
        let err = engine
            .run(&ctx, &[record.clone(), record], &[], at(2), &DataTip::default(), &MetricsRegistry::new())
            .unwrap_err();
        assert!(matches!(err, FlagError::DuplicatePrior(_)));
    }
}
