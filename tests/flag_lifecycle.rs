//! Flag Lifecycle Tests
//!
//! Flags persist across runs through the prior flag set:
//! - a re-fired rule re-evaluates the same open flag under the same id
//! - a quiet rule's flag clears once its condition is met, with evidence
//! - green is terminal; a recurrence opens a successor that supersedes it
//! - reviewer clearances apply only to human-review flags

mod common;

use serde_json::json;

use common::{bundle_text, flags_of, offchain, run_text, two_period_rows};
use treasury_audit::flags::{flag_id, successor_id, Severity, SourceKind, TransitionKind};

const RESIDUAL: &str = "F-RECON-RESIDUAL";

/// Period 100 leaves 200_000 unexplained against a 300_000 delta
fn residual_input() -> String {
    bundle_text(two_period_rows(10_300_000), vec![], vec![])
}

/// Period 100 leaves 50_000 unexplained against a 450_000 delta
fn explained_input() -> String {
    bundle_text(two_period_rows(10_450_000), vec![], vec![])
}

// =============================================================================
// Opening and re-evaluation
// =============================================================================

#[test]
fn test_residual_flag_opens_with_stable_id() {
    let run = run_text(&residual_input(), &[], 12);
    let flags = flags_of(&run, RESIDUAL);

    assert_eq!(flags.len(), 1);
    let flag = flags[0];
    assert_eq!(flag.flag_id, flag_id(RESIDUAL, "treasury", "period:100"));
    assert_eq!(flag.severity, Severity::Orange);
    assert_eq!(flag.source_kind, SourceKind::Onchain);
    assert!(flag.evidence.iter().any(|e| e == "epochs.json#period=100"));
    assert!(matches!(flag.history[0].kind, TransitionKind::Opened { .. }));
    assert_eq!(run.flags.summary.opened, 1);
}

#[test]
fn test_rerun_keeps_flag_identity() {
    let first = run_text(&residual_input(), &[], 12);
    let second = run_text(&residual_input(), &first.flags.flags, 13);

    let before = flags_of(&first, RESIDUAL);
    let after = flags_of(&second, RESIDUAL);
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].flag_id, before[0].flag_id);
    assert!(after[0].is_open());
    assert_eq!(second.flags.summary.opened, 0);
    // history only grows
    assert!(after[0].history.len() >= before[0].history.len());
    assert_eq!(after[0].history[..before[0].history.len()], before[0].history[..]);
}

// =============================================================================
// Clearing and reopening
// =============================================================================

#[test]
fn test_flag_clears_then_reopens_as_successor() {
    let opened = run_text(&residual_input(), &[], 12);
    let root = flag_id(RESIDUAL, "treasury", "period:100");

    let cleared = run_text(&explained_input(), &opened.flags.flags, 13);
    let flag = cleared
        .flags
        .flags
        .iter()
        .find(|f| f.flag_id == root)
        .unwrap();
    assert_eq!(flag.severity, Severity::Green);
    assert_eq!(cleared.flags.summary.cleared, 1);
    match &flag.history.last().unwrap().kind {
        TransitionKind::Cleared { evidence, .. } => assert!(!evidence.is_empty()),
        other => panic!("expected a clearing transition, got {:?}", other),
    }

    let reopened = run_text(&residual_input(), &cleared.flags.flags, 14);
    let flags = flags_of(&reopened, RESIDUAL);
    assert_eq!(flags.len(), 2);
    assert_eq!(reopened.flags.summary.reopened, 1);

    let old = flags.iter().find(|f| f.flag_id == root).unwrap();
    assert_eq!(old.severity, Severity::Green);

    let next = flags.iter().find(|f| f.flag_id != root).unwrap();
    assert_eq!(next.flag_id, successor_id(RESIDUAL, &root));
    assert_eq!(next.supersedes.as_deref(), Some(root.as_str()));
    assert!(next.is_open());
}

#[test]
fn test_green_flag_stays_green_while_quiet() {
    let opened = run_text(&residual_input(), &[], 12);
    let cleared = run_text(&explained_input(), &opened.flags.flags, 13);
    let again = run_text(&explained_input(), &cleared.flags.flags, 14);

    assert_eq!(again.flags.flags, cleared.flags.flags);
    assert_eq!(again.flags.summary.reopened, 0);
}

// =============================================================================
// Reviewer clearances
// =============================================================================

fn high_volume_entity() -> serde_json::Value {
    let mut entity = offchain("p-1", "prolific", "av-1");
    entity["total_projects"] = json!(60);
    entity
}

#[test]
fn test_reviewer_clears_human_review_flag() {
    let text = bundle_text(two_period_rows(10_500_000), vec![high_volume_entity()], vec![]);
    let opened = run_text(&text, &[], 12);
    let flags = flags_of(&opened, "F-HIGH-VOLUME");
    assert_eq!(flags.len(), 1);
    let id = flags[0].flag_id.clone();

    let review = json!({"flag_id": id, "reviewer": "auditor-1", "note": "team of eleven, verified"});
    let text = bundle_text(two_period_rows(10_500_000), vec![high_volume_entity()], vec![review]);
    let reviewed = run_text(&text, &opened.flags.flags, 13);

    let flag = reviewed.flags.flags.iter().find(|f| f.flag_id == id).unwrap();
    assert_eq!(flag.severity, Severity::Green);
    assert_eq!(reviewed.flags.summary.clearances_ignored, 0);
}

#[test]
fn test_reviewer_cannot_clear_machine_flag() {
    let opened = run_text(&residual_input(), &[], 12);
    let id = flag_id(RESIDUAL, "treasury", "period:100");

    let review = json!({"flag_id": id, "reviewer": "auditor-1", "note": "looks fine"});
    let text = bundle_text(two_period_rows(10_300_000), vec![], vec![review]);
    let reviewed = run_text(&text, &opened.flags.flags, 13);

    let flag = reviewed.flags.flags.iter().find(|f| f.flag_id == id).unwrap();
    assert!(flag.is_open());
    assert_eq!(reviewed.flags.summary.clearances_ignored, 1);
}
