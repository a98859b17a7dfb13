//! Reconciliation Invariant Tests
//!
//! - the reconciliation identity holds exactly for every estimated period
//! - calendar-year aggregates conserve the per-period values they roll up
//! - a missing epoch is reported as a gap, never interpolated
//! - the first period of a series carries no estimate

mod common;

use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};

use common::{bundle_text, ledger_row, run_text, two_period_rows};
use treasury_audit::reconcile::DegradedCause;

// =============================================================================
// Test Utilities
// =============================================================================

/// Five-day epochs from 2022-12-17, closing balance rising by `step(epoch)`
fn year_boundary_rows(count: u64, step: impl Fn(u64) -> i64) -> Vec<Value> {
    let origin = Utc.with_ymd_and_hms(2022, 12, 17, 21, 44, 0).unwrap();
    let mut balance = 10_000_000i64;
    (0..count)
        .map(|i| {
            let start = origin + Duration::days(5 * i as i64);
            let end = start + Duration::days(5);
            let close = balance + step(i);
            let mir = if i % 3 == 1 { 25_000 } else { 0 };
            let row = json!({
                "epoch_no": 380 + i,
                "start_time": start.format("%Y-%m-%d %H:%M:%S").to_string(),
                "end_time": end.format("%Y-%m-%d %H:%M:%S").to_string(),
                "fees_epoch": 2_000_000,
                "treasury_start": balance,
                "treasury_end": close,
                "reserves_start": 400_000_000,
                "rho": "0.003",
                "tau": "0.2",
                "mir_treasury_payments": mir,
            });
            balance = close;
            row
        })
        .collect()
}

// =============================================================================
// Identity
// =============================================================================

#[test]
fn test_identity_holds_for_every_estimated_period() {
    let text = bundle_text(year_boundary_rows(8, |i| 300_000 + 7_919 * i as i64), vec![], vec![]);
    let run = run_text(&text, &[], 12);

    assert_eq!(run.reconciliation.records.len(), 8);
    for record in &run.reconciliation.records {
        assert_eq!(
            record.identity_residual(),
            Some(0),
            "identity broken for period {}",
            record.period_id()
        );
    }
}

#[test]
fn test_reference_period_values() {
    let text = bundle_text(two_period_rows(10_300_000), vec![], vec![]);
    let run = run_text(&text, &[], 12);

    let first = &run.reconciliation.records[0];
    assert_eq!(first.inflow_est, Some(500_000));
    assert_eq!(first.treasury_delta, Some(300_000));
    assert_eq!(first.implied_outflow_other, Some(200_000));
    assert!(first.tolerance.exceeded);
    assert_eq!(first.display["implied_outflow_other"].as_deref(), Some("0.200000"));

    let second = &run.reconciliation.records[1];
    assert_eq!(second.implied_outflow_other, Some(0));
    assert!(!second.tolerance.needs_review());
}

// =============================================================================
// Aggregation
// =============================================================================

#[test]
fn test_year_aggregates_conserve_period_sums() {
    let text = bundle_text(year_boundary_rows(8, |_| 310_000), vec![], vec![]);
    let run = run_text(&text, &[], 12);
    let records = &run.reconciliation.records;

    assert_eq!(run.years.iter().map(|y| y.year).collect::<Vec<_>>(), vec![2022, 2023]);

    let periods: u64 = run.years.iter().map(|y| y.periods).sum();
    assert_eq!(periods, records.len() as u64);

    let fees: i128 = records.iter().map(|r| r.snapshot.fees as i128).sum();
    assert_eq!(run.years.iter().map(|y| y.fees).sum::<i128>(), fees);

    let implied: i128 = records.iter().filter_map(|r| r.implied_outflow_other).map(i128::from).sum();
    let year_implied: i128 = run
        .years
        .iter()
        .filter_map(|y| y.implied_outflow_other.total)
        .sum();
    assert_eq!(year_implied, implied);

    let withdrawals: i128 = records.iter().map(|r| r.withdrawals as i128).sum();
    assert_eq!(run.years.iter().map(|y| y.withdrawals).sum::<i128>(), withdrawals);
    assert_eq!(withdrawals, 75_000);
}

// =============================================================================
// Gaps and boundaries
// =============================================================================

#[test]
fn test_missing_epoch_is_a_gap() {
    let rows = vec![
        ledger_row(100, 1, 10_000_000, 10_500_000),
        ledger_row(101, 6, 10_500_000, 11_000_000),
        ledger_row(103, 16, 11_500_000, 12_000_000),
    ];
    let run = run_text(&bundle_text(rows, vec![], vec![]), &[], 30);

    assert_eq!(run.series.gaps.len(), 1);
    assert_eq!(run.series.gaps[0].first_missing(), 102);
    assert_eq!(run.series.gaps[0].missing_count(), 1);
    assert_eq!(run.metrics.series_gaps, 1);
    // no synthetic record is produced for the missing epoch
    let ids: Vec<u64> = run.reconciliation.records.iter().map(|r| r.period_id()).collect();
    assert_eq!(ids, vec![100, 101, 103]);
}

#[test]
fn test_series_start_has_null_estimate() {
    let mut first = ledger_row(100, 1, 0, 10_500_000);
    first["treasury_start"] = Value::Null;
    let rows = vec![first, ledger_row(101, 6, 10_500_000, 11_000_000)];
    let run = run_text(&bundle_text(rows, vec![], vec![]), &[], 12);

    let head = &run.reconciliation.records[0];
    assert_eq!(head.inflow_est, None);
    assert_eq!(head.implied_outflow_other, None);
    assert!(matches!(head.degraded, Some(DegradedCause::SeriesBoundary { .. })));
    assert_eq!(run.metrics.periods_degraded, 1);
    assert!(run.reconciliation.records[1].has_estimate());
}

#[test]
fn test_rejected_row_downgrades_provenance() {
    let mut broken = ledger_row(101, 6, 10_500_000, 11_000_000);
    broken["fees_epoch"] = Value::Null;
    let rows = vec![ledger_row(100, 1, 10_000_000, 10_500_000), broken];
    let run = run_text(&bundle_text(rows, vec![], vec![]), &[], 12);

    assert_eq!(run.series.issues.len(), 1);
    assert_eq!(run.metrics.rows_rejected, 1);
    assert_eq!(
        run.provenance.grade,
        treasury_audit::provenance::Grade::Approximate
    );
}
