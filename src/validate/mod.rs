//! Series validation
//!
//! Sanity checks over a reconciled series: monotonic ids, gaps, balance
//! continuity, the reconciliation identity, negative fees and balances,
//! year ordering and per-year period counts. Failures make a run unfit for
//! publication; warnings are reported and carried.

mod checks;
mod report;

pub use checks::{validate_issues, validate_records, validate_years, YEAR_PERIODS_MAX, YEAR_PERIODS_MIN};
pub use report::{CheckResult, CheckStatus, ValidationReport};

use crate::aggregate::YearAggregate;
use crate::reconcile::ReconciledRecord;
use crate::snapshot::NormalizeIssue;

/// Run every check
pub fn validate_series(
    records: &[ReconciledRecord],
    years: &[YearAggregate],
    issues: &[NormalizeIssue],
) -> ValidationReport {
    let mut report = ValidationReport::new();
    validate_records(&mut report, records);
    validate_issues(&mut report, issues);
    validate_years(&mut report, years);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate_years;
    use crate::money::{DisplayUnit, Rate};
    use crate::observability::MetricsRegistry;
    use crate::reconcile::{reconcile_series, ReconcileOptions};
    use crate::snapshot::{find_gaps, NormalizedSeries, PeriodSnapshot};
    use chrono::{Duration, TimeZone, Utc};

    fn series(ids: &[u64], fees: i64) -> NormalizedSeries {
        let t0 = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let mut balance = 1_000_000i64;
        let snapshots: Vec<PeriodSnapshot> = ids
            .iter()
            .map(|&id| {
                let start = t0 + Duration::days(5 * (id as i64 - 100));
                let open = balance;
                balance += 100;
                PeriodSnapshot {
                    period_id: id,
                    start_time: start,
                    end_time: start + Duration::days(5),
                    fees,
                    treasury_balance_start: Some(open),
                    treasury_balance_end: balance,
                    reserves_balance_start: Some(10_000),
                    expansion_rate: Some(Rate::parse("0.003").unwrap()),
                    treasury_growth_rate: Some(Rate::parse("0.2").unwrap()),
                }
            })
            .collect();
        NormalizedSeries {
            gaps: find_gaps(&snapshots),
            snapshots,
            ..NormalizedSeries::default()
        }
    }

    fn report_for(series: &NormalizedSeries) -> ValidationReport {
        let options = ReconcileOptions {
            parallel: false,
            ..ReconcileOptions::default()
        };
        let run = reconcile_series(series, &options, &MetricsRegistry::new());
        let years = aggregate_years(&run.records, &series.gaps, &DisplayUnit::default());
        validate_series(&run.records, &years, &series.issues)
    }

    #[test]
    fn test_gaps_warn_but_pass() {
        let report = report_for(&series(&[100, 101, 103], 1_000));
        assert_eq!(report.status_of("monotonic"), Some(CheckStatus::Warn));
        assert_eq!(report.status_of("identity"), Some(CheckStatus::Pass));
        assert!(report.is_pass());
    }

    #[test]
    fn test_negative_fees_fail() {
        let report = report_for(&series(&[100, 101], -5));
        assert_eq!(report.status_of("fees"), Some(CheckStatus::Fail));
        assert!(!report.is_pass());
        assert!(report.to_string().contains("[FAIL]"));
    }

    #[test]
    fn test_continuity_mismatch_warns() {
        let mut s = series(&[100, 101], 1_000);
        s.snapshots[1].treasury_balance_start = Some(42);
        let report = report_for(&s);
        assert_eq!(report.status_of("continuity"), Some(CheckStatus::Warn));
    }

    #[test]
    fn test_unsorted_years_fail() {
        let s = series(&[100, 101], 1_000);
        let options = ReconcileOptions::default();
        let run = reconcile_series(&s, &options, &MetricsRegistry::new());
        let mut years = aggregate_years(&run.records, &[], &DisplayUnit::default());
        let mut later = years[0].clone();
        later.year = 2020;
        years.push(later);

        let mut report = ValidationReport::new();
        validate_years(&mut report, &years);
        assert_eq!(report.status_of("year_order"), Some(CheckStatus::Fail));
    }
}
