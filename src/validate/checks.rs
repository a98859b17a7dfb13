//! Series checks
//!
//! Run over reconciled records and year aggregates, whether freshly
//! computed or read back from a publication.

use super::report::ValidationReport;
use crate::aggregate::YearAggregate;
use crate::reconcile::ReconciledRecord;
use crate::snapshot::NormalizeIssue;

/// Periods per year outside this range mark an unusual year
pub const YEAR_PERIODS_MIN: u64 = 50;
pub const YEAR_PERIODS_MAX: u64 = 80;

/// Unusual years tolerated before the count check warns (first and last)
const PARTIAL_YEARS_ALLOWED: usize = 2;

pub fn validate_records(report: &mut ValidationReport, records: &[ReconciledRecord]) {
    report.pass("rows", format!("loaded {} periods", records.len()));

    // monotonic ids
    let steps: Vec<(u64, u64)> = records
        .windows(2)
        .map(|w| (w[0].period_id(), w[1].period_id()))
        .collect();
    if steps.iter().all(|(a, b)| *b == a + 1) {
        report.pass("monotonic", "period ids strictly increase by one");
    } else if steps.iter().all(|(a, b)| b > a) {
        let gaps = steps.iter().filter(|(a, b)| *b != a + 1).count();
        report.warn("monotonic", format!("period ids increase but have {} gap(s)", gaps));
    } else {
        report.fail("monotonic", "period ids are not increasing");
    }

    // identity
    let broken: Vec<String> = records
        .iter()
        .filter(|r| matches!(r.identity_residual(), Some(v) if v != 0))
        .map(|r| r.period_id().to_string())
        .collect();
    let checked = records.iter().filter(|r| r.identity_residual().is_some()).count();
    if broken.is_empty() {
        report.pass("identity", format!("reconciliation identity holds for {} periods", checked));
    } else {
        report.fail(
            "identity",
            format!("identity broken in periods {}", broken.join(", ")),
        );
    }

    let review = records.iter().filter(|r| r.tolerance.needs_review()).count();
    if review == 0 {
        report.pass("tolerance", "no period exceeds the residual tolerance");
    } else {
        report.warn(
            "tolerance",
            format!(
                "{} of {} evaluated periods marked for review",
                review,
                records.iter().filter(|r| r.tolerance.evaluated).count()
            ),
        );
    }

    let degraded = records.iter().filter(|r| r.degraded.is_some()).count();
    if degraded == 0 {
        report.pass("estimates", "every period carries an estimate");
    } else {
        report.warn("estimates", format!("{} period(s) have no estimate", degraded));
    }

    // continuity over adjacent ids with both balances present
    let pairs: Vec<bool> = records
        .windows(2)
        .filter(|w| w[1].period_id() == w[0].period_id() + 1)
        .filter_map(|w| {
            let start = w[1].snapshot.treasury_balance_start?;
            Some(start == w[0].snapshot.treasury_balance_end)
        })
        .collect();
    if pairs.is_empty() {
        report.warn("continuity", "no adjacent period pairs with both balances");
    } else {
        let mismatches = pairs.iter().filter(|ok| !**ok).count();
        if mismatches == 0 {
            report.pass(
                "continuity",
                format!("closing balance matches next opening for {} pairs", pairs.len()),
            );
        } else {
            report.warn(
                "continuity",
                format!("balance continuity mismatch in {} transition(s)", mismatches),
            );
        }
    }

    let negative_fees = records.iter().filter(|r| r.snapshot.fees < 0).count();
    if negative_fees == 0 {
        report.pass("fees", "no negative fees");
    } else {
        report.fail("fees", format!("{} period(s) have negative fees", negative_fees));
    }

    let negative_balances = records
        .iter()
        .filter(|r| r.snapshot.treasury_balance_end < 0)
        .count();
    if negative_balances == 0 {
        report.pass("balances", "no negative treasury balances");
    } else {
        report.fail(
            "balances",
            format!("{} period(s) have a negative treasury balance", negative_balances),
        );
    }

    if let Some(latest) = records.iter().map(|r| r.snapshot.end_time).max() {
        report.pass("freshness", format!("latest period ends {}", latest.to_rfc3339()));
    }
}

pub fn validate_issues(report: &mut ValidationReport, issues: &[NormalizeIssue]) {
    if issues.is_empty() {
        report.pass("rows_rejected", "no source rows rejected");
    } else {
        let periods: Vec<String> = issues.iter().map(|i| i.period_id.to_string()).collect();
        report.warn(
            "rows_rejected",
            format!("{} source row(s) rejected (periods {})", issues.len(), periods.join(", ")),
        );
    }
}

pub fn validate_years(report: &mut ValidationReport, years: &[YearAggregate]) {
    let (Some(first), Some(last)) = (years.first(), years.last()) else {
        report.warn("years", "no year aggregates");
        return;
    };
    report.pass("years", format!("{} years ({}–{})", years.len(), first.year, last.year));

    if years.windows(2).all(|w| w[0].year < w[1].year) {
        report.pass("year_order", "years are increasing");
    } else {
        report.fail("year_order", "years are not sorted");
    }

    let unusual = years
        .iter()
        .filter(|y| y.periods < YEAR_PERIODS_MIN || y.periods > YEAR_PERIODS_MAX)
        .count();
    let min = years.iter().map(|y| y.periods).min().unwrap_or(0);
    let max = years.iter().map(|y| y.periods).max().unwrap_or(0);
    if unusual <= PARTIAL_YEARS_ALLOWED {
        report.pass(
            "year_periods",
            format!("periods per year look reasonable ({}–{})", min, max),
        );
    } else {
        report.warn(
            "year_periods",
            format!("{} years have unusual period counts", unusual),
        );
    }

    let gaps: usize = years.iter().map(|y| y.gap_warnings.len()).sum();
    if gaps > 0 {
        report.warn("year_gaps", format!("{} series gap warning(s) attached to years", gaps));
    }
}
