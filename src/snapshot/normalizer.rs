//! Snapshot Normalizer
//!
//! Converts source rows into canonical `PeriodSnapshot` and `ExplicitFlow`
//! records and reports the shape of the series:
//! - gaps in `period_id` are reported, never filled or skipped silently
//! - opening balances that disagree with the prior closing balance are
//!   reported as discontinuities
//! - rows that cannot form a period are dropped with a recorded issue (the
//!   hole they leave then shows up as a gap)

use serde::{Deserialize, Serialize};

use super::errors::{NormalizeError, NormalizeIssue, NormalizeResult};
use super::source::{ApiSnapshotRow, LedgerIndexRow};
use super::types::{ExplicitFlow, FlowKind, PeriodId, PeriodSnapshot};

/// A run of missing period ids between two present periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesGap {
    /// Last present period before the gap
    pub after: PeriodId,
    /// First present period after the gap
    pub before: PeriodId,
}

impl SeriesGap {
    /// First missing period id
    pub fn first_missing(&self) -> PeriodId {
        self.after + 1
    }

    /// Last missing period id
    pub fn last_missing(&self) -> PeriodId {
        self.before - 1
    }

    /// Number of missing periods
    pub fn missing_count(&self) -> u64 {
        self.before - self.after - 1
    }
}

/// An opening balance that does not match the prior period's close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDiscontinuity {
    pub period_id: PeriodId,
    pub previous_end: i64,
    pub start: i64,
}

/// Normalized series ready for estimation and reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedSeries {
    pub snapshots: Vec<PeriodSnapshot>,
    pub flows: Vec<ExplicitFlow>,
    pub gaps: Vec<SeriesGap>,
    pub discontinuities: Vec<BalanceDiscontinuity>,
    pub issues: Vec<NormalizeIssue>,
}

impl NormalizedSeries {
    /// Flows belonging to one period, in input order
    pub fn flows_for(&self, period_id: PeriodId) -> Vec<&ExplicitFlow> {
        self.flows.iter().filter(|f| f.period_id == period_id).collect()
    }
}

/// Normalize ledger-index rows.
///
/// Rows must arrive ordered by epoch; out-of-order or duplicate epochs are
/// structural errors.
pub fn normalize_ledger_rows(rows: &[LedgerIndexRow]) -> NormalizeResult<NormalizedSeries> {
    check_order(rows.iter().map(|r| r.epoch_no))?;

    let mut snapshots = Vec::with_capacity(rows.len());
    let mut flows = Vec::new();
    let mut issues = Vec::new();

    for row in rows {
        let Some(fees) = row.fees_epoch else {
            issues.push(NormalizeIssue::new(row.epoch_no, "fees_epoch missing"));
            continue;
        };
        let Some(treasury_end) = row.treasury_end else {
            issues.push(NormalizeIssue::new(row.epoch_no, "treasury_end missing"));
            continue;
        };
        if row.end_time < row.start_time {
            issues.push(NormalizeIssue::new(row.epoch_no, "end_time precedes start_time"));
            continue;
        }

        snapshots.push(PeriodSnapshot {
            period_id: row.epoch_no,
            start_time: row.start_time,
            end_time: row.end_time,
            fees,
            treasury_balance_start: row.treasury_start,
            treasury_balance_end: treasury_end,
            reserves_balance_start: row.reserves_start,
            expansion_rate: row.rho,
            treasury_growth_rate: row.tau,
        });

        let query = row.query_ref.as_deref().unwrap_or("ledger_index");
        let columns = [
            (FlowKind::Donation, "treasury_donations", row.treasury_donations),
            (FlowKind::PotTransfer, "pot_transfer_treasury", row.pot_transfer_treasury),
            (FlowKind::MirPayment, "mir_treasury_payments", row.mir_treasury_payments),
            (
                FlowKind::GovernanceWithdrawal,
                "conway_enacted_withdrawals",
                row.conway_enacted_withdrawals,
            ),
            (FlowKind::DepositNet, "deposit_net", row.deposit_net),
        ];
        for (kind, column, value) in columns {
            match value {
                Some(raw) if raw != 0 => flows.push(ExplicitFlow::new(
                    row.epoch_no,
                    kind,
                    kind.signed(raw),
                    format!("{}/epoch/{}/{}", query, row.epoch_no, column),
                )),
                _ => {}
            }
        }
    }

    Ok(finish(snapshots, flows, issues))
}

/// Normalize consecutive API tip readings into periods.
///
/// Reading `i` opens period `epoch_i` and reading `i+1` closes it, so the
/// pair must be adjacent epochs. The last reading opens a period that has not
/// closed yet and produces nothing.
pub fn normalize_api_snapshots(rows: &[ApiSnapshotRow]) -> NormalizeResult<NormalizedSeries> {
    check_order(rows.iter().map(|r| r.epoch_no))?;

    let mut snapshots = Vec::new();
    let mut issues = Vec::new();

    for pair in rows.windows(2) {
        let (open, close) = (&pair[0], &pair[1]);
        if close.epoch_no != open.epoch_no + 1 {
            issues.push(NormalizeIssue::new(
                open.epoch_no,
                format!("no closing reading (next reading is epoch {})", close.epoch_no),
            ));
            continue;
        }
        let Some(fees) = open.fees_epoch else {
            issues.push(NormalizeIssue::new(open.epoch_no, "fees_epoch missing"));
            continue;
        };
        let Some(treasury_end) = close.treasury else {
            issues.push(NormalizeIssue::new(open.epoch_no, "closing treasury reading missing"));
            continue;
        };
        let (Some(rho), Some(tau)) = (open.rho, open.tau) else {
            issues.push(NormalizeIssue::new(open.epoch_no, "protocol rates missing"));
            continue;
        };

        snapshots.push(PeriodSnapshot {
            period_id: open.epoch_no,
            start_time: open.tip_time,
            end_time: close.tip_time,
            fees,
            treasury_balance_start: open.treasury,
            treasury_balance_end: treasury_end,
            reserves_balance_start: open.reserves,
            expansion_rate: Some(rho),
            treasury_growth_rate: Some(tau),
        });
    }

    Ok(finish(snapshots, Vec::new(), issues))
}

/// Accept already-canonical records from a collaborator.
///
/// Flows for periods that are not in the snapshot set are dropped with an
/// issue so they cannot leak into another period's totals.
pub fn normalize_canonical(
    snapshots: Vec<PeriodSnapshot>,
    flows: Vec<ExplicitFlow>,
) -> NormalizeResult<NormalizedSeries> {
    check_order(snapshots.iter().map(|s| s.period_id))?;

    let mut issues = Vec::new();
    let known: std::collections::BTreeSet<PeriodId> =
        snapshots.iter().map(|s| s.period_id).collect();
    let mut kept = Vec::with_capacity(flows.len());
    for flow in flows {
        if known.contains(&flow.period_id) {
            kept.push(flow);
        } else {
            issues.push(NormalizeIssue::new(
                flow.period_id,
                format!("{} flow for unknown period ({})", flow.kind, flow.evidence_ref),
            ));
        }
    }

    Ok(finish(snapshots, kept, issues))
}

/// Merge extra explicit flows into a normalized series.
pub fn attach_flows(series: &mut NormalizedSeries, flows: Vec<ExplicitFlow>) {
    for flow in flows {
        if series.snapshots.iter().any(|s| s.period_id == flow.period_id) {
            series.flows.push(flow);
        } else {
            series.issues.push(NormalizeIssue::new(
                flow.period_id,
                format!("{} flow for unknown period ({})", flow.kind, flow.evidence_ref),
            ));
        }
    }
}

fn check_order(ids: impl Iterator<Item = PeriodId>) -> NormalizeResult<()> {
    let mut previous: Option<PeriodId> = None;
    for id in ids {
        if let Some(prev) = previous {
            if id == prev {
                return Err(NormalizeError::DuplicatePeriod(id));
            }
            if id < prev {
                return Err(NormalizeError::OutOfOrder {
                    previous: prev,
                    found: id,
                });
            }
        }
        previous = Some(id);
    }
    Ok(())
}

fn finish(
    snapshots: Vec<PeriodSnapshot>,
    flows: Vec<ExplicitFlow>,
    issues: Vec<NormalizeIssue>,
) -> NormalizedSeries {
    let gaps = find_gaps(&snapshots);
    let discontinuities = find_discontinuities(&snapshots);
    NormalizedSeries {
        snapshots,
        flows,
        gaps,
        discontinuities,
        issues,
    }
}

/// Gaps between consecutive snapshots (input must be ordered)
pub fn find_gaps(snapshots: &[PeriodSnapshot]) -> Vec<SeriesGap> {
    snapshots
        .windows(2)
        .filter(|w| w[1].period_id > w[0].period_id + 1)
        .map(|w| SeriesGap {
            after: w[0].period_id,
            before: w[1].period_id,
        })
        .collect()
}

/// Opening balances that disagree with the adjacent prior close
pub fn find_discontinuities(snapshots: &[PeriodSnapshot]) -> Vec<BalanceDiscontinuity> {
    snapshots
        .windows(2)
        .filter(|w| w[1].period_id == w[0].period_id + 1)
        .filter_map(|w| {
            let start = w[1].treasury_balance_start?;
            (start != w[0].treasury_balance_end).then_some(BalanceDiscontinuity {
                period_id: w[1].period_id,
                previous_end: w[0].treasury_balance_end,
                start,
            })
        })
        .collect()
}
