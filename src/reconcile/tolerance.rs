//! Tolerance policy and review signals
//!
//! A period is marked for review when
//! - `|implied| / max(1, |delta|)` exceeds the configured ratio, or
//! - its residual flips sign against the immediately prior period's residual
//!   and the period carries no explicit flow that could explain the flip.
//!
//! A marked period is a signal for the flag engine, not an error.

use serde::{Deserialize, Serialize};

use super::record::ReconciledRecord;
use crate::money::Rate;
use crate::snapshot::PeriodId;

/// Scale used for the displayed residual ratio
const RATIO_DISPLAY_DIGITS: u32 = 6;

/// Why a period was marked
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// `|implied| / max(1, |delta|)` above the tolerance
    RatioExceeded,
    /// Residual sign changed against the adjacent prior period
    SignFlip,
}

/// A period marked for review, handed to the flag engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToleranceSignal {
    pub period_id: PeriodId,
    pub kind: SignalKind,
    pub implied_outflow_other: i64,
    pub treasury_delta: i64,
    /// Tolerance the ratio was tested against
    pub threshold: Rate,
    /// Six-decimal rendering, floored
    pub residual_ratio: String,
    /// True when `|implied| >= max(1, |delta|)`
    pub residual_dominates: bool,
    /// Residual of the adjacent prior period, when there is one
    pub prior_implied_outflow_other: Option<i64>,
    /// Explicit flow references of the period
    pub evidence_refs: Vec<String>,
}

/// Ratio test for one period. Returns `(exceeded, ratio_display)`.
pub fn evaluate_ratio(implied: i64, delta: i64, threshold: Rate) -> (bool, String) {
    let part = implied.unsigned_abs() as u128;
    let whole = (delta.unsigned_abs() as u128).max(1);
    (threshold.is_exceeded_by(part, whole), format_ratio(part, whole))
}

fn format_ratio(part: u128, whole: u128) -> String {
    let scale = 10u128.pow(RATIO_DISPLAY_DIGITS);
    let scaled = part.saturating_mul(scale) / whole;
    format!(
        "{}.{:0width$}",
        scaled / scale,
        scaled % scale,
        width = RATIO_DISPLAY_DIGITS as usize
    )
}

/// Sequential trend pass over an ordered record series.
///
/// Only adjacent period ids are compared; a gap resets the trend.
pub fn apply_sign_flip(records: &mut [ReconciledRecord]) {
    for i in 1..records.len() {
        let (head, tail) = records.split_at_mut(i);
        let prior = &head[i - 1];
        let current = &mut tail[0];

        if current.period_id() != prior.period_id() + 1 {
            continue;
        }
        let (Some(prev), Some(cur)) = (prior.implied_outflow_other, current.implied_outflow_other) else {
            continue;
        };
        if prev == 0 || cur == 0 {
            continue;
        }
        if prev.signum() != cur.signum() && !current.has_explicit_flows() {
            current.tolerance.sign_flip = true;
        }
    }
}

/// Collect review signals from reconciled records, in period order.
pub fn collect_signals(records: &[ReconciledRecord]) -> Vec<ToleranceSignal> {
    let mut signals = Vec::new();
    let mut prior: Option<&ReconciledRecord> = None;

    for record in records {
        let tol = &record.tolerance;
        if let (true, Some(implied), Some(delta)) =
            (tol.evaluated, record.implied_outflow_other, record.treasury_delta)
        {
            let prior_implied = prior
                .filter(|p| p.period_id() + 1 == record.period_id())
                .and_then(|p| p.implied_outflow_other);
            let ratio = tol.residual_ratio.clone().unwrap_or_default();
            let dominates = implied.unsigned_abs() >= delta.unsigned_abs().max(1);

            for (flagged, kind) in [
                (tol.exceeded, SignalKind::RatioExceeded),
                (tol.sign_flip, SignalKind::SignFlip),
            ] {
                if flagged {
                    signals.push(ToleranceSignal {
                        period_id: record.period_id(),
                        kind,
                        implied_outflow_other: implied,
                        treasury_delta: delta,
                        threshold: tol.threshold,
                        residual_ratio: ratio.clone(),
                        residual_dominates: dominates,
                        prior_implied_outflow_other: prior_implied,
                        evidence_refs: record.evidence_refs.clone(),
                    });
                }
            }
        }
        prior = Some(record);
    }

    signals
}
