//! Canonical per-period records
//!
//! These are the only shapes the estimator and reconciliation engine see.
//! Both are immutable once produced by the normalizer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Rate;

/// Ledger period (epoch) number
pub type PeriodId = u64;

/// One ledger period as observed at extraction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSnapshot {
    pub period_id: PeriodId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Fees collected in the period, smallest unit
    pub fees: i64,
    /// `None` at a series boundary
    pub treasury_balance_start: Option<i64>,
    pub treasury_balance_end: i64,
    /// `None` at a series boundary
    pub reserves_balance_start: Option<i64>,
    /// ρ, absent when the source did not report it
    pub expansion_rate: Option<Rate>,
    /// τ, absent when the source did not report it
    pub treasury_growth_rate: Option<Rate>,
}

impl PeriodSnapshot {
    /// True when both opening balances needed by the inflow model are known.
    pub fn has_opening_balances(&self) -> bool {
        self.treasury_balance_start.is_some() && self.reserves_balance_start.is_some()
    }

    /// Observed treasury movement, `None` without an opening balance
    pub fn treasury_delta(&self) -> Option<i64> {
        self.treasury_balance_start
            .and_then(|start| self.treasury_balance_end.checked_sub(start))
    }
}

/// Category of an attributable treasury flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    /// Voluntary donation into the treasury
    Donation,
    /// Transfer between reserves and treasury pots
    PotTransfer,
    /// Legacy instantaneous-reward payment out of the treasury
    MirPayment,
    /// Enacted governance treasury withdrawal
    GovernanceWithdrawal,
    /// Net deposit movement routed through the treasury
    DepositNet,
}

impl FlowKind {
    pub const ALL: [FlowKind; 5] = [
        FlowKind::Donation,
        FlowKind::PotTransfer,
        FlowKind::MirPayment,
        FlowKind::GovernanceWithdrawal,
        FlowKind::DepositNet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::Donation => "donation",
            FlowKind::PotTransfer => "pot_transfer",
            FlowKind::MirPayment => "mir_payment",
            FlowKind::GovernanceWithdrawal => "governance_withdrawal",
            FlowKind::DepositNet => "deposit_net",
        }
    }

    /// Kinds that only ever move funds out of the treasury.
    ///
    /// Together these form the canonical withdrawal series.
    pub fn is_withdrawal(&self) -> bool {
        matches!(self, FlowKind::MirPayment | FlowKind::GovernanceWithdrawal)
    }

    /// Apply the sign convention to a magnitude reported by a source column.
    ///
    /// Withdrawal kinds are always negative. Donations are reported as
    /// inflows. Transfers and deposits carry their own sign.
    pub fn signed(&self, raw: i64) -> i64 {
        if self.is_withdrawal() {
            -(raw.saturating_abs())
        } else {
            raw
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A classified, attributable flow item for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplicitFlow {
    pub period_id: PeriodId,
    pub kind: FlowKind,
    /// Inflow positive, outflow negative
    pub amount: i64,
    /// Query or transaction reference the amount came from
    pub evidence_ref: String,
}

impl ExplicitFlow {
    pub fn new(period_id: PeriodId, kind: FlowKind, amount: i64, evidence_ref: impl Into<String>) -> Self {
        Self {
            period_id,
            kind,
            amount,
            evidence_ref: evidence_ref.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot(start: Option<i64>, end: i64) -> PeriodSnapshot {
        PeriodSnapshot {
            period_id: 1,
            start_time: Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2021, 1, 6, 0, 0, 0).unwrap(),
            fees: 0,
            treasury_balance_start: start,
            treasury_balance_end: end,
            reserves_balance_start: Some(1),
            expansion_rate: None,
            treasury_growth_rate: None,
        }
    }

    #[test]
    fn test_treasury_delta() {
        assert_eq!(snapshot(Some(10), 25).treasury_delta(), Some(15));
        assert_eq!(snapshot(None, 25).treasury_delta(), None);
    }

    #[test]
    fn test_withdrawal_sign_convention() {
        assert_eq!(FlowKind::MirPayment.signed(500), -500);
        assert_eq!(FlowKind::GovernanceWithdrawal.signed(-500), -500);
        assert_eq!(FlowKind::Donation.signed(500), 500);
        assert_eq!(FlowKind::PotTransfer.signed(-7), -7);
    }

    #[test]
    fn test_flow_kind_serde_names() {
        let json = serde_json::to_string(&FlowKind::GovernanceWithdrawal).unwrap();
        assert_eq!(json, "\"governance_withdrawal\"");
        for kind in FlowKind::ALL {
            let back: FlowKind =
                serde_json::from_str(&format!("\"{}\"", kind.as_str())).unwrap();
            assert_eq!(back, kind);
        }
    }
}
