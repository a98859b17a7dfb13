//! Reconciled per-period record
//!
//! The identity
//!
//! ```text
//! treasury_delta = inflow_est + explicit_inflow_other
//!                  − explicit_outflow − implied_outflow_other
//! ```
//!
//! holds exactly for every record that carries an estimate, because
//! `implied_outflow_other` is solved from it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::estimator::EstimatorError;
use crate::money::Rate;
use crate::snapshot::{FlowKind, PeriodId, PeriodSnapshot};

/// Why a record carries no estimate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DegradedCause {
    /// An opening balance is unknown (start of series)
    SeriesBoundary { missing: String },
    /// A rate or balance was outside its valid domain
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
}

impl From<&EstimatorError> for DegradedCause {
    fn from(err: &EstimatorError) -> Self {
        match err {
            EstimatorError::InvalidParameter {
                parameter,
                value,
                reason,
            } => DegradedCause::InvalidParameter {
                parameter: parameter.to_string(),
                value: value.clone(),
                reason: reason.to_string(),
            },
            EstimatorError::MissingInput(field) => DegradedCause::SeriesBoundary {
                missing: field.to_string(),
            },
        }
    }
}

/// Tolerance evaluation for one period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToleranceOutcome {
    /// False when the record had no estimate to test
    pub evaluated: bool,
    pub threshold: Rate,
    /// `|implied| / max(1, |delta|)` rendered to six decimals, floored
    pub residual_ratio: Option<String>,
    /// Ratio above threshold
    pub exceeded: bool,
    /// Residual changed sign against the prior period with no explicit flow
    /// to account for it
    pub sign_flip: bool,
}

impl ToleranceOutcome {
    pub(crate) fn not_evaluated(threshold: Rate) -> Self {
        Self {
            evaluated: false,
            threshold,
            residual_ratio: None,
            exceeded: false,
            sign_flip: false,
        }
    }

    /// True when the period should be reviewed
    pub fn needs_review(&self) -> bool {
        self.exceeded || self.sign_flip
    }
}

/// One reconciled period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledRecord {
    #[serde(flatten)]
    pub snapshot: PeriodSnapshot,
    pub monetary_expansion_est: Option<i64>,
    pub inflow_est: Option<i64>,
    pub treasury_delta: Option<i64>,
    /// `−Σ amount` over outflow rows, non-negative
    pub explicit_outflow: i64,
    /// `Σ amount` over inflow rows
    pub explicit_inflow_other: i64,
    /// Net signed amount per flow kind
    pub explicit_by_kind: BTreeMap<FlowKind, i64>,
    /// Canonical withdrawal series: MIR payments plus governance
    /// withdrawals, as a non-negative magnitude
    pub withdrawals: i64,
    /// Balancing residual, labeled alternative to `withdrawals`
    pub implied_outflow_other: Option<i64>,
    pub evidence_refs: Vec<String>,
    pub tolerance: ToleranceOutcome,
    pub degraded: Option<DegradedCause>,
    /// Display-unit renderings keyed by field name
    pub display: BTreeMap<String, Option<String>>,
}

impl ReconciledRecord {
    pub fn period_id(&self) -> PeriodId {
        self.snapshot.period_id
    }

    /// True when the record carries an estimate
    pub fn has_estimate(&self) -> bool {
        self.inflow_est.is_some()
    }

    /// Left-over of the reconciliation identity; `Some(0)` for every record
    /// with an estimate.
    pub fn identity_residual(&self) -> Option<i128> {
        let delta = self.treasury_delta? as i128;
        let inflow = self.inflow_est? as i128;
        let implied = self.implied_outflow_other? as i128;
        Some(
            delta
                - (inflow + self.explicit_inflow_other as i128
                    - self.explicit_outflow as i128
                    - implied),
        )
    }

    /// True when any explicit flow row was attached
    pub fn has_explicit_flows(&self) -> bool {
        !self.explicit_by_kind.is_empty()
    }
}
