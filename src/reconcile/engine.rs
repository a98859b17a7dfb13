//! Reconciliation Engine
//!
//! Treats the observed treasury delta as ground truth and solves for the
//! residual (`implied_outflow_other`) that balances it against the model
//! estimate and the explicit flows. Reconciliation therefore cannot fail to
//! balance; it characterizes how much movement is unexplained.
//!
//! Per-period work only reads immutable input and is fanned out with rayon.
//! The sign-flip trend pass runs afterwards, in order.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::record::{DegradedCause, ReconciledRecord, ToleranceOutcome};
use super::tolerance::{apply_sign_flip, collect_signals, evaluate_ratio, ToleranceSignal};
use crate::estimator::{estimate, EstimatorError, EstimatorResult, FlowEstimate};
use crate::money::{DisplayUnit, Rate};
use crate::observability::{log_event, Event, MetricsRegistry};
use crate::snapshot::{ExplicitFlow, FlowKind, NormalizedSeries, PeriodId, PeriodSnapshot};

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOptions {
    /// Residual ratio above which a period is marked for review
    pub tolerance: Rate,
    /// Unit used for the `display` renderings
    pub display_unit: DisplayUnit,
    /// Fan periods out across the rayon pool
    pub parallel: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            tolerance: Rate::percent(25),
            display_unit: DisplayUnit::default(),
            parallel: true,
        }
    }
}

/// Output of a full-series reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationRun {
    pub records: Vec<ReconciledRecord>,
    pub signals: Vec<ToleranceSignal>,
}

/// Reconcile one period from its snapshot, estimate and explicit flows.
///
/// Never fails. A missing opening balance, an estimator error or a flow
/// total outside i64 leaves the estimate null and names the cause in
/// `degraded`.
pub fn reconcile_period(
    snapshot: &PeriodSnapshot,
    estimate: &EstimatorResult<FlowEstimate>,
    flows: &[&ExplicitFlow],
    options: &ReconcileOptions,
) -> ReconciledRecord {
    // i128 accumulators: negating i64::MIN or summing many large rows
    // cannot overflow here
    let mut by_kind: BTreeMap<FlowKind, i128> = BTreeMap::new();
    let mut outflow: i128 = 0;
    let mut inflow_other: i128 = 0;
    let mut withdrawn: i128 = 0;
    let mut evidence_refs = Vec::with_capacity(flows.len());

    for flow in flows {
        let amount = flow.amount as i128;
        *by_kind.entry(flow.kind).or_insert(0) += amount;
        if amount < 0 {
            outflow -= amount;
            if flow.kind.is_withdrawal() {
                withdrawn -= amount;
            }
        } else {
            inflow_other += amount;
        }
        evidence_refs.push(flow.evidence_ref.clone());
    }

    let mut overflow = None;
    let explicit_outflow = narrow("explicit_outflow", outflow, &mut overflow);
    let explicit_inflow_other = narrow("explicit_inflow_other", inflow_other, &mut overflow);
    let withdrawals = narrow("withdrawals", withdrawn, &mut overflow);
    let explicit_by_kind: BTreeMap<FlowKind, i64> = by_kind
        .into_iter()
        .map(|(kind, total)| (kind, narrow("explicit_by_kind", total, &mut overflow)))
        .collect();

    let treasury_delta = snapshot.treasury_delta();

    let mut degraded = None;
    let mut model: Option<FlowEstimate> = None;
    match (estimate, snapshot.treasury_balance_start) {
        (_, None) => {
            degraded = Some(DegradedCause::SeriesBoundary {
                missing: "treasury_balance_start".to_string(),
            });
        }
        (Err(err), Some(_)) => degraded = Some(DegradedCause::from(err)),
        (Ok(est), Some(_)) => model = Some(*est),
    }
    if let Some(cause) = overflow {
        degraded = Some(cause);
        model = None;
    }

    let implied_outflow_other = match (model, treasury_delta) {
        (Some(est), Some(delta)) => {
            let implied = est.inflow_est as i128 + explicit_inflow_other as i128
                - delta as i128
                - explicit_outflow as i128;
            match i64::try_from(implied) {
                Ok(v) => Some(v),
                Err(_) => {
                    degraded = Some(out_of_range("implied_outflow_other", implied));
                    model = None;
                    None
                }
            }
        }
        _ => None,
    };

    let tolerance = match (implied_outflow_other, treasury_delta) {
        (Some(implied), Some(delta)) => {
            let (exceeded, ratio) = evaluate_ratio(implied, delta, options.tolerance);
            ToleranceOutcome {
                evaluated: true,
                threshold: options.tolerance,
                residual_ratio: Some(ratio),
                exceeded,
                sign_flip: false,
            }
        }
        _ => ToleranceOutcome::not_evaluated(options.tolerance),
    };

    let monetary_expansion_est = model.map(|m| m.monetary_expansion_est);
    let inflow_est = model.map(|m| m.inflow_est);

    let unit = &options.display_unit;
    let mut display = BTreeMap::new();
    display.insert("fees".to_string(), Some(unit.format(snapshot.fees)));
    display.insert(
        "treasury_balance_start".to_string(),
        unit.format_opt(snapshot.treasury_balance_start),
    );
    display.insert(
        "treasury_balance_end".to_string(),
        Some(unit.format(snapshot.treasury_balance_end)),
    );
    display.insert(
        "reserves_balance_start".to_string(),
        unit.format_opt(snapshot.reserves_balance_start),
    );
    display.insert(
        "monetary_expansion_est".to_string(),
        unit.format_opt(monetary_expansion_est),
    );
    display.insert("inflow_est".to_string(), unit.format_opt(inflow_est));
    display.insert("treasury_delta".to_string(), unit.format_opt(treasury_delta));
    display.insert("explicit_outflow".to_string(), Some(unit.format(explicit_outflow)));
    display.insert(
        "explicit_inflow_other".to_string(),
        Some(unit.format(explicit_inflow_other)),
    );
    display.insert("withdrawals".to_string(), Some(unit.format(withdrawals)));
    display.insert(
        "implied_outflow_other".to_string(),
        unit.format_opt(implied_outflow_other),
    );

    ReconciledRecord {
        snapshot: snapshot.clone(),
        monetary_expansion_est,
        inflow_est,
        treasury_delta,
        explicit_outflow,
        explicit_inflow_other,
        explicit_by_kind,
        withdrawals,
        implied_outflow_other,
        evidence_refs,
        tolerance,
        degraded,
        display,
    }
}

/// Estimate and reconcile every period of a normalized series.
pub fn reconcile_series(
    series: &NormalizedSeries,
    options: &ReconcileOptions,
    metrics: &MetricsRegistry,
) -> ReconciliationRun {
    let mut by_period: BTreeMap<PeriodId, Vec<&ExplicitFlow>> = BTreeMap::new();
    for flow in &series.flows {
        by_period.entry(flow.period_id).or_default().push(flow);
    }

    let work = |snapshot: &PeriodSnapshot| -> ReconciledRecord {
        let flows = by_period
            .get(&snapshot.period_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let est = estimate(snapshot);
        let record = reconcile_period(snapshot, &est, flows, options);
        metrics.increment_periods_reconciled();
        if let Some(cause) = &record.degraded {
            metrics.increment_periods_degraded();
            let period = snapshot.period_id.to_string();
            let reason = match cause {
                DegradedCause::SeriesBoundary { missing } => format!("missing {}", missing),
                DegradedCause::InvalidParameter {
                    parameter, reason, ..
                } => format!("{} {}", parameter, reason),
            };
            log_event(
                Event::PeriodDegraded,
                &[("period_id", period.as_str()), ("reason", reason.as_str())],
            );
        }
        record
    };

    // collect() on an indexed parallel iterator keeps input order
    let mut records: Vec<ReconciledRecord> = if options.parallel {
        series.snapshots.par_iter().map(work).collect()
    } else {
        series.snapshots.iter().map(work).collect()
    };

    apply_sign_flip(&mut records);
    let signals = collect_signals(&records);
    for signal in &signals {
        metrics.increment_tolerance_signals();
        let kind = format!("{:?}", signal.kind);
        let period = signal.period_id.to_string();
        log_event(
            Event::ToleranceSignal,
            &[
                ("kind", kind.as_str()),
                ("period_id", period.as_str()),
                ("residual_ratio", signal.residual_ratio.as_str()),
            ],
        );
    }

    ReconciliationRun { records, signals }
}

fn out_of_range(parameter: &'static str, value: i128) -> DegradedCause {
    DegradedCause::from(&EstimatorError::InvalidParameter {
        parameter,
        value: value.to_string(),
        reason: "exceeds arithmetic range",
    })
}

/// Narrow a flow total to i64, saturating and recording the first overflow
fn narrow(parameter: &'static str, total: i128, overflow: &mut Option<DegradedCause>) -> i64 {
    i64::try_from(total).unwrap_or_else(|_| {
        overflow.get_or_insert_with(|| out_of_range(parameter, total));
        if total < 0 {
            i64::MIN
        } else {
            i64::MAX
        }
    })
}
