//! Reconciliation Engine
//!
//! - `engine`: per-period residual derivation and series driver
//! - `record`: the reconciled record and its degradation markers
//! - `tolerance`: review policy and signals for the flag engine

mod engine;
mod record;
mod tolerance;

pub use engine::{reconcile_period, reconcile_series, ReconcileOptions, ReconciliationRun};
pub use record::{DegradedCause, ReconciledRecord, ToleranceOutcome};
pub use tolerance::{apply_sign_flip, collect_signals, evaluate_ratio, SignalKind, ToleranceSignal};
