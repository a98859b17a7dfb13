//! Flag Engine
//!
//! Rules turn the reconciled series and the Unified Flow Ledger into
//! candidate flags; the engine folds them into the published flag set.
//!
//! - `types`: the flag record and its enums
//! - `id`: deterministic flag ids
//! - `lifecycle`: open / re-evaluate / clear / reopen
//! - `rules`: the built-in rule set
//! - `clearing`: machine checks for `clears_if`
//! - `engine`: parallel evaluation, deduplication and the run driver

mod clearing;
mod engine;
mod errors;
mod id;
mod lifecycle;
pub mod rules;
mod types;

pub use clearing::{check_clear, ClearCheck};
pub use engine::{FlagEngine, FlagRun, FlagSummary, ReviewClearance};
pub use errors::{FlagError, FlagResult};
pub use id::{flag_id, successor_id};
pub use rules::{builtin_rules, FlagRule, RuleContext, RuleThresholds, TREASURY_ENTITY};
pub use types::{
    ClearCondition, Confidence, FlagCandidate, FlagDefinition, FlagRecord, FlagTransition,
    Severity, SourceKind, TransitionKind,
};
