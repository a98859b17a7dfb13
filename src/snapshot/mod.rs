//! Snapshot Normalizer
//!
//! Turns ledger-index rows and API tip readings into one canonical
//! per-period record shape. Everything downstream reads only these types.

mod errors;
mod normalizer;
mod source;
mod time;
mod types;

pub use errors::{NormalizeError, NormalizeIssue, NormalizeResult};
pub use normalizer::{
    attach_flows, find_discontinuities, find_gaps, normalize_api_snapshots, normalize_canonical,
    normalize_ledger_rows, BalanceDiscontinuity, NormalizedSeries, SeriesGap,
};
pub use source::{ApiSnapshotRow, LedgerIndexRow};
pub use time::parse_utc;
pub use types::{ExplicitFlow, FlowKind, PeriodId, PeriodSnapshot};
