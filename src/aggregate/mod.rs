//! Aggregator
//!
//! Calendar-year rollups of reconciled periods, with partial-year labels
//! and series-gap warnings.

mod completeness;
mod year;

pub use completeness::{period_year, PartialReason};
pub use year::{aggregate_years, CountedSum, YearAggregate};
