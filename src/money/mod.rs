//! Exact monetary values and protocol rates
//!
//! All ledger amounts are integers in the smallest currency unit. Rates are
//! decimal rationals parsed from their textual form, never floats. Rounding
//! happens exactly once, when a value is rendered for display.

mod amount;
mod rate;

pub use amount::{DisplayUnit, Money};
pub(crate) use amount::deserialize_opt_amount;
pub use rate::{Rate, RateParseError};
