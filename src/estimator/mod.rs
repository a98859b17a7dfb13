//! Flow Estimator
//!
//! Applies the protocol inflow model to one canonical period. Pure, no I/O,
//! exact integer arithmetic on the smallest currency unit.

mod errors;
mod model;

pub use errors::{EstimatorError, EstimatorResult};
pub use model::{estimate, FlowEstimate};
