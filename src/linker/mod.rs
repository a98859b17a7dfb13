//! Evidence Linker
//!
//! Joins entity records from independent indices into the Unified Flow
//! Ledger under confidence gating. Only high and medium links merge.

mod entity;
mod errors;
mod ledger;
mod link;
mod normalize;

pub use entity::{
    sum_in_unit, EntityRecord, IndexKind, IndexRef, MoneyTotal, ProjectRecord, ProjectStatus,
    ScaledSum, TotalKind,
};
pub use errors::{LinkError, LinkResult};
pub use ledger::{AmbiguousLink, Cluster, LinkPolicy, UnifiedFlowLedger};
pub use link::{Confidence, EntityLink, LinkBasis, LinkEvidence, PairOutcome};
pub use normalize::{identifier, AttributeNormalizer};
