//! Typed pipeline events
//!
//! Every stage of a run emits one of these, so log consumers can rely on a
//! closed vocabulary.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Run lifecycle
    RunStart,
    RunComplete,
    RunAborted,

    ConfigLoaded,
    InputLoaded,
    /// Input came from a network other than the expected one
    NetworkOverride,

    // Normalization
    SeriesNormalized,
    SeriesGap,
    BalanceDiscontinuity,
    RowRejected,

    // Reconciliation / aggregation
    /// A period's estimate is null
    PeriodDegraded,
    ToleranceSignal,
    ReconcileComplete,
    AggregateComplete,

    // Linking and flags
    LinksResolved,
    FlagsEvaluated,
    FlagCleared,
    FlagReopened,
    /// A group flag kept its id after the group's membership changed
    FlagCarried,
    /// A review clearance did not match an open human-review flag
    ClearanceIgnored,

    // Output
    OutputWritten,
    ManifestWritten,

    // Validation
    ValidationComplete,
    ValidationFailed,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::RunStart => "AUDIT_RUN_BEGIN",
            Event::RunComplete => "AUDIT_RUN_COMPLETE",
            Event::RunAborted => "AUDIT_RUN_ABORTED",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::InputLoaded => "INPUT_LOADED",
            Event::NetworkOverride => "NETWORK_OVERRIDE",
            Event::SeriesNormalized => "SERIES_NORMALIZED",
            Event::SeriesGap => "SERIES_GAP",
            Event::BalanceDiscontinuity => "BALANCE_DISCONTINUITY",
            Event::RowRejected => "ROW_REJECTED",
            Event::PeriodDegraded => "PERIOD_ESTIMATE_DEGRADED",
            Event::ToleranceSignal => "TOLERANCE_SIGNAL",
            Event::ReconcileComplete => "RECONCILE_COMPLETE",
            Event::AggregateComplete => "AGGREGATE_COMPLETE",
            Event::LinksResolved => "LINKS_RESOLVED",
            Event::FlagsEvaluated => "FLAGS_EVALUATED",
            Event::FlagCleared => "FLAG_CLEARED",
            Event::FlagReopened => "FLAG_REOPENED",
            Event::FlagCarried => "FLAG_CARRIED",
            Event::ClearanceIgnored => "CLEARANCE_IGNORED",
            Event::OutputWritten => "OUTPUT_WRITTEN",
            Event::ManifestWritten => "MANIFEST_WRITTEN",
            Event::ValidationComplete => "VALIDATION_COMPLETE",
            Event::ValidationFailed => "VALIDATION_FAILED",
        }
    }

    /// Events that end the run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::RunAborted)
    }

    /// Events that describe degraded input rather than progress
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Event::NetworkOverride
                | Event::SeriesGap
                | Event::BalanceDiscontinuity
                | Event::RowRejected
                | Event::PeriodDegraded
                | Event::ValidationFailed
                | Event::ClearanceIgnored
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
