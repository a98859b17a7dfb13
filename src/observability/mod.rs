//! Observability
//!
//! - structured one-line JSON logs (`Logger`)
//! - the closed pipeline event vocabulary (`Event`)
//! - run counters (`MetricsRegistry`), published with the status output
//! - stage scopes (`ObservationScope`)
//!
//! Observability is write-only from the pipeline's point of view: nothing
//! here feeds back into results.

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log a pipeline event at the severity its class implies
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_fatal() {
        Severity::Fatal
    } else if event.is_warning() {
        Severity::Warn
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}
