//! Audit run driver
//!
//! normalize → reconcile → aggregate → link → flag → registry → validate,
//! each stage wrapped in an observation scope. A run is a pure function of
//! the input bundle, the config, the prior flags and `observed_at`.

use chrono::{DateTime, Utc};

use super::errors::PipelineResult;
use super::input::InputBundle;
use crate::aggregate::{aggregate_years, YearAggregate};
use crate::config::AuditConfig;
use crate::flags::rules::RuleContext;
use crate::flags::{FlagEngine, FlagRecord, FlagRun};
use crate::linker::UnifiedFlowLedger;
use crate::observability::{log_event, Event, MetricsRegistry, MetricsSnapshot, ObservationScope};
use crate::provenance::{check_network, sha256, ProvenanceStub};
use crate::reconcile::{reconcile_series, ReconciliationRun};
use crate::registry::{registry_report, RegistryReport};
use crate::snapshot::NormalizedSeries;
use crate::validate::{validate_series, ValidationReport};

/// Everything one run produced
#[derive(Debug, Clone)]
pub struct AuditRun {
    pub series: NormalizedSeries,
    pub reconciliation: ReconciliationRun,
    pub years: Vec<YearAggregate>,
    pub ledger: UnifiedFlowLedger,
    pub flags: FlagRun,
    pub registry: RegistryReport,
    pub validation: ValidationReport,
    pub provenance: ProvenanceStub,
    pub metrics: MetricsSnapshot,
}

/// Run the full audit over one input bundle.
///
/// `input_bytes` is the raw document the bundle was parsed from; its digest
/// identifies the batch.
pub fn run_audit(
    bundle: &InputBundle,
    input_bytes: &[u8],
    config: &AuditConfig,
    prior_flags: &[FlagRecord],
    observed_at: DateTime<Utc>,
) -> PipelineResult<AuditRun> {
    let metrics = MetricsRegistry::new();
    log_event(Event::RunStart, &[("network", bundle.network_name.as_str())]);

    let network_notes = check_network(
        &bundle.network_name,
        &config.expected_network,
        config.allow_non_mainnet,
    )
    .map_err(|e| {
        let reason = e.to_string();
        log_event(Event::RunAborted, &[("reason", reason.as_str())]);
        e
    })?;
    for note in &network_notes {
        log_event(Event::NetworkOverride, &[("note", note.as_str())]);
    }

    let source_kind = bundle.source_kind()?;
    let series = normalize_stage(bundle, &metrics)?;

    let scope = ObservationScope::new("RECONCILE");
    let reconciliation = reconcile_series(&series, &config.reconcile_options(), &metrics);
    let signals = reconciliation.signals.len().to_string();
    log_event(Event::ReconcileComplete, &[("signals", signals.as_str())]);
    scope.complete();

    let years = aggregate_years(&reconciliation.records, &series.gaps, &config.display_unit);
    let year_count = years.len().to_string();
    log_event(Event::AggregateComplete, &[("years", year_count.as_str())]);

    let scope = ObservationScope::new("LINK");
    let ledger = match UnifiedFlowLedger::build(bundle.entities.clone(), &config.link_policy(), &metrics) {
        Ok(ledger) => ledger,
        Err(e) => {
            scope.fail(&e.to_string());
            return Err(e.into());
        }
    };
    let clusters = ledger.clusters().len().to_string();
    scope.complete_with_fields(&[("clusters", clusters.as_str())]);

    let scope = ObservationScope::new("FLAGS");
    let flags = FlagEngine::with_builtin_rules(config.parallel).and_then(|engine| {
        let ctx = RuleContext::new(
            &reconciliation.records,
            &reconciliation.signals,
            &ledger,
            &config.rules,
        );
        engine.run(
            &ctx,
            prior_flags,
            &bundle.clearances,
            observed_at,
            &bundle.data_tip,
            &metrics,
        )
    });
    let flags = match flags {
        Ok(run) => run,
        Err(e) => {
            scope.fail(&e.to_string());
            return Err(e.into());
        }
    };
    scope.complete();

    let registry = registry_report(
        ledger.entities(),
        &config.registry_units,
        &config.rules.heavy_recipient_unit,
        config.rules.heavy_recipient_percentile,
    );

    let validation = validate_series(&reconciliation.records, &years, &series.issues);
    let tally = format!(
        "{}/{}/{}",
        validation.passed, validation.warned, validation.failed
    );
    if validation.is_pass() {
        log_event(Event::ValidationComplete, &[("pass_warn_fail", tally.as_str())]);
    } else {
        log_event(Event::ValidationFailed, &[("pass_warn_fail", tally.as_str())]);
    }

    let mut provenance = ProvenanceStub::new(
        bundle.network_name.trim().to_ascii_lowercase(),
        bundle.data_tip.clone(),
        observed_at,
        source_kind,
        &sha256(input_bytes),
    )
    .with_notes(network_notes);
    if !series.issues.is_empty() {
        provenance.downgrade(format!(
            "{} source row(s) rejected during normalization",
            series.issues.len()
        ));
    }

    let batch = provenance.batch_id.to_string();
    log_event(Event::RunComplete, &[("batch_id", batch.as_str())]);

    Ok(AuditRun {
        series,
        reconciliation,
        years,
        ledger,
        flags,
        registry,
        validation,
        provenance,
        metrics: metrics.snapshot(),
    })
}

fn normalize_stage(bundle: &InputBundle, metrics: &MetricsRegistry) -> PipelineResult<NormalizedSeries> {
    let scope = ObservationScope::new("NORMALIZE");
    let series = match bundle.normalize() {
        Ok(series) => series,
        Err(e) => {
            scope.fail(&e.to_string());
            return Err(e);
        }
    };

    for gap in &series.gaps {
        metrics.increment_series_gaps();
        let first = gap.first_missing().to_string();
        let last = gap.last_missing().to_string();
        log_event(
            Event::SeriesGap,
            &[("first_missing", first.as_str()), ("last_missing", last.as_str())],
        );
    }
    for jump in &series.discontinuities {
        let period = jump.period_id.to_string();
        let previous_end = jump.previous_end.to_string();
        let start = jump.start.to_string();
        log_event(
            Event::BalanceDiscontinuity,
            &[
                ("period_id", period.as_str()),
                ("previous_end", previous_end.as_str()),
                ("start", start.as_str()),
            ],
        );
    }
    for issue in &series.issues {
        metrics.increment_rows_rejected();
        let period = issue.period_id.to_string();
        log_event(
            Event::RowRejected,
            &[("period_id", period.as_str()), ("reason", issue.reason.as_str())],
        );
    }

    let periods = series.snapshots.len().to_string();
    log_event(Event::SeriesNormalized, &[("periods", periods.as_str())]);
    scope.complete_with_fields(&[("periods", periods.as_str())]);
    Ok(series)
}
