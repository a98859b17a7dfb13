//! Output bundle
//!
//! ```text
//! <out>/
//!   epochs.json     reconciled period records
//!   years.json      calendar-year aggregates
//!   flags.json      every flag with its history
//!   registry.json   off-chain registry analytics
//!   status.json     provenance, counters, validation, link outcome
//!   manifest.json   CRC32 of each file above, input digest
//! ```
//!
//! Every file is pretty JSON with a trailing newline. Maps are BTreeMaps
//! and vectors arrive sorted, so identical runs write identical bytes.

use std::fs;
use std::path::Path;

use serde::Serialize;

use super::errors::{PipelineError, PipelineResult};
use super::run::AuditRun;
use crate::flags::FlagSummary;
use crate::linker::{AmbiguousLink, Cluster, EntityLink};
use crate::observability::{log_event, Event, MetricsSnapshot};
use crate::provenance::{OutputManifest, ProvenanceStub};
use crate::snapshot::{BalanceDiscontinuity, NormalizeIssue, SeriesGap};
use crate::validate::ValidationReport;

pub const EPOCHS_FILE: &str = "epochs.json";
pub const YEARS_FILE: &str = "years.json";
pub const FLAGS_FILE: &str = "flags.json";
pub const REGISTRY_FILE: &str = "registry.json";
pub const STATUS_FILE: &str = "status.json";

/// Files listed in the manifest, in write order
pub const OUTPUT_FILES: [&str; 5] = [EPOCHS_FILE, YEARS_FILE, FLAGS_FILE, REGISTRY_FILE, STATUS_FILE];

#[derive(Serialize)]
struct StatusDocument<'a> {
    provenance: &'a ProvenanceStub,
    metrics: &'a MetricsSnapshot,
    flags: &'a FlagSummary,
    validation: &'a ValidationReport,
    issues: &'a [NormalizeIssue],
    gaps: &'a [SeriesGap],
    discontinuities: &'a [BalanceDiscontinuity],
    clusters: &'a [Cluster],
    links: &'a [EntityLink],
    similar_links: &'a [EntityLink],
    ambiguous_links: &'a [AmbiguousLink],
}

fn write_json<T: Serialize + ?Sized>(dir: &Path, name: &str, value: &T) -> PipelineResult<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    let path = dir.join(name);
    fs::write(&path, &bytes).map_err(|source| PipelineError::Write { path, source })?;
    let size = bytes.len().to_string();
    log_event(Event::OutputWritten, &[("file", name), ("bytes", size.as_str())]);
    Ok(())
}

/// Write every output file for `run` into `dir`, then the manifest.
pub fn write_outputs(dir: &Path, run: &AuditRun) -> PipelineResult<OutputManifest> {
    fs::create_dir_all(dir).map_err(|source| PipelineError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    write_json(dir, EPOCHS_FILE, &run.reconciliation.records)?;
    write_json(dir, YEARS_FILE, &run.years)?;
    write_json(dir, FLAGS_FILE, &run.flags.flags)?;
    write_json(dir, REGISTRY_FILE, &run.registry)?;
    write_json(
        dir,
        STATUS_FILE,
        &StatusDocument {
            provenance: &run.provenance,
            metrics: &run.metrics,
            flags: &run.flags.summary,
            validation: &run.validation,
            issues: &run.series.issues,
            gaps: &run.series.gaps,
            discontinuities: &run.series.discontinuities,
            clusters: run.ledger.clusters(),
            links: run.ledger.links(),
            similar_links: run.ledger.similar_links(),
            ambiguous_links: run.ledger.ambiguous_links(),
        },
    )?;

    let mut manifest = OutputManifest::for_batch(&run.provenance);
    for name in OUTPUT_FILES {
        manifest.record_file(dir, name)?;
    }
    manifest.write_to(dir)?;
    let batch = manifest.batch_id.to_string();
    log_event(Event::ManifestWritten, &[("batch_id", batch.as_str())]);
    Ok(manifest)
}
