//! CLI command implementations
//!
//! Each command loads its config, sets the log threshold, does its work and
//! prints one JSON response on stdout.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::config::AuditConfig;
use crate::flags::FlagRecord;
use crate::observability::{log_event, Event, Logger};
use crate::pipeline::{run_audit, write_outputs, InputBundle};
use crate::provenance::OutputManifest;
use crate::snapshot::parse_utc;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{parse_json, read_bytes, write_response};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Run {
            input,
            config,
            out,
            prior_flags,
            observed_at,
        } => audit(
            &input,
            config.as_deref(),
            &out,
            prior_flags.as_deref(),
            observed_at.as_deref(),
        ),
        Command::Validate { input, config } => validate(&input, config.as_deref()),
        Command::InitConfig { path } => init_config(&path),
        Command::Verify { out } => verify(&out),
    }
}

fn load_config(path: Option<&Path>) -> CliResult<AuditConfig> {
    let config = match path {
        Some(path) => AuditConfig::load(path)?,
        None => AuditConfig::default(),
    };
    Logger::set_min_severity(config.log_severity());
    let source = path.map(|p| p.display().to_string()).unwrap_or_else(|| "defaults".to_string());
    log_event(Event::ConfigLoaded, &[("source", source.as_str())]);
    Ok(config)
}

fn load_input(path: &Path) -> CliResult<(InputBundle, Vec<u8>)> {
    let bytes = read_bytes(path)?;
    let bundle: InputBundle = parse_json(path, &bytes)?;
    let size = bytes.len().to_string();
    log_event(
        Event::InputLoaded,
        &[("network", bundle.network_name.as_str()), ("bytes", size.as_str())],
    );
    Ok((bundle, bytes))
}

fn parse_observed_at(text: Option<&str>) -> CliResult<DateTime<Utc>> {
    match text {
        Some(text) => parse_utc(text)
            .ok_or_else(|| CliError::input_error(format!("unrecognized --observed-at '{}'", text))),
        None => Ok(Utc::now()),
    }
}

/// Run the full audit and write the output set
pub fn audit(
    input: &Path,
    config_path: Option<&Path>,
    out: &Path,
    prior_flags: Option<&Path>,
    observed_at: Option<&str>,
) -> CliResult<()> {
    let config = load_config(config_path)?;
    let (bundle, bytes) = load_input(input)?;
    let prior: Vec<FlagRecord> = match prior_flags {
        Some(path) => parse_json(path, &read_bytes(path)?)?,
        None => Vec::new(),
    };
    let observed_at = parse_observed_at(observed_at)?;

    let run = run_audit(&bundle, &bytes, &config, &prior, observed_at)?;
    let manifest = write_outputs(out, &run)?;

    write_response(json!({
        "batch_id": manifest.batch_id.to_string(),
        "grade": run.provenance.grade,
        "periods": run.reconciliation.records.len(),
        "years": run.years.len(),
        "flags": run.flags.summary,
        "validation": {
            "passed": run.validation.passed,
            "warned": run.validation.warned,
            "failed": run.validation.failed,
        },
        "files": manifest.files,
    }))
}

/// Reconcile without writing outputs; fails when any check fails
pub fn validate(input: &Path, config_path: Option<&Path>) -> CliResult<()> {
    let config = load_config(config_path)?;
    let (bundle, bytes) = load_input(input)?;
    let run = run_audit(&bundle, &bytes, &config, &[], parse_observed_at(None)?)?;

    eprintln!("{}", run.validation);
    write_response(serde_json::to_value(&run.validation)?)?;
    if run.validation.is_pass() {
        Ok(())
    } else {
        Err(CliError::validation_failed(run.validation.failed))
    }
}

/// Write a config file holding every default, refusing to overwrite
pub fn init_config(path: &Path) -> CliResult<()> {
    if path.exists() {
        return Err(CliError::config_error(format!(
            "{} already exists",
            path.display()
        )));
    }
    AuditConfig::default().write_to(path)?;
    write_response(json!({"written": path.display().to_string()}))
}

/// Re-checksum an output directory against its manifest
pub fn verify(out: &Path) -> CliResult<()> {
    let manifest = OutputManifest::read_from(out)?;
    let mismatched = manifest.verify(out)?;
    if !mismatched.is_empty() {
        return Err(CliError::verify_failed(&mismatched));
    }
    write_response(json!({
        "batch_id": manifest.batch_id.to_string(),
        "files": manifest.files.len(),
    }))
}
