//! CLI and Output Bundle Tests
//!
//! - `run` writes the full output set plus a manifest that verifies
//! - identical input and observation time give byte-identical outputs
//! - prior flags given on the command line carry history forward
//! - a group flag keeps its id when the group gains a member
//! - stdout carries exactly one JSON response; log lines go to stderr
//! - tampering is caught by `verify`

mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command as Process, Output};

use tempfile::TempDir;

use common::{bundle_text, offchain, two_period_rows};
use treasury_audit::cli::{run_command, CliErrorCode, Command};
use treasury_audit::flags::FlagRecord;
use treasury_audit::pipeline::{FLAGS_FILE, OUTPUT_FILES, STATUS_FILE};
use treasury_audit::provenance::MANIFEST_FILE;

// =============================================================================
// Test Utilities
// =============================================================================

fn write_input(dir: &Path, text: &str) -> PathBuf {
    let path = dir.join("bundle.json");
    fs::write(&path, text).unwrap();
    path
}

fn sample_input() -> String {
    bundle_text(
        two_period_rows(10_300_000),
        vec![
            offchain("cat-1", "alice", "avatar-42"),
            offchain("cat-2", "alicia", "avatar-42"),
        ],
        vec![],
    )
}

fn run_into(input: &Path, out: &Path, prior: Option<PathBuf>, at: &str) {
    run_command(Command::Run {
        input: input.to_path_buf(),
        config: None,
        out: out.to_path_buf(),
        prior_flags: prior,
        observed_at: Some(at.to_string()),
    })
    .unwrap();
}

// =============================================================================
// Output set
// =============================================================================

#[test]
fn test_run_writes_every_file_and_manifest() {
    let work = TempDir::new().unwrap();
    let input = write_input(work.path(), &sample_input());
    let out = work.path().join("out");

    run_into(&input, &out, None, "2023-03-12T00:00:00Z");

    for name in OUTPUT_FILES.iter().chain([MANIFEST_FILE].iter()) {
        assert!(out.join(name).is_file(), "{} missing", name);
    }
    let status: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join(STATUS_FILE)).unwrap()).unwrap();
    assert_eq!(status["provenance"]["network_name"], "mainnet");
    assert_eq!(status["provenance"]["grade"], "audit_grade");
    assert_eq!(status["metrics"]["periods_reconciled"], 2);

    run_command(Command::Verify { out: out.clone() }).unwrap();
}

#[test]
fn test_outputs_are_byte_identical_across_runs() {
    let work = TempDir::new().unwrap();
    let input = write_input(work.path(), &sample_input());
    let a = work.path().join("a");
    let b = work.path().join("b");

    run_into(&input, &a, None, "2023-03-12T00:00:00Z");
    run_into(&input, &b, None, "2023-03-12T00:00:00Z");

    for name in OUTPUT_FILES.iter().chain([MANIFEST_FILE].iter()) {
        let left = fs::read(a.join(name)).unwrap();
        let right = fs::read(b.join(name)).unwrap();
        assert_eq!(left, right, "{} differs between runs", name);
    }
}

// =============================================================================
// Flag history across invocations
// =============================================================================

#[test]
fn test_prior_flags_carry_forward() {
    let work = TempDir::new().unwrap();
    let input = write_input(work.path(), &sample_input());
    let first = work.path().join("first");
    let second = work.path().join("second");

    run_into(&input, &first, None, "2023-03-12T00:00:00Z");
    run_into(&input, &second, Some(first.join(FLAGS_FILE)), "2023-03-13T00:00:00Z");

    let read = |dir: &Path| -> Vec<FlagRecord> {
        serde_json::from_str(&fs::read_to_string(dir.join(FLAGS_FILE)).unwrap()).unwrap()
    };
    let before = read(&first);
    let after = read(&second);

    assert!(!before.is_empty());
    let ids = |flags: &[FlagRecord]| flags.iter().map(|f| f.flag_id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&before), ids(&after));
    for (old, new) in before.iter().zip(&after) {
        assert_eq!(new.history[..old.history.len()], old.history[..]);
    }
}

#[test]
fn test_avatar_flag_keeps_id_when_lower_holder_joins() {
    let work = TempDir::new().unwrap();
    let input = write_input(work.path(), &sample_input());
    let first = work.path().join("first");
    run_into(&input, &first, None, "2023-03-12T00:00:00Z");

    let grown = bundle_text(
        two_period_rows(10_300_000),
        vec![
            offchain("cat-0", "al", "avatar-42"),
            offchain("cat-1", "alice", "avatar-42"),
            offchain("cat-2", "alicia", "avatar-42"),
        ],
        vec![],
    );
    let grown_input = work.path().join("grown.json");
    fs::write(&grown_input, grown).unwrap();
    let second = work.path().join("second");
    run_into(&grown_input, &second, Some(first.join(FLAGS_FILE)), "2023-03-13T00:00:00Z");

    let avatar_flags = |dir: &Path| -> Vec<FlagRecord> {
        let all: Vec<FlagRecord> =
            serde_json::from_str(&fs::read_to_string(dir.join(FLAGS_FILE)).unwrap()).unwrap();
        all.into_iter().filter(|f| f.rule_id == "F-DUP-AVATAR").collect()
    };
    let before = avatar_flags(&first);
    let after = avatar_flags(&second);

    assert_eq!(before.len(), 1);
    assert_eq!(after.len(), 1, "one avatar must stay one flag");
    assert_eq!(after[0].flag_id, before[0].flag_id);
    assert!(after[0].is_open());
    assert!(after[0].related_entity_ids.contains(&"cat-0".to_string()));
}

// =============================================================================
// Process output
// =============================================================================

fn invoke(args: &[&str]) -> Output {
    Process::new(env!("CARGO_BIN_EXE_treasury-audit"))
        .args(args)
        .output()
        .unwrap()
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_run_stdout_is_a_single_response() {
    let work = TempDir::new().unwrap();
    let input = write_input(work.path(), &sample_input());
    let out = work.path().join("out");

    let output = invoke(&[
        "run",
        "--input",
        path_arg(&input),
        "--out",
        path_arg(&out),
        "--observed-at",
        "2023-03-12T00:00:00Z",
    ]);
    assert!(output.status.success());

    let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response["status"], "ok");
    assert!(response["data"]["batch_id"].is_string());

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("\"event\":\"CONFIG_LOADED\""));
}

#[test]
fn test_validate_stdout_is_a_single_response() {
    let work = TempDir::new().unwrap();
    let input = write_input(work.path(), &sample_input());

    let output = invoke(&["validate", "--input", path_arg(&input)]);
    let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(response["status"].is_string());
}

#[test]
fn test_error_stdout_is_a_single_response() {
    let work = TempDir::new().unwrap();
    let output = invoke(&["verify", "--out", path_arg(work.path())]);

    assert!(!output.status.success());
    let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response["status"], "error");
    assert!(response["code"].as_str().unwrap().starts_with("AUDIT_CLI_"));
}

// =============================================================================
// Failure modes
// =============================================================================

#[test]
fn test_verify_detects_tampering() {
    let work = TempDir::new().unwrap();
    let input = write_input(work.path(), &sample_input());
    let out = work.path().join("out");
    run_into(&input, &out, None, "2023-03-12T00:00:00Z");

    fs::write(out.join(FLAGS_FILE), "[]\n").unwrap();
    let err = run_command(Command::Verify { out }).unwrap_err();
    assert_eq!(err.code(), &CliErrorCode::VerifyFailed);
    assert!(err.message().contains(FLAGS_FILE));
}

#[test]
fn test_wrong_network_is_refused() {
    let work = TempDir::new().unwrap();
    let text = sample_input().replacen("\"mainnet\"", "\"preview\"", 1);
    let input = write_input(work.path(), &text);

    let err = run_command(Command::Run {
        input,
        config: None,
        out: work.path().join("out"),
        prior_flags: None,
        observed_at: Some("2023-03-12T00:00:00Z".to_string()),
    })
    .unwrap_err();
    assert_eq!(err.code(), &CliErrorCode::RunFailed);
    assert!(!work.path().join("out").exists());
}

#[test]
fn test_malformed_input_is_input_error() {
    let work = TempDir::new().unwrap();
    let input = write_input(work.path(), "{\"network_name\": 7}");

    let err = run_command(Command::Validate { input, config: None }).unwrap_err();
    assert_eq!(err.code(), &CliErrorCode::InputError);
}
