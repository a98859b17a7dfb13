//! Audit pipeline
//!
//! - `input`: the input bundle and its single period source
//! - `run`: stage driver producing an `AuditRun`
//! - `output`: the published file set and its manifest

mod errors;
mod input;
mod output;
mod run;

pub use errors::{PipelineError, PipelineResult};
pub use input::InputBundle;
pub use output::{
    write_outputs, EPOCHS_FILE, FLAGS_FILE, OUTPUT_FILES, REGISTRY_FILE, STATUS_FILE, YEARS_FILE,
};
pub use run::{run_audit, AuditRun};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuditConfig;
    use crate::provenance::{Grade, InputSource, OutputManifest};
    use chrono::{TimeZone, Utc};

    const LEDGER_INPUT: &str = r#"{
        "network_name": "mainnet",
        "data_tip": {"block_no": 9000000, "tip_time": "2023-03-12T00:00:00Z"},
        "ledger_rows": [
            {"epoch_no": 100, "start_time": "2023-03-01 21:44:00", "end_time": "2023-03-06 21:44:00",
             "fees_epoch": 1000000, "treasury_start": 10000000, "treasury_end": 10300000,
             "reserves_start": 500000000, "rho": "0.003", "tau": "0.2"},
            {"epoch_no": 101, "start_time": "2023-03-06 21:44:00", "end_time": "2023-03-11 21:44:00",
             "fees_epoch": 1000000, "treasury_start": 10300000, "treasury_end": 10800000,
             "reserves_start": 498500000, "rho": "0.003", "tau": "0.2",
             "mir_treasury_payments": 100000}
        ]
    }"#;

    fn observed_at() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 3, 12, 0, 0, 0).unwrap()
    }

    fn run_ledger(config: &AuditConfig) -> AuditRun {
        let bundle = InputBundle::from_json(LEDGER_INPUT).unwrap();
        run_audit(&bundle, LEDGER_INPUT.as_bytes(), config, &[], observed_at()).unwrap()
    }

    #[test]
    fn test_ledger_run_end_to_end() {
        let mut config = AuditConfig::default();
        config.parallel = false;
        let run = run_ledger(&config);

        assert_eq!(run.reconciliation.records.len(), 2);
        for record in &run.reconciliation.records {
            assert_eq!(record.identity_residual(), Some(0));
        }
        assert_eq!(run.years.len(), 1);
        assert_eq!(run.provenance.source_kind, InputSource::LedgerIndex);
        assert_eq!(run.provenance.grade, Grade::AuditGrade);
        assert_eq!(run.metrics.periods_reconciled, 2);
        assert!(run
            .flags
            .flags
            .iter()
            .any(|f| f.rule_id == "F-RECON-RESIDUAL" && f.scope == "period:100"));
    }

    #[test]
    fn test_network_mismatch_aborts() {
        let text = LEDGER_INPUT.replacen("mainnet", "preprod", 1);
        let bundle = InputBundle::from_json(&text).unwrap();
        let err = run_audit(&bundle, text.as_bytes(), &AuditConfig::default(), &[], observed_at())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Provenance(_)));

        let mut config = AuditConfig::default();
        config.allow_non_mainnet = true;
        let run = run_audit(&bundle, text.as_bytes(), &config, &[], observed_at()).unwrap();
        assert_eq!(run.provenance.network_name, "preprod");
        assert_eq!(run.provenance.notes.len(), 1);
    }

    #[test]
    fn test_outputs_and_manifest_verify() {
        let dir = tempfile::tempdir().unwrap();
        let run = run_ledger(&AuditConfig::default());
        let manifest = write_outputs(dir.path(), &run).unwrap();

        assert_eq!(manifest.files.len(), OUTPUT_FILES.len());
        let loaded = OutputManifest::read_from(dir.path()).unwrap();
        assert_eq!(loaded, manifest);
        assert!(loaded.verify(dir.path()).unwrap().is_empty());

        std::fs::write(dir.path().join(FLAGS_FILE), b"[]\n").unwrap();
        assert_eq!(loaded.verify(dir.path()).unwrap(), vec![FLAGS_FILE.to_string()]);
    }

    #[test]
    fn test_parallel_and_serial_write_same_bytes() {
        let serial_dir = tempfile::tempdir().unwrap();
        let parallel_dir = tempfile::tempdir().unwrap();

        let mut serial = AuditConfig::default();
        serial.parallel = false;
        write_outputs(serial_dir.path(), &run_ledger(&serial)).unwrap();
        write_outputs(parallel_dir.path(), &run_ledger(&AuditConfig::default())).unwrap();

        for name in OUTPUT_FILES {
            let a = std::fs::read(serial_dir.path().join(name)).unwrap();
            let b = std::fs::read(parallel_dir.path().join(name)).unwrap();
            assert_eq!(a, b, "{} differs", name);
        }
    }
}
