//! Shared fixtures for the integration tests
//!
//! Input bundles are built as JSON text, the way the CLI receives them.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use treasury_audit::config::AuditConfig;
use treasury_audit::flags::FlagRecord;
use treasury_audit::pipeline::{run_audit, AuditRun, InputBundle};

pub fn observed_at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 3, day, 0, 0, 0).unwrap()
}

pub fn serial_config() -> AuditConfig {
    AuditConfig {
        parallel: false,
        ..AuditConfig::default()
    }
}

/// One ledger-index row at protocol rates 0.003 / 0.2 with 1 ADA of fees
pub fn ledger_row(epoch: u64, start_day: u32, treasury_start: i64, treasury_end: i64) -> Value {
    json!({
        "epoch_no": epoch,
        "start_time": format!("2023-03-{:02} 21:44:00", start_day),
        "end_time": format!("2023-03-{:02} 21:44:00", start_day + 5),
        "fees_epoch": 1_000_000,
        "treasury_start": treasury_start,
        "treasury_end": treasury_end,
        "reserves_start": 500_000_000,
        "rho": "0.003",
        "tau": "0.2",
    })
}

/// Period 100 closes `close_100`; period 101 follows on from it with
/// the same 500_000 inflow and no residual.
pub fn two_period_rows(close_100: i64) -> Vec<Value> {
    vec![
        ledger_row(100, 1, 10_000_000, close_100),
        ledger_row(101, 6, close_100, close_100 + 500_000),
    ]
}

pub fn bundle_text(rows: Vec<Value>, entities: Vec<Value>, clearances: Vec<Value>) -> String {
    serde_json::to_string_pretty(&json!({
        "network_name": "mainnet",
        "data_tip": {"block_no": 8_500_000, "tip_time": "2023-03-12T00:00:00Z"},
        "ledger_rows": rows,
        "entities": entities,
        "clearances": clearances,
    }))
    .unwrap()
}

pub fn run_text(text: &str, prior: &[FlagRecord], day: u32) -> AuditRun {
    let bundle = InputBundle::from_json(text).unwrap();
    run_audit(&bundle, text.as_bytes(), &serial_config(), prior, observed_at(day)).unwrap()
}

pub fn offchain(id: &str, username: &str, avatar: &str) -> Value {
    json!({
        "entity_id": id,
        "index": {"name": "catalyst", "kind": "offchain"},
        "username": username,
        "avatar_id": avatar,
    })
}

pub fn flags_of<'a>(run: &'a AuditRun, rule_id: &str) -> Vec<&'a FlagRecord> {
    run.flags.flags.iter().filter(|f| f.rule_id == rule_id).collect()
}
