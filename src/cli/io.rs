//! File and stdout helpers for the CLI
//!
//! Results go to stdout as a single JSON object; logs go to stderr.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::errors::{CliError, CliResult};

/// Read a file as raw bytes, naming it in the error
pub fn read_bytes(path: &Path) -> CliResult<Vec<u8>> {
    fs::read(path).map_err(|e| CliError::input_error(format!("cannot read {}: {}", path.display(), e)))
}

/// Parse a JSON document, naming the source in the error
pub fn parse_json<T: DeserializeOwned>(path: &Path, bytes: &[u8]) -> CliResult<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| CliError::input_error(format!("{} is not valid: {}", path.display(), e)))
}

fn emit(response: &Value) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, response)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

/// `{"status": "ok", "data": …}` on stdout
pub fn write_response(data: Value) -> CliResult<()> {
    emit(&json!({"status": "ok", "data": data}))
}

/// `{"status": "error", "code": …, "message": …}` on stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    emit(&json!({"status": "error", "code": code, "message": message}))
}
