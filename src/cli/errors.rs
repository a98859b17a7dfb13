//! CLI-specific error types
//!
//! Every CLI error ends the process with a non-zero exit.

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::pipeline::PipelineError;
use crate::provenance::ProvenanceError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (files, stdout)
    IoError,
    /// Input bundle or prior flags could not be read
    InputError,
    /// The audit run aborted
    RunFailed,
    /// The series failed one or more validation checks
    ValidationFailed,
    /// Output files do not match their manifest
    VerifyFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "AUDIT_CLI_CONFIG_ERROR",
            Self::IoError => "AUDIT_CLI_IO_ERROR",
            Self::InputError => "AUDIT_CLI_INPUT_ERROR",
            Self::RunFailed => "AUDIT_CLI_RUN_FAILED",
            Self::ValidationFailed => "AUDIT_CLI_VALIDATION_FAILED",
            Self::VerifyFailed => "AUDIT_CLI_VERIFY_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn input_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InputError, msg)
    }

    pub fn run_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::RunFailed, msg)
    }

    pub fn validation_failed(failed: u64) -> Self {
        Self::new(
            CliErrorCode::ValidationFailed,
            format!("{} validation check(s) failed", failed),
        )
    }

    pub fn verify_failed(files: &[String]) -> Self {
        Self::new(
            CliErrorCode::VerifyFailed,
            format!("checksum mismatch: {}", files.join(", ")),
        )
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::MixedSources(_) | PipelineError::OrphanFlows => {
                Self::input_error(e.to_string())
            }
            PipelineError::Write { .. } => Self::io_error(e.to_string()),
            other => Self::run_failed(other.to_string()),
        }
    }
}

impl From<ProvenanceError> for CliError {
    fn from(e: ProvenanceError) -> Self {
        Self::io_error(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_code() {
        let err = CliError::validation_failed(2);
        assert_eq!(
            err.to_string(),
            "AUDIT_CLI_VALIDATION_FAILED: 2 validation check(s) failed"
        );
        assert_eq!(err.code(), &CliErrorCode::ValidationFailed);
    }

    #[test]
    fn test_mixed_sources_is_input_error() {
        let err: CliError = PipelineError::MixedSources("ledger_rows, snapshots".into()).into();
        assert_eq!(err.code_str(), "AUDIT_CLI_INPUT_ERROR");
    }
}
