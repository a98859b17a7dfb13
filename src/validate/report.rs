//! Validation report

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Warn => "WARN",
            CheckStatus::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check: String,
    pub status: CheckStatus,
    pub message: String,
}

/// Pass/warn/fail tally over a published series
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: u64,
    pub warned: u64,
    pub failed: u64,
    pub checks: Vec<CheckResult>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, check: &str, status: CheckStatus, message: impl Into<String>) {
        match status {
            CheckStatus::Pass => self.passed += 1,
            CheckStatus::Warn => self.warned += 1,
            CheckStatus::Fail => self.failed += 1,
        }
        self.checks.push(CheckResult {
            check: check.to_string(),
            status,
            message: message.into(),
        });
    }

    pub fn pass(&mut self, check: &str, message: impl Into<String>) {
        self.push(check, CheckStatus::Pass, message);
    }

    pub fn warn(&mut self, check: &str, message: impl Into<String>) {
        self.push(check, CheckStatus::Warn, message);
    }

    pub fn fail(&mut self, check: &str, message: impl Into<String>) {
        self.push(check, CheckStatus::Fail, message);
    }

    /// True when nothing failed; warnings do not fail a report
    pub fn is_pass(&self) -> bool {
        self.failed == 0
    }

    pub fn total(&self) -> u64 {
        self.passed + self.warned + self.failed
    }

    pub fn status_of(&self, check: &str) -> Option<CheckStatus> {
        self.checks.iter().find(|c| c.check == check).map(|c| c.status)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.checks {
            writeln!(f, "  [{}] {}: {}", c.status.as_str(), c.check, c.message)?;
        }
        let status = if self.is_pass() { "PASS" } else { "FAIL" };
        write!(
            f,
            "  [{}] {}/{} passed, {} warnings, {} failures",
            status,
            self.passed,
            self.total(),
            self.warned,
            self.failed
        )
    }
}
