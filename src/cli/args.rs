//! CLI argument definitions using clap
//!
//! Commands:
//! - treasury-audit run --input <path> --out <dir> [--config <path>] [--prior-flags <path>] [--observed-at <rfc3339>]
//! - treasury-audit validate --input <path> [--config <path>]
//! - treasury-audit init-config --path <path>
//! - treasury-audit verify --out <dir>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Treasury reconciliation and flag-scoring engine
#[derive(Parser, Debug)]
#[command(name = "treasury-audit")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reconcile, link and flag one input bundle, writing the output set
    Run {
        /// Input bundle (JSON)
        #[arg(long)]
        input: PathBuf,

        /// Configuration file; defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory
        #[arg(long)]
        out: PathBuf,

        /// flags.json from an earlier run, whose history is carried forward
        #[arg(long)]
        prior_flags: Option<PathBuf>,

        /// Observation time stamped on flags and provenance (RFC 3339)
        #[arg(long)]
        observed_at: Option<String>,
    },

    /// Reconcile an input bundle and print its validation report
    Validate {
        /// Input bundle (JSON)
        #[arg(long)]
        input: PathBuf,

        /// Configuration file; defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Write a configuration file holding every default
    InitConfig {
        /// Where to write the file
        #[arg(long, default_value = "./treasury-audit.json")]
        path: PathBuf,
    },

    /// Check an output directory against its manifest
    Verify {
        /// Output directory
        #[arg(long)]
        out: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "treasury-audit",
            "run",
            "--input",
            "bundle.json",
            "--out",
            "out",
            "--observed-at",
            "2024-01-01T00:00:00Z",
        ])
        .unwrap();
        match cli.command {
            Command::Run {
                input,
                config,
                observed_at,
                ..
            } => {
                assert_eq!(input, PathBuf::from("bundle.json"));
                assert!(config.is_none());
                assert_eq!(observed_at.as_deref(), Some("2024-01-01T00:00:00Z"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_run_requires_out() {
        assert!(Cli::try_parse_from(["treasury-audit", "run", "--input", "bundle.json"]).is_err());
    }
}
