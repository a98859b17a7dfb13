//! CLI module
//!
//! Provides command-line interface for:
//! - run: full audit of one input bundle into an output directory
//! - validate: validation report only
//! - init-config: write a default configuration file
//! - verify: check outputs against their manifest

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{audit, init_config, run, run_command, validate, verify};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
