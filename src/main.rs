//! treasury-audit entry point
//!
//! Parses arguments and dispatches through `cli::run`. Errors are reported
//! as a JSON error response on stdout and a plain line on stderr, then the
//! process exits non-zero.

use treasury_audit::cli;

fn main() {
    if let Err(e) = cli::run() {
        let _ = cli::write_error(e.code_str(), e.message());
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
