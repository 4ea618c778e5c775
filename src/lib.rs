// Network forensic tool: case registration, pcap evidence acquisition,
// DoS/DDoS heuristics and case reports.

pub mod analysis;
pub mod capture;
pub mod case;
pub mod cli;
pub mod common;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod report;

use std::process::ExitCode;

pub use cli::Cli;
pub use error::{ForensicError, ForensicResult};

/// Execute one command. Errors are printed, never propagated as panics.
pub fn run(cli: Cli) -> ExitCode {
    match cli::execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(kind = err.kind(), error = ?err, "Command failed");
            cli::report_error(&err);
            ExitCode::FAILURE
        }
    }
}
