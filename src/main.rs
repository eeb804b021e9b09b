//! EdControls CLI - command-line client for the EdControls platform

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = edcontrols_cli::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
