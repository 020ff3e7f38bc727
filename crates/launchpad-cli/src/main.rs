//! CLI entrypoint for the Launchpad orchestrator.
//!
//! The binary delegates to [`launchpad_cli::run`], which loads configuration,
//! parses the subcommand and reports per-application results.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    launchpad_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
