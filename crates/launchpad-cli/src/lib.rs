//! Command-line runtime for the Launchpad orchestrator.
//!
//! The module owns argument parsing, configuration bootstrapping and the
//! dispatch of subcommands onto the registry, runtime, artifact and publish
//! crates. Every invocation is short-lived: it loads the registry and runtime
//! state afresh, acts and exits with `0` only when every selected
//! application succeeded.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;

mod audit;
mod cli;
mod commands;
mod config;
mod errors;
mod output;
mod sync;
mod telemetry;

use cli::Cli;
use commands::Workspace;
use config::{ConfigLoader, OrthoConfigLoader, command_arguments, split_config_arguments};
use errors::AppError;

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&args);

    let cli = match Cli::try_parse_from(command_arguments(&args, &split)) {
        Ok(cli) => cli,
        Err(error) if !error.use_stderr() => {
            // --help and --version
            let _ = write!(stdout, "{error}");
            return ExitCode::SUCCESS;
        }
        Err(error) => {
            let _ = write!(stderr, "{}", AppError::CliUsage(error));
            return ExitCode::FAILURE;
        }
    };

    let result = loader.load(&split.config_arguments).and_then(|config| {
        telemetry::initialise(&config)?;
        let workspace = Workspace::new(config);
        commands::dispatch(&workspace, cli.command, stdout)
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::BatchFailed { failed, total }) => {
            let _ = writeln!(stderr, "{failed} of {total} applications failed");
            ExitCode::FAILURE
        }
        Err(error) => {
            let _ = writeln!(stderr, "error: {error}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests;
