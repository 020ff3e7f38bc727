//! Configuration loading helpers for the Launchpad CLI.
//!
//! Leading configuration flags are handed to `ortho_config`; everything from
//! the first other token onwards is parsed as the subcommand.

use std::ffi::{OsStr, OsString};

use launchpad_config::Config;
use ortho_config::OrthoConfig;

use crate::errors::AppError;

/// CLI flags recognised by the configuration loader that take a value.
///
/// Keep in sync with the fields of `launchpad_config::Config`.
const CONFIG_VALUE_FLAGS: &[&str] = &[
    "--config-path",
    "--registry-path",
    "--state-dir",
    "--apps-root",
    "--bind-host",
    "--log-filter",
    "--log-format",
    "--stop-grace-ms",
    "--launch-probe-ms",
    "--extra-excludes",
    "--publish-base-url",
    "--publish-board",
    "--publish-token",
    "--publish-handle",
    "--publish-password",
];

/// Boolean configuration flags.
const CONFIG_SWITCH_FLAGS: &[&str] = &[
    "--include-build-output",
    "--verify-fail-on-extra",
    "--publish-enabled",
];

pub(crate) trait ConfigLoader {
    /// Loads configuration for the CLI.
    ///
    /// # Flag Ordering
    ///
    /// Configuration flags must appear before the subcommand. Anything after
    /// the subcommand is parsed as a subcommand argument.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned())
            .map_err(AppError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Skip,
}

fn process_config_flag(argument: &OsStr) -> FlagAction {
    let argument_text = argument.to_string_lossy();
    if !argument_text.starts_with("--") {
        return FlagAction::Skip;
    }
    let (flag, has_inline_value) = match argument_text.split_once('=') {
        Some((name, _)) => (name, true),
        None => (argument_text.as_ref(), false),
    };
    if CONFIG_VALUE_FLAGS.contains(&flag) {
        return FlagAction::Include {
            needs_value: !has_inline_value,
        };
    }
    if CONFIG_SWITCH_FLAGS.contains(&flag) {
        return FlagAction::Include { needs_value: false };
    }
    FlagAction::Skip
}

pub(crate) struct ConfigArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) command_start: usize,
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let Some(program) = args.first() else {
        return ConfigArgumentSplit {
            config_arguments: Vec::new(),
            command_start: 0,
        };
    };

    let mut filtered = vec![program.clone()];
    let mut command_start = 1_usize;
    let mut pending_value = false;

    for argument in args.iter().skip(1) {
        if pending_value {
            filtered.push(argument.clone());
            pending_value = false;
            command_start += 1;
            continue;
        }
        match process_config_flag(argument) {
            FlagAction::Include { needs_value } => {
                filtered.push(argument.clone());
                command_start += 1;
                pending_value = needs_value;
            }
            FlagAction::Skip => break,
        }
    }

    ConfigArgumentSplit {
        config_arguments: filtered,
        command_start,
    }
}

/// Rebuilds the argument vector seen by the subcommand parser.
pub(crate) fn command_arguments(args: &[OsString], split: &ConfigArgumentSplit) -> Vec<OsString> {
    args.first()
        .into_iter()
        .chain(args.get(split.command_start..).unwrap_or_default())
        .cloned()
        .collect()
}
