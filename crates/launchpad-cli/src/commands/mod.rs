//! Subcommand handlers.

use std::io::Write;
use std::path::{Path, PathBuf};

use launchpad_artifact::ExclusionSet;
use launchpad_config::{Config, StatePaths};
use launchpad_registry::{AppEntry, Phase, Registry};
use launchpad_runtime::{BindProbe, LifecycleManager, LifecycleSettings, StateStore};
use serde_json::Value;
use tracing::warn;

use crate::audit::AuditLog;
use crate::cli::{AppSelector, Command};
use crate::errors::AppError;
use crate::output::outcome_marker;
use crate::sync::GitSync;

mod artifact;
mod registry;
mod runtime;

const COMMANDS_TARGET: &str = "launchpad_cli::commands";

/// Resolved configuration plus the lazily opened resources commands need.
pub(crate) struct Workspace {
    config: Config,
}

impl Workspace {
    pub(crate) const fn new(config: Config) -> Self {
        Self { config }
    }

    pub(crate) const fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn apps_root(&self) -> &Path {
        self.config.apps_root().as_std_path()
    }

    pub(crate) fn registry_path(&self) -> &Path {
        self.config.registry_path().as_std_path()
    }

    /// Loads the registry, pointing at `launchpad init` when it is missing.
    pub(crate) fn registry(&self) -> Result<Registry, AppError> {
        let path = self.registry_path();
        if !path.exists() {
            return Err(AppError::RegistryMissing {
                path: path.to_path_buf(),
            });
        }
        Ok(Registry::load(path)?)
    }

    /// State paths, creating the state and log directories.
    pub(crate) fn state_paths(&self) -> Result<StatePaths, AppError> {
        Ok(StatePaths::from_config(&self.config)?)
    }

    pub(crate) fn manager(&self) -> Result<LifecycleManager<BindProbe>, AppError> {
        let paths = self.state_paths()?;
        let settings = LifecycleSettings {
            apps_root: self.apps_root().to_path_buf(),
            logs_dir: paths.logs_dir().to_path_buf(),
            bind_host: self.config.bind_host().to_owned(),
            stop_grace: self.config.stop_grace(),
            launch_probe: self.config.launch_probe(),
        };
        Ok(LifecycleManager::new(
            StateStore::new(paths.state_path()),
            BindProbe::new(self.config.bind_host()),
            settings,
        ))
    }

    pub(crate) fn exclusions(&self) -> ExclusionSet {
        ExclusionSet::standard(self.config.include_build_output)
            .with_patterns(&self.config.extra_excludes)
    }

    pub(crate) fn artifacts_dir(&self) -> PathBuf {
        self.config.state_dir().as_std_path().join("artifacts")
    }

    /// Appends an audit event. Audit failures are logged, never fatal.
    pub(crate) fn audit(&self, kind: &str, payload: Value) {
        let log = AuditLog::new(StatePaths::from_config_readonly(&self.config).audit_path());
        if let Err(error) = log.record(kind, payload) {
            warn!(target: COMMANDS_TARGET, event = kind, %error, "audit event not recorded");
        }
    }
}

/// Resolves the applications a selector names, in registry order.
pub(crate) fn select<'r>(
    registry: &'r Registry,
    selector: &AppSelector,
) -> Result<Vec<&'r AppEntry>, AppError> {
    match &selector.app {
        Some(name) if !selector.all => Ok(vec![registry.require(name)?]),
        _ => Ok(registry.iter().collect()),
    }
}

/// Prints one line per application and fails when any failed.
pub(crate) fn report_batch<W, T, F>(
    out: &mut W,
    results: Vec<(String, Result<T, String>)>,
    mut describe: F,
) -> Result<(), AppError>
where
    W: Write,
    F: FnMut(&T) -> String,
{
    let total = results.len();
    let mut failed = 0_usize;
    for (app, result) in results {
        let (ok, detail) = match &result {
            Ok(value) => (true, describe(value)),
            Err(message) => (false, message.clone()),
        };
        if !ok {
            failed += 1;
        }
        writeln!(out, "{} {app}: {detail}", outcome_marker(ok))?;
    }
    if failed > 0 {
        return Err(AppError::BatchFailed { failed, total });
    }
    Ok(())
}

pub(crate) fn dispatch<W: Write>(
    workspace: &Workspace,
    command: Command,
    out: &mut W,
) -> Result<(), AppError> {
    match command {
        Command::Init => registry::init(workspace, out),
        Command::List => registry::list(workspace, out),
        Command::Sync(selector) => registry::sync(workspace, &GitSync::default(), &selector, out),
        Command::Capsule { app } => registry::capsule(workspace, &app, out),
        Command::Detect { app } => registry::detect(workspace, &app, out),
        Command::Doctor => registry::doctor(out),
        Command::Install(selector) => runtime::phase(workspace, Phase::Install, &selector, out),
        Command::Test(selector) => runtime::phase(workspace, Phase::Test, &selector, out),
        Command::Build(selector) => runtime::phase(workspace, Phase::Build, &selector, out),
        Command::Run(selector) => runtime::start(workspace, &selector, out),
        Command::Stop(selector) => runtime::stop(workspace, &selector, out),
        Command::Status(selector) => runtime::status(workspace, &selector, out),
        Command::Open { app } => runtime::open(workspace, &app, out),
        Command::Pack { app, output } => artifact::pack(workspace, &app, output, out),
        Command::Verify {
            target,
            manifest,
            fail_on_extra,
        } => artifact::verify(workspace, &target, manifest.as_deref(), fail_on_extra, out),
        Command::Publish(args) => artifact::publish(workspace, &args, out),
    }
}
