//! In-process tests for the CLI runtime and shared fixtures for the command
//! modules.

use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use launchpad_config::Config;
use rstest::rstest;
use tempfile::TempDir;

use crate::commands::Workspace;
use crate::config::ConfigLoader;
use crate::errors::AppError;
use crate::run_with_loader;

pub(crate) const WORKSPACE_REGISTRY: &str = r#"
[[apps]]
name = "api"
source = "https://example.com/api.git"
description = "Example API"
stack = "fastapi"
ports = { min = 18000, max = 18010 }

[apps.commands]
install = "true"
run = "python -m http.server {PORT}"

[[apps]]
name = "site"
description = "Static site"
ports = { min = 18030, max = 18040 }
"#;

/// Temporary workspace with its own registry, state directory and apps root.
pub(crate) struct TestWorkspace {
    _temp: TempDir,
    config: Config,
}

impl TestWorkspace {
    pub(crate) fn with_registry(registry: &str) -> Self {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8 temp dir");
        let config = Config {
            registry_path: root.join("launchpad.toml"),
            state_dir: root.join("state"),
            apps_root: root.join("apps"),
            ..Config::default()
        };
        fs::write(config.registry_path.as_std_path(), registry).expect("write registry");
        Self {
            _temp: temp,
            config,
        }
    }

    pub(crate) fn without_registry() -> Self {
        let fixture = Self::with_registry("");
        fs::remove_file(fixture.config.registry_path.as_std_path()).expect("remove registry");
        fixture
    }

    pub(crate) fn apps_root(&self) -> PathBuf {
        self.config.apps_root.as_std_path().to_path_buf()
    }

    pub(crate) fn workspace(&self) -> Workspace {
        Workspace::new(self.config.clone())
    }
}

struct StaticLoader(Config);

impl ConfigLoader for StaticLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.0.clone())
    }
}

fn run_cli(fixture: &TestWorkspace, args: &[&str]) -> (ExitCode, String, String) {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let argv = std::iter::once("launchpad")
        .chain(args.iter().copied())
        .map(OsString::from);
    let code = run_with_loader(
        argv,
        &mut stdout,
        &mut stderr,
        &StaticLoader(fixture.config.clone()),
    );
    (
        code,
        String::from_utf8(stdout).expect("utf8 stdout"),
        String::from_utf8(stderr).expect("utf8 stderr"),
    )
}

#[test]
fn list_prints_registered_applications() {
    let fixture = TestWorkspace::with_registry(WORKSPACE_REGISTRY);
    let (code, stdout, _) = run_cli(&fixture, &["list"]);

    assert_eq!(code, ExitCode::SUCCESS);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3, "{stdout}");
    assert!(lines.first().is_some_and(|line| line.starts_with("NAME")));
    assert!(stdout.contains("18000-18010"));
}

#[test]
fn init_seeds_a_missing_registry_and_is_idempotent() {
    let fixture = TestWorkspace::without_registry();

    let (first, stdout, _) = run_cli(&fixture, &["init"]);
    assert_eq!(first, ExitCode::SUCCESS);
    assert!(stdout.starts_with("created registry"), "{stdout}");

    let (second, again, _) = run_cli(&fixture, &["init"]);
    assert_eq!(second, ExitCode::SUCCESS);
    assert!(again.starts_with("registry already exists"), "{again}");

    let audit = fixture.config.state_dir.join("audit.jsonl");
    let events = fs::read_to_string(audit.as_std_path()).expect("audit log");
    assert_eq!(events.lines().count(), 2);
}

#[test]
fn missing_registry_points_at_init() {
    let fixture = TestWorkspace::without_registry();
    let (code, _, stderr) = run_cli(&fixture, &["list"]);

    assert_eq!(code, ExitCode::FAILURE);
    assert!(stderr.contains("launchpad init"), "{stderr}");
}

#[rstest]
#[case::unknown_app(&["status", "nope"], "not in the registry")]
#[case::selector_required(&["run"], "required")]
#[case::selector_exclusive(&["stop", "api", "--all"], "cannot be used with")]
fn invalid_invocations_fail(#[case] args: &[&str], #[case] message: &str) {
    let fixture = TestWorkspace::with_registry(WORKSPACE_REGISTRY);
    let (code, _, stderr) = run_cli(&fixture, args);

    assert_eq!(code, ExitCode::FAILURE);
    assert!(stderr.contains(message), "{stderr}");
}

#[test]
fn help_goes_to_stdout_and_succeeds() {
    let fixture = TestWorkspace::with_registry(WORKSPACE_REGISTRY);
    let (code, stdout, stderr) = run_cli(&fixture, &["--help"]);

    assert_eq!(code, ExitCode::SUCCESS);
    assert!(stdout.contains("Usage"), "{stdout}");
    assert!(stderr.is_empty());
}

#[test]
fn batch_failures_are_summarised_on_stderr() {
    let fixture = TestWorkspace::with_registry(WORKSPACE_REGISTRY);
    let (code, stdout, stderr) = run_cli(&fixture, &["install", "--all"]);

    assert_eq!(code, ExitCode::FAILURE);
    assert_eq!(stdout.lines().count(), 2, "{stdout}");
    assert!(stderr.contains("2 of 2 applications failed"), "{stderr}");
}
