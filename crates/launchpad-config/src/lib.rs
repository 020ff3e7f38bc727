//! Shared configuration for the Launchpad orchestrator.
//!
//! Values are layered by `ortho_config`: built-in defaults, then a
//! configuration file (`--config-path`), then `LAUNCHPAD_*` environment
//! variables, then command-line flags. Only the resolved values matter to the
//! rest of the workspace; the loading mechanics stay inside this crate.

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod defaults;
mod logging;
mod paths;

pub use defaults::{
    DEFAULT_BIND_HOST, DEFAULT_LAUNCH_PROBE_MS, DEFAULT_LOG_FILTER, DEFAULT_PUBLISH_BASE_URL,
    DEFAULT_PUBLISH_BOARD, DEFAULT_STOP_GRACE_MS, default_apps_root, default_bind_host,
    default_log_filter, default_log_filter_string, default_log_format, default_publish_base_url,
    default_publish_board, default_registry_path, default_state_dir,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use paths::{StatePaths, StatePathsError};

/// Resolved configuration shared by every Launchpad command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "LAUNCHPAD")]
pub struct Config {
    /// Registry file describing the managed applications.
    #[ortho_config(default = default_registry_path())]
    pub registry_path: Utf8PathBuf,
    /// Directory holding the runtime state file, its lock, logs and audit trail.
    #[ortho_config(default = default_state_dir())]
    pub state_dir: Utf8PathBuf,
    /// Directory under which application checkouts live.
    #[ortho_config(default = default_apps_root())]
    pub apps_root: Utf8PathBuf,
    /// Host used for port bind probes and application URLs.
    #[ortho_config(default = default_bind_host())]
    pub bind_host: String,
    /// Tracing filter expression (`EnvFilter` syntax).
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Grace period before a stopping application is force-killed.
    #[ortho_config(default = DEFAULT_STOP_GRACE_MS)]
    pub stop_grace_ms: u64,
    /// Window during which a freshly launched command must stay alive.
    #[ortho_config(default = DEFAULT_LAUNCH_PROBE_MS)]
    pub launch_probe_ms: u64,
    /// Keeps `dist`, `build` and `.next` directories when packing.
    #[ortho_config(default = false)]
    pub include_build_output: bool,
    /// Additional exclusion patterns (`name` or `*.suffix`) for packing.
    #[serde(default)]
    pub extra_excludes: Vec<String>,
    /// Treats files absent from the manifest as a verification failure.
    #[ortho_config(default = false)]
    pub verify_fail_on_extra: bool,
    /// Enables the publish pipeline.
    #[ortho_config(default = false)]
    pub publish_enabled: bool,
    /// Base URL of the publishing service.
    #[ortho_config(default = default_publish_base_url())]
    pub publish_base_url: String,
    /// Board slug receiving published threads.
    #[ortho_config(default = default_publish_board())]
    pub publish_board: String,
    /// Bearer token for the publishing service.
    pub publish_token: Option<String>,
    /// Account handle used when no token is configured.
    pub publish_handle: Option<String>,
    /// Account password used when no token is configured.
    pub publish_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_path: default_registry_path(),
            state_dir: default_state_dir(),
            apps_root: default_apps_root(),
            bind_host: default_bind_host(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            stop_grace_ms: DEFAULT_STOP_GRACE_MS,
            launch_probe_ms: DEFAULT_LAUNCH_PROBE_MS,
            include_build_output: false,
            extra_excludes: Vec::new(),
            verify_fail_on_extra: false,
            publish_enabled: false,
            publish_base_url: default_publish_base_url(),
            publish_board: default_publish_board(),
            publish_token: None,
            publish_handle: None,
            publish_password: None,
        }
    }
}

impl Config {
    /// Path of the registry file.
    #[must_use]
    pub fn registry_path(&self) -> &camino::Utf8Path {
        self.registry_path.as_path()
    }

    /// Directory holding runtime artefacts.
    #[must_use]
    pub fn state_dir(&self) -> &camino::Utf8Path {
        self.state_dir.as_path()
    }

    /// Root directory of application checkouts.
    #[must_use]
    pub fn apps_root(&self) -> &camino::Utf8Path {
        self.apps_root.as_path()
    }

    /// Host used for bind probes and URLs.
    #[must_use]
    pub fn bind_host(&self) -> &str {
        self.bind_host.as_str()
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Stop grace period.
    #[must_use]
    pub const fn stop_grace(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.stop_grace_ms)
    }

    /// Launch liveness probe window.
    #[must_use]
    pub const fn launch_probe(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.launch_probe_ms)
    }
}
