use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Default log filter expression used by the CLI.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Default host for bind probes and application URLs.
pub const DEFAULT_BIND_HOST: &str = "127.0.0.1";

/// Default grace period, in milliseconds, before a stop escalates to a kill.
pub const DEFAULT_STOP_GRACE_MS: u64 = 5_000;

/// Default window, in milliseconds, a launched command must survive.
pub const DEFAULT_LAUNCH_PROBE_MS: u64 = 300;

/// Default base URL of the publishing service.
pub const DEFAULT_PUBLISH_BASE_URL: &str = "http://localhost:8000";

/// Default board slug for published threads.
pub const DEFAULT_PUBLISH_BOARD: &str = "dev";

/// Default log filter expression used by the CLI.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the CLI.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default registry file location, relative to the working directory.
#[must_use]
pub fn default_registry_path() -> Utf8PathBuf {
    Utf8PathBuf::from("apps.toml")
}

/// Default state directory, relative to the working directory.
#[must_use]
pub fn default_state_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(".launchpad")
}

/// Default root for application checkouts.
#[must_use]
pub fn default_apps_root() -> Utf8PathBuf {
    Utf8PathBuf::from("apps")
}

/// Owned bind host.
#[must_use]
pub fn default_bind_host() -> String {
    DEFAULT_BIND_HOST.to_owned()
}

/// Owned publish base URL.
#[must_use]
pub fn default_publish_base_url() -> String {
    DEFAULT_PUBLISH_BASE_URL.to_owned()
}

/// Owned publish board slug.
#[must_use]
pub fn default_publish_board() -> String {
    DEFAULT_PUBLISH_BOARD.to_owned()
}
