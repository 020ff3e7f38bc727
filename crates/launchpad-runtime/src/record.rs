//! Persisted per-application runtime records.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Current on-disk format version of [`RuntimeState`].
pub const STATE_FORMAT_VERSION: u32 = 1;

/// Lifecycle status of a tracked application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeStatus {
    /// Not running; `pid` and `port` are cleared.
    #[default]
    Stopped,
    /// Launched but not yet confirmed alive.
    Starting,
    /// Confirmed alive after launch.
    Running,
    /// Recorded as live but the process could not be confirmed.
    Unknown,
}

impl RuntimeStatus {
    /// Returns `true` when the status claims a port.
    #[must_use]
    pub const fn holds_port(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last known process state of one application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeRecord {
    /// Process id of the launched command (the process group leader).
    #[serde(default)]
    pub pid: Option<u32>,
    /// Allocated port.
    #[serde(default)]
    pub port: Option<u16>,
    /// Lifecycle status.
    #[serde(default)]
    pub status: RuntimeStatus,
    /// When the last launch was attempted.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    /// When the application was last seen stopping.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub stopped_at: Option<OffsetDateTime>,
    /// Reason the last launch failed.
    #[serde(default)]
    pub last_error: Option<String>,
    /// File receiving the application's output.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
}

impl RuntimeRecord {
    /// Returns the pid and port when the record claims a live process.
    #[must_use]
    pub const fn live_claim(&self) -> Option<(u32, u16)> {
        match (self.status.holds_port(), self.pid, self.port) {
            (true, Some(pid), Some(port)) => Some((pid, port)),
            _ => None,
        }
    }

    /// Transitions to `Stopped`, clearing the process fields.
    pub fn mark_stopped(&mut self, at: OffsetDateTime) {
        self.status = RuntimeStatus::Stopped;
        self.pid = None;
        self.port = None;
        self.stopped_at = Some(at);
    }
}

/// Whole persisted runtime state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeState {
    /// Format version.
    pub version: u32,
    /// Records keyed by application name.
    #[serde(default)]
    pub apps: BTreeMap<String, RuntimeRecord>,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            version: STATE_FORMAT_VERSION,
            apps: BTreeMap::new(),
        }
    }
}

impl RuntimeState {
    /// Returns the record for `app`, if one exists.
    #[must_use]
    pub fn record(&self, app: &str) -> Option<&RuntimeRecord> {
        self.apps.get(app)
    }

    /// Returns the record for `app`, creating an empty one on first use.
    pub fn record_mut(&mut self, app: &str) -> &mut RuntimeRecord {
        self.apps.entry(app.to_owned()).or_default()
    }

    /// Ports claimed by records in `Starting` or `Running`.
    pub fn held_ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.apps
            .values()
            .filter(|record| record.status.holds_port())
            .filter_map(|record| record.port)
    }
}

/// Current UTC time.
#[must_use]
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}
