//! Application entry types.
//!
//! An [`AppEntry`] is the static description of one managed application. The
//! stack is a closed [`StackKind`] with an `unknown` fallback so free-form
//! hints such as `fastapi` or `vite` collapse onto a family instead of
//! failing the whole registry.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Technology family of an application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum StackKind {
    /// Python services and tools (`fastapi`, `streamlit`, plain scripts).
    Python,
    /// Node-based web applications (`vite`, `next`).
    Node,
    /// Static sites served from plain files.
    Static,
    /// Anything unrecognised.
    #[default]
    Unknown,
}

impl StackKind {
    /// Maps a free-form stack hint onto its family.
    #[must_use]
    pub fn from_hint(hint: &str) -> Self {
        match hint.trim().to_ascii_lowercase().as_str() {
            "python" | "python-cli" | "fastapi" | "streamlit" | "flask" | "django" => Self::Python,
            "node" | "vite" | "next" | "nextjs" | "react" => Self::Node,
            "static" | "html" => Self::Static,
            _ => Self::Unknown,
        }
    }

    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Node => "node",
            Self::Static => "static",
            Self::Unknown => "unknown",
        }
    }
}

impl From<String> for StackKind {
    fn from(value: String) -> Self {
        Self::from_hint(&value)
    }
}

impl std::fmt::Display for StackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an application is described when exported as a capsule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapsuleMode {
    /// Serves HTTP and exposes a health endpoint.
    #[default]
    Http,
    /// Ships as static files.
    Static,
    /// Placeholder for work in progress.
    Wip,
}

impl CapsuleMode {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Static => "static",
            Self::Wip => "wip",
        }
    }
}

impl std::fmt::Display for CapsuleMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle phase with an associated command template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// Installs dependencies.
    Install,
    /// Launches the application; the template may contain `{PORT}`.
    Run,
    /// Runs the test suite.
    Test,
    /// Produces build output.
    Build,
}

impl Phase {
    /// Every phase in declaration order.
    pub const ALL: [Self; 4] = [Self::Install, Self::Run, Self::Test, Self::Build];

    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Run => "run",
            Self::Test => "test",
            Self::Build => "build",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive range of ports an application may bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    /// Lowest port, inclusive.
    pub min: u16,
    /// Highest port, inclusive.
    pub max: u16,
}

impl PortRange {
    /// Creates a range without validating it.
    #[must_use]
    pub const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    /// Iterates the candidate ports in ascending order.
    #[must_use]
    pub const fn ports(self) -> RangeInclusive<u16> {
        self.min..=self.max
    }

    /// Returns `true` when `port` falls inside the range.
    #[must_use]
    pub const fn contains(self, port: u16) -> bool {
        port >= self.min && port <= self.max
    }
}

impl std::fmt::Display for PortRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Shell command templates keyed by lifecycle phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Commands {
    /// Dependency installation command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<String>,
    /// Launch command; `{PORT}` is replaced by the allocated port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,
    /// Test command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
    /// Build command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
}

impl Commands {
    /// Returns the template configured for `phase`, if any.
    #[must_use]
    pub fn get(&self, phase: Phase) -> Option<&str> {
        let slot = match phase {
            Phase::Install => &self.install,
            Phase::Run => &self.run,
            Phase::Test => &self.test,
            Phase::Build => &self.build,
        };
        slot.as_deref().filter(|command| !command.trim().is_empty())
    }

    /// Sets the template for `phase`.
    #[must_use]
    pub fn with(mut self, phase: Phase, command: impl Into<String>) -> Self {
        let value = Some(command.into());
        match phase {
            Phase::Install => self.install = value,
            Phase::Run => self.run = value,
            Phase::Test => self.test = value,
            Phase::Build => self.build = value,
        }
        self
    }
}

/// Static description of one managed application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppEntry {
    name: String,
    #[serde(default)]
    source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    stack: StackKind,
    ports: PortRange,
    #[serde(default)]
    commands: Commands,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    health_path: Option<String>,
    #[serde(default)]
    capsule_mode: CapsuleMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    entrypoint: Option<String>,
}

impl AppEntry {
    /// Creates an entry with the given name and port range.
    #[must_use]
    pub fn new(name: impl Into<String>, ports: PortRange) -> Self {
        Self {
            name: name.into(),
            source: String::new(),
            path: None,
            description: String::new(),
            stack: StackKind::Unknown,
            ports,
            commands: Commands::default(),
            health_path: None,
            capsule_mode: CapsuleMode::Http,
            entrypoint: None,
        }
    }

    /// Sets the sync source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Sets the checkout-relative directory.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the stack family.
    #[must_use]
    pub const fn with_stack(mut self, stack: StackKind) -> Self {
        self.stack = stack;
        self
    }

    /// Sets the command template for a phase.
    #[must_use]
    pub fn with_command(mut self, phase: Phase, command: impl Into<String>) -> Self {
        self.commands = self.commands.with(phase, command);
        self
    }

    /// Sets the health endpoint path.
    #[must_use]
    pub fn with_health_path(mut self, health_path: impl Into<String>) -> Self {
        self.health_path = Some(health_path.into());
        self
    }

    /// Sets the capsule mode.
    #[must_use]
    pub const fn with_capsule_mode(mut self, mode: CapsuleMode) -> Self {
        self.capsule_mode = mode;
        self
    }

    /// Validates the entry's invariants.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidEntry`] when the name is empty or not
    /// usable as a file name, when the port range is inverted or starts at
    /// zero, or when the checkout path escapes the apps root.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let invalid = |message: String| RegistryError::InvalidEntry {
            app: self.name.clone(),
            message,
        };
        if self.name.trim().is_empty() {
            return Err(invalid(String::from("name must not be empty")));
        }
        let name_is_safe = !self.name.starts_with('.')
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !name_is_safe {
            return Err(invalid(format!(
                "name '{}' may only contain letters, digits, '-', '_' and '.'",
                self.name
            )));
        }
        if self.ports.min == 0 {
            return Err(invalid(String::from("port range must start above 0")));
        }
        if self.ports.min > self.ports.max {
            return Err(invalid(format!(
                "port range {} is inverted (min > max)",
                self.ports
            )));
        }
        if let Some(path) = &self.path
            && (path.is_absolute()
                || path
                    .components()
                    .any(|c| matches!(c, std::path::Component::ParentDir)))
        {
            return Err(invalid(format!(
                "path '{}' must be relative to the apps root",
                path.display()
            )));
        }
        Ok(())
    }

    /// Returns the unique application name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the location the application is synced from.
    #[must_use]
    pub const fn source(&self) -> &str {
        self.source.as_str()
    }

    /// Returns the human-readable description.
    #[must_use]
    pub const fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns the stack family.
    #[must_use]
    pub const fn stack(&self) -> StackKind {
        self.stack
    }

    /// Returns the port range.
    #[must_use]
    pub const fn ports(&self) -> PortRange {
        self.ports
    }

    /// Returns the command templates.
    #[must_use]
    pub const fn commands(&self) -> &Commands {
        &self.commands
    }

    /// Returns the template for a phase, ignoring blank templates.
    #[must_use]
    pub fn command(&self, phase: Phase) -> Option<&str> {
        self.commands.get(phase)
    }

    /// Returns the health endpoint path, if any.
    #[must_use]
    pub fn health_path(&self) -> Option<&str> {
        self.health_path.as_deref()
    }

    /// Returns the capsule mode.
    #[must_use]
    pub const fn capsule_mode(&self) -> CapsuleMode {
        self.capsule_mode
    }

    /// Returns the declared entrypoint (for example a Python module path).
    #[must_use]
    pub fn entrypoint(&self) -> Option<&str> {
        self.entrypoint.as_deref()
    }

    /// Returns the checkout-relative directory, defaulting to the name.
    #[must_use]
    pub fn relative_dir(&self) -> &Path {
        self.path
            .as_deref()
            .unwrap_or_else(|| Path::new(self.name.as_str()))
    }

    /// Resolves the application directory under `apps_root`.
    #[must_use]
    pub fn checkout_dir(&self, apps_root: &Path) -> PathBuf {
        apps_root.join(self.relative_dir())
    }
}
