//! Registry file loading and lookup.
//!
//! The registry file is TOML with one `[[apps]]` table per application.
//! Entries keep their declaration order so batch commands walk them the way
//! the user wrote them.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::entry::AppEntry;
use crate::error::RegistryError;

const REGISTRY_TARGET: &str = "launchpad_registry::registry";

/// Registry written by `launchpad init` in a fresh workspace.
pub const DEFAULT_REGISTRY: &str = r#"# Launchpad application registry.
#
# One [[apps]] table per application. Edit commands and ports to match your
# local setup; `{PORT}` in the run command is replaced by the allocated port,
# which is also exported as the PORT environment variable.

[[apps]]
name = "coevo-api"
source = "https://github.com/MichaelWave369/CoEvo.git"
path = "CoEvo/server"
description = "CoEvo backend API"
stack = "fastapi"
ports = { min = 8000, max = 8019 }
health_path = "/health"
capsule_mode = "http"
entrypoint = "app.main:app"

[apps.commands]
install = "python -m pip install -r requirements.txt"
run = "uvicorn app.main:app --reload --host 127.0.0.1 --port {PORT}"
test = "python -m pytest"

[[apps]]
name = "coevo-web"
source = "https://github.com/MichaelWave369/CoEvo.git"
path = "CoEvo/web"
description = "CoEvo frontend web app"
stack = "vite"
ports = { min = 5173, max = 5199 }
capsule_mode = "http"

[apps.commands]
install = "npm install"
run = "npm run dev -- --host 127.0.0.1 --port {PORT}"
build = "npm run build"

[[apps]]
name = "recom3ndo"
source = "https://github.com/MichaelWave369/RecoM3ndo.git"
description = "RecoM3ndo static web app"
stack = "static"
ports = { min = 8030, max = 8049 }
capsule_mode = "static"

[apps.commands]
run = "python -m http.server {PORT} --bind 127.0.0.1"

[[apps]]
name = "growora"
source = "https://github.com/MichaelWave369/Growora.git"
description = "Growora placeholder"
stack = "wip"
ports = { min = 8060, max = 8079 }
capsule_mode = "wip"
"#;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryFile {
    #[serde(default)]
    apps: Vec<AppEntry>,
}

/// Validated set of application entries.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    apps: Vec<AppEntry>,
}

impl Registry {
    /// Builds a registry from entries, validating each and rejecting
    /// duplicate names.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidEntry`] or
    /// [`RegistryError::DuplicateApp`].
    pub fn from_entries(apps: Vec<AppEntry>) -> Result<Self, RegistryError> {
        let mut seen = std::collections::BTreeSet::new();
        for app in &apps {
            app.validate()?;
            if !seen.insert(app.name()) {
                return Err(RegistryError::DuplicateApp {
                    name: app.name().to_owned(),
                });
            }
        }
        Ok(Self { apps })
    }

    /// Parses registry TOML.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Parse`] for malformed TOML (reported against
    /// `origin`) and the validation errors of [`Registry::from_entries`].
    pub fn parse(raw: &str, origin: &Path) -> Result<Self, RegistryError> {
        let file: RegistryFile = toml::from_str(raw).map_err(|source| RegistryError::Parse {
            path: origin.to_path_buf(),
            source: Box::new(source),
        })?;
        Self::from_entries(file.apps)
    }

    /// Loads and validates the registry at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Read`] when the file cannot be read, plus
    /// every error of [`Registry::parse`].
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let raw = fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.to_path_buf(),
            source: Arc::new(source),
        })?;
        let registry = Self::parse(&raw, path)?;
        debug!(
            target: REGISTRY_TARGET,
            path = %path.display(),
            apps = registry.len(),
            "loaded registry"
        );
        Ok(registry)
    }

    /// Looks up an application by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AppEntry> {
        self.apps.iter().find(|app| app.name() == name)
    }

    /// Looks up an application by name, failing when it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownApp`] when no entry matches.
    pub fn require(&self, name: &str) -> Result<&AppEntry, RegistryError> {
        self.get(name).ok_or_else(|| RegistryError::UnknownApp {
            name: name.to_owned(),
        })
    }

    /// Iterates entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &AppEntry> {
        self.apps.iter()
    }

    /// Returns the entries as a slice.
    #[must_use]
    pub fn entries(&self) -> &[AppEntry] {
        &self.apps
    }

    /// Returns the number of registered applications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.apps.len()
    }

    /// Returns `true` when no applications are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

/// Writes [`DEFAULT_REGISTRY`] to `path` unless a file already exists.
///
/// Returns `true` when the file was created and `false` when an existing file
/// was left untouched.
///
/// # Errors
///
/// Returns [`RegistryError::Write`] when the file cannot be created.
pub fn write_default_registry(path: &Path) -> Result<bool, RegistryError> {
    let write_error = |source: std::io::Error| RegistryError::Write {
        path: path.to_path_buf(),
        source: Arc::new(source),
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    let mut file = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(file) => file,
        Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(error) => return Err(write_error(error)),
    };
    file.write_all(DEFAULT_REGISTRY.as_bytes())
        .map_err(write_error)?;
    debug!(target: REGISTRY_TARGET, path = %path.display(), "wrote default registry");
    Ok(true)
}

#[cfg(test)]
mod tests;
