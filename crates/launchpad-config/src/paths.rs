//! Derives the state artefact paths shared by every command.
//!
//! The state directory houses the runtime state file, its advisory lock,
//! per-application logs and the audit trail. Every invocation derives the same
//! layout from configuration so independent commands agree on where truth is
//! persisted.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::Config;

const STATE_FILE_NAME: &str = "runtime.json";
const LOCK_FILE_NAME: &str = "runtime.json.lock";
const LOGS_DIR_NAME: &str = "logs";
const AUDIT_FILE_NAME: &str = "audit.jsonl";

/// Canonical paths for state artefacts written by the orchestrator.
#[derive(Debug, Clone)]
pub struct StatePaths {
    state_dir: PathBuf,
    state_path: PathBuf,
    lock_path: PathBuf,
    logs_dir: PathBuf,
    audit_path: PathBuf,
}

impl StatePaths {
    /// Derives state paths from configuration, creating the directories.
    pub fn from_config(config: &Config) -> Result<Self, StatePathsError> {
        let paths = Self::from_config_readonly(config);
        for dir in [paths.state_dir.as_path(), paths.logs_dir.as_path()] {
            fs::create_dir_all(dir).map_err(|source| StatePathsError::StateDirectory {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        Ok(paths)
    }

    /// Derives state paths without touching the filesystem.
    #[must_use]
    pub fn from_config_readonly(config: &Config) -> Self {
        Self::under(config.state_dir().as_std_path())
    }

    /// Derives state paths rooted at an explicit directory.
    #[must_use]
    pub fn under(state_dir: &Path) -> Self {
        Self {
            state_path: state_dir.join(STATE_FILE_NAME),
            lock_path: state_dir.join(LOCK_FILE_NAME),
            logs_dir: state_dir.join(LOGS_DIR_NAME),
            audit_path: state_dir.join(AUDIT_FILE_NAME),
            state_dir: state_dir.to_path_buf(),
        }
    }

    /// Directory holding state artefacts.
    pub fn state_dir(&self) -> &Path {
        self.state_dir.as_path()
    }

    /// Path to the runtime state file.
    pub fn state_path(&self) -> &Path {
        self.state_path.as_path()
    }

    /// Path to the advisory lock guarding state mutations.
    pub fn lock_path(&self) -> &Path {
        self.lock_path.as_path()
    }

    /// Directory receiving application output.
    pub fn logs_dir(&self) -> &Path {
        self.logs_dir.as_path()
    }

    /// Path to the append-only audit trail.
    pub fn audit_path(&self) -> &Path {
        self.audit_path.as_path()
    }
}

/// Errors raised while deriving state paths.
#[derive(Debug, Error)]
pub enum StatePathsError {
    /// Creating the state directory failed.
    #[error("failed to prepare state directory '{path}': {source}")]
    StateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
