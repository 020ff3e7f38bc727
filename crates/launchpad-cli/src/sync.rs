//! Bringing application checkouts up to date.

use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};

use launchpad_registry::AppEntry;
use thiserror::Error;
use tracing::info;

const SYNC_TARGET: &str = "launchpad_cli::sync";

#[derive(Debug, Error)]
pub(crate) enum SyncError {
    #[error("no source configured")]
    NoSource,
    #[error("checkout path '{}' has no repository directory", path.display())]
    InvalidPath { path: PathBuf },
    #[error("failed to run git: {0}")]
    Spawn(#[source] io::Error),
    #[error("git {operation} exited with {status}")]
    Git { operation: &'static str, status: String },
}

/// Ensures an application's sources exist locally and are current.
pub(crate) trait SyncSource {
    /// Returns the application directory after syncing.
    fn ensure_up_to_date(&self, entry: &AppEntry, apps_root: &Path) -> Result<PathBuf, SyncError>;
}

/// Syncs with `git clone` and `git pull --ff-only`.
#[derive(Debug, Clone)]
pub(crate) struct GitSync {
    program: OsString,
}

impl Default for GitSync {
    fn default() -> Self {
        Self {
            program: OsString::from("git"),
        }
    }
}

impl GitSync {
    #[cfg(test)]
    pub(crate) fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn git(&self, operation: &'static str, args: &[&std::ffi::OsStr]) -> Result<(), SyncError> {
        let status = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .status()
            .map_err(SyncError::Spawn)?;
        if status.success() {
            Ok(())
        } else {
            Err(SyncError::Git {
                operation,
                status: status.to_string(),
            })
        }
    }
}

/// Directory holding the repository: the first component of the
/// application's relative path.
fn repository_dir(entry: &AppEntry, apps_root: &Path) -> Result<PathBuf, SyncError> {
    let relative = entry.relative_dir();
    match relative.components().next() {
        Some(Component::Normal(first)) => Ok(apps_root.join(first)),
        _ => Err(SyncError::InvalidPath {
            path: relative.to_path_buf(),
        }),
    }
}

impl SyncSource for GitSync {
    fn ensure_up_to_date(&self, entry: &AppEntry, apps_root: &Path) -> Result<PathBuf, SyncError> {
        let repo = repository_dir(entry, apps_root)?;
        if repo.join(".git").exists() {
            info!(target: SYNC_TARGET, app = entry.name(), repo = %repo.display(), "pulling");
            self.git(
                "pull",
                &[
                    "-C".as_ref(),
                    repo.as_os_str(),
                    "pull".as_ref(),
                    "--ff-only".as_ref(),
                ],
            )?;
        } else {
            if entry.source().trim().is_empty() {
                return Err(SyncError::NoSource);
            }
            std::fs::create_dir_all(apps_root).map_err(SyncError::Spawn)?;
            info!(target: SYNC_TARGET, app = entry.name(), source = entry.source(), "cloning");
            self.git(
                "clone",
                &["clone".as_ref(), entry.source().as_ref(), repo.as_os_str()],
            )?;
        }
        Ok(entry.checkout_dir(apps_root))
    }
}
