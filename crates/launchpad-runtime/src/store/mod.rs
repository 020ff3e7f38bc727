//! Runtime state persistence.
//!
//! The state file is the only place runtime truth survives between
//! invocations. Every mutation runs as `lock → load → mutate → save` under an
//! exclusive advisory lock on a sibling `.lock` file, and every save is an
//! atomic replace, so a concurrent reader never sees a torn write and two
//! racing writers never lose each other's updates.

mod files;

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::STORE_TARGET;
use crate::record::RuntimeState;

use self::files::{LockMode, acquire_lock, atomic_write};

const LOCK_SUFFIX: &str = ".lock";
const CORRUPT_SUFFIX: &str = ".corrupt";

/// Errors raised by the state store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The state file exists but could not be read.
    #[error("failed to read runtime state '{path}': {source}")]
    Read {
        /// State file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The state file could not be parsed.
    #[error("runtime state '{path}' is corrupt: {source}")]
    CorruptState {
        /// State file path.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The state could not be serialised.
    #[error("failed to serialise runtime state: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Writing the state file failed.
    #[error("failed to write runtime state '{path}': {source}")]
    Write {
        /// State file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The advisory lock could not be acquired.
    #[error("failed to lock runtime state '{path}': {source}")]
    Lock {
        /// Lock file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A corrupt state file could not be moved aside.
    #[error("failed to quarantine corrupt runtime state '{path}': {source}")]
    Quarantine {
        /// State file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Handle on the persisted runtime state file.
#[derive(Debug, Clone)]
pub struct StateStore {
    state_path: PathBuf,
    lock_path: PathBuf,
}

impl StateStore {
    /// Creates a store for `state_path`, locking through `<state_path>.lock`.
    #[must_use]
    pub fn new(state_path: impl Into<PathBuf>) -> Self {
        let state_path = state_path.into();
        let lock_path = with_suffix(&state_path, LOCK_SUFFIX);
        Self {
            state_path,
            lock_path,
        }
    }

    /// Path of the state file.
    #[must_use]
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Path of the advisory lock file.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Reads the state without locking. A missing file is an empty state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] or [`StoreError::CorruptState`].
    pub fn load(&self) -> Result<RuntimeState, StoreError> {
        let raw = match fs::read(&self.state_path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(RuntimeState::default());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.state_path.clone(),
                    source,
                });
            }
        };
        serde_json::from_slice(&raw).map_err(|source| StoreError::CorruptState {
            path: self.state_path.clone(),
            source,
        })
    }

    /// Atomically replaces the state file with `state`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialize`] or [`StoreError::Write`].
    pub fn save(&self, state: &RuntimeState) -> Result<(), StoreError> {
        let mut payload = serde_json::to_vec_pretty(state).map_err(StoreError::Serialize)?;
        payload.push(b'\n');
        atomic_write(&self.state_path, &payload).map_err(|source| StoreError::Write {
            path: self.state_path.clone(),
            source,
        })?;
        debug!(
            target: STORE_TARGET,
            file = %self.state_path.display(),
            apps = state.apps.len(),
            "runtime state saved"
        );
        Ok(())
    }

    /// Acquires the exclusive lock and loads the state for mutation.
    ///
    /// A corrupt state file is moved aside to `<file>.corrupt` with a
    /// warning and the transaction starts from an empty state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Lock`], [`StoreError::Read`] or
    /// [`StoreError::Quarantine`].
    pub fn lock(&self) -> Result<StateTransaction<'_>, StoreError> {
        let lock = self.acquire(LockMode::Exclusive)?;
        let state = match self.load() {
            Ok(state) => state,
            Err(StoreError::CorruptState { path, source }) => {
                let quarantine = with_suffix(&path, CORRUPT_SUFFIX);
                fs::rename(&path, &quarantine).map_err(|error| StoreError::Quarantine {
                    path: path.clone(),
                    source: error,
                })?;
                warn!(
                    target: STORE_TARGET,
                    file = %path.display(),
                    moved_to = %quarantine.display(),
                    error = %source,
                    "runtime state was corrupt; continuing from an empty state"
                );
                RuntimeState::default()
            }
            Err(other) => return Err(other),
        };
        Ok(StateTransaction {
            store: self,
            state,
            _lock: lock,
        })
    }

    /// Runs `mutate` on the locked state and saves the result.
    ///
    /// # Errors
    ///
    /// Returns any error of [`StateStore::lock`] or [`StateStore::save`].
    pub fn update<T>(&self, mutate: impl FnOnce(&mut RuntimeState) -> T) -> Result<T, StoreError> {
        let mut transaction = self.lock()?;
        let output = mutate(transaction.state_mut());
        transaction.save()?;
        Ok(output)
    }

    /// Loads the state under a shared lock for read-only use.
    ///
    /// Unlike [`StateStore::lock`], a corrupt file is reported rather than
    /// quarantined.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Lock`], [`StoreError::Read`] or
    /// [`StoreError::CorruptState`].
    pub fn snapshot(&self) -> Result<RuntimeState, StoreError> {
        let _lock = self.acquire(LockMode::Shared)?;
        self.load()
    }

    fn acquire(&self, mode: LockMode) -> Result<File, StoreError> {
        if let Some(parent) = self.lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| StoreError::Lock {
                path: self.lock_path.clone(),
                source,
            })?;
        }
        acquire_lock(&self.lock_path, mode).map_err(|source| StoreError::Lock {
            path: self.lock_path.clone(),
            source,
        })
    }
}

/// Locked, in-memory view of the runtime state.
///
/// Changes are persisted only by [`StateTransaction::save`]; the lock is
/// released when the transaction drops.
#[derive(Debug)]
pub struct StateTransaction<'a> {
    store: &'a StateStore,
    state: RuntimeState,
    _lock: File,
}

impl StateTransaction<'_> {
    /// Read access to the state.
    #[must_use]
    pub const fn state(&self) -> &RuntimeState {
        &self.state
    }

    /// Write access to the state.
    pub const fn state_mut(&mut self) -> &mut RuntimeState {
        &mut self.state
    }

    /// Persists the current in-memory state while keeping the lock.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialize`] or [`StoreError::Write`].
    pub fn save(&self) -> Result<(), StoreError> {
        self.store.save(&self.state)
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}
