//! Errors raised while loading or querying the registry.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors arising from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry file could not be read.
    #[error("failed to read registry '{path}': {source}")]
    Read {
        /// Registry file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The registry file is not valid TOML or does not match the schema.
    #[error("failed to parse registry '{path}': {source}")]
    Parse {
        /// Registry file path.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: Box<toml::de::Error>,
    },

    /// An application entry violates a registry invariant.
    #[error("invalid registry entry '{app}': {message}")]
    InvalidEntry {
        /// Name of the offending application (may be empty).
        app: String,
        /// Description of the violated invariant.
        message: String,
    },

    /// Two entries share the same name.
    #[error("application '{name}' is declared more than once")]
    DuplicateApp {
        /// Duplicated application name.
        name: String,
    },

    /// The requested application is not registered.
    #[error("application '{name}' is not in the registry")]
    UnknownApp {
        /// Name that was looked up.
        name: String,
    },

    /// Writing the default registry failed.
    #[error("failed to write registry '{path}': {source}")]
    Write {
        /// Registry file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },
}
