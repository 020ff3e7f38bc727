//! Errors raised while packing or verifying artifacts.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors arising from artifact operations.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Directory traversal failed.
    #[error("failed to walk '{path}': {source}")]
    Walk {
        /// Directory being walked.
        path: PathBuf,
        /// Underlying traversal error.
        #[source]
        source: Box<walkdir::Error>,
    },

    /// A file could not be read.
    #[error("failed to read '{path}': {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A path cannot be represented in the manifest.
    #[error("path '{path}' is not valid UTF-8")]
    NonUtf8Path {
        /// Offending path.
        path: PathBuf,
    },

    /// A path climbs out of, or is anchored outside, the artifact root.
    #[error("path '{path}' escapes the artifact root")]
    UnsafeMemberPath {
        /// Offending path.
        path: PathBuf,
    },

    /// Building or reading the archive failed.
    #[error("archive error for '{path}': {source}")]
    Archive {
        /// Archive path (or the packed directory for in-memory archives).
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Writing an output file failed.
    #[error("failed to write '{path}': {source}")]
    Write {
        /// Output path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The manifest could not be serialised.
    #[error("failed to serialise manifest: {0}")]
    ManifestSerialize(#[source] serde_json::Error),

    /// The manifest could not be parsed.
    #[error("manifest '{path}' is malformed: {source}")]
    ManifestParse {
        /// Manifest location.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The manifest declares a format this build does not understand.
    #[error("manifest '{path}' has unsupported format version {found}")]
    UnsupportedManifestVersion {
        /// Manifest location.
        path: PathBuf,
        /// Declared version.
        found: u32,
    },

    /// No manifest was found in the target.
    #[error("no artifact.manifest.json found in '{target}'")]
    ManifestNotFound {
        /// Directory or archive searched.
        target: PathBuf,
    },

    /// The target is neither a directory nor a `.tar.gz` archive.
    #[error("'{path}' is neither a directory nor a .tar.gz archive")]
    UnsupportedTarget {
        /// Offending target.
        path: PathBuf,
    },
}
