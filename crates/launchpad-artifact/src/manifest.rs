//! Artifact manifest model.
//!
//! A manifest lists every packaged file with its size and SHA-256 digest,
//! sorted by path so its content is independent of traversal order. It never
//! lists its own file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ArtifactError;

/// File name of the manifest inside a packed directory or archive.
pub const MANIFEST_FILE_NAME: &str = "artifact.manifest.json";

/// Current manifest format version.
pub const MANIFEST_FORMAT_VERSION: u32 = 1;

/// One packaged file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the artifact root, `/`-separated.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
    /// Lowercase hex SHA-256 digest of the content.
    pub sha256: String,
}

/// Digest listing of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Format version.
    pub format_version: u32,
    /// Artifact name.
    pub name: String,
    /// Generation time.
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    /// Packaged files sorted by path.
    pub files: Vec<ManifestEntry>,
}

impl Manifest {
    /// Builds a manifest, sorting the entries and dropping any entry for the
    /// manifest file itself.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        generated_at: OffsetDateTime,
        mut files: Vec<ManifestEntry>,
    ) -> Self {
        files.retain(|entry| entry.path != MANIFEST_FILE_NAME);
        files.sort();
        Self {
            format_version: MANIFEST_FORMAT_VERSION,
            name: name.into(),
            generated_at,
            files,
        }
    }

    /// Serialises the manifest as pretty JSON with a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::ManifestSerialize`].
    pub fn to_json(&self) -> Result<Vec<u8>, ArtifactError> {
        let mut payload =
            serde_json::to_vec_pretty(self).map_err(ArtifactError::ManifestSerialize)?;
        payload.push(b'\n');
        Ok(payload)
    }

    /// Parses a manifest, reporting errors against `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::ManifestParse`] or
    /// [`ArtifactError::UnsupportedManifestVersion`].
    pub fn from_json(raw: &[u8], origin: &Path) -> Result<Self, ArtifactError> {
        let manifest: Self =
            serde_json::from_slice(raw).map_err(|source| ArtifactError::ManifestParse {
                path: origin.to_path_buf(),
                source,
            })?;
        if manifest.format_version != MANIFEST_FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedManifestVersion {
                path: origin.to_path_buf(),
                found: manifest.format_version,
            });
        }
        Ok(manifest)
    }

    /// Reads a manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Read`] plus the errors of
    /// [`Manifest::from_json`].
    pub fn read(path: &Path) -> Result<Self, ArtifactError> {
        let raw = fs::read(path).map_err(|source| ArtifactError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw, path)
    }

    /// Total size of the listed files.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|entry| entry.size).sum()
    }
}
