//! Directory traversal and hashing shared by the packer and the verifier.

use std::io::Read;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use crate::WALK_TARGET;
use crate::error::ArtifactError;
use crate::exclude::ExclusionSet;
use crate::manifest::MANIFEST_FILE_NAME;

/// A regular file selected for packing or verification.
#[derive(Debug)]
pub(crate) struct WalkedFile {
    pub(crate) absolute: PathBuf,
    pub(crate) relative: String,
}

/// Lists regular files under `root` depth-first in file-name order.
///
/// Excluded components prune whole subtrees. Symbolic links are neither
/// followed nor listed; each one is logged at debug level. The root-level
/// manifest and `skip` (a root-relative path) are left out.
pub(crate) fn walk_files(
    root: &Path,
    exclusions: &ExclusionSet,
    skip: Option<&str>,
) -> Result<Vec<WalkedFile>, ArtifactError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || entry
                    .file_name()
                    .to_str()
                    .is_none_or(|name| !exclusions.excludes_name(name))
        });
    for item in walker {
        let entry = item.map_err(|source| ArtifactError::Walk {
            path: root.to_path_buf(),
            source: Box::new(source),
        })?;
        if entry.file_type().is_symlink() {
            debug!(target: WALK_TARGET, path = %entry.path().display(), "symbolic link skipped");
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }
        let relative_path = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let relative = to_manifest_path(relative_path)?;
        if relative == MANIFEST_FILE_NAME || skip.is_some_and(|skipped| skipped == relative) {
            continue;
        }
        files.push(WalkedFile {
            absolute: entry.into_path(),
            relative,
        });
    }
    Ok(files)
}

/// Converts a relative path to its `/`-separated manifest form.
pub(crate) fn to_manifest_path(relative: &Path) -> Result<String, ArtifactError> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let text = part.to_str().ok_or_else(|| ArtifactError::NonUtf8Path {
                    path: relative.to_path_buf(),
                })?;
                parts.push(text);
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ArtifactError::UnsafeMemberPath {
                    path: relative.to_path_buf(),
                });
            }
        }
    }
    Ok(parts.join("/"))
}

/// Lowercase hex SHA-256 of a byte slice.
pub(crate) fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Streams a reader through SHA-256, returning the digest and byte count.
pub(crate) fn sha256_reader(mut reader: impl Read) -> std::io::Result<(String, u64)> {
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 8192];
    let mut total = 0_u64;
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        let chunk = buffer.get(..read).unwrap_or_default();
        hasher.update(chunk);
        total += u64::try_from(read).unwrap_or(u64::MAX);
    }
    Ok((hex::encode(hasher.finalize()), total))
}
