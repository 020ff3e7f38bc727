//! Verification of a directory or archive against a manifest.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use serde::Serialize;
use tracing::{info, warn};

use crate::VERIFY_TARGET;
use crate::error::ArtifactError;
use crate::exclude::ExclusionSet;
use crate::manifest::{MANIFEST_FILE_NAME, Manifest};
use crate::walk::{sha256_reader, to_manifest_path, walk_files};

/// How strictly extra files are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyPolicy {
    /// Fail when the target holds files the manifest does not list.
    pub fail_on_extra: bool,
}

/// Outcome of comparing a target with a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    /// `true` when nothing is missing or mismatched, and no extras are
    /// present under a strict policy.
    pub ok: bool,
    /// Listed in the manifest but absent from the target.
    pub missing: Vec<String>,
    /// Present in the target but not listed in the manifest.
    pub extra: Vec<String>,
    /// Present on both sides with differing digests.
    pub mismatched: Vec<String>,
}

/// Path to digest view of a verification target.
pub type DigestMap = BTreeMap<String, String>;

enum Target<'a> {
    Directory(&'a Path),
    Archive(&'a Path),
}

fn classify(target: &Path) -> Result<Target<'_>, ArtifactError> {
    if target.is_dir() {
        return Ok(Target::Directory(target));
    }
    let is_archive = target.is_file()
        && target
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(".tar.gz") || name.ends_with(".tgz"));
    if is_archive {
        Ok(Target::Archive(target))
    } else {
        Err(ArtifactError::UnsupportedTarget {
            path: target.to_path_buf(),
        })
    }
}

/// Verifies `target` against `manifest`.
///
/// Directories are walked with `exclusions`; archives are read in full. The
/// manifest's own file is ignored on both sides.
///
/// # Errors
///
/// Returns [`ArtifactError`] when the target cannot be read.
pub fn verify(
    target: &Path,
    manifest: &Manifest,
    exclusions: &ExclusionSet,
    policy: VerifyPolicy,
) -> Result<VerificationResult, ArtifactError> {
    let actual = match classify(target)? {
        Target::Directory(dir) => digest_directory(dir, exclusions)?,
        Target::Archive(archive) => digest_archive(archive)?,
    };
    let result = compare(manifest, &actual, policy);
    if result.ok {
        info!(
            target: VERIFY_TARGET,
            target_path = %target.display(),
            files = manifest.files.len(),
            extra = result.extra.len(),
            "artifact verified"
        );
    } else {
        warn!(
            target: VERIFY_TARGET,
            target_path = %target.display(),
            missing = result.missing.len(),
            extra = result.extra.len(),
            mismatched = result.mismatched.len(),
            "artifact verification failed"
        );
    }
    Ok(result)
}

/// Compares a manifest with an observed digest map.
#[must_use]
pub fn compare(
    manifest: &Manifest,
    actual: &DigestMap,
    policy: VerifyPolicy,
) -> VerificationResult {
    let expected: DigestMap = manifest
        .files
        .iter()
        .filter(|entry| entry.path != MANIFEST_FILE_NAME)
        .map(|entry| (entry.path.clone(), entry.sha256.to_ascii_lowercase()))
        .collect();

    let mut missing = Vec::new();
    let mut mismatched = Vec::new();
    for (path, digest) in &expected {
        match actual.get(path) {
            None => missing.push(path.clone()),
            Some(observed) if observed != digest => mismatched.push(path.clone()),
            Some(_) => {}
        }
    }
    let extra: Vec<String> = actual
        .keys()
        .filter(|path| path.as_str() != MANIFEST_FILE_NAME && !expected.contains_key(*path))
        .cloned()
        .collect();

    let extras_fail = policy.fail_on_extra && !extra.is_empty();
    let ok = missing.is_empty() && mismatched.is_empty() && !extras_fail;
    VerificationResult {
        ok,
        missing,
        extra,
        mismatched,
    }
}

/// Digests every file under `root` that survives `exclusions`.
///
/// # Errors
///
/// Returns [`ArtifactError`] when traversal or reading fails.
pub fn digest_directory(
    root: &Path,
    exclusions: &ExclusionSet,
) -> Result<DigestMap, ArtifactError> {
    let mut digests = DigestMap::new();
    for file in walk_files(root, exclusions, None)? {
        let handle = File::open(&file.absolute).map_err(|source| ArtifactError::Read {
            path: file.absolute.clone(),
            source,
        })?;
        let (digest, _) = sha256_reader(handle).map_err(|source| ArtifactError::Read {
            path: file.absolute.clone(),
            source,
        })?;
        digests.insert(file.relative, digest);
    }
    Ok(digests)
}

/// Digests every regular file stored in a `.tar.gz` archive, leaving out the
/// manifest member.
///
/// # Errors
///
/// Returns [`ArtifactError::Archive`] when the archive cannot be read.
pub fn digest_archive(path: &Path) -> Result<DigestMap, ArtifactError> {
    let mut digests = DigestMap::new();
    scan_archive(path, |relative, reader| {
        if relative != MANIFEST_FILE_NAME {
            let (digest, _) = sha256_reader(reader)?;
            digests.insert(relative.to_owned(), digest);
        }
        Ok(())
    })?;
    Ok(digests)
}

/// Loads the manifest stored in a packed directory or inside an archive.
///
/// # Errors
///
/// Returns [`ArtifactError::ManifestNotFound`] when the target carries no
/// manifest, or the errors of [`Manifest::from_json`].
pub fn load_manifest(target: &Path) -> Result<Manifest, ArtifactError> {
    match classify(target)? {
        Target::Directory(dir) => {
            let path = dir.join(MANIFEST_FILE_NAME);
            if !path.is_file() {
                return Err(ArtifactError::ManifestNotFound {
                    target: target.to_path_buf(),
                });
            }
            Manifest::read(&path)
        }
        Target::Archive(archive) => {
            let mut raw = None;
            scan_archive(archive, |relative, reader| {
                if relative == MANIFEST_FILE_NAME {
                    let mut buffer = Vec::new();
                    reader.read_to_end(&mut buffer)?;
                    raw = Some(buffer);
                }
                Ok(())
            })?;
            let bytes = raw.ok_or_else(|| ArtifactError::ManifestNotFound {
                target: target.to_path_buf(),
            })?;
            Manifest::from_json(&bytes, &archive.join(MANIFEST_FILE_NAME))
        }
    }
}

fn scan_archive<F>(path: &Path, mut visit: F) -> Result<(), ArtifactError>
where
    F: FnMut(&str, &mut dyn Read) -> std::io::Result<()>,
{
    let archive_error = |source: std::io::Error| ArtifactError::Archive {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    for item in archive.entries().map_err(archive_error)? {
        let mut entry = item.map_err(archive_error)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let member = entry.path().map_err(archive_error)?.into_owned();
        let relative = to_manifest_path(&member)?;
        visit(&relative, &mut entry).map_err(archive_error)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests;
