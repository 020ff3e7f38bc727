//! Deterministic packaging of an application directory.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::Builder;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::PACK_TARGET;
use crate::error::ArtifactError;
use crate::exclude::ExclusionSet;
use crate::manifest::{MANIFEST_FILE_NAME, Manifest, ManifestEntry};
use crate::walk::{sha256_hex, to_manifest_path, walk_files};

/// In-memory result of packing a directory.
#[derive(Debug, Clone)]
pub struct PackOutput {
    /// Gzip-compressed tar bytes, manifest included as the last member.
    pub archive: Vec<u8>,
    /// Manifest describing every packed file except itself.
    pub manifest: Manifest,
}

/// Summary of a pack written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackReport {
    /// Location of the written archive.
    pub archive_path: PathBuf,
    /// Location of the manifest written into the source directory.
    pub manifest_path: PathBuf,
    /// Number of packaged files.
    pub file_count: usize,
    /// Total uncompressed size of the packaged files.
    pub total_size: u64,
}

/// Packs `source_dir` into a gzip-compressed tar with a generated manifest.
///
/// Each file is read once; the bytes feed both the digest and the archive so
/// the manifest always describes exactly what was archived.
///
/// # Errors
///
/// Returns [`ArtifactError`] when traversal, reading or archiving fails.
pub fn pack(
    source_dir: &Path,
    name: &str,
    exclusions: &ExclusionSet,
) -> Result<PackOutput, ArtifactError> {
    pack_skipping(source_dir, name, exclusions, None)
}

/// Packs `source_dir` to `output` and writes the manifest next to the
/// sources as `artifact.manifest.json`.
///
/// The archive is written atomically. When `output` lies inside the source
/// directory it is left out of the traversal.
///
/// # Errors
///
/// Returns [`ArtifactError`] when packing or either write fails.
pub fn pack_to_path(
    source_dir: &Path,
    output: &Path,
    name: &str,
    exclusions: &ExclusionSet,
) -> Result<PackReport, ArtifactError> {
    let skip = output_inside(source_dir, output);
    let packed = pack_skipping(source_dir, name, exclusions, skip.as_deref())?;

    write_atomic(output, &packed.archive)?;
    let manifest_path = source_dir.join(MANIFEST_FILE_NAME);
    write_atomic(&manifest_path, &packed.manifest.to_json()?)?;

    info!(
        target: PACK_TARGET,
        app = name,
        archive = %output.display(),
        files = packed.manifest.files.len(),
        "artifact packed"
    );
    Ok(PackReport {
        archive_path: output.to_path_buf(),
        manifest_path,
        file_count: packed.manifest.files.len(),
        total_size: packed.manifest.total_size(),
    })
}

fn pack_skipping(
    source_dir: &Path,
    name: &str,
    exclusions: &ExclusionSet,
    skip: Option<&str>,
) -> Result<PackOutput, ArtifactError> {
    let archive_error = |source: io::Error| ArtifactError::Archive {
        path: source_dir.to_path_buf(),
        source,
    };

    let files = walk_files(source_dir, exclusions, skip)?;
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let mut entries = Vec::with_capacity(files.len());

    for file in files {
        let metadata = fs::metadata(&file.absolute).map_err(|source| ArtifactError::Read {
            path: file.absolute.clone(),
            source,
        })?;
        let contents = fs::read(&file.absolute).map_err(|source| ArtifactError::Read {
            path: file.absolute.clone(),
            source,
        })?;
        let size = u64::try_from(contents.len()).unwrap_or(u64::MAX);

        let mut header = tar::Header::new_gnu();
        header.set_size(size);
        header.set_mode(file_mode(&metadata));
        header.set_mtime(modified_secs(&metadata));
        header.set_cksum();
        builder
            .append_data(&mut header, &file.relative, contents.as_slice())
            .map_err(archive_error)?;

        debug!(target: PACK_TARGET, path = %file.relative, size, "file packed");
        entries.push(ManifestEntry {
            path: file.relative,
            size,
            sha256: sha256_hex(&contents),
        });
    }

    let manifest = Manifest::new(name, OffsetDateTime::now_utc(), entries);
    let manifest_json = manifest.to_json()?;
    let mut header = tar::Header::new_gnu();
    header.set_size(u64::try_from(manifest_json.len()).unwrap_or(u64::MAX));
    header.set_mode(0o644);
    header.set_mtime(u64::try_from(manifest.generated_at.unix_timestamp()).unwrap_or(0));
    header.set_cksum();
    builder
        .append_data(&mut header, MANIFEST_FILE_NAME, manifest_json.as_slice())
        .map_err(archive_error)?;

    let archive = builder
        .into_inner()
        .and_then(GzEncoder::finish)
        .map_err(archive_error)?;
    Ok(PackOutput { archive, manifest })
}

/// Relative manifest path of `output` when it sits under `source_dir`.
fn output_inside(source_dir: &Path, output: &Path) -> Option<String> {
    let source = fs::canonicalize(source_dir).ok()?;
    let parent = output.parent().filter(|p| !p.as_os_str().is_empty())?;
    let output_dir = fs::canonicalize(parent).ok()?;
    let relative_dir = output_dir.strip_prefix(&source).ok()?;
    let relative = relative_dir.join(output.file_name()?);
    to_manifest_path(&relative).ok()
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ArtifactError> {
    let write_error = |source: io::Error| ArtifactError::Write {
        path: path.to_path_buf(),
        source,
    };
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let prefix = path
        .file_name()
        .and_then(|file_name| file_name.to_str())
        .unwrap_or("artifact");
    let mut file = Builder::new()
        .prefix(prefix)
        .tempfile_in(directory)
        .map_err(write_error)?;
    file.write_all(contents).map_err(write_error)?;
    file.as_file().sync_all().map_err(write_error)?;
    file.persist(path).map_err(|error| write_error(error.error))?;
    Ok(())
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

fn modified_secs(metadata: &fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |elapsed| elapsed.as_secs())
}
