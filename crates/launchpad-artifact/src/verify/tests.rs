use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;
use crate::manifest::ManifestEntry;
use crate::pack::pack_to_path;

struct Packed {
    source: TempDir,
    _out: TempDir,
    archive: PathBuf,
    manifest: Manifest,
}

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
    fs::write(path, contents).expect("write file");
}

#[fixture]
fn packed() -> Packed {
    let source = TempDir::new().expect("source dir");
    write(source.path(), "app/main.py", "print('hi')\n");
    write(source.path(), "static/index.html", "<html></html>\n");
    write(source.path(), ".git/HEAD", "ref: refs/heads/main\n");
    let out = TempDir::new().expect("output dir");
    let archive = out.path().join("demo.tar.gz");
    let report =
        pack_to_path(source.path(), &archive, "demo", &ExclusionSet::default()).expect("pack");
    let manifest = Manifest::read(&report.manifest_path).expect("manifest");
    Packed {
        source,
        _out: out,
        archive,
        manifest,
    }
}

fn check(target: &Path, manifest: &Manifest, policy: VerifyPolicy) -> VerificationResult {
    verify(target, manifest, &ExclusionSet::default(), policy).expect("verify")
}

#[rstest]
fn freshly_packed_directory_verifies(packed: Packed) {
    let result = check(packed.source.path(), &packed.manifest, VerifyPolicy::default());
    assert_eq!(
        result,
        VerificationResult {
            ok: true,
            ..VerificationResult::default()
        }
    );
}

#[rstest]
fn freshly_packed_archive_verifies(packed: Packed) {
    let result = check(&packed.archive, &packed.manifest, VerifyPolicy::default());
    assert!(result.ok, "{result:?}");
    assert!(result.extra.is_empty());
}

/// Rewrites `archive` in place, passing each member through `edit`.
/// Members for which `edit` returns `None` are dropped.
fn rewrite_archive(archive: &Path, mut edit: impl FnMut(&str, Vec<u8>) -> Option<Vec<u8>>) {
    let mut members = Vec::new();
    let mut reader = tar::Archive::new(GzDecoder::new(File::open(archive).expect("open")));
    for item in reader.entries().expect("entries") {
        let mut entry = item.expect("entry");
        let path = entry.path().expect("member path").to_string_lossy().into_owned();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).expect("read member");
        members.push((entry.header().clone(), path, data));
    }

    let encoder = GzEncoder::new(File::create(archive).expect("create"), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (mut header, path, data) in members {
        let Some(data) = edit(&path, data) else {
            continue;
        };
        header.set_size(u64::try_from(data.len()).expect("size"));
        header.set_cksum();
        builder.append(&header, data.as_slice()).expect("append");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip");
}

#[rstest]
fn tampered_archive_reports_mismatched_and_missing_members(packed: Packed) {
    rewrite_archive(&packed.archive, |path, mut data| match path {
        "static/index.html" => None,
        "app/main.py" => {
            if let Some(byte) = data.first_mut() {
                *byte ^= 0x20;
            }
            Some(data)
        }
        _ => Some(data),
    });

    let result = check(&packed.archive, &packed.manifest, VerifyPolicy::default());

    assert!(!result.ok);
    assert_eq!(result.mismatched, vec!["app/main.py"]);
    assert_eq!(result.missing, vec!["static/index.html"]);
    assert!(result.extra.is_empty());
}

#[rstest]
fn truncated_archive_is_an_archive_error(packed: Packed) {
    let bytes = fs::read(&packed.archive).expect("read archive");
    fs::write(&packed.archive, bytes.get(..bytes.len() / 2).expect("half")).expect("truncate");

    let err = verify(
        &packed.archive,
        &packed.manifest,
        &ExclusionSet::default(),
        VerifyPolicy::default(),
    )
    .expect_err("truncated archive");
    assert!(matches!(err, ArtifactError::Archive { .. }), "{err}");
}

#[rstest]
fn single_byte_change_is_mismatched(packed: Packed) {
    write(packed.source.path(), "app/main.py", "print('hI')\n");

    let result = check(packed.source.path(), &packed.manifest, VerifyPolicy::default());
    assert!(!result.ok);
    assert_eq!(result.mismatched, vec!["app/main.py"]);
    assert!(result.missing.is_empty());
}

#[rstest]
fn deleted_file_is_missing(packed: Packed) {
    fs::remove_file(packed.source.path().join("static/index.html")).expect("remove");

    let result = check(packed.source.path(), &packed.manifest, VerifyPolicy::default());
    assert!(!result.ok);
    assert_eq!(result.missing, vec!["static/index.html"]);
}

#[rstest]
#[case::lenient(false, true)]
#[case::strict(true, false)]
fn extra_files_fail_only_under_strict_policy(
    packed: Packed,
    #[case] fail_on_extra: bool,
    #[case] expected_ok: bool,
) {
    write(packed.source.path(), "notes.txt", "scratch\n");

    let result = check(
        packed.source.path(),
        &packed.manifest,
        VerifyPolicy { fail_on_extra },
    );
    assert_eq!(result.extra, vec!["notes.txt"]);
    assert_eq!(result.ok, expected_ok);
}

#[rstest]
fn manifest_file_is_never_reported(packed: Packed) {
    let result = check(
        packed.source.path(),
        &packed.manifest,
        VerifyPolicy {
            fail_on_extra: true,
        },
    );
    assert!(result.ok, "{result:?}");
    assert!(
        !packed
            .manifest
            .files
            .iter()
            .any(|entry| entry.path == MANIFEST_FILE_NAME)
    );
}

#[rstest]
fn manifest_loads_from_directory_and_archive(packed: Packed) {
    let from_dir = load_manifest(packed.source.path()).expect("directory manifest");
    let from_archive = load_manifest(&packed.archive).expect("archive manifest");
    assert_eq!(from_dir, packed.manifest);
    assert_eq!(from_archive.files, packed.manifest.files);
}

#[test]
fn directory_without_manifest_is_reported() {
    let dir = TempDir::new().expect("temp dir");
    let err = load_manifest(dir.path()).expect_err("no manifest");
    assert!(matches!(err, ArtifactError::ManifestNotFound { .. }));
}

#[test]
fn unsupported_targets_are_rejected() {
    let dir = TempDir::new().expect("temp dir");
    let zip = dir.path().join("demo.zip");
    fs::write(&zip, "PK").expect("write");
    let manifest = Manifest::new("demo", time::OffsetDateTime::UNIX_EPOCH, Vec::new());

    let err = verify(&zip, &manifest, &ExclusionSet::default(), VerifyPolicy::default())
        .expect_err("zip rejected");
    assert!(matches!(err, ArtifactError::UnsupportedTarget { .. }));
    assert!(matches!(
        load_manifest(&zip),
        Err(ArtifactError::UnsupportedTarget { .. })
    ));
}

#[test]
fn compare_sorts_and_classifies_paths() {
    let manifest = Manifest::new(
        "demo",
        time::OffsetDateTime::UNIX_EPOCH,
        vec![
            ManifestEntry {
                path: "b".to_owned(),
                size: 1,
                sha256: "AA".to_owned(),
            },
            ManifestEntry {
                path: "a".to_owned(),
                size: 1,
                sha256: "bb".to_owned(),
            },
        ],
    );
    let actual = DigestMap::from([
        ("b".to_owned(), "aa".to_owned()),
        ("c".to_owned(), "cc".to_owned()),
        (MANIFEST_FILE_NAME.to_owned(), "ff".to_owned()),
    ]);

    let result = compare(&manifest, &actual, VerifyPolicy::default());
    assert!(!result.ok);
    assert_eq!(result.missing, vec!["a"]);
    assert_eq!(result.extra, vec!["c"]);
    assert!(result.mismatched.is_empty());
}
