//! Artifact packaging and integrity verification.
//!
//! [`pack`] turns an application directory into a gzip-compressed tar plus a
//! SHA-256 [`Manifest`]; [`verify`] checks a directory or archive against a
//! manifest and reports every missing, extra and mismatched path. Both sides
//! share one [`ExclusionSet`] so a directory verifies against the manifest it
//! was packed with.

pub mod error;
pub mod exclude;
pub mod manifest;
pub mod pack;
pub mod verify;
mod walk;

pub use self::error::ArtifactError;
pub use self::exclude::ExclusionSet;
pub use self::manifest::{MANIFEST_FILE_NAME, MANIFEST_FORMAT_VERSION, Manifest, ManifestEntry};
pub use self::pack::{PackOutput, PackReport, pack, pack_to_path};
pub use self::verify::{
    DigestMap, VerificationResult, VerifyPolicy, compare, digest_archive, digest_directory,
    load_manifest, verify,
};

const PACK_TARGET: &str = "launchpad_artifact::pack";
const VERIFY_TARGET: &str = "launchpad_artifact::verify";
const WALK_TARGET: &str = "launchpad_artifact::walk";
