//! Unit tests for registry loading.

use std::fs;
use std::path::Path;

use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;
use crate::entry::{CapsuleMode, Phase, PortRange, StackKind};

const SAMPLE: &str = r#"
[[apps]]
name = "api"
source = "https://example.com/api.git"
stack = "fastapi"
ports = { min = 8000, max = 8010 }
health_path = "/health"

[apps.commands]
run = "uvicorn main:app --port {PORT}"
test = "pytest"

[[apps]]
name = "web"
stack = "next"
path = "frontend/web"
ports = { min = 3000, max = 3000 }
capsule_mode = "static"
"#;

#[fixture]
fn sample() -> Registry {
    Registry::parse(SAMPLE, Path::new("apps.toml")).expect("sample parses")
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[rstest]
fn parses_entries_in_declaration_order(sample: Registry) {
    let names: Vec<_> = sample.iter().map(AppEntry::name).collect();
    assert_eq!(names, vec!["api", "web"]);
}

#[rstest]
fn parses_entry_fields(sample: Registry) {
    let api = sample.require("api").expect("api present");
    assert_eq!(api.source(), "https://example.com/api.git");
    assert_eq!(api.stack(), StackKind::Python);
    assert_eq!(api.ports(), PortRange::new(8000, 8010));
    assert_eq!(api.health_path(), Some("/health"));
    assert_eq!(api.capsule_mode(), CapsuleMode::Http);
    assert_eq!(api.command(Phase::Run), Some("uvicorn main:app --port {PORT}"));
    assert_eq!(api.command(Phase::Install), None);

    let web = sample.require("web").expect("web present");
    assert_eq!(web.stack(), StackKind::Node);
    assert_eq!(web.capsule_mode(), CapsuleMode::Static);
    assert_eq!(web.relative_dir(), Path::new("frontend/web"));
}

#[test]
fn empty_file_yields_empty_registry() {
    let registry = Registry::parse("", Path::new("apps.toml")).expect("empty parses");
    assert!(registry.is_empty());
}

#[test]
fn rejects_duplicate_names() {
    let raw = r#"
[[apps]]
name = "api"
ports = { min = 8000, max = 8010 }

[[apps]]
name = "api"
ports = { min = 9000, max = 9010 }
"#;
    let err = Registry::parse(raw, Path::new("apps.toml")).expect_err("duplicate fails");
    assert!(matches!(err, RegistryError::DuplicateApp { ref name } if name == "api"));
}

#[test]
fn rejects_inverted_port_range() {
    let raw = r#"
[[apps]]
name = "api"
ports = { min = 8010, max = 8000 }
"#;
    let err = Registry::parse(raw, Path::new("apps.toml")).expect_err("inverted fails");
    assert!(matches!(err, RegistryError::InvalidEntry { ref app, .. } if app == "api"));
}

#[rstest]
#[case::unknown_field("[[apps]]\nname = \"a\"\nports = { min = 1, max = 2 }\ncolour = \"red\"\n")]
#[case::missing_ports("[[apps]]\nname = \"a\"\n")]
#[case::syntax_error("[[apps]\nname = ")]
fn malformed_registry_reports_path(#[case] raw: &str) {
    let err = Registry::parse(raw, Path::new("conf/apps.toml")).expect_err("parse fails");
    assert!(matches!(err, RegistryError::Parse { .. }));
    assert!(err.to_string().contains("conf/apps.toml"));
}

#[test]
fn require_reports_unknown_app() {
    let registry = Registry::default();
    let err = registry.require("ghost").expect_err("lookup fails");
    assert!(err.to_string().contains("ghost"));
}

// ---------------------------------------------------------------------------
// Loading from disk
// ---------------------------------------------------------------------------

#[test]
fn load_reads_file() {
    let temp = TempDir::new().expect("temp dir");
    let path = temp.path().join("apps.toml");
    fs::write(&path, SAMPLE).expect("write registry");
    let registry = Registry::load(&path).expect("load");
    assert_eq!(registry.len(), 2);
}

#[test]
fn load_reports_missing_file() {
    let temp = TempDir::new().expect("temp dir");
    let err = Registry::load(&temp.path().join("absent.toml")).expect_err("missing file");
    assert!(matches!(err, RegistryError::Read { .. }));
}

// ---------------------------------------------------------------------------
// Default registry
// ---------------------------------------------------------------------------

#[test]
fn default_registry_is_valid() {
    let registry =
        Registry::parse(DEFAULT_REGISTRY, Path::new("apps.toml")).expect("default parses");
    assert!(registry.get("coevo-api").is_some());
    assert!(registry.get("growora").is_some());
}

#[test]
fn write_default_never_overwrites() {
    let temp = TempDir::new().expect("temp dir");
    let path = temp.path().join("nested").join("apps.toml");

    assert!(write_default_registry(&path).expect("first write"));
    fs::write(&path, "# customised\n").expect("customise");
    assert!(!write_default_registry(&path).expect("second write"));
    assert_eq!(
        fs::read_to_string(&path).expect("read back"),
        "# customised\n"
    );
}
