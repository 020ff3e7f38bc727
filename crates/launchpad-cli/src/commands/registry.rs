//! Registry-side commands: init, list, sync, capsule, detect and doctor.

use std::io::Write;
use std::path::PathBuf;

use launchpad_registry::{
    Capsule, StackKind, detect_package_manager, detect_stack, write_default_registry,
};
use serde_json::json;
use tracing::info;

use super::{COMMANDS_TARGET, Workspace, report_batch, select};
use crate::cli::AppSelector;
use crate::errors::AppError;
use crate::output::{Table, outcome_marker};
use crate::sync::SyncSource;

/// Tools `doctor` looks for on `PATH`.
const DOCTOR_TOOLS: [&str; 5] = ["git", "python", "node", "npm", "pnpm"];

pub(super) fn init<W: Write>(workspace: &Workspace, out: &mut W) -> Result<(), AppError> {
    let path = workspace.registry_path();
    let created = write_default_registry(path)?;
    let paths = workspace.state_paths()?;
    if created {
        writeln!(out, "created registry at {}", path.display())?;
    } else {
        writeln!(out, "registry already exists at {}", path.display())?;
    }
    writeln!(out, "state directory: {}", paths.state_dir().display())?;
    workspace.audit("init", json!({ "registry": path, "created": created }));
    Ok(())
}

pub(super) fn list<W: Write>(workspace: &Workspace, out: &mut W) -> Result<(), AppError> {
    let registry = workspace.registry()?;
    let mut table = Table::new(["NAME", "STACK", "PORTS", "PATH", "DESCRIPTION"]);
    for entry in registry.iter() {
        table.push([
            entry.name().to_owned(),
            entry.stack().to_string(),
            entry.ports().to_string(),
            entry.relative_dir().display().to_string(),
            entry.description().to_owned(),
        ]);
    }
    write!(out, "{}", table.render())?;
    Ok(())
}

pub(super) fn sync<W: Write, S: SyncSource>(
    workspace: &Workspace,
    source: &S,
    selector: &AppSelector,
    out: &mut W,
) -> Result<(), AppError> {
    let registry = workspace.registry()?;
    let results = select(&registry, selector)?
        .into_iter()
        .map(|entry| {
            let result = source
                .ensure_up_to_date(entry, workspace.apps_root())
                .map_err(|error| error.to_string());
            (entry.name().to_owned(), result)
        })
        .collect();
    workspace.audit(
        "sync",
        json!({ "apps": selector.app.as_deref().unwrap_or("--all") }),
    );
    report_batch(out, results, |dir: &PathBuf| dir.display().to_string())
}

pub(super) fn capsule<W: Write>(
    workspace: &Workspace,
    app: &str,
    out: &mut W,
) -> Result<(), AppError> {
    let registry = workspace.registry()?;
    let entry = registry.require(app)?;
    let checkout = entry.checkout_dir(workspace.apps_root());
    let detected = checkout.is_dir().then(|| detect_stack(&checkout));
    let capsule = Capsule::from_entry(entry, detected);
    serde_json::to_writer_pretty(&mut *out, &capsule)?;
    writeln!(out)?;
    Ok(())
}

pub(super) fn detect<W: Write>(
    workspace: &Workspace,
    app: &str,
    out: &mut W,
) -> Result<(), AppError> {
    let registry = workspace.registry()?;
    let entry = registry.require(app)?;
    let checkout = entry.checkout_dir(workspace.apps_root());
    if !checkout.is_dir() {
        return Err(AppError::MissingCheckout {
            app: app.to_owned(),
            path: checkout,
        });
    }
    let stack = detect_stack(&checkout);
    let manager = detect_package_manager(&checkout);
    info!(target: COMMANDS_TARGET, app, %stack, "stack detected");
    writeln!(out, "{app}: {stack}")?;
    if stack != entry.stack() && entry.stack() != StackKind::Unknown {
        writeln!(out, "  registry declares {}", entry.stack())?;
    }
    if let Some(manager) = manager {
        writeln!(out, "  package manager: {manager}")?;
    }
    Ok(())
}

/// Lists external tools and where they resolve. Never fails on a missing tool.
pub(super) fn doctor<W: Write>(out: &mut W) -> Result<(), AppError> {
    let mut table = Table::new(["", "TOOL", "LOCATION"]);
    for tool in DOCTOR_TOOLS {
        let (found, location) = match which::which(tool) {
            Ok(path) => (true, path.display().to_string()),
            Err(_) => (false, "not found".to_owned()),
        };
        table.push([outcome_marker(found).to_owned(), tool.to_owned(), location]);
    }
    write!(out, "{}", table.render())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use launchpad_registry::AppEntry;
    use mockall::mock;

    use super::*;
    use crate::sync::SyncError;
    use crate::tests::{TestWorkspace, WORKSPACE_REGISTRY};

    mock! {
        Source {}
        impl SyncSource for Source {
            fn ensure_up_to_date(&self, entry: &AppEntry, apps_root: &Path) -> Result<PathBuf, SyncError>;
        }
    }

    #[test]
    fn sync_reports_each_application_and_fails_the_batch() {
        let fixture = TestWorkspace::with_registry(WORKSPACE_REGISTRY);
        let mut source = MockSource::new();
        source
            .expect_ensure_up_to_date()
            .times(2)
            .returning(|entry, root| match entry.name() {
                "site" => Err(SyncError::NoSource),
                _ => Ok(entry.checkout_dir(root)),
            });
        let selector = AppSelector {
            app: None,
            all: true,
        };

        let mut out = Vec::new();
        let err = sync(&fixture.workspace(), &source, &selector, &mut out)
            .expect_err("one application fails");

        assert!(matches!(err, AppError::BatchFailed { failed: 1, total: 2 }));
        let printed = String::from_utf8(out).expect("utf8");
        assert!(printed.contains("ok   api:"), "{printed}");
        assert!(printed.contains("FAIL site: no source configured"), "{printed}");
    }

    #[test]
    fn capsule_prefers_the_detected_stack_for_unknown_entries() {
        let fixture = TestWorkspace::with_registry(WORKSPACE_REGISTRY);
        let checkout = fixture.apps_root().join("site");
        std::fs::create_dir_all(&checkout).expect("checkout");
        std::fs::write(checkout.join("index.html"), "<html></html>").expect("index");

        let mut out = Vec::new();
        capsule(&fixture.workspace(), "site", &mut out).expect("capsule");

        let value: serde_json::Value = serde_json::from_slice(&out).expect("json");
        assert_eq!(value["name"], "site");
        assert_eq!(value["stack"], "static");
    }

    #[test]
    fn detect_requires_a_checkout() {
        let fixture = TestWorkspace::with_registry(WORKSPACE_REGISTRY);
        let err = detect(&fixture.workspace(), "api", &mut Vec::new()).expect_err("no checkout");
        assert!(matches!(err, AppError::MissingCheckout { .. }));
    }

    #[test]
    fn doctor_lists_every_tool() {
        let mut out = Vec::new();
        doctor(&mut out).expect("doctor");
        let printed = String::from_utf8(out).expect("utf8");
        for tool in DOCTOR_TOOLS {
            assert!(printed.contains(tool), "{tool} missing from {printed}");
        }
    }
}
