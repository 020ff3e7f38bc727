//! Runtime commands: lifecycle phases, run, stop, status and open.

use std::io::Write;

use launchpad_registry::Phase;
use launchpad_runtime::{BatchOutcome, StatusReport, StopOutcome};
use serde_json::json;

use super::{Workspace, report_batch, select};
use crate::cli::AppSelector;
use crate::errors::AppError;
use crate::output::{Table, outcome_marker};

fn flatten<T>(outcomes: Vec<BatchOutcome<T>>) -> Vec<(String, Result<T, String>)> {
    outcomes
        .into_iter()
        .map(|outcome| (outcome.app, outcome.result.map_err(|error| error.to_string())))
        .collect()
}

pub(super) fn phase<W: Write>(
    workspace: &Workspace,
    phase: Phase,
    selector: &AppSelector,
    out: &mut W,
) -> Result<(), AppError> {
    let registry = workspace.registry()?;
    let entries = select(&registry, selector)?;
    let manager = workspace.manager()?;
    let outcomes = manager.run_phase_all(entries, phase);
    report_batch(out, flatten(outcomes), |_| format!("{phase} finished"))
}

pub(super) fn start<W: Write>(
    workspace: &Workspace,
    selector: &AppSelector,
    out: &mut W,
) -> Result<(), AppError> {
    let registry = workspace.registry()?;
    let entries = select(&registry, selector)?;
    let manager = workspace.manager()?;
    let outcomes = manager.start_all(entries);
    for outcome in &outcomes {
        if let Ok(report) = &outcome.result {
            workspace.audit(
                "start",
                json!({ "app": report.app, "pid": report.pid, "port": report.port }),
            );
        }
    }
    report_batch(out, flatten(outcomes), |report| {
        format!(
            "pid {} on {} (log {})",
            report.pid,
            report.url,
            report.log_path.display()
        )
    })
}

pub(super) fn stop<W: Write>(
    workspace: &Workspace,
    selector: &AppSelector,
    out: &mut W,
) -> Result<(), AppError> {
    let registry = workspace.registry()?;
    let entries = select(&registry, selector)?;
    let manager = workspace.manager()?;
    let outcomes = manager.stop_all(entries);
    for outcome in &outcomes {
        if let Ok(StopOutcome::Stopped { pid, forced }) = &outcome.result {
            workspace.audit(
                "stop",
                json!({ "app": outcome.app, "pid": pid, "forced": forced }),
            );
        }
    }
    report_batch(out, flatten(outcomes), |stopped| match stopped {
        StopOutcome::NotRunning => String::from("not running"),
        StopOutcome::AlreadyExited => String::from("had already exited"),
        StopOutcome::Stopped { pid, forced: false } => format!("stopped pid {pid}"),
        StopOutcome::Stopped { pid, forced: true } => {
            format!("killed pid {pid} after the grace period")
        }
    })
}

fn status_row(report: &StatusReport) -> [String; 6] {
    let dash = || String::from("-");
    let mut status = report.record.status.to_string();
    if report.orphaned {
        status.push_str(" (exited)");
    }
    [
        report.app.clone(),
        status,
        report.record.pid.map_or_else(dash, |pid| pid.to_string()),
        report.record.port.map_or_else(dash, |port| port.to_string()),
        report
            .listening
            .map_or_else(dash, |listening| String::from(if listening { "yes" } else { "no" })),
        report.url.clone().unwrap_or_else(dash),
    ]
}

/// Prints a status table; applications whose status could not be read are
/// reported below it and fail the command.
pub(super) fn status<W: Write>(
    workspace: &Workspace,
    selector: &AppSelector,
    out: &mut W,
) -> Result<(), AppError> {
    let registry = workspace.registry()?;
    let entries = select(&registry, selector)?;
    let manager = workspace.manager()?;
    let outcomes = manager.status_all(entries);
    let total = outcomes.len();

    let mut table = Table::new(["NAME", "STATUS", "PID", "PORT", "LISTENING", "URL"]);
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(report) => table.push(status_row(&report)),
            Err(error) => failures.push((outcome.app, error)),
        }
    }
    write!(out, "{}", table.render())?;
    for (app, error) in &failures {
        writeln!(out, "{} {app}: {error}", outcome_marker(false))?;
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(AppError::BatchFailed {
            failed: failures.len(),
            total,
        })
    }
}

pub(super) fn open<W: Write>(
    workspace: &Workspace,
    app: &str,
    out: &mut W,
) -> Result<(), AppError> {
    let registry = workspace.registry()?;
    let entry = registry.require(app)?;
    let report = workspace.manager()?.status(entry)?;
    let url = report.url.ok_or_else(|| AppError::NotRunning {
        app: app.to_owned(),
    })?;
    open::that(&url).map_err(|source| AppError::Open {
        app: app.to_owned(),
        url: url.clone(),
        source,
    })?;
    writeln!(out, "opened {url}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use launchpad_runtime::{RuntimeRecord, RuntimeStatus};

    use super::*;
    use crate::tests::{TestWorkspace, WORKSPACE_REGISTRY};

    #[test]
    fn status_of_untracked_applications_is_stopped() {
        let fixture = TestWorkspace::with_registry(WORKSPACE_REGISTRY);
        let selector = AppSelector {
            app: None,
            all: true,
        };

        let mut out = Vec::new();
        status(&fixture.workspace(), &selector, &mut out).expect("status");

        let printed = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = printed.lines().collect();
        assert_eq!(lines.len(), 3, "{printed}");
        assert!(lines.iter().skip(1).all(|line| line.contains("stopped")));
    }

    #[test]
    fn open_refuses_stopped_applications() {
        let fixture = TestWorkspace::with_registry(WORKSPACE_REGISTRY);
        let err = open(&fixture.workspace(), "api", &mut Vec::new()).expect_err("not running");
        assert!(matches!(err, AppError::NotRunning { app } if app == "api"));
    }

    #[test]
    fn phase_without_checkout_fails_the_batch() {
        let fixture = TestWorkspace::with_registry(WORKSPACE_REGISTRY);
        let selector = AppSelector {
            app: Some(String::from("api")),
            all: false,
        };

        let mut out = Vec::new();
        let err = phase(&fixture.workspace(), Phase::Install, &selector, &mut out)
            .expect_err("missing checkout");

        assert!(matches!(err, AppError::BatchFailed { failed: 1, total: 1 }));
        let printed = String::from_utf8(out).expect("utf8");
        assert!(printed.starts_with("FAIL api:"), "{printed}");
    }

    #[test]
    fn status_row_marks_orphaned_records() {
        let report = StatusReport {
            app: String::from("api"),
            record: RuntimeRecord {
                status: RuntimeStatus::Stopped,
                ..RuntimeRecord::default()
            },
            listening: None,
            url: None,
            orphaned: true,
        };
        let row = status_row(&report);
        assert_eq!(row.get(1).map(String::as_str), Some("stopped (exited)"));
        assert_eq!(row.get(2).map(String::as_str), Some("-"));
    }
}
