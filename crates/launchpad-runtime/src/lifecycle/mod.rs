//! Application lifecycle management.
//!
//! There is no resident supervisor: each operation locks the state store,
//! reconciles the recorded pid against the operating system, acts, and saves.
//! Start holds the lock across allocate, spawn and record so two concurrent
//! invocations can never claim the same port.

mod error;

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use launchpad_registry::{AppEntry, Phase};
use tracing::{debug, info, warn};

pub use self::error::LifecycleError;
use crate::LIFECYCLE_TARGET;
use crate::ports::{BindProbe, PortProbe, allocate, is_listening};
use crate::process::{self, StopSignal};
use crate::record::{RuntimeRecord, RuntimeState, RuntimeStatus, now_utc};
use crate::store::{StateStore, StoreError};

const KILL_WAIT: Duration = Duration::from_secs(2);
const PORT_PLACEHOLDER: &str = "{PORT}";

/// Filesystem and timing settings for lifecycle operations.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    /// Directory under which application checkouts live.
    pub apps_root: PathBuf,
    /// Directory receiving per-application logs.
    pub logs_dir: PathBuf,
    /// Host used for URLs and connection probes.
    pub bind_host: String,
    /// Grace period between the termination request and a forced kill.
    pub stop_grace: Duration,
    /// Window during which a launched command must stay alive.
    pub launch_probe: Duration,
}

/// Result of a successful start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReport {
    /// Application name.
    pub app: String,
    /// Process group leader.
    pub pid: u32,
    /// Allocated port.
    pub port: u16,
    /// Application URL.
    pub url: String,
    /// Log file receiving the command's output.
    pub log_path: PathBuf,
}

/// Result of a successful stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was running; state is unchanged.
    NotRunning,
    /// The recorded process had already exited; the record was corrected.
    AlreadyExited,
    /// The process was signalled and exited.
    Stopped {
        /// Stopped process id.
        pid: u32,
        /// `true` when the grace period lapsed and the group was killed.
        forced: bool,
    },
}

/// Reconciled status of an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// Application name.
    pub app: String,
    /// Reconciled record; a default `Stopped` record if never started.
    pub record: RuntimeRecord,
    /// Whether the port accepts TCP connections, when running.
    pub listening: Option<bool>,
    /// Application URL, when running.
    pub url: Option<String>,
    /// `true` when reconciliation found the recorded process dead.
    pub orphaned: bool,
}

/// Per-application result of a batch operation.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    /// Application name.
    pub app: String,
    /// Operation result.
    pub result: Result<T, LifecycleError>,
}

impl<T> BatchOutcome<T> {
    /// Returns `true` when the operation succeeded.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Starts, stops and reconciles applications against the state store.
#[derive(Debug)]
pub struct LifecycleManager<P = BindProbe> {
    store: StateStore,
    probe: P,
    settings: LifecycleSettings,
}

enum Reconciled {
    Live { pid: u32, port: u16 },
    Orphaned,
    Idle,
}

impl<P: PortProbe> LifecycleManager<P> {
    /// Creates a manager over `store` probing ports with `probe`.
    pub const fn new(store: StateStore, probe: P, settings: LifecycleSettings) -> Self {
        Self {
            store,
            probe,
            settings,
        }
    }

    /// Returns the underlying state store.
    pub const fn store(&self) -> &StateStore {
        &self.store
    }

    /// Returns the lifecycle settings.
    pub const fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    /// Launches the application's run command on a freshly allocated port.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::AlreadyRunning`] for a live record,
    /// [`LifecycleError::MissingCheckout`] or
    /// [`LifecycleError::MissingCommand`] for incomplete setup,
    /// [`LifecycleError::Allocation`] when the range is exhausted, and
    /// [`LifecycleError::Spawn`] or [`LifecycleError::LaunchFailed`] when the
    /// command cannot be started or exits immediately.
    pub fn start(&self, entry: &AppEntry) -> Result<StartReport, LifecycleError> {
        let app = entry.name();
        let mut transaction = self.store.lock()?;
        if let Reconciled::Live { pid, port } = reconcile(transaction.state_mut(), app)? {
            return Err(LifecycleError::AlreadyRunning {
                app: app.to_owned(),
                pid,
                port,
            });
        }

        let checkout = entry.checkout_dir(&self.settings.apps_root);
        if !checkout.is_dir() {
            return Err(LifecycleError::MissingCheckout {
                app: app.to_owned(),
                path: checkout,
            });
        }
        let template = entry
            .command(Phase::Run)
            .ok_or_else(|| LifecycleError::MissingCommand {
                app: app.to_owned(),
                phase: Phase::Run,
            })?;

        let port = allocate(entry, transaction.state(), &self.probe)?;
        let command = template.replace(PORT_PLACEHOLDER, &port.to_string());
        let log_path = self.settings.logs_dir.join(format!("{app}.log"));
        let started_at = now_utc();

        let mut child = match process::spawn_detached(&command, &checkout, port, &log_path) {
            Ok(child) => child,
            Err(source) => {
                let record = transaction.state_mut().record_mut(app);
                record.mark_stopped(started_at);
                record.started_at = Some(started_at);
                record.last_error = Some(source.to_string());
                record.log_path = Some(log_path);
                transaction.save()?;
                warn!(target: LIFECYCLE_TARGET, app, error = %source, "failed to spawn run command");
                return Err(LifecycleError::Spawn {
                    app: app.to_owned(),
                    source,
                });
            }
        };
        let pid = child.id();
        *transaction.state_mut().record_mut(app) = RuntimeRecord {
            pid: Some(pid),
            port: Some(port),
            status: RuntimeStatus::Starting,
            started_at: Some(started_at),
            stopped_at: None,
            last_error: None,
            log_path: Some(log_path.clone()),
        };
        transaction.save()?;
        debug!(target: LIFECYCLE_TARGET, app, pid, port, command = %command, "launched");

        let exited = process::probe_launch(&mut child, self.settings.launch_probe).map_err(
            |source| LifecycleError::Spawn {
                app: app.to_owned(),
                source,
            },
        )?;
        let record = transaction.state_mut().record_mut(app);
        if let Some(status) = exited {
            let reason = describe_exit(status);
            record.mark_stopped(now_utc());
            record.last_error = Some(reason.clone());
            transaction.save()?;
            warn!(target: LIFECYCLE_TARGET, app, pid, reason = %reason, "exited during startup");
            return Err(LifecycleError::LaunchFailed {
                app: app.to_owned(),
                reason,
                log_path,
            });
        }
        record.status = RuntimeStatus::Running;
        transaction.save()?;
        info!(target: LIFECYCLE_TARGET, app, pid, port, "running");

        Ok(StartReport {
            app: app.to_owned(),
            pid,
            port,
            url: self.url(port),
            log_path,
        })
    }

    /// Stops the application's process group.
    ///
    /// Stopping an application that is not running succeeds and leaves the
    /// state file untouched.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Process`] when signalling fails and
    /// [`LifecycleError::Store`] when state cannot be persisted.
    pub fn stop(&self, entry: &AppEntry) -> Result<StopOutcome, LifecycleError> {
        let app = entry.name();
        let mut transaction = self.store.lock()?;
        let Some(record) = transaction.state().record(app) else {
            return Ok(StopOutcome::NotRunning);
        };
        if record.status == RuntimeStatus::Stopped {
            return Ok(StopOutcome::NotRunning);
        }

        let pid = match reconcile(transaction.state_mut(), app)? {
            Reconciled::Live { pid, .. } => pid,
            Reconciled::Orphaned | Reconciled::Idle => {
                transaction.save()?;
                return Ok(StopOutcome::AlreadyExited);
            }
        };

        let process_error = |source| LifecycleError::Process {
            app: app.to_owned(),
            source,
        };
        process::signal_group(pid, StopSignal::Terminate).map_err(process_error)?;
        let mut forced = false;
        if !process::wait_for_exit(pid, self.settings.stop_grace).map_err(process_error)? {
            warn!(
                target: LIFECYCLE_TARGET,
                app,
                pid,
                grace_ms = self.settings.stop_grace.as_millis(),
                "grace period lapsed; killing process group"
            );
            process::signal_group(pid, StopSignal::Kill).map_err(process_error)?;
            process::wait_for_exit(pid, KILL_WAIT).map_err(process_error)?;
            forced = true;
        }

        transaction.state_mut().record_mut(app).mark_stopped(now_utc());
        transaction.save()?;
        info!(target: LIFECYCLE_TARGET, app, pid, forced, "stopped");
        Ok(StopOutcome::Stopped { pid, forced })
    }

    /// Reconciles the recorded state against the OS and reports it.
    ///
    /// Stopped and unknown applications are answered from a shared-lock
    /// snapshot without writing. Anything else is reconciled under the
    /// exclusive lock, which is released before the listening check connects
    /// to the port.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Process`] when liveness cannot be checked
    /// and [`LifecycleError::Store`] when state cannot be persisted.
    pub fn status(&self, entry: &AppEntry) -> Result<StatusReport, LifecycleError> {
        let app = entry.name();
        match self.store.snapshot() {
            Ok(state) => {
                let record = state.record(app);
                if record.is_none_or(|recorded| recorded.status == RuntimeStatus::Stopped) {
                    return Ok(StatusReport {
                        app: app.to_owned(),
                        record: record.cloned().unwrap_or_default(),
                        listening: None,
                        url: None,
                        orphaned: false,
                    });
                }
            }
            // The exclusive lock below quarantines it.
            Err(StoreError::CorruptState { .. }) => {}
            Err(other) => return Err(other.into()),
        }

        let (reconciled, record) = self.store.update(|state| {
            let reconciled = reconcile(state, app)?;
            let record = state.record(app).cloned().unwrap_or_default();
            Ok::<_, LifecycleError>((reconciled, record))
        })??;

        let live_port = match reconciled {
            Reconciled::Live { port, .. } => Some(port),
            Reconciled::Orphaned | Reconciled::Idle => None,
        };
        Ok(StatusReport {
            app: app.to_owned(),
            listening: live_port.map(|port| is_listening(&self.settings.bind_host, port)),
            url: live_port.map(|port| self.url(port)),
            orphaned: matches!(reconciled, Reconciled::Orphaned),
            record,
        })
    }

    /// Runs a non-`run` phase command to completion in the checkout.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::PhaseNotRunnable`] for [`Phase::Run`],
    /// [`LifecycleError::MissingCheckout`],
    /// [`LifecycleError::MissingCommand`], [`LifecycleError::Spawn`] and
    /// [`LifecycleError::PhaseFailed`] for a non-zero exit.
    pub fn run_phase(&self, entry: &AppEntry, phase: Phase) -> Result<(), LifecycleError> {
        let app = entry.name();
        if phase == Phase::Run {
            return Err(LifecycleError::PhaseNotRunnable {
                app: app.to_owned(),
            });
        }
        let checkout = entry.checkout_dir(&self.settings.apps_root);
        if !checkout.is_dir() {
            return Err(LifecycleError::MissingCheckout {
                app: app.to_owned(),
                path: checkout,
            });
        }
        let command = entry
            .command(phase)
            .ok_or_else(|| LifecycleError::MissingCommand {
                app: app.to_owned(),
                phase,
            })?;
        info!(target: LIFECYCLE_TARGET, app, phase = %phase, command, "running phase");
        let status = process::run_to_completion(command, &checkout).map_err(|source| {
            LifecycleError::Spawn {
                app: app.to_owned(),
                source,
            }
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(LifecycleError::PhaseFailed {
                app: app.to_owned(),
                phase,
                reason: describe_exit(status),
            })
        }
    }

    /// Starts every entry in order, collecting per-application results.
    pub fn start_all<'a>(
        &self,
        entries: impl IntoIterator<Item = &'a AppEntry>,
    ) -> Vec<BatchOutcome<StartReport>> {
        batch(entries, |entry| self.start(entry))
    }

    /// Stops every entry in order, collecting per-application results.
    pub fn stop_all<'a>(
        &self,
        entries: impl IntoIterator<Item = &'a AppEntry>,
    ) -> Vec<BatchOutcome<StopOutcome>> {
        batch(entries, |entry| self.stop(entry))
    }

    /// Reports the status of every entry in order.
    pub fn status_all<'a>(
        &self,
        entries: impl IntoIterator<Item = &'a AppEntry>,
    ) -> Vec<BatchOutcome<StatusReport>> {
        batch(entries, |entry| self.status(entry))
    }

    /// Runs `phase` for every entry in order.
    pub fn run_phase_all<'a>(
        &self,
        entries: impl IntoIterator<Item = &'a AppEntry>,
        phase: Phase,
    ) -> Vec<BatchOutcome<()>> {
        batch(entries, |entry| self.run_phase(entry, phase))
    }

    fn url(&self, port: u16) -> String {
        format!("http://{}:{port}/", self.settings.bind_host)
    }
}

fn batch<'a, T>(
    entries: impl IntoIterator<Item = &'a AppEntry>,
    mut operation: impl FnMut(&AppEntry) -> Result<T, LifecycleError>,
) -> Vec<BatchOutcome<T>> {
    entries
        .into_iter()
        .map(|entry| BatchOutcome {
            app: entry.name().to_owned(),
            result: operation(entry),
        })
        .collect()
}

/// Brings the record for `app` in line with the process table.
///
/// Records claiming a process that no longer exists, or whose pid no longer
/// leads its own process group, go to `Stopped` with their pid and port
/// cleared.
fn reconcile(state: &mut RuntimeState, app: &str) -> Result<Reconciled, LifecycleError> {
    let Some(record) = state.apps.get_mut(app) else {
        return Ok(Reconciled::Idle);
    };
    if record.status == RuntimeStatus::Stopped {
        return Ok(Reconciled::Idle);
    }
    let alive = match record.pid {
        Some(pid) => process::leads_live_group(pid).map_err(|source| LifecycleError::Process {
            app: app.to_owned(),
            source,
        })?,
        None => false,
    };
    match (alive, record.pid, record.port) {
        (true, Some(pid), Some(port)) => {
            if record.status == RuntimeStatus::Unknown {
                record.status = RuntimeStatus::Running;
            }
            Ok(Reconciled::Live { pid, port })
        }
        _ => {
            info!(
                target: LIFECYCLE_TARGET,
                app,
                pid = record.pid,
                port = record.port,
                "recorded process is gone; marking stopped"
            );
            record.mark_stopped(now_utc());
            Ok(Reconciled::Orphaned)
        }
    }
}

fn describe_exit(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {code}"),
        None => {
            #[cfg(unix)]
            {
                use std::os::unix::process::ExitStatusExt;
                if let Some(signal) = status.signal() {
                    return format!("killed by signal {signal}");
                }
            }
            String::from("terminated abnormally")
        }
    }
}
