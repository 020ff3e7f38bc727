use std::path::PathBuf;

use launchpad_registry::Phase;
use thiserror::Error;

use crate::ports::AllocationError;
use crate::process::ProcessError;
use crate::store::StoreError;

/// Errors raised by lifecycle operations. Every variant names the
/// application it concerns, except state persistence failures which are not
/// application-specific.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The application already has a live process.
    #[error("'{app}' is already running (pid {pid}, port {port})")]
    AlreadyRunning {
        /// Application name.
        app: String,
        /// Live process id.
        pid: u32,
        /// Port it holds.
        port: u16,
    },

    /// The application directory does not exist.
    #[error("'{app}' has no checkout at '{path}'; run sync first")]
    MissingCheckout {
        /// Application name.
        app: String,
        /// Expected checkout directory.
        path: PathBuf,
    },

    /// No command template is configured for the phase.
    #[error("'{app}' has no {phase} command configured")]
    MissingCommand {
        /// Application name.
        app: String,
        /// Phase lacking a command.
        phase: Phase,
    },

    /// The run phase cannot be executed to completion.
    #[error("'{app}': the run phase is started with `run`, not executed to completion")]
    PhaseNotRunnable {
        /// Application name.
        app: String,
    },

    /// No port was available.
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// The command could not be spawned.
    #[error("failed to launch '{app}': {source}")]
    Spawn {
        /// Application name.
        app: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The command exited during the launch probe window.
    #[error("'{app}' exited during startup ({reason}); see {}", log_path.display())]
    LaunchFailed {
        /// Application name.
        app: String,
        /// Exit description.
        reason: String,
        /// Log file holding the command's output.
        log_path: PathBuf,
    },

    /// A phase command exited unsuccessfully.
    #[error("'{app}' {phase} failed ({reason})")]
    PhaseFailed {
        /// Application name.
        app: String,
        /// Phase that failed.
        phase: Phase,
        /// Exit description.
        reason: String,
    },

    /// Inspecting or signalling the process failed.
    #[error("process control failed for '{app}': {source}")]
    Process {
        /// Application name.
        app: String,
        /// Underlying process error.
        #[source]
        source: ProcessError,
    },

    /// The runtime state could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),
}
