//! Operating-system process control.
//!
//! Launched applications outlive the invocation that started them, so no
//! process handle is ever kept. Liveness is always re-derived from the pid
//! recorded in the state file.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

#[cfg(unix)]
use nix::errno::Errno;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Errors raised while inspecting or signalling processes.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The recorded pid cannot be represented as an OS pid.
    #[error("pid {pid} is out of range")]
    InvalidPid {
        /// Recorded pid.
        pid: u32,
    },

    /// Querying the process table failed.
    #[cfg(unix)]
    #[error("failed to check process {pid}: {source}")]
    Probe {
        /// Process id being checked.
        pid: u32,
        /// Underlying errno.
        #[source]
        source: Errno,
    },

    /// Delivering a signal failed.
    #[cfg(unix)]
    #[error("failed to signal process group {pid}: {source}")]
    Signal {
        /// Process group leader.
        pid: u32,
        /// Underlying errno.
        #[source]
        source: Errno,
    },

    /// Process control is not available on this platform.
    #[error("process control is unsupported on this platform")]
    Unsupported,
}

/// Signal sent while stopping an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// Graceful termination request.
    Terminate,
    /// Forced kill.
    Kill,
}

/// Launches `command` through `sh -c` as the leader of a new process group.
///
/// Output is appended to `log_path`; `PORT` is exported to the child.
pub(crate) fn spawn_detached(
    command: &str,
    cwd: &Path,
    port: u16,
    log_path: &Path,
) -> io::Result<Child> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let stdout = OpenOptions::new().create(true).append(true).open(log_path)?;
    let stderr = stdout.try_clone()?;

    let mut cmd = shell(command);
    cmd.current_dir(cwd)
        .env("PORT", port.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    cmd.spawn()
}

/// Runs `command` to completion in `cwd`, inheriting standard streams.
pub(crate) fn run_to_completion(command: &str, cwd: &Path) -> io::Result<ExitStatus> {
    shell(command).current_dir(cwd).status()
}

fn shell(command: &str) -> Command {
    #[cfg(unix)]
    {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
    #[cfg(not(unix))]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    }
}

/// Polls a freshly spawned child for `window`, returning its exit status if
/// it terminated within the window.
pub(crate) fn probe_launch(child: &mut Child, window: Duration) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + window;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Returns `true` when `pid` refers to a live process.
///
/// A pid that is our own exited child is reaped first so zombies are not
/// mistaken for live processes.
#[cfg(unix)]
pub fn is_alive(pid: u32) -> Result<bool, ProcessError> {
    use nix::sys::signal::kill;
    use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};

    let raw = to_pid(pid)?;
    if raw.as_raw() <= 0 {
        return Ok(false);
    }
    match waitpid(raw, Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::Exited(..) | WaitStatus::Signaled(..)) => return Ok(false),
        Ok(_) | Err(Errno::ECHILD) => {}
        Err(source) => return Err(ProcessError::Probe { pid, source }),
    }
    match kill(raw, None) {
        Ok(()) | Err(Errno::EPERM) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(source) => Err(ProcessError::Probe { pid, source }),
    }
}

/// Returns `true` when `pid` refers to a live process.
#[cfg(not(unix))]
pub fn is_alive(_pid: u32) -> Result<bool, ProcessError> {
    Err(ProcessError::Unsupported)
}

/// Returns `true` when `pid` is alive and still leads its own process group.
///
/// Applications are always launched as group leaders, so a live pid outside
/// its own group has been reused by an unrelated process.
#[cfg(unix)]
pub fn leads_live_group(pid: u32) -> Result<bool, ProcessError> {
    use nix::unistd::getpgid;

    if !is_alive(pid)? {
        return Ok(false);
    }
    let raw = to_pid(pid)?;
    match getpgid(Some(raw)) {
        Ok(group) => Ok(group == raw),
        Err(Errno::ESRCH) => Ok(false),
        Err(source) => Err(ProcessError::Probe { pid, source }),
    }
}

/// Returns `true` when `pid` is alive and still leads its own process group.
#[cfg(not(unix))]
pub fn leads_live_group(_pid: u32) -> Result<bool, ProcessError> {
    Err(ProcessError::Unsupported)
}

/// Sends `signal` to the process group led by `pid`.
///
/// A group that no longer exists is not an error. Only the group is ever
/// signalled, never the bare pid.
#[cfg(unix)]
pub fn signal_group(pid: u32, signal: StopSignal) -> Result<(), ProcessError> {
    use nix::sys::signal::{Signal, killpg};

    let raw = to_pid(pid)?;
    let signal = match signal {
        StopSignal::Terminate => Signal::SIGTERM,
        StopSignal::Kill => Signal::SIGKILL,
    };
    match killpg(raw, signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(source) => Err(ProcessError::Signal { pid, source }),
    }
}

/// Sends `signal` to the process group led by `pid`.
#[cfg(not(unix))]
pub fn signal_group(_pid: u32, _signal: StopSignal) -> Result<(), ProcessError> {
    Err(ProcessError::Unsupported)
}

/// Waits up to `timeout` for `pid` to exit, returning `true` if it did.
pub fn wait_for_exit(pid: u32, timeout: Duration) -> Result<bool, ProcessError> {
    let deadline = Instant::now() + timeout;
    loop {
        if !is_alive(pid)? {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(unix)]
fn to_pid(pid: u32) -> Result<nix::unistd::Pid, ProcessError> {
    i32::try_from(pid)
        .map(nix::unistd::Pid::from_raw)
        .map_err(|_| ProcessError::InvalidPid { pid })
}
