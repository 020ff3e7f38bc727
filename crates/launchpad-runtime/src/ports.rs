//! Port allocation.
//!
//! Allocation is deterministic: the range is scanned from its lowest port and
//! the first candidate that is neither claimed by a tracked record nor bound
//! by some other process wins.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use launchpad_registry::AppEntry;
use socket2::{Domain, Socket, Type};
use thiserror::Error;
use tracing::{debug, warn};

use crate::PORTS_TARGET;
use crate::record::RuntimeState;

const CONNECT_PROBE_TIMEOUT: Duration = Duration::from_millis(250);

/// Errors raised while allocating a port.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocationError {
    /// Every port of the application's range is taken.
    #[error("no free port for '{app}' in range {min}-{max}")]
    NoPortAvailable {
        /// Application name.
        app: String,
        /// Lowest port of the range.
        min: u16,
        /// Highest port of the range.
        max: u16,
    },
}

/// Checks whether a port can currently be bound.
pub trait PortProbe {
    /// Returns `true` when nothing else holds `port`.
    fn is_free(&self, port: u16) -> bool;
}

/// Probes ports by binding a TCP socket on the configured host.
///
/// `SO_REUSEADDR` is set so sockets lingering in `TIME_WAIT` from a
/// just-stopped application do not make its port look taken.
#[derive(Debug, Clone)]
pub struct BindProbe {
    host: String,
}

impl BindProbe {
    /// Creates a probe binding on `host`.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// Host the probe binds on.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    fn try_bind(&self, port: u16) -> io::Result<()> {
        let address = resolve(&self.host, port)?;
        let socket = Socket::new(Domain::for_address(address), Type::STREAM, None)?;
        socket.set_reuse_address(true)?;
        socket.bind(&address.into())
    }
}

impl PortProbe for BindProbe {
    fn is_free(&self, port: u16) -> bool {
        match self.try_bind(port) {
            Ok(()) => true,
            Err(error) if error.kind() == io::ErrorKind::AddrInUse => false,
            Err(error) => {
                warn!(
                    target: PORTS_TARGET,
                    host = %self.host,
                    port,
                    error = %error,
                    "bind probe failed; treating port as taken"
                );
                false
            }
        }
    }
}

/// Picks the lowest port of the entry's range that is free.
///
/// # Errors
///
/// Returns [`AllocationError::NoPortAvailable`] when the whole range is
/// claimed or bound.
pub fn allocate(
    entry: &AppEntry,
    state: &RuntimeState,
    probe: &dyn PortProbe,
) -> Result<u16, AllocationError> {
    let held: std::collections::BTreeSet<u16> = state.held_ports().collect();
    let range = entry.ports();
    for port in range.ports() {
        if held.contains(&port) {
            debug!(target: PORTS_TARGET, app = entry.name(), port, "port held by a tracked app");
            continue;
        }
        if !probe.is_free(port) {
            debug!(target: PORTS_TARGET, app = entry.name(), port, "port bound by another process");
            continue;
        }
        debug!(target: PORTS_TARGET, app = entry.name(), port, "port allocated");
        return Ok(port);
    }
    Err(AllocationError::NoPortAvailable {
        app: entry.name().to_owned(),
        min: range.min,
        max: range.max,
    })
}

/// Returns `true` when something accepts TCP connections on `host:port`.
#[must_use]
pub fn is_listening(host: &str, port: u16) -> bool {
    resolve(host, port)
        .and_then(|address| TcpStream::connect_timeout(&address, CONNECT_PROBE_TIMEOUT))
        .is_ok()
}

fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    let mut addrs = (host, port).to_socket_addrs()?;
    addrs
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved address"))
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use launchpad_registry::PortRange;
    use mockall::mock;
    use mockall::predicate::eq;
    use rstest::rstest;

    use super::*;
    use crate::record::RuntimeStatus;

    mock! {
        Probe {}
        impl PortProbe for Probe {
            fn is_free(&self, port: u16) -> bool;
        }
    }

    fn all_free() -> MockProbe {
        let mut probe = MockProbe::new();
        probe.expect_is_free().returning(|_| true);
        probe
    }

    fn state_with(records: &[(&str, RuntimeStatus, u16)]) -> RuntimeState {
        let mut state = RuntimeState::default();
        for (name, status, port) in records {
            let record = state.record_mut(name);
            record.status = *status;
            record.port = Some(*port);
            record.pid = Some(1);
        }
        state
    }

    #[rstest]
    #[case::wide(PortRange::new(8000, 8010))]
    #[case::single(PortRange::new(3000, 3000))]
    fn empty_state_allocates_range_minimum(#[case] range: PortRange) {
        let entry = AppEntry::new("api", range);
        let state = RuntimeState::default();
        for _ in 0..3 {
            assert_eq!(allocate(&entry, &state, &all_free()), Ok(range.min));
        }
    }

    #[rstest]
    #[case::running(RuntimeStatus::Running, 8001)]
    #[case::starting(RuntimeStatus::Starting, 8001)]
    #[case::stopped(RuntimeStatus::Stopped, 8000)]
    #[case::unknown(RuntimeStatus::Unknown, 8000)]
    fn skips_ports_claimed_by_live_records(#[case] status: RuntimeStatus, #[case] expected: u16) {
        let entry = AppEntry::new("b", PortRange::new(8000, 8010));
        let state = state_with(&[("a", status, 8000)]);
        assert_eq!(allocate(&entry, &state, &all_free()), Ok(expected));
    }

    #[test]
    fn skips_ports_bound_outside_the_registry() {
        let entry = AppEntry::new("api", PortRange::new(8000, 8002));
        let mut probe = MockProbe::new();
        probe.expect_is_free().with(eq(8000)).return_const(false);
        probe.expect_is_free().with(eq(8001)).return_const(true);
        assert_eq!(
            allocate(&entry, &RuntimeState::default(), &probe),
            Ok(8001)
        );
    }

    #[test]
    fn held_ports_are_never_probed() {
        let entry = AppEntry::new("b", PortRange::new(8000, 8001));
        let state = state_with(&[("a", RuntimeStatus::Running, 8000)]);
        let mut probe = MockProbe::new();
        probe.expect_is_free().with(eq(8000)).never();
        probe.expect_is_free().with(eq(8001)).return_const(true);
        assert_eq!(allocate(&entry, &state, &probe), Ok(8001));
    }

    #[test]
    fn exhausted_range_reports_no_port_available() {
        let entry = AppEntry::new("api", PortRange::new(8000, 8001));
        let state = state_with(&[
            ("a", RuntimeStatus::Running, 8000),
            ("b", RuntimeStatus::Starting, 8001),
        ]);
        assert_eq!(
            allocate(&entry, &state, &all_free()),
            Err(AllocationError::NoPortAvailable {
                app: String::from("api"),
                min: 8000,
                max: 8001,
            })
        );
    }

    #[test]
    fn bind_probe_detects_listening_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
        let port = listener.local_addr().expect("local addr").port();
        let probe = BindProbe::new("127.0.0.1");
        assert!(!probe.is_free(port));
        assert!(is_listening("127.0.0.1", port));
        drop(listener);
        assert!(probe.is_free(port));
    }
}
