//! Runtime state and process lifecycle for Launchpad.
//!
//! Launchpad has no daemon. Every command is a short-lived process that
//! recovers the truth about running applications from a persisted state file,
//! re-derives liveness from the operating system and writes corrections back.
//! This crate holds the pieces of that cycle:
//!
//! - [`StateStore`]: locked, atomic load/mutate/save of [`RuntimeState`].
//! - [`allocate`]: lowest-free-port allocation within an application's range.
//! - [`LifecycleManager`]: start, stop, status and phase execution, singly or
//!   in batches that never let one application's failure abort the others.

pub mod lifecycle;
pub mod ports;
pub mod process;
pub mod record;
pub mod store;

pub use self::lifecycle::{
    BatchOutcome, LifecycleError, LifecycleManager, LifecycleSettings, StartReport, StatusReport,
    StopOutcome,
};
pub use self::ports::{AllocationError, BindProbe, PortProbe, allocate, is_listening};
pub use self::process::ProcessError;
pub use self::record::{RuntimeRecord, RuntimeState, RuntimeStatus, STATE_FORMAT_VERSION};
pub use self::store::{StateStore, StateTransaction, StoreError};

const STORE_TARGET: &str = "launchpad_runtime::store";
const PORTS_TARGET: &str = "launchpad_runtime::ports";
const LIFECYCLE_TARGET: &str = "launchpad_runtime::lifecycle";
