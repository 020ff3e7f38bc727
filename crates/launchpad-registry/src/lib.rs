//! Application registry for Launchpad.
//!
//! The registry is a hand-edited TOML file listing every managed application:
//! where it is synced from, which stack it uses, the ports it may bind and
//! the shell command templates for each lifecycle phase. It is loaded fresh on
//! every invocation and never written back by the orchestrator, with the
//! single exception of [`write_default_registry`] seeding a new workspace.
//!
//! Beyond the data model the crate offers two read-only helpers: stack
//! detection over a checkout ([`detect_stack`], [`detect_package_manager`])
//! and the [`Capsule`] export describing an application without packaging it.

pub mod capsule;
pub mod detect;
pub mod entry;
pub mod error;
pub mod registry;

pub use self::capsule::Capsule;
pub use self::detect::{PackageManager, detect_package_manager, detect_stack};
pub use self::entry::{AppEntry, CapsuleMode, Commands, Phase, PortRange, StackKind};
pub use self::error::RegistryError;
pub use self::registry::{DEFAULT_REGISTRY, Registry, write_default_registry};
