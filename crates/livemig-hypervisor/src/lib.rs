//! # livemig-hypervisor
//!
//! Collaborator contracts for the live-migration engine.
//!
//! The coordinators in `livemig-core` never talk to a management API
//! directly. Everything they need from the outside world is expressed here:
//!
//! - [`HypervisorClient`]: partition lookup, readiness, migrate/abort/recover
//! - [`HostInventory`]: capacity and compatibility snapshots
//! - [`ConsoleService`], [`CredentialRegistrar`], [`StorageScrubber`],
//!   [`VirtualMedia`], [`NetworkWiring`]: single-purpose host services
//!
//! ## Backends
//!
//! - **In-memory**: [`in_memory::InMemoryHost`] simulates one managed system
//!   and records every call.
//!
//! ## Example
//!
//! ```
//! use livemig_hypervisor::{HostInventory, HostSnapshot, InMemoryHost};
//!
//! let host = InMemoryHost::new(HostSnapshot {
//!     system_name: "HV4".into(),
//!     memory_region_size: 256,
//!     active_migrations_supported: 4,
//!     active_migrations_in_progress: 2,
//!     proc_compat_modes: vec!["default".into()],
//! });
//! assert!(host.capacity_snapshot().unwrap().has_migration_headroom());
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod in_memory;
pub mod traits;
pub mod types;

pub use error::{HypervisorError, Result};
pub use in_memory::InMemoryHost;
pub use traits::{
    ConsoleService, CredentialRegistrar, HostInventory, HypervisorClient, NetworkWiring,
    StorageScrubber, VirtualMedia,
};
pub use types::{
    DestinationIdentity, HostSnapshot, LparWrapper, MigrationState, NetworkInfo, Readiness, Vif,
};
