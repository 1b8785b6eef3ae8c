//! # livemig-core
//!
//! Live-migration orchestration engine.
//!
//! Moves a running partition from one managed system to another. Each side
//! of an attempt gets its own coordinator; the orchestration layer carries
//! [`MigrationMetadata`] between them.
//!
//! ## Architecture
//!
//! ```text
//!        destination host                         source host
//! ┌──────────────────────────────┐      ┌──────────────────────────────┐
//! │ check_destination ───────────┼─────▶│ check_source                 │
//! │   (dest_* metadata)          │      │   (public_key + volume keys) │
//! │ pre_live_migration ◀─────────┼──────┤                              │
//! │   (key, scrub, volumes) ─────┼─────▶│ live_migration               │
//! │                              │      │   ├─ ok  ─▶ post_live_…_at_source
//! │ post_live_…_at_destination   │      │   └─ err ─▶ rollback_live_migration
//! │ rollback_live_…_at_destination      │                              │
//! └──────────────────────────────┘      └──────────────────────────────┘
//!                 │                                   │
//!                 └──────────── HostServices ─────────┘
//!                    (livemig-hypervisor traits)
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use livemig_core::{
//!     DestinationConfig, DestinationMigrationCoordinator, HostServices, Instance,
//!     RequestContext, SourceMigrationCoordinator,
//! };
//! use livemig_hypervisor::{HostSnapshot, InMemoryHost, LparWrapper, MigrationState};
//!
//! let snapshot = |name: &str| HostSnapshot {
//!     system_name: name.into(),
//!     memory_region_size: 256,
//!     active_migrations_supported: 4,
//!     active_migrations_in_progress: 0,
//!     proc_compat_modes: vec!["default".into()],
//! };
//! let source = Arc::new(InMemoryHost::new(snapshot("HV4")).with_lpar(LparWrapper {
//!     uuid: "1234".into(),
//!     name: "inst".into(),
//!     migration_state: MigrationState::NotMigrating,
//!     proc_compat_mode: "default".into(),
//! }));
//! let target = Arc::new(InMemoryHost::new(snapshot("HV5")));
//! let instance = Instance::new("1234", "inst", "my instance");
//! let ctx = RequestContext::new();
//!
//! let mut dst = DestinationMigrationCoordinator::new(
//!     instance.clone(),
//!     HostServices::in_memory(&target),
//!     DestinationConfig::default(),
//! );
//! let dest_data = dst.check_destination(&ctx, &snapshot("HV4"), &snapshot("HV5"))?;
//!
//! let mut src =
//!     SourceMigrationCoordinator::new(instance, HostServices::in_memory(&source), dest_data);
//! src.check_source(&ctx, &Default::default(), &[])?;
//! # Ok::<(), livemig_core::MigrationError>(())
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod destination;
pub mod error;
pub mod instance;
pub mod logging;
pub mod metadata;
pub mod services;
pub mod source;
pub mod state;
pub mod volume;

pub use config::{Config, DestinationConfig, LoggingConfig};
pub use destination::DestinationMigrationCoordinator;
pub use error::{MigrationError, Result};
pub use instance::{BlockDeviceInfo, DiskInfo, Instance, LparHandle, RequestContext};
pub use metadata::{DestinationData, MetadataError, MigrationMetadata, ProcCompatModes};
pub use services::HostServices;
pub use source::SourceMigrationCoordinator;
pub use state::MigrationPhase;
pub use volume::{VolumeError, VolumeParticipant};
