//! Common types used across the hypervisor crate.

use serde::{Deserialize, Serialize};

/// Hypervisor-reported migration state of a logical partition.
///
/// The wire strings match what the management API reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MigrationState {
    /// Idle sentinel; nothing in flight.
    NotMigrating,
    /// Migration job accepted, transfer not yet running.
    Starting,
    /// Memory/state transfer running.
    Running,
    /// Final switch-over in progress.
    Completing,
    /// The last attempt failed and has not been recovered.
    Failed,
    /// Abort requested and in progress.
    Aborting,
    /// Recovery requested and in progress.
    Recovering,
    /// Any state string this crate does not know about.
    Other(String),
}

impl MigrationState {
    /// Returns true for the idle sentinel.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::NotMigrating)
    }

    /// Returns true while a migrate job is underway and can be aborted.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            Self::Starting | Self::Running | Self::Completing | Self::Aborting | Self::Recovering
        )
    }

    /// Returns the wire string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::NotMigrating => "Not_Migrating",
            Self::Starting => "Migration_Starting",
            Self::Running => "Migration_Running",
            Self::Completing => "Migration_Completing",
            Self::Failed => "Migration_Failed",
            Self::Aborting => "Migration_Aborting",
            Self::Recovering => "Migration_Recovering",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for MigrationState {
    fn from(s: &str) -> Self {
        match s {
            "Not_Migrating" => Self::NotMigrating,
            "Migration_Starting" => Self::Starting,
            "Migration_Running" => Self::Running,
            "Migration_Completing" => Self::Completing,
            "Migration_Failed" => Self::Failed,
            "Migration_Aborting" => Self::Aborting,
            "Migration_Recovering" => Self::Recovering,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for MigrationState {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<MigrationState> for String {
    fn from(state: MigrationState) -> Self {
        state.as_str().to_string()
    }
}

impl std::fmt::Display for MigrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live view of a logical partition as last fetched from the hypervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LparWrapper {
    /// Partition UUID (same as the instance UUID).
    pub uuid: String,
    /// Partition name on the managed system.
    pub name: String,
    /// Current migration state.
    pub migration_state: MigrationState,
    /// Processor compatibility mode the partition currently runs in.
    pub proc_compat_mode: String,
}

/// Point-in-time capacity and compatibility view of one host.
///
/// These numbers change as migrations start and stop cluster-wide; callers
/// must fetch a new snapshot for every decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSnapshot {
    /// Managed system name.
    pub system_name: String,
    /// Memory region (logical memory block) size in MB.
    pub memory_region_size: u64,
    /// Concurrent active migrations the host allows.
    pub active_migrations_supported: u32,
    /// Active migrations currently running on the host.
    pub active_migrations_in_progress: u32,
    /// Processor compatibility modes the host can run partitions in.
    pub proc_compat_modes: Vec<String>,
}

impl HostSnapshot {
    /// Returns true if another active migration fits under the ceiling.
    #[must_use]
    pub fn has_migration_headroom(&self) -> bool {
        self.active_migrations_in_progress < self.active_migrations_supported
    }
}

/// Target of a migrate job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationIdentity {
    /// Destination managed system name.
    pub sys_name: String,
    /// Destination management server address.
    pub ip: String,
    /// Management user on the destination, if one is required.
    pub user_id: Option<String>,
}

/// Result of the hypervisor's migration-readiness predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    pub ready: bool,
    /// Human-readable reason when not ready.
    pub reason: Option<String>,
}

impl Readiness {
    #[must_use]
    pub fn ready() -> Self {
        Self {
            ready: true,
            reason: None,
        }
    }

    #[must_use]
    pub fn not_ready(reason: impl Into<String>) -> Self {
        Self {
            ready: false,
            reason: Some(reason.into()),
        }
    }
}

/// One virtual network interface bound to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vif {
    /// Port identifier.
    pub id: String,
    /// MAC address.
    pub address: String,
}

/// Network interfaces of an instance, as supplied by the caller.
pub type NetworkInfo = Vec<Vif>;
