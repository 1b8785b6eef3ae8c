//! Error types for the migration engine.

use livemig_hypervisor::HypervisorError;
use thiserror::Error;

use crate::metadata::MetadataError;
use crate::volume::VolumeError;

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrationError>;

/// Errors raised by the source and destination coordinators.
///
/// Admission failures are raised before any side effect. Hypervisor errors
/// pass through transparently so callers see the collaborator's own kind and
/// message.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Instance not in a migratable state, or required metadata missing.
    #[error("live migration of instance '{name}' failed because {reason}")]
    InvalidState { name: String, reason: String },

    /// No overlap between the instance's mode and the destination's modes.
    #[error(
        "cannot migrate {name} because its processor compatibility mode {mode} \
         is not in the list of modes \"{modes}\" supported by the target host"
    )]
    ProcCompatMismatch {
        name: String,
        mode: String,
        modes: String,
    },

    /// The hypervisor's readiness predicate is false.
    #[error("live migration of instance '{name}' failed because it is not ready. Reason: {reason}")]
    NotReady { name: String, reason: String },

    /// A host is at its concurrent-migration ceiling.
    #[error(
        "cannot migrate {name} because the host {host} only allows {allowed} concurrent \
         migrations and {running} migrations are currently running"
    )]
    CapacityExceeded {
        name: String,
        host: String,
        allowed: u32,
        running: u32,
    },

    /// Source and destination memory-region granularity differ.
    #[error(
        "cannot migrate {name} because the memory region size of the source ({source_mrs} MB) \
         does not match the memory region size of the target ({target_mrs} MB)"
    )]
    MemoryRegionSizeMismatch {
        name: String,
        source_mrs: u64,
        target_mrs: u64,
    },

    /// One or more volume participants failed. All participants were
    /// attempted; `source` is the first failure.
    #[error(
        "cannot migrate {name} because the volume {volume} cannot be prepared on host {host} \
         ({failed} of {attempted} volume participants failed)"
    )]
    VolumeMigration {
        name: String,
        host: String,
        volume: String,
        attempted: usize,
        failed: usize,
        #[source]
        source: VolumeError,
    },

    /// Hypervisor client or host service error.
    #[error(transparent)]
    Hypervisor(#[from] HypervisorError),

    /// Migration metadata could not be built, encoded or decoded.
    #[error("migration metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl MigrationError {
    /// Creates a new invalid state error.
    #[must_use]
    pub fn invalid_state(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for errors raised by the admission checks.
    #[must_use]
    pub const fn is_admission_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidState { .. }
                | Self::ProcCompatMismatch { .. }
                | Self::NotReady { .. }
                | Self::CapacityExceeded { .. }
                | Self::MemoryRegionSizeMismatch { .. }
        )
    }

    /// Returns true if a volume participant failed.
    #[must_use]
    pub const fn is_volume_failure(&self) -> bool {
        matches!(self, Self::VolumeMigration { .. })
    }

    /// Short machine-readable kind, used as a structured log field.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidState { .. } => "invalid_state",
            Self::ProcCompatMismatch { .. } => "proc_compat_mismatch",
            Self::NotReady { .. } => "not_ready",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::MemoryRegionSizeMismatch { .. } => "memory_region_size_mismatch",
            Self::VolumeMigration { .. } => "volume_migration",
            Self::Hypervisor(e) => e.kind(),
            Self::Metadata(_) => "metadata",
            Self::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_message() {
        let err = MigrationError::CapacityExceeded {
            name: "inst".into(),
            host: "HV4".into(),
            allowed: 4,
            running: 4,
        };
        assert!(err.is_admission_failure());
        assert_eq!(
            err.to_string(),
            "cannot migrate inst because the host HV4 only allows 4 concurrent migrations \
             and 4 migrations are currently running"
        );
    }

    #[test]
    fn test_hypervisor_error_is_transparent() {
        let err: MigrationError = HypervisorError::api("session expired").into();
        assert!(!err.is_admission_failure());
        assert_eq!(err.kind(), "api");
        assert_eq!(err.to_string(), "management API error: session expired");
    }

    #[test]
    fn test_volume_error_keeps_source() {
        use std::error::Error as _;

        let err = MigrationError::VolumeMigration {
            name: "inst".into(),
            host: "HV5".into(),
            volume: "vol-2".into(),
            attempted: 2,
            failed: 1,
            source: VolumeError::other("vol-2", "foo"),
        };
        assert!(err.is_volume_failure());
        assert_eq!(err.kind(), "volume_migration");
        assert!(err.source().unwrap().to_string().contains("foo"));
    }
}
