//! Volume participants.
//!
//! A volume participant is the storage-backend adapter for one attached
//! volume. Coordinators call it at fixed points of the migration; it may read
//! the migration metadata and add its own keys.

use std::sync::Arc;

use livemig_hypervisor::HypervisorError;
use thiserror::Error;

use crate::metadata::{MetadataError, MigrationMetadata};

/// Errors reported by a volume participant.
#[derive(Debug, Error)]
pub enum VolumeError {
    /// The volume cannot be mapped or attached on this host.
    #[error("volume {volume}: attach failed: {reason}")]
    Attach { volume: String, reason: String },

    /// Host storage call failed.
    #[error("volume {volume}: {source}")]
    Hypervisor {
        volume: String,
        #[source]
        source: HypervisorError,
    },

    /// Participant wrote a coordinator-owned metadata key.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Any other participant failure.
    #[error("volume {volume}: {reason}")]
    Other { volume: String, reason: String },
}

impl VolumeError {
    /// Creates a new attach error.
    #[must_use]
    pub fn attach(volume: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Attach {
            volume: volume.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new generic error.
    #[must_use]
    pub fn other(volume: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Other {
            volume: volume.into(),
            reason: reason.into(),
        }
    }
}

/// Storage-backend adapter for one volume.
pub trait VolumeParticipant: Send + Sync {
    /// Identifier of the volume this participant handles.
    fn volume_id(&self) -> &str;

    /// Source-side preparation. May add keys to `migrate_data`, which is
    /// sent to the destination.
    fn prepare_source(&self, migrate_data: &mut MigrationMetadata) -> Result<(), VolumeError>;

    /// Destination-side preparation. Reads the source's `migrate_data` and
    /// may add keys to `dest_data`, which is returned to the orchestration
    /// layer.
    fn prepare_destination(
        &self,
        migrate_data: &MigrationMetadata,
        dest_data: &mut MigrationMetadata,
    ) -> Result<(), VolumeError>;

    /// Runs on the destination once the instance is resident there.
    fn post_live_migration_at_destination(
        &self,
        _dest_data: &MigrationMetadata,
    ) -> Result<(), VolumeError> {
        Ok(())
    }

    /// Discards destination-side preparation after a failed attempt.
    fn cleanup_at_destination(&self, _dest_data: &MigrationMetadata) -> Result<(), VolumeError> {
        Ok(())
    }
}

/// Outcome of running one phase across every participant.
#[derive(Debug)]
pub(crate) struct SetOutcome {
    pub attempted: usize,
    /// Failures in participant order.
    pub failures: Vec<(String, VolumeError)>,
}

impl SetOutcome {
    /// Splits off the first failure, if any.
    pub fn into_first_failure(self) -> Option<(String, VolumeError, usize, usize)> {
        let attempted = self.attempted;
        let failed = self.failures.len();
        self.failures
            .into_iter()
            .next()
            .map(|(volume, err)| (volume, err, attempted, failed))
    }
}

/// Calls `f` on every participant in order. A failing participant does not
/// stop the ones after it.
pub(crate) fn run_all<F>(participants: &[Arc<dyn VolumeParticipant>], mut f: F) -> SetOutcome
where
    F: FnMut(&dyn VolumeParticipant) -> Result<(), VolumeError>,
{
    let mut failures = Vec::new();
    for participant in participants {
        let volume = participant.volume_id();
        tracing::info!(volume, "Performing migration step for volume");
        if let Err(e) = f(participant.as_ref()) {
            tracing::error!(volume, error = %e, "Volume participant failed");
            failures.push((volume.to_string(), e));
        }
    }
    SetOutcome {
        attempted: participants.len(),
        failures,
    }
}
