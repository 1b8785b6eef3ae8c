//! Coordinator-side migration phase.

use serde::{Deserialize, Serialize};

/// Phase of one migration attempt as seen by a coordinator.
///
/// ```text
/// Idle ──check──▶ Admitted ──live_migration──▶ Transferring ──▶ Completed
///                                                  │
///                                                  ├──▶ Failed ──rollback──▶ RolledBack
///                                                  └──abort──▶ Aborted
/// ```
///
/// The hypervisor's own migration state stays authoritative; this phase
/// only drives guards and log context within a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationPhase {
    /// No admission check has passed yet.
    Idle,
    /// Admission checks passed.
    Admitted,
    /// The migrate job is running.
    Transferring,
    /// The migrate job finished.
    Completed,
    /// The migrate job failed.
    Failed,
    /// Abort accepted by the hypervisor.
    Aborted,
    /// Rollback ran after a failure.
    RolledBack,
}

impl MigrationPhase {
    /// Returns true if no further transition is expected.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::RolledBack)
    }

    /// Returns true if a migrate job may be started from this phase.
    #[must_use]
    pub const fn can_transfer(&self) -> bool {
        matches!(self, Self::Admitted)
    }

    /// Returns the phase name for logging.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Admitted => "admitted",
            Self::Transferring => "transferring",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
            Self::RolledBack => "rolled_back",
        }
    }
}

impl std::fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
