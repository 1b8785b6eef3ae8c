//! Error types for the hypervisor collaborator crate.

use thiserror::Error;

/// Result type alias for hypervisor operations.
pub type Result<T> = std::result::Result<T, HypervisorError>;

/// Errors reported by the hypervisor management client and the host-side
/// services the migration engine consumes.
#[derive(Debug, Error)]
pub enum HypervisorError {
    /// The partition, host or session does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Management API call failed.
    #[error("management API error: {0}")]
    Api(String),

    /// The hypervisor rejected or failed a migrate/abort/recover job.
    #[error("migration job {operation} failed: {reason}")]
    MigrationFailed { operation: String, reason: String },
}

impl HypervisorError {
    /// Creates a new API error.
    #[must_use]
    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }

    /// Creates a new not found error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// Creates a new migration job failure.
    #[must_use]
    pub fn migration_failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MigrationFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this is a not found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Short machine-readable kind, used as a structured log field.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Api(_) => "api",
            Self::MigrationFailed { .. } => "migration_failed",
        }
    }
}
