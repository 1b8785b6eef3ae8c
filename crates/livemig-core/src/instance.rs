//! Migrating instance identity and its cached hypervisor view.

use std::collections::BTreeMap;
use std::sync::Arc;

use livemig_hypervisor::{HypervisorClient, HypervisorError, LparWrapper};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller-owned identity of the instance being migrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Instance UUID; also the partition UUID on the hypervisor.
    pub uuid: String,
    /// Instance name.
    pub name: String,
    /// Name shown to users.
    pub display_name: String,
}

impl Instance {
    #[must_use]
    pub fn new(
        uuid: impl Into<String>,
        name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
            display_name: display_name.into(),
        }
    }

    /// Emits the per-operation log line.
    pub fn log_operation(&self, op: &str) {
        tracing::info!(
            operation = op,
            display_name = %self.display_name,
            name = %self.name,
            uuid = %self.uuid,
            "Operation: {}. Virtual machine display name: {}, name: {}, UUID: {}",
            op,
            self.display_name,
            self.name,
            self.uuid
        );
    }
}

/// Per-request context handed in by the orchestration layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Correlation id for log lines of one orchestration request.
    pub request_id: String,
}

impl RequestContext {
    /// Creates a context with a fresh request id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: format!("req-{}", Uuid::new_v4()),
        }
    }

    #[must_use]
    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Block device mapping of the instance, passed through for logging.
pub type BlockDeviceInfo = BTreeMap<String, String>;

/// Disk layout of the instance, passed through for logging.
pub type DiskInfo = BTreeMap<String, String>;

/// Cached hypervisor view of the instance's partition.
///
/// Fetched lazily on first use and refreshed only when asked. Callers that
/// need current state (rollback, for example) must call [`refresh`].
///
/// [`refresh`]: LparHandle::refresh
pub struct LparHandle {
    instance_uuid: String,
    client: Arc<dyn HypervisorClient>,
    cached: Option<LparWrapper>,
}

impl LparHandle {
    #[must_use]
    pub fn new(instance_uuid: impl Into<String>, client: Arc<dyn HypervisorClient>) -> Self {
        Self {
            instance_uuid: instance_uuid.into(),
            client,
            cached: None,
        }
    }

    /// Returns the cached wrapper, fetching it if nothing is cached yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the first fetch fails.
    pub fn get(&mut self) -> Result<&LparWrapper, HypervisorError> {
        if self.cached.is_none() {
            self.refresh()?;
        }
        self.cached
            .as_ref()
            .ok_or_else(|| HypervisorError::not_found(format!("lpar {}", self.instance_uuid)))
    }

    /// Re-reads the wrapper from the hypervisor and replaces the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails; the previous cache is kept.
    pub fn refresh(&mut self) -> Result<&LparWrapper, HypervisorError> {
        let fresh = self.client.get_lpar(&self.instance_uuid)?;
        Ok(self.cached.insert(fresh))
    }

    /// Returns the cached wrapper without fetching.
    #[must_use]
    pub fn cached(&self) -> Option<&LparWrapper> {
        self.cached.as_ref()
    }
}

impl std::fmt::Debug for LparHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LparHandle")
            .field("instance_uuid", &self.instance_uuid)
            .field("cached", &self.cached)
            .finish_non_exhaustive()
    }
}
