//! Host service bundle handed to the coordinators.

use std::sync::Arc;

use livemig_hypervisor::{
    ConsoleService, CredentialRegistrar, HostInventory, HypervisorClient, InMemoryHost,
    NetworkWiring, StorageScrubber, VirtualMedia,
};

/// Every external service one host's coordinators use.
///
/// Cheap to clone; one bundle can back many coordinators.
#[derive(Clone)]
pub struct HostServices {
    pub hypervisor: Arc<dyn HypervisorClient>,
    pub inventory: Arc<dyn HostInventory>,
    pub console: Arc<dyn ConsoleService>,
    pub credentials: Arc<dyn CredentialRegistrar>,
    pub storage: Arc<dyn StorageScrubber>,
    pub media: Arc<dyn VirtualMedia>,
    pub network: Arc<dyn NetworkWiring>,
}

impl HostServices {
    /// Backs every service with one in-memory host.
    #[must_use]
    pub fn in_memory(host: &Arc<InMemoryHost>) -> Self {
        Self {
            hypervisor: host.clone(),
            inventory: host.clone(),
            console: host.clone(),
            credentials: host.clone(),
            storage: host.clone(),
            media: host.clone(),
            network: host.clone(),
        }
    }
}

impl std::fmt::Debug for HostServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostServices").finish_non_exhaustive()
    }
}
