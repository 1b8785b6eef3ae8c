//! Collaborator traits consumed by the migration coordinators.
//!
//! Each trait is the whole contract the engine needs from one external
//! service. All calls are blocking; implementations must be shareable across
//! threads so one set of services can back many coordinators.

use crate::{
    error::HypervisorError,
    types::{DestinationIdentity, HostSnapshot, LparWrapper, NetworkInfo, Readiness},
};

/// Hypervisor management client.
pub trait HypervisorClient: Send + Sync {
    /// Fetches the current wrapper for the partition backing `instance_uuid`.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition cannot be read.
    fn get_lpar(&self, instance_uuid: &str) -> Result<LparWrapper, HypervisorError>;

    /// Evaluates the hypervisor's migration-readiness predicate.
    ///
    /// # Errors
    ///
    /// Returns an error if the predicate cannot be evaluated. A partition
    /// that is simply not ready is reported through [`Readiness`].
    fn is_migration_ready(
        &self,
        lpar: &LparWrapper,
        host: &HostSnapshot,
    ) -> Result<Readiness, HypervisorError>;

    /// Runs the live migrate job. Blocks until the hypervisor reports the
    /// job finished.
    ///
    /// # Errors
    ///
    /// Returns an error if the job fails.
    fn migrate(
        &self,
        lpar: &LparWrapper,
        destination: &DestinationIdentity,
    ) -> Result<(), HypervisorError>;

    /// Requests a graceful abort of an in-flight migration.
    ///
    /// # Errors
    ///
    /// Returns an error if the abort request fails.
    fn abort(&self, lpar: &LparWrapper) -> Result<(), HypervisorError>;

    /// Recovers a partition left in a migration state.
    ///
    /// # Errors
    ///
    /// Returns an error if recovery fails.
    fn recover(&self, lpar: &LparWrapper, force: bool) -> Result<(), HypervisorError>;
}

/// Host capability inventory.
pub trait HostInventory: Send + Sync {
    /// Reads a fresh snapshot of the local host.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot be read.
    fn capacity_snapshot(&self) -> Result<HostSnapshot, HypervisorError>;
}

/// Virtual console / terminal service.
pub trait ConsoleService: Send + Sync {
    /// Closes any console session bound to the partition. Closing when no
    /// session is open succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if an open session cannot be closed.
    fn close_session(&self, instance_uuid: &str) -> Result<(), HypervisorError>;
}

/// Management-console credential registrar.
pub trait CredentialRegistrar: Send + Sync {
    /// Returns the local management console's public key, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be read.
    fn public_key(&self) -> Result<Option<String>, HypervisorError>;

    /// Authorizes `public_key` for the transfer's secure channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be registered.
    fn add_authorized_key(&self, public_key: &str) -> Result<(), HypervisorError>;
}

/// Destination-side storage scrubber.
pub trait StorageScrubber: Send + Sync {
    /// Removes stale mappings and orphaned storage left by earlier failed
    /// attempts. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the scrub fails.
    fn scrub_all_destination_storage(&self) -> Result<(), HypervisorError>;
}

/// Virtual optical media (config drive) service.
pub trait VirtualMedia: Send + Sync {
    /// Detaches and deletes virtual optical media of the partition. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the media cannot be removed.
    fn remove_optical_media(&self, lpar_uuid: &str) -> Result<(), HypervisorError>;
}

/// Host network wiring for migrated instances.
pub trait NetworkWiring: Send + Sync {
    /// Releases network resources bound to the instance on the source host.
    ///
    /// # Errors
    ///
    /// Returns [`HypervisorError::NotFound`] if the instance is no longer
    /// known on this host, or another error if release fails.
    fn release_source(
        &self,
        instance_uuid: &str,
        network_info: &NetworkInfo,
    ) -> Result<(), HypervisorError>;

    /// Finalizes network wiring for an instance now resident on this host.
    ///
    /// # Errors
    ///
    /// Returns an error if wiring fails.
    fn finalize_destination(
        &self,
        instance_uuid: &str,
        network_info: &NetworkInfo,
    ) -> Result<(), HypervisorError>;
}
