//! Destination-side migration coordinator.

use std::sync::Arc;

use livemig_hypervisor::{HostSnapshot, NetworkInfo};
use tracing::{debug, info, warn};

use crate::config::DestinationConfig;
use crate::error::{MigrationError, Result};
use crate::instance::{BlockDeviceInfo, DiskInfo, Instance, RequestContext};
use crate::metadata::{DestinationData, MigrationMetadata, ProcCompatModes};
use crate::services::HostServices;
use crate::state::MigrationPhase;
use crate::volume::{self, VolumeParticipant};

/// Drives one migration attempt on the host the instance is moving to.
#[derive(Debug)]
pub struct DestinationMigrationCoordinator {
    instance: Instance,
    services: HostServices,
    identity: DestinationConfig,
    /// Host name seen by the last capacity check.
    system_name: Option<String>,
    /// Participant output of `pre_live_migration`, kept for rollback.
    dest_data: Option<MigrationMetadata>,
    phase: MigrationPhase,
}

impl DestinationMigrationCoordinator {
    /// Creates a coordinator that advertises `identity` as the migrate
    /// job's target.
    #[must_use]
    pub fn new(instance: Instance, services: HostServices, identity: DestinationConfig) -> Self {
        Self {
            instance,
            services,
            identity,
            system_name: None,
            dest_data: None,
            phase: MigrationPhase::Idle,
        }
    }

    #[must_use]
    pub const fn instance(&self) -> &Instance {
        &self.instance
    }

    #[must_use]
    pub const fn phase(&self) -> MigrationPhase {
        self.phase
    }

    /// Destination data produced by the last `pre_live_migration`.
    #[must_use]
    pub const fn dest_data(&self) -> Option<&MigrationMetadata> {
        self.dest_data.as_ref()
    }

    /// Host-level admission checks on the destination.
    ///
    /// Memory region sizes are compared first, then the destination's
    /// capacity is read from a fresh snapshot. No per-instance check runs
    /// here.
    ///
    /// Returns the metadata the source coordinator is built with: this
    /// host's name, advertised address and user, and its processor
    /// compatibility modes.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::MemoryRegionSizeMismatch`],
    /// [`MigrationError::CapacityExceeded`], or the inventory's error.
    pub fn check_destination(
        &mut self,
        ctx: &RequestContext,
        src_host: &HostSnapshot,
        dst_host: &HostSnapshot,
    ) -> Result<MigrationMetadata> {
        self.instance.log_operation("check_destination");
        debug!(
            request_id = %ctx.request_id,
            source = %src_host.system_name,
            destination = %dst_host.system_name,
            "Destination migration check"
        );

        if src_host.memory_region_size != dst_host.memory_region_size {
            return Err(MigrationError::MemoryRegionSizeMismatch {
                name: self.instance.name.clone(),
                source_mrs: src_host.memory_region_size,
                target_mrs: dst_host.memory_region_size,
            });
        }

        let host = self.services.inventory.capacity_snapshot()?;
        self.system_name = Some(host.system_name.clone());
        if !host.has_migration_headroom() {
            return Err(MigrationError::CapacityExceeded {
                name: self.instance.name.clone(),
                host: host.system_name,
                allowed: host.active_migrations_supported,
                running: host.active_migrations_in_progress,
            });
        }

        let proc_compat = (!host.proc_compat_modes.is_empty())
            .then(|| ProcCompatModes::from_modes(host.proc_compat_modes).to_string());
        let dest_data = MigrationMetadata::with_destination(DestinationData::new(
            host.system_name,
            self.identity.ip.clone(),
            self.identity.user_id.clone(),
            proc_compat,
        ));
        debug!(dest_data = ?dest_data, "Destination migration data");

        self.phase = MigrationPhase::Admitted;
        Ok(dest_data)
    }

    /// Prepares this host to receive the instance.
    ///
    /// Registers the source's public key (if any), scrubs stale storage
    /// mappings, then lets every participant prepare its volume. A failing
    /// participant does not stop the ones after it.
    ///
    /// # Errors
    ///
    /// Returns a [`MigrationError::VolumeMigration`] for the first failed
    /// participant, or the collaborator's error.
    pub fn pre_live_migration(
        &mut self,
        ctx: &RequestContext,
        block_device_info: &BlockDeviceInfo,
        network_info: &NetworkInfo,
        disk_info: &DiskInfo,
        migrate_data: &MigrationMetadata,
        participants: &[Arc<dyn VolumeParticipant>],
    ) -> Result<MigrationMetadata> {
        self.instance.log_operation("pre_live_migration");
        debug!(
            request_id = %ctx.request_id,
            migrate_data = ?migrate_data,
            block_device_info = ?block_device_info,
            network_info = ?network_info,
            disk_info = ?disk_info,
            "Preparing destination"
        );

        // The migrate job authenticates with this key.
        if let Some(key) = migrate_data.public_key() {
            self.services.credentials.add_authorized_key(key)?;
        }

        self.services.storage.scrub_all_destination_storage()?;

        let mut dest_data = MigrationMetadata::new();
        let outcome = volume::run_all(participants, |p| {
            p.prepare_destination(migrate_data, &mut dest_data)
        });
        let failure = outcome.into_first_failure();
        self.dest_data = Some(dest_data.clone());

        if let Some((volume, source, attempted, failed)) = failure {
            self.phase = MigrationPhase::Failed;
            return Err(MigrationError::VolumeMigration {
                name: self.instance.name.clone(),
                host: self.host_name(),
                volume,
                attempted,
                failed,
                source,
            });
        }

        debug!(dest_data = ?dest_data, "Pre live migration data");
        Ok(dest_data)
    }

    /// Finishes the migration once the instance runs here.
    ///
    /// # Errors
    ///
    /// Returns the network service's error, or a
    /// [`MigrationError::VolumeMigration`] for the first failed participant.
    pub fn post_live_migration_at_destination(
        &mut self,
        network_info: &NetworkInfo,
        participants: &[Arc<dyn VolumeParticipant>],
    ) -> Result<()> {
        self.instance.log_operation("post_live_migration_at_destination");

        self.services
            .network
            .finalize_destination(&self.instance.uuid, network_info)?;

        let empty = MigrationMetadata::new();
        let dest_data = self.dest_data.as_ref().unwrap_or(&empty);
        let outcome = volume::run_all(participants, |p| {
            p.post_live_migration_at_destination(dest_data)
        });
        if let Some((volume, source, attempted, failed)) = outcome.into_first_failure() {
            return Err(MigrationError::VolumeMigration {
                name: self.instance.name.clone(),
                host: self.host_name(),
                volume,
                attempted,
                failed,
                source,
            });
        }

        info!(uuid = %self.instance.uuid, "Instance migrated to this host");
        self.phase = MigrationPhase::Completed;
        Ok(())
    }

    /// Discards destination-side volume preparation after a failed attempt.
    ///
    /// Never fails: participant errors are logged and swallowed.
    pub fn rollback_live_migration_at_destination(
        &mut self,
        ctx: &RequestContext,
        participants: &[Arc<dyn VolumeParticipant>],
    ) {
        self.instance.log_operation("rollback_live_migration_at_destination");
        debug!(request_id = %ctx.request_id, "Rolling back destination");

        let empty = MigrationMetadata::new();
        let dest_data = self.dest_data.as_ref().unwrap_or(&empty);
        let outcome = volume::run_all(participants, |p| p.cleanup_at_destination(dest_data));
        if !outcome.failures.is_empty() {
            warn!(
                uuid = %self.instance.uuid,
                attempted = outcome.attempted,
                failed = outcome.failures.len(),
                "Destination volume cleanup incomplete"
            );
        }
        self.phase = MigrationPhase::RolledBack;
    }

    fn host_name(&self) -> String {
        if let Some(name) = &self.system_name {
            return name.clone();
        }
        self.services
            .inventory
            .capacity_snapshot()
            .map_or_else(|_| self.identity.ip.clone(), |host| host.system_name)
    }
}
