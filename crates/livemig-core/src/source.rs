//! Source-side migration coordinator.

use std::sync::Arc;

use livemig_hypervisor::NetworkInfo;
use tracing::{debug, error, info, warn};

use crate::error::{MigrationError, Result};
use crate::instance::{BlockDeviceInfo, Instance, LparHandle, RequestContext};
use crate::metadata::MigrationMetadata;
use crate::services::HostServices;
use crate::state::MigrationPhase;
use crate::volume::{self, VolumeParticipant};

/// Drives one migration attempt on the host the instance currently runs on.
///
/// Built with the destination metadata returned by
/// [`DestinationMigrationCoordinator::check_destination`]. The expected call
/// order is [`check_source`], then [`live_migration`], then either
/// [`post_live_migration_at_source`] or [`rollback_live_migration`].
///
/// [`DestinationMigrationCoordinator::check_destination`]: crate::DestinationMigrationCoordinator::check_destination
/// [`check_source`]: Self::check_source
/// [`live_migration`]: Self::live_migration
/// [`post_live_migration_at_source`]: Self::post_live_migration_at_source
/// [`rollback_live_migration`]: Self::rollback_live_migration
#[derive(Debug)]
pub struct SourceMigrationCoordinator {
    instance: Instance,
    services: HostServices,
    dest_data: MigrationMetadata,
    lpar: LparHandle,
    migrate_data: Option<MigrationMetadata>,
    phase: MigrationPhase,
}

impl SourceMigrationCoordinator {
    #[must_use]
    pub fn new(instance: Instance, services: HostServices, dest_data: MigrationMetadata) -> Self {
        let lpar = LparHandle::new(instance.uuid.clone(), services.hypervisor.clone());
        Self {
            instance,
            services,
            dest_data,
            lpar,
            migrate_data: None,
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

    /// Destination metadata this coordinator was built with.
    #[must_use]
    pub const fn dest_data(&self) -> &MigrationMetadata {
        &self.dest_data
    }

    /// Metadata built by [`check_source`](Self::check_source), to be sent to
    /// the destination's `pre_live_migration`.
    #[must_use]
    pub const fn migrate_data(&self) -> Option<&MigrationMetadata> {
        self.migrate_data.as_ref()
    }

    /// Admission checks on the source host, then source-side preparation.
    ///
    /// Checks run in order and the first failure wins: destination data
    /// present, processor compatibility, idle migration state, hypervisor
    /// readiness, source capacity. Nothing is changed on the host until all
    /// checks pass.
    ///
    /// # Errors
    ///
    /// Returns the admission error that failed, a
    /// [`MigrationError::VolumeMigration`] if any participant failed, or the
    /// collaborator's error.
    pub fn check_source(
        &mut self,
        ctx: &RequestContext,
        block_device_info: &BlockDeviceInfo,
        participants: &[Arc<dyn VolumeParticipant>],
    ) -> Result<()> {
        self.instance.log_operation("check_source");
        debug!(
            request_id = %ctx.request_id,
            dest_data = ?self.dest_data,
            block_device_info = ?block_device_info,
            "Source migration check"
        );
        let name = self.instance.name.as_str();

        let destination = self.dest_data.destination().ok_or_else(|| {
            MigrationError::invalid_state(name, "the destination data is missing")
        })?;
        let modes = destination.proc_compat_modes().ok_or_else(|| {
            MigrationError::invalid_state(
                name,
                "the destination processor compatibility modes are missing",
            )
        })?;

        let lpar = self.lpar.get()?.clone();
        if !modes.contains(&lpar.proc_compat_mode) {
            return Err(MigrationError::ProcCompatMismatch {
                name: name.to_string(),
                mode: lpar.proc_compat_mode,
                modes: modes.to_string(),
            });
        }

        if !lpar.migration_state.is_idle() {
            return Err(MigrationError::invalid_state(
                name,
                format!("the migration state is: {}", lpar.migration_state),
            ));
        }

        let host = self.services.inventory.capacity_snapshot()?;
        let readiness = self.services.hypervisor.is_migration_ready(&lpar, &host)?;
        if !readiness.ready {
            return Err(MigrationError::NotReady {
                name: name.to_string(),
                reason: readiness
                    .reason
                    .unwrap_or_else(|| "no reason given".to_string()),
            });
        }

        // Counters move as other migrations start; never reuse a snapshot.
        let host = self.services.inventory.capacity_snapshot()?;
        if !host.has_migration_headroom() {
            return Err(MigrationError::CapacityExceeded {
                name: name.to_string(),
                host: host.system_name,
                allowed: host.active_migrations_supported,
                running: host.active_migrations_in_progress,
            });
        }

        let public_key = self.services.credentials.public_key()?;
        let mut migrate_data = MigrationMetadata::with_public_key(public_key);
        let outcome = volume::run_all(participants, |p| p.prepare_source(&mut migrate_data));
        if let Some((volume, source, attempted, failed)) = outcome.into_first_failure() {
            return Err(MigrationError::VolumeMigration {
                name: name.to_string(),
                host: host.system_name,
                volume,
                attempted,
                failed,
                source,
            });
        }

        self.services.media.remove_optical_media(&lpar.uuid)?;
        self.services.console.close_session(&self.instance.uuid)?;

        debug!(migrate_data = ?migrate_data, "Source migration data");
        self.migrate_data = Some(migrate_data);
        self.phase = MigrationPhase::Admitted;
        Ok(())
    }

    /// Starts the migrate job and waits for it.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::InvalidState`] if the source check has not
    /// passed, otherwise the hypervisor's error unchanged.
    pub fn live_migration(
        &mut self,
        ctx: &RequestContext,
        pre_live_result: &MigrationMetadata,
    ) -> Result<()> {
        self.instance.log_operation("live_migration");
        debug!(
            request_id = %ctx.request_id,
            pre_live_result = ?pre_live_result,
            "Starting migrate job"
        );
        let name = self.instance.name.as_str();

        if !self.phase.can_transfer() {
            return Err(MigrationError::invalid_state(
                name,
                format!("the source check has not passed (phase {})", self.phase),
            ));
        }
        let lpar = self.lpar.cached().cloned().ok_or_else(|| {
            MigrationError::invalid_state(name, "the partition has not been looked up")
        })?;
        let destination = self
            .dest_data
            .destination()
            .ok_or_else(|| MigrationError::invalid_state(name, "the destination data is missing"))?
            .identity();

        self.phase = MigrationPhase::Transferring;
        match self.services.hypervisor.migrate(&lpar, &destination) {
            Ok(()) => {
                info!(
                    uuid = %self.instance.uuid,
                    dest = %destination.sys_name,
                    "Live migration job completed"
                );
                self.phase = MigrationPhase::Completed;
                Ok(())
            }
            Err(e) => {
                error!(
                    uuid = %self.instance.uuid,
                    dest = %destination.sys_name,
                    kind = e.kind(),
                    error = %e,
                    "Live migration job failed"
                );
                self.phase = MigrationPhase::Failed;
                Err(e.into())
            }
        }
    }

    /// Returns the partition to a non-migrating state after a failure.
    ///
    /// Re-reads the partition first; nothing is done if it is already idle.
    /// Never fails: errors are logged and swallowed.
    pub fn rollback_live_migration(&mut self, ctx: &RequestContext) {
        self.instance.log_operation("rollback_live_migration");
        debug!(request_id = %ctx.request_id, "Rolling back live migration");

        match self.lpar.refresh() {
            Ok(lpar) if lpar.migration_state.is_idle() => {
                debug!(uuid = %lpar.uuid, "Partition is not migrating; nothing to recover");
            }
            Ok(lpar) => {
                let lpar = lpar.clone();
                info!(
                    uuid = %lpar.uuid,
                    state = %lpar.migration_state,
                    "Recovering partition after failed migration"
                );
                if let Err(e) = self.services.hypervisor.recover(&lpar, true) {
                    error!(
                        uuid = %lpar.uuid,
                        kind = e.kind(),
                        error = %e,
                        "Migration recovery failed during rollback"
                    );
                }
            }
            Err(e) => {
                error!(
                    uuid = %self.instance.uuid,
                    kind = e.kind(),
                    error = %e,
                    "Cannot refresh partition during rollback"
                );
            }
        }
        self.phase = MigrationPhase::RolledBack;
    }

    /// Aborts the running migrate job.
    ///
    /// The partition is re-read first; only an in-progress migration can be
    /// aborted.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::InvalidState`] if no migration is in
    /// progress, otherwise the hypervisor's error unchanged.
    pub fn migration_abort(&mut self, ctx: &RequestContext) -> Result<()> {
        self.instance.log_operation("migration_abort");
        debug!(request_id = %ctx.request_id, "Aborting live migration");

        let lpar = self.lpar.refresh()?.clone();
        if !lpar.migration_state.is_in_progress() {
            return Err(MigrationError::invalid_state(
                &self.instance.name,
                format!(
                    "there is no migration to abort (migration state is: {})",
                    lpar.migration_state
                ),
            ));
        }
        self.services.hypervisor.abort(&lpar)?;
        self.phase = MigrationPhase::Aborted;
        Ok(())
    }

    /// Forces migration recovery on the partition.
    ///
    /// # Errors
    ///
    /// Returns the hypervisor's error unchanged.
    pub fn migration_recover(&mut self, ctx: &RequestContext) -> Result<()> {
        self.instance.log_operation("migration_recover");
        debug!(request_id = %ctx.request_id, "Recovering live migration");

        let lpar = self.lpar.get()?.clone();
        self.services.hypervisor.recover(&lpar, true)?;
        Ok(())
    }

    /// Releases source network resources once the instance has left.
    ///
    /// # Errors
    ///
    /// Returns the network service's error, except not found.
    pub fn post_live_migration_at_source(&self, network_info: &NetworkInfo) -> Result<()> {
        self.instance.log_operation("post_live_migration_at_source");

        match self
            .services
            .network
            .release_source(&self.instance.uuid, network_info)
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                warn!(
                    uuid = %self.instance.uuid,
                    error = %e,
                    "Instance already gone from source host; skipping network cleanup"
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
