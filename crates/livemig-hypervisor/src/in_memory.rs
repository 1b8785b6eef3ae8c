//! In-memory host backend.
//!
//! [`InMemoryHost`] implements every collaborator trait against a single
//! simulated managed system. Each call is recorded, and any operation can be
//! made to fail, which makes it suitable for tests and dry-runs of the
//! migration flow without a management API.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{HypervisorError, Result};
use crate::traits::{
    ConsoleService, CredentialRegistrar, HostInventory, HypervisorClient, NetworkWiring,
    StorageScrubber, VirtualMedia,
};
use crate::types::{
    DestinationIdentity, HostSnapshot, LparWrapper, MigrationState, NetworkInfo, Readiness,
};

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetLpar,
    IsMigrationReady,
    Migrate,
    Abort,
    Recover,
    CapacitySnapshot,
    CloseSession,
    PublicKey,
    AddAuthorizedKey,
    Scrub,
    RemoveOpticalMedia,
    ReleaseSource,
    FinalizeDestination,
}

/// A recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetLpar(String),
    IsMigrationReady(String),
    Migrate {
        uuid: String,
        destination: DestinationIdentity,
    },
    Abort(String),
    Recover {
        uuid: String,
        force: bool,
    },
    CapacitySnapshot,
    CloseSession(String),
    PublicKey,
    AddAuthorizedKey(String),
    Scrub,
    RemoveOpticalMedia(String),
    ReleaseSource(String),
    FinalizeDestination(String),
}

/// A simulated managed system.
pub struct InMemoryHost {
    host: Mutex<HostSnapshot>,
    lpars: Mutex<HashMap<String, LparWrapper>>,
    readiness: Mutex<Readiness>,
    public_key: Mutex<Option<String>>,
    failures: Mutex<HashMap<Operation, String>>,
    calls: Mutex<Vec<Call>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryHost {
    /// Creates a host with the given snapshot, no partitions, readiness true
    /// and no management console key.
    #[must_use]
    pub fn new(host: HostSnapshot) -> Self {
        Self {
            host: Mutex::new(host),
            lpars: Mutex::new(HashMap::new()),
            readiness: Mutex::new(Readiness::ready()),
            public_key: Mutex::new(None),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Adds (or replaces) a partition.
    #[must_use]
    pub fn with_lpar(self, lpar: LparWrapper) -> Self {
        lock(&self.lpars).insert(lpar.uuid.clone(), lpar);
        self
    }

    /// Sets the management console public key.
    #[must_use]
    pub fn with_public_key(self, key: impl Into<String>) -> Self {
        *lock(&self.public_key) = Some(key.into());
        self
    }

    /// Sets the migration counters.
    pub fn set_migrations(&self, in_progress: u32, supported: u32) {
        let mut host = lock(&self.host);
        host.active_migrations_in_progress = in_progress;
        host.active_migrations_supported = supported;
    }

    /// Sets the readiness predicate result.
    pub fn set_readiness(&self, readiness: Readiness) {
        *lock(&self.readiness) = readiness;
    }

    /// Sets a partition's migration state.
    pub fn set_migration_state(&self, uuid: &str, state: MigrationState) {
        if let Some(lpar) = lock(&self.lpars).get_mut(uuid) {
            lpar.migration_state = state;
        }
    }

    /// Sets a partition's processor compatibility mode.
    pub fn set_proc_compat_mode(&self, uuid: &str, mode: impl Into<String>) {
        if let Some(lpar) = lock(&self.lpars).get_mut(uuid) {
            lpar.proc_compat_mode = mode.into();
        }
    }

    /// Removes a partition, as happens on the source after a migration.
    pub fn remove_lpar(&self, uuid: &str) {
        lock(&self.lpars).remove(uuid);
    }

    /// Returns a partition's current state.
    #[must_use]
    pub fn migration_state(&self, uuid: &str) -> Option<MigrationState> {
        lock(&self.lpars).get(uuid).map(|l| l.migration_state.clone())
    }

    /// Makes every subsequent call of `op` fail with `reason`.
    pub fn fail_on(&self, op: Operation, reason: impl Into<String>) {
        lock(&self.failures).insert(op, reason.into());
    }

    /// Clears an injected failure.
    pub fn clear_failure(&self, op: Operation) {
        lock(&self.failures).remove(&op);
    }

    /// Returns all recorded calls in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    /// Counts recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        lock(&self.calls).iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call, op: Operation) -> Result<()> {
        lock(&self.calls).push(call);
        match lock(&self.failures).get(&op) {
            Some(reason) => Err(HypervisorError::api(reason.clone())),
            None => Ok(()),
        }
    }

    fn lpar(&self, uuid: &str) -> Result<LparWrapper> {
        lock(&self.lpars)
            .get(uuid)
            .cloned()
            .ok_or_else(|| HypervisorError::not_found(format!("lpar {uuid}")))
    }
}

impl HypervisorClient for InMemoryHost {
    fn get_lpar(&self, instance_uuid: &str) -> Result<LparWrapper> {
        self.record(Call::GetLpar(instance_uuid.to_string()), Operation::GetLpar)?;
        self.lpar(instance_uuid)
    }

    fn is_migration_ready(&self, lpar: &LparWrapper, _host: &HostSnapshot) -> Result<Readiness> {
        self.record(
            Call::IsMigrationReady(lpar.uuid.clone()),
            Operation::IsMigrationReady,
        )?;
        Ok(lock(&self.readiness).clone())
    }

    fn migrate(&self, lpar: &LparWrapper, destination: &DestinationIdentity) -> Result<()> {
        let recorded = self.record(
            Call::Migrate {
                uuid: lpar.uuid.clone(),
                destination: destination.clone(),
            },
            Operation::Migrate,
        );
        if let Err(e) = recorded {
            // A failed job leaves the partition in a migration state.
            self.set_migration_state(&lpar.uuid, MigrationState::Failed);
            return Err(HypervisorError::migration_failed("migrate", e.to_string()));
        }
        self.lpar(&lpar.uuid)?;
        tracing::debug!(uuid = %lpar.uuid, dest = %destination.sys_name, "in-memory migrate");
        Ok(())
    }

    fn abort(&self, lpar: &LparWrapper) -> Result<()> {
        self.record(Call::Abort(lpar.uuid.clone()), Operation::Abort)?;
        self.set_migration_state(&lpar.uuid, MigrationState::NotMigrating);
        Ok(())
    }

    fn recover(&self, lpar: &LparWrapper, force: bool) -> Result<()> {
        self.record(
            Call::Recover {
                uuid: lpar.uuid.clone(),
                force,
            },
            Operation::Recover,
        )?;
        self.set_migration_state(&lpar.uuid, MigrationState::NotMigrating);
        Ok(())
    }
}

impl HostInventory for InMemoryHost {
    fn capacity_snapshot(&self) -> Result<HostSnapshot> {
        self.record(Call::CapacitySnapshot, Operation::CapacitySnapshot)?;
        Ok(lock(&self.host).clone())
    }
}

impl ConsoleService for InMemoryHost {
    fn close_session(&self, instance_uuid: &str) -> Result<()> {
        self.record(
            Call::CloseSession(instance_uuid.to_string()),
            Operation::CloseSession,
        )
    }
}

impl CredentialRegistrar for InMemoryHost {
    fn public_key(&self) -> Result<Option<String>> {
        self.record(Call::PublicKey, Operation::PublicKey)?;
        Ok(lock(&self.public_key).clone())
    }

    fn add_authorized_key(&self, public_key: &str) -> Result<()> {
        self.record(
            Call::AddAuthorizedKey(public_key.to_string()),
            Operation::AddAuthorizedKey,
        )
    }
}

impl StorageScrubber for InMemoryHost {
    fn scrub_all_destination_storage(&self) -> Result<()> {
        self.record(Call::Scrub, Operation::Scrub)
    }
}

impl VirtualMedia for InMemoryHost {
    fn remove_optical_media(&self, lpar_uuid: &str) -> Result<()> {
        self.record(
            Call::RemoveOpticalMedia(lpar_uuid.to_string()),
            Operation::RemoveOpticalMedia,
        )
    }
}

impl NetworkWiring for InMemoryHost {
    fn release_source(&self, instance_uuid: &str, _network_info: &NetworkInfo) -> Result<()> {
        self.record(
            Call::ReleaseSource(instance_uuid.to_string()),
            Operation::ReleaseSource,
        )?;
        self.lpar(instance_uuid).map(|_| ())
    }

    fn finalize_destination(&self, instance_uuid: &str, _network_info: &NetworkInfo) -> Result<()> {
        self.record(
            Call::FinalizeDestination(instance_uuid.to_string()),
            Operation::FinalizeDestination,
        )
    }
}
