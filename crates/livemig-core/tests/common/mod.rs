#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use livemig_core::{
    DestinationConfig, DestinationMigrationCoordinator, HostServices, Instance, MigrationMetadata,
    SourceMigrationCoordinator, VolumeError, VolumeParticipant,
};
use livemig_hypervisor::{HostSnapshot, InMemoryHost, LparWrapper, MigrationState};

pub const UUID: &str = "c1a5a5e0-1b7c-4a0e-9a35-1f1d0f6f2f11";

/// Host snapshot with two of four migration slots in use.
pub fn snapshot(name: &str, memory_region_size: u64) -> HostSnapshot {
    HostSnapshot {
        system_name: name.into(),
        memory_region_size,
        active_migrations_supported: 4,
        active_migrations_in_progress: 2,
        proc_compat_modes: vec!["a".into(), "b".into(), "c".into()],
    }
}

fn source_lpar_host() -> InMemoryHost {
    InMemoryHost::new(snapshot("HV4", 256)).with_lpar(LparWrapper {
        uuid: UUID.into(),
        name: "inst-00000001".into(),
        migration_state: MigrationState::NotMigrating,
        proc_compat_mode: "b".into(),
    })
}

/// Source host running the test instance in compatibility mode `b`.
pub fn source_host() -> Arc<InMemoryHost> {
    Arc::new(source_lpar_host())
}

/// Source host whose management console provisioned `key`.
pub fn source_host_with_key(key: &str) -> Arc<InMemoryHost> {
    Arc::new(source_lpar_host().with_public_key(key))
}

pub fn dest_host() -> Arc<InMemoryHost> {
    Arc::new(InMemoryHost::new(snapshot("HV5", 256)))
}

pub fn instance() -> Instance {
    Instance::new(UUID, "inst-00000001", "web-1")
}

pub fn destination(host: &Arc<InMemoryHost>) -> DestinationMigrationCoordinator {
    DestinationMigrationCoordinator::new(
        instance(),
        HostServices::in_memory(host),
        DestinationConfig {
            ip: "10.0.0.5".into(),
            user_id: Some("neo".into()),
        },
    )
}

pub fn source(
    host: &Arc<InMemoryHost>,
    dest_data: MigrationMetadata,
) -> SourceMigrationCoordinator {
    SourceMigrationCoordinator::new(instance(), HostServices::in_memory(host), dest_data)
}

/// Volume participant that records each hook it receives.
pub struct RecordingParticipant {
    id: String,
    fail: bool,
    hooks: Mutex<Vec<&'static str>>,
}

impl RecordingParticipant {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            fail: false,
            hooks: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            fail: true,
            hooks: Mutex::new(Vec::new()),
        })
    }

    pub fn hooks(&self) -> Vec<&'static str> {
        self.hooks.lock().unwrap().clone()
    }

    fn hit(&self, hook: &'static str) -> Result<(), VolumeError> {
        self.hooks.lock().unwrap().push(hook);
        if self.fail {
            Err(VolumeError::attach(&self.id, "foo"))
        } else {
            Ok(())
        }
    }
}

impl VolumeParticipant for RecordingParticipant {
    fn volume_id(&self) -> &str {
        &self.id
    }

    fn prepare_source(&self, migrate_data: &mut MigrationMetadata) -> Result<(), VolumeError> {
        self.hit("prepare_source")?;
        migrate_data.set_volume_key(format!("{}_src_mapping", self.id), "vios1/slot4")?;
        Ok(())
    }

    fn prepare_destination(
        &self,
        migrate_data: &MigrationMetadata,
        dest_data: &mut MigrationMetadata,
    ) -> Result<(), VolumeError> {
        self.hit("prepare_destination")?;
        let mapping = migrate_data
            .volume_str(&format!("{}_src_mapping", self.id))
            .unwrap_or("none")
            .to_string();
        dest_data.set_volume_key(format!("{}_dest_mapping", self.id), mapping)?;
        Ok(())
    }

    fn post_live_migration_at_destination(
        &self,
        _dest_data: &MigrationMetadata,
    ) -> Result<(), VolumeError> {
        self.hit("post_live_migration_at_destination")
    }

    fn cleanup_at_destination(&self, _dest_data: &MigrationMetadata) -> Result<(), VolumeError> {
        self.hit("cleanup_at_destination")
    }
}

pub fn set(participants: &[&Arc<RecordingParticipant>]) -> Vec<Arc<dyn VolumeParticipant>> {
    participants
        .iter()
        .map(|p| Arc::clone(*p) as Arc<dyn VolumeParticipant>)
        .collect()
}
