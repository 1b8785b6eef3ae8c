mod common;

use common::{RecordingParticipant, UUID};
use livemig_core::{
    BlockDeviceInfo, DiskInfo, MigrationError, MigrationMetadata, MigrationPhase, RequestContext,
};
use livemig_hypervisor::in_memory::{Call, Operation};
use livemig_hypervisor::{MigrationState, NetworkInfo, Vif};

fn network_info() -> NetworkInfo {
    vec![Vif {
        id: "port-1".into(),
        address: "fa:16:3e:00:00:01".into(),
    }]
}

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

/// Matching mode, idle partition, ready, both hosts at 2/4, same memory
/// region size: both checks pass.
#[test]
fn both_checks_admit_compatible_instance() {
    let src_host = common::source_host();
    let dst_host = common::dest_host();
    let ctx = RequestContext::new();

    let mut dst = common::destination(&dst_host);
    let dest_data = dst
        .check_destination(&ctx, &common::snapshot("HV4", 256), &common::snapshot("HV5", 256))
        .unwrap();
    assert_eq!(dest_data.destination().unwrap().proc_compat(), Some("a,b,c"));

    let mut src = common::source(&src_host, dest_data);
    src.check_source(&ctx, &BlockDeviceInfo::new(), &[]).unwrap();
    assert_eq!(src.phase(), MigrationPhase::Admitted);
}

/// Destination at its ceiling rejects the attempt.
#[test]
fn destination_at_capacity_is_rejected() {
    let dst_host = common::dest_host();
    dst_host.set_migrations(4, 4);

    let mut dst = common::destination(&dst_host);
    let err = dst
        .check_destination(
            &RequestContext::new(),
            &common::snapshot("HV4", 256),
            &common::snapshot("HV5", 256),
        )
        .unwrap_err();
    assert!(matches!(err, MigrationError::CapacityExceeded { .. }));
    assert!(err.is_admission_failure());
}

/// Memory region size mismatch wins over every other check.
#[test]
fn memory_region_size_mismatch_is_rejected() {
    let dst_host = common::dest_host();
    dst_host.set_migrations(4, 4);

    let mut src_snapshot = common::snapshot("HV4", 2);
    src_snapshot.proc_compat_modes = vec!["z".into()];
    let mut dst = common::destination(&dst_host);
    let err = dst
        .check_destination(&RequestContext::new(), &src_snapshot, &common::snapshot("HV5", 1))
        .unwrap_err();
    assert!(matches!(
        err,
        MigrationError::MemoryRegionSizeMismatch {
            source_mrs: 2,
            target_mrs: 1,
            ..
        }
    ));
}

/// Every compatibility list containing the instance's mode admits; every
/// list without it rejects.
#[test]
fn proc_compat_membership_decides_admission() {
    let admitting = ["b", "a,b,c", "b,c", " a , b ", "POWER8,b"];
    let rejecting = ["a", "a,c", "bb", "B", "a,b2,c"];

    for list in admitting {
        let host = common::source_host();
        let mut src = common::source(&host, dest_data(list));
        assert!(
            src.check_source(&RequestContext::new(), &BlockDeviceInfo::new(), &[])
                .is_ok(),
            "{list} should admit"
        );
    }
    for list in rejecting {
        let host = common::source_host();
        let mut src = common::source(&host, dest_data(list));
        let err = src
            .check_source(&RequestContext::new(), &BlockDeviceInfo::new(), &[])
            .unwrap_err();
        assert!(
            matches!(err, MigrationError::ProcCompatMismatch { .. }),
            "{list} should reject, got {err}"
        );
    }
}

/// Capacity: equality rejects, strictly less admits, on both hosts.
#[test]
fn capacity_boundary_on_both_hosts() {
    for (in_progress, supported, admits) in [(3, 4, true), (4, 4, false), (0, 1, true), (1, 1, false)]
    {
        let dst_host = common::dest_host();
        dst_host.set_migrations(in_progress, supported);
        let mut dst = common::destination(&dst_host);
        let result = dst.check_destination(
            &RequestContext::new(),
            &common::snapshot("HV4", 256),
            &common::snapshot("HV5", 256),
        );
        assert_eq!(result.is_ok(), admits, "destination {in_progress}/{supported}");

        let src_host = common::source_host();
        src_host.set_migrations(in_progress, supported);
        let mut src = common::source(&src_host, dest_data("b"));
        let result = src.check_source(&RequestContext::new(), &BlockDeviceInfo::new(), &[]);
        assert_eq!(result.is_ok(), admits, "source {in_progress}/{supported}");
        if let Err(err) = result {
            assert!(matches!(err, MigrationError::CapacityExceeded { .. }));
        }
    }
}

/// A failed admission check has no side effects on the host.
#[test]
fn rejected_source_check_changes_nothing() {
    let host = common::source_host();
    host.set_migrations(4, 4);
    let vol = RecordingParticipant::new("vol-1");
    let mut src = common::source(&host, dest_data("b"));

    src.check_source(&RequestContext::new(), &BlockDeviceInfo::new(), &common::set(&[&vol]))
        .unwrap_err();

    assert!(vol.hooks().is_empty());
    assert_eq!(host.count(|c| matches!(c, Call::PublicKey)), 0);
    assert_eq!(host.count(|c| matches!(c, Call::RemoveOpticalMedia(_))), 0);
    assert_eq!(host.count(|c| matches!(c, Call::CloseSession(_))), 0);
}

// ---------------------------------------------------------------------------
// Preparation
// ---------------------------------------------------------------------------

/// Second participant fails: the first still prepares, the key is
/// registered before either runs, and the error names the failed volume.
#[test]
fn pre_live_migration_runs_every_participant() {
    let dst_host = common::dest_host();
    let ok = RecordingParticipant::new("vol-1");
    let bad = RecordingParticipant::failing("vol-2");
    let mut dst = common::destination(&dst_host);

    let migrate_data = MigrationMetadata::with_public_key(Some("ssh-rsa AAAAB3".into()));
    let err = dst
        .pre_live_migration(
            &RequestContext::new(),
            &BlockDeviceInfo::new(),
            &network_info(),
            &DiskInfo::new(),
            &migrate_data,
            &common::set(&[&ok, &bad]),
        )
        .unwrap_err();

    assert_eq!(ok.hooks(), ["prepare_destination"]);
    assert_eq!(bad.hooks(), ["prepare_destination"]);
    assert_eq!(
        dst_host.calls().first(),
        Some(&Call::AddAuthorizedKey("ssh-rsa AAAAB3".into()))
    );
    match err {
        MigrationError::VolumeMigration {
            volume,
            attempted,
            failed,
            ..
        } => {
            assert_eq!(volume, "vol-2");
            assert_eq!((attempted, failed), (2, 1));
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// Scrub failure propagates before any participant runs.
#[test]
fn scrub_failure_propagates() {
    let dst_host = common::dest_host();
    dst_host.fail_on(Operation::Scrub, "VIOS busy");
    let vol = RecordingParticipant::new("vol-1");
    let mut dst = common::destination(&dst_host);

    let err = dst
        .pre_live_migration(
            &RequestContext::new(),
            &BlockDeviceInfo::new(),
            &network_info(),
            &DiskInfo::new(),
            &MigrationMetadata::new(),
            &common::set(&[&vol]),
        )
        .unwrap_err();
    assert_eq!(err.to_string(), "management API error: VIOS busy");
    assert!(vol.hooks().is_empty());
}

// ---------------------------------------------------------------------------
// Full flows
// ---------------------------------------------------------------------------

/// Happy path across both hosts; metadata goes over the wire as JSON.
#[test]
fn full_migration_flow() {
    let src_host = common::source_host_with_key("ssh-rsa AAAAB3");
    let dst_host = common::dest_host();
    let vol = RecordingParticipant::new("vol-1");
    let participants = common::set(&[&vol]);
    let ctx = RequestContext::new();

    let mut dst = common::destination(&dst_host);
    let dest_data = dst
        .check_destination(&ctx, &common::snapshot("HV4", 256), &common::snapshot("HV5", 256))
        .unwrap();
    let wire = dest_data.to_json().unwrap();

    let mut src = common::source(&src_host, MigrationMetadata::from_json(&wire).unwrap());
    src.check_source(&ctx, &BlockDeviceInfo::new(), &participants)
        .unwrap();
    let wire = src.migrate_data().unwrap().to_json().unwrap();

    let pre_live = dst
        .pre_live_migration(
            &ctx,
            &BlockDeviceInfo::new(),
            &network_info(),
            &DiskInfo::new(),
            &MigrationMetadata::from_json(&wire).unwrap(),
            &participants,
        )
        .unwrap();
    assert_eq!(pre_live.volume_str("vol-1_dest_mapping"), Some("vios1/slot4"));
    assert_eq!(
        dst_host.count(|c| *c == Call::AddAuthorizedKey("ssh-rsa AAAAB3".into())),
        1
    );

    src.live_migration(&ctx, &pre_live).unwrap();
    dst.post_live_migration_at_destination(&network_info(), &participants)
        .unwrap();
    src.post_live_migration_at_source(&network_info()).unwrap();

    assert_eq!(src.phase(), MigrationPhase::Completed);
    assert_eq!(dst.phase(), MigrationPhase::Completed);
    assert_eq!(
        vol.hooks(),
        [
            "prepare_source",
            "prepare_destination",
            "post_live_migration_at_destination"
        ]
    );
    assert_eq!(src_host.count(|c| *c == Call::ReleaseSource(UUID.into())), 1);
}

/// Failed migrate job: both sides roll back without raising.
#[test]
fn failed_migration_rolls_back_both_sides() {
    let src_host = common::source_host();
    src_host.fail_on(Operation::Migrate, "destination VIOS rejected the job");
    let dst_host = common::dest_host();
    let vol = RecordingParticipant::new("vol-1");
    let participants = common::set(&[&vol]);
    let ctx = RequestContext::new();

    let mut dst = common::destination(&dst_host);
    let dest_data = dst
        .check_destination(&ctx, &common::snapshot("HV4", 256), &common::snapshot("HV5", 256))
        .unwrap();
    let mut src = common::source(&src_host, dest_data);
    src.check_source(&ctx, &BlockDeviceInfo::new(), &participants)
        .unwrap();
    let pre_live = dst
        .pre_live_migration(
            &ctx,
            &BlockDeviceInfo::new(),
            &network_info(),
            &DiskInfo::new(),
            src.migrate_data().unwrap(),
            &participants,
        )
        .unwrap();

    let err = src.live_migration(&ctx, &pre_live).unwrap_err();
    assert_eq!(err.kind(), "migration_failed");
    assert_eq!(
        src_host.migration_state(UUID),
        Some(MigrationState::Failed)
    );

    src.rollback_live_migration(&ctx);
    dst.rollback_live_migration_at_destination(&ctx, &participants);

    assert_eq!(
        src_host.migration_state(UUID),
        Some(MigrationState::NotMigrating)
    );
    assert_eq!(src.phase(), MigrationPhase::RolledBack);
    assert_eq!(dst.phase(), MigrationPhase::RolledBack);
    assert_eq!(vol.hooks().last(), Some(&"cleanup_at_destination"));
}

/// Rollback is safe to repeat and never raises, whatever the hypervisor does.
#[test]
fn rollback_never_raises() {
    let host = common::source_host();
    let mut src = common::source(&host, dest_data("b"));
    let ctx = RequestContext::new();

    // Idle partition.
    src.rollback_live_migration(&ctx);

    // Stuck partition, recovery succeeds.
    host.set_migration_state(UUID, MigrationState::Aborting);
    src.rollback_live_migration(&ctx);
    assert!(host.migration_state(UUID).unwrap().is_idle());

    // Stuck partition, recovery fails.
    host.set_migration_state(UUID, MigrationState::Recovering);
    host.fail_on(Operation::Recover, "recover rejected");
    src.rollback_live_migration(&ctx);

    // Partition vanished.
    host.remove_lpar(UUID);
    src.rollback_live_migration(&ctx);

    assert_eq!(src.phase(), MigrationPhase::RolledBack);
    assert_eq!(host.count(|c| matches!(c, Call::Recover { force: true, .. })), 2);
}

fn dest_data(proc_compat: &str) -> MigrationMetadata {
    MigrationMetadata::with_destination(livemig_core::DestinationData::new(
        "HV5",
        "10.0.0.5",
        None,
        Some(proc_compat.to_string()),
    ))
}
