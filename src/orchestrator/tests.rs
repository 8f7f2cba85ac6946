use super::*;
use crate::backup::transport::{Mechanism, Transport};
use crate::backup::BackupTarget;
use crate::command::{CommandMock, Context, RetryPolicy};
use crate::commands::Commander;
use crate::error::ManagerError;
use crate::period::Period;
use crate::retention::RetentionPolicy;
use chrono::NaiveDate;
use std::time::Duration;
use tempfile::tempdir;

fn ctx() -> Context {
    Context::Local { user: "root".into() }
}

fn dt(h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(h, 0, 0).unwrap()
}

#[test]
fn create_due_tags_snapshot_with_every_due_period() {
    let dir = tempdir().unwrap();
    let snapshots_dir = dir.path().join(".snapshots");
    std::fs::create_dir(&snapshots_dir).unwrap();

    let mut mock = CommandMock::new();
    let subvol_path = dir.path().to_string_lossy().to_string();
    let dest = snapshots_dir.join("2024-06-01_10-00-00_HD").to_string_lossy().to_string();
    mock.expect(
        &format!("btrfs subvolume snapshot -r '{}' '{}'", subvol_path, dest),
        ctx(),
        Ok(String::new()),
    );

    let mut subvol = Subvolume::new(dir.path(), Some(snapshots_dir), Commander::new(mock), ctx());
    let created = create_due(&mut subvol, &[Period::Hourly, Period::Daily], dt(10), None).unwrap();

    assert_eq!(created.unwrap().name, "2024-06-01_10-00-00_HD");
}

#[test]
fn create_due_is_a_noop_when_nothing_is_due() {
    let dir = tempdir().unwrap();
    let snapshots_dir = dir.path().join(".snapshots");
    std::fs::create_dir(&snapshots_dir).unwrap();

    let mock = CommandMock::new();
    let mut subvol = Subvolume::new(dir.path(), Some(snapshots_dir), Commander::new(mock), ctx());
    let created = create_due(&mut subvol, &[], dt(10), None).unwrap();

    assert!(created.is_none());
}

#[test]
fn cleanup_deletes_exactly_the_discard_set() {
    let dir = tempdir().unwrap();
    let snapshots_dir = dir.path().join(".snapshots");
    std::fs::create_dir(&snapshots_dir).unwrap();
    for h in [8, 9, 10, 11] {
        std::fs::create_dir(snapshots_dir.join(format!("2024-06-01_{:02}-00-00_H", h))).unwrap();
    }

    let mut mock = CommandMock::new();
    for h in [8, 9] {
        let path = snapshots_dir.join(format!("2024-06-01_{:02}-00-00_H", h)).to_string_lossy().to_string();
        mock.expect(&format!("btrfs subvolume delete --commit-each '{}'", path), ctx(), Ok(String::new()));
    }

    let mut subvol = Subvolume::new(dir.path(), Some(snapshots_dir), Commander::new(mock), ctx());
    subvol.list().unwrap();

    let retention = RetentionPolicy::new([(Period::Hourly, 2)]);
    let discarded = cleanup(&mut subvol, &retention).unwrap();

    let names: Vec<_> = discarded.iter().map(|s| s.name.clone()).collect();
    assert_eq!(names, vec!["2024-06-01_08-00-00_H", "2024-06-01_09-00-00_H"]);

    let remaining: Vec<_> = subvol.snapshots().iter().map(|s| s.name.clone()).collect();
    assert_eq!(remaining, vec!["2024-06-01_10-00-00_H", "2024-06-01_11-00-00_H"]);
}

#[test]
fn reconcile_backups_isolates_a_failing_target() {
    let dir = tempdir().unwrap();
    let snapshots_dir = dir.path().join(".snapshots");
    std::fs::create_dir(&snapshots_dir).unwrap();

    let mock = CommandMock::new();
    let mut subvol = Subvolume::new(dir.path(), Some(snapshots_dir.clone()), Commander::new(mock), ctx());
    subvol.list().unwrap();

    let mut failing_mock = CommandMock::new();
    let remote = Context::Remote {
        host: "backup.example".into(),
        user: None,
        ssh_options: None,
    };
    failing_mock.expect(
        "if [[ -d '/mnt/backup' ]] ; then echo 'yes' ; fi",
        remote.clone(),
        Err(ManagerError::CommandFailed {
            command: "if [[ -d '/mnt/backup' ]] ; then echo 'yes' ; fi".into(),
            code: 1,
            stderr: "denied".into(),
        }),
    );
    let failing_target = BackupTarget {
        transport: Transport::new(
            Commander::new(failing_mock),
            Mechanism::Native,
            ctx(),
            remote,
            snapshots_dir.clone(),
            "/mnt/backup".into(),
        )
        .with_retry_policy(RetryPolicy {
            attempts: 1,
            fail_delay: Duration::from_secs(0),
        }),
        retention: RetentionPolicy::default(),
        minimum: 0,
        last_sync_file: None,
    };

    let ok_dest = tempdir().unwrap();
    let ok_target = BackupTarget {
        transport: Transport::new(
            Commander::new(CommandMock::new()),
            Mechanism::Native,
            ctx(),
            ctx(),
            snapshots_dir.clone(),
            ok_dest.path().to_string_lossy().to_string(),
        ),
        retention: RetentionPolicy::default(),
        minimum: 0,
        last_sync_file: None,
    };

    let mut targets = vec![failing_target, ok_target];
    let results = reconcile_backups(&subvol, &mut targets, None);

    assert_eq!(results[0].0, 0);
    assert!(results[0].1.is_err());
    assert_eq!(results[1].0, 1);
    assert!(results[1].1.is_ok());
}

#[test]
fn run_pass_respects_the_subvolume_filter() {
    let dir_a = tempdir().unwrap();
    let dir_b = tempdir().unwrap();
    let snaps_a = dir_a.path().join(".snapshots");
    let snaps_b = dir_b.path().join(".snapshots");
    std::fs::create_dir(&snaps_a).unwrap();
    std::fs::create_dir(&snaps_b).unwrap();

    let subvol_a = Subvolume::new(dir_a.path(), Some(snaps_a), Commander::new(CommandMock::new()), ctx());
    let subvol_b = Subvolume::new(dir_b.path(), Some(snaps_b), Commander::new(CommandMock::new()), ctx());

    let mut managed = vec![
        ManagedSubvolume {
            subvolume: subvol_a,
            configured_periods: vec![],
            retention: RetentionPolicy::default(),
            backup_targets: vec![],
            bootloader_specs: vec![],
        },
        ManagedSubvolume {
            subvolume: subvol_b,
            configured_periods: vec![],
            retention: RetentionPolicy::default(),
            backup_targets: vec![],
            bootloader_specs: vec![],
        },
    ];

    let filter = vec![dir_b.path().to_path_buf()];
    let reports = run_pass(&mut managed, None, None, dt(10), Some(&filter));

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].path, dir_b.path());
}
