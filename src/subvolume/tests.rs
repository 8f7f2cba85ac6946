use super::*;
use crate::command::CommandMock;
use crate::commands::Commander;
use crate::snapshot_name::tags;
use chrono::NaiveDate;
use tempfile::tempdir;

fn ctx() -> Context {
    Context::Local { user: "root".into() }
}

fn dt(h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(h, 0, 0).unwrap()
}

#[test]
fn verify_caches_top_level_path() {
    let mut mock = CommandMock::new();
    mock.expect(
        "btrfs subvolume show '/srv/data'",
        ctx(),
        Ok("/srv/data\n\tName: \t\t\t<FS_TREE>\n".to_string()),
    );

    let mut subvol = Subvolume::new("/srv/data", None, Commander::new(mock), ctx());
    subvol.verify().unwrap();
    assert_eq!(subvol.top_level_path(), Some("/srv/data"));
}

#[test]
fn init_snapshots_fails_if_dir_already_exists() {
    let dir = tempdir().unwrap();
    let snapshots_dir = dir.path().join(".snapshots");
    std::fs::create_dir(&snapshots_dir).unwrap();

    let mock = CommandMock::new();
    let mut subvol = Subvolume::new(dir.path(), Some(snapshots_dir), Commander::new(mock), ctx());

    let err = subvol.init_snapshots().unwrap_err();
    assert!(matches!(err, ManagerError::AlreadyInitialised(_)));
}

#[test]
fn list_filters_and_sorts_by_timestamp() {
    let dir = tempdir().unwrap();
    let snapshots_dir = dir.path().join(".snapshots");
    std::fs::create_dir(&snapshots_dir).unwrap();
    std::fs::create_dir(snapshots_dir.join("2024-06-01_11-00-00_H")).unwrap();
    std::fs::create_dir(snapshots_dir.join("2024-06-01_08-00-00_H")).unwrap();
    std::fs::create_dir(snapshots_dir.join("not-a-snapshot")).unwrap();

    let mock = CommandMock::new();
    let mut subvol = Subvolume::new(dir.path(), Some(snapshots_dir), Commander::new(mock), ctx());
    subvol.list().unwrap();

    let names: Vec<_> = subvol.snapshots().iter().map(|s| s.name.clone()).collect();
    assert_eq!(names, vec!["2024-06-01_08-00-00_H", "2024-06-01_11-00-00_H"]);
}

#[test]
fn create_snapshots_and_appends_to_list() {
    let dir = tempdir().unwrap();
    let snapshots_dir = dir.path().join(".snapshots");
    std::fs::create_dir(&snapshots_dir).unwrap();

    let mut mock = CommandMock::new();
    let subvol_path = dir.path().to_string_lossy().to_string();
    let dest_path = snapshots_dir.join("2024-06-01_10-00-00_H").to_string_lossy().to_string();
    mock.expect(
        &format!("btrfs subvolume snapshot -r '{}' '{}'", subvol_path, dest_path),
        ctx(),
        Ok(String::new()),
    );

    let mut subvol = Subvolume::new(dir.path(), Some(snapshots_dir), Commander::new(mock), ctx());
    let snapshot = subvol.create(dt(10), tags(&[Period::Hourly])).unwrap();

    assert_eq!(snapshot.name, "2024-06-01_10-00-00_H");
    assert_eq!(subvol.snapshots().len(), 1);
}

#[test]
fn delete_removes_from_list() {
    let dir = tempdir().unwrap();
    let snapshots_dir = dir.path().join(".snapshots");
    std::fs::create_dir(&snapshots_dir).unwrap();

    let mock = CommandMock::new();
    let mut subvol = Subvolume::new(dir.path(), Some(snapshots_dir.clone()), Commander::new(mock), ctx());
    subvol.list().unwrap();

    // Seed an entry directly; `create` would also work but this keeps the
    // test focused on delete's bookkeeping.
    let snapshot = Snapshot::new_at(&snapshots_dir, dt(10), tags(&[Period::Hourly]));
    let name = snapshot.name.clone();
    subvol.snapshots.push(snapshot);

    let deleted_path = snapshots_dir.join(&name).to_string_lossy().to_string();
    let mut mock = CommandMock::new();
    mock.expect(
        &format!("btrfs subvolume delete --commit-each '{}'", deleted_path),
        ctx(),
        Ok(String::new()),
    );
    subvol.commander = Commander::new(mock);

    subvol.delete(&name).unwrap();
    assert!(subvol.snapshots().is_empty());
}

#[test]
fn delete_missing_snapshot_is_an_error() {
    let mock = CommandMock::new();
    let mut subvol = Subvolume::new("/srv/data", None, Commander::new(mock), ctx());
    let err = subvol.delete("2024-06-01_10-00-00_H").unwrap_err();
    assert!(matches!(err, ManagerError::SnapshotNotFound(_)));
}

#[test]
fn search_includes_untagged_via_null_marker() {
    let parent = Path::new("/srv/data/.snapshots");
    let mock = CommandMock::new();
    let mut subvol = Subvolume::new("/srv/data", None, Commander::new(mock), ctx());
    subvol.snapshots = vec![
        Snapshot::new_at(parent, dt(8), tags(&[Period::Hourly])),
        Snapshot::new_at(parent, dt(9), tags(&[])),
    ];

    let hourly_only = subvol.search(&[Some(Period::Hourly)]);
    assert_eq!(hourly_only.len(), 1);

    let hourly_and_untagged = subvol.search(&[Some(Period::Hourly), None]);
    assert_eq!(hourly_and_untagged.len(), 2);
}
