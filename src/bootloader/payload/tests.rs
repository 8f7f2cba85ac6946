use super::*;
use crate::command::{CommandMock, Context};
use crate::commands::Commander;
use chrono::NaiveDate;
use tempfile::tempdir;

fn ctx() -> Context {
    Context::Local { user: "root".into() }
}

fn ts(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(hour, 0, 0).unwrap()
}

#[test]
fn create_archives_every_designated_file() {
    let boot = tempdir().unwrap();
    std::fs::write(boot.path().join("vmlinuz"), b"kernel").unwrap();
    std::fs::write(boot.path().join("initramfs.img"), b"initrd").unwrap();

    let mut mock = CommandMock::new();
    let name = format_payload_name(ts(10));
    let dest = boot.path().join("snapshots").join(&name);
    mock.expect(
        &format!("cp '{}' '{}'", boot.path().join("initramfs.img").display(), dest.join("initramfs.img").display()),
        ctx(),
        Ok(String::new()),
    );
    mock.expect(
        &format!("cp '{}' '{}'", boot.path().join("vmlinuz").display(), dest.join("vmlinuz").display()),
        ctx(),
        Ok(String::new()),
    );

    let mut store = BootPayloadStore::new(boot.path(), None, Commander::new(mock), ctx());
    let payload = store.create(ts(10)).unwrap();

    assert_eq!(payload.name, "2024-06-01_10-00-00");
    assert!(dest.is_dir());
    assert_eq!(store.payloads().len(), 1);
}

#[test]
fn create_if_needed_skips_when_latest_payload_matches() {
    let boot = tempdir().unwrap();
    std::fs::write(boot.path().join("vmlinuz"), b"kernel").unwrap();

    let archived = boot.path().join("snapshots").join("2024-06-01_08-00-00");
    std::fs::create_dir_all(&archived).unwrap();
    std::fs::write(archived.join("vmlinuz"), b"kernel").unwrap();

    let mut mock = CommandMock::new();
    mock.expect(
        &format!(
            "diff -q '{}' '{}' > /dev/null; echo $?",
            boot.path().join("vmlinuz").display(),
            archived.join("vmlinuz").display()
        ),
        ctx(),
        Ok("0".to_string()),
    );

    let mut store = BootPayloadStore::new(boot.path(), Some(vec!["vmlinuz".to_string()]), Commander::new(mock), ctx());
    store.list().unwrap();
    let created = store.create_if_needed(ts(12)).unwrap();

    assert!(created.is_none());
    assert_eq!(store.payloads().len(), 1);
}

#[test]
fn create_if_needed_archives_a_new_copy_once_the_kernel_changes() {
    let boot = tempdir().unwrap();
    std::fs::write(boot.path().join("vmlinuz"), b"kernel-v2").unwrap();

    let archived = boot.path().join("snapshots").join("2024-06-01_08-00-00");
    std::fs::create_dir_all(&archived).unwrap();
    std::fs::write(archived.join("vmlinuz"), b"kernel-v1").unwrap();

    let mut mock = CommandMock::new();
    mock.expect(
        &format!(
            "diff -q '{}' '{}' > /dev/null; echo $?",
            boot.path().join("vmlinuz").display(),
            archived.join("vmlinuz").display()
        ),
        ctx(),
        Ok("1".to_string()),
    );
    let new_dest = boot.path().join("snapshots").join(format_payload_name(ts(12)));
    mock.expect(
        &format!("cp '{}' '{}'", boot.path().join("vmlinuz").display(), new_dest.join("vmlinuz").display()),
        ctx(),
        Ok(String::new()),
    );

    let mut store = BootPayloadStore::new(boot.path(), Some(vec!["vmlinuz".to_string()]), Commander::new(mock), ctx());
    store.list().unwrap();
    let created = store.create_if_needed(ts(12)).unwrap();

    assert!(created.is_some());
    assert_eq!(store.payloads().len(), 2);
}

#[test]
fn resolve_for_picks_the_latest_payload_not_after_the_snapshot() {
    let payloads = vec![
        BootPayloadSnapshot { path: PathBuf::from("/boot/snapshots/a"), name: "a".into(), timestamp: ts(6) },
        BootPayloadSnapshot { path: PathBuf::from("/boot/snapshots/b"), name: "b".into(), timestamp: ts(9) },
    ];

    let resolved = resolve_for(&payloads, ts(10)).unwrap();
    assert_eq!(resolved.name, "b");

    let resolved = resolve_for(&payloads, ts(7)).unwrap();
    assert_eq!(resolved.name, "a");

    assert!(resolve_for(&payloads, ts(5)).is_none());
}

#[test]
fn delete_removes_one_payload_by_name() {
    let boot = tempdir().unwrap();
    let dir_a = boot.path().join("snapshots").join("2024-06-01_06-00-00");
    let dir_b = boot.path().join("snapshots").join("2024-06-01_09-00-00");
    std::fs::create_dir_all(&dir_a).unwrap();
    std::fs::create_dir_all(&dir_b).unwrap();

    let mut mock = CommandMock::new();
    mock.expect(&format!("rm -rf '{}'", dir_a.display()), ctx(), Ok(String::new()));

    let mut store = BootPayloadStore::new(boot.path(), None, Commander::new(mock), ctx());
    store.list().unwrap();

    let deleted = store.delete("2024-06-01_06-00-00").unwrap();

    assert_eq!(deleted.name, "2024-06-01_06-00-00");
    assert_eq!(store.payloads().len(), 1);
    assert_eq!(store.payloads()[0].name, "2024-06-01_09-00-00");
}

#[test]
fn delete_missing_payload_is_an_error() {
    let boot = tempdir().unwrap();
    let mock = CommandMock::new();
    let mut store = BootPayloadStore::new(boot.path(), None, Commander::new(mock), ctx());

    let err = store.delete("2024-06-01_06-00-00").unwrap_err();
    assert!(matches!(err, crate::error::ManagerError::SnapshotNotFound(_)));
}

#[test]
fn gc_deletes_payloads_no_live_snapshot_resolves_to() {
    let boot = tempdir().unwrap();
    let dir_a = boot.path().join("snapshots").join("2024-06-01_06-00-00");
    let dir_b = boot.path().join("snapshots").join("2024-06-01_09-00-00");
    std::fs::create_dir_all(&dir_a).unwrap();
    std::fs::create_dir_all(&dir_b).unwrap();

    let mut mock = CommandMock::new();
    mock.expect(&format!("rm -rf '{}'", dir_a.display()), ctx(), Ok(String::new()));

    let mut store = BootPayloadStore::new(boot.path(), None, Commander::new(mock), ctx());
    store.list().unwrap();

    let deleted = store.gc(&[ts(10)]).unwrap();

    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].name, "2024-06-01_06-00-00");
    assert_eq!(store.payloads().len(), 1);
    assert_eq!(store.payloads()[0].name, "2024-06-01_09-00-00");
}
