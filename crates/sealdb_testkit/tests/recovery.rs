//! Manifest-pointer recovery through the storage facade.

use sealdb_storage::{EncryptedStorage, FileDesc, Storage, StorageError};
use sealdb_testkit::crash::{crash_scenarios, PointerFile, PointerLayout, Recovered};
use sealdb_testkit::{init_test_tracing, TEST_KEY_128};
use std::path::Path;
use tempfile::tempdir;

fn outcome(result: Result<FileDesc, StorageError>) -> Recovered {
    match result {
        Ok(fd) => Recovered::Manifest(fd.num),
        Err(StorageError::NotFound) => Recovered::NotFound,
        Err(StorageError::Corrupted { .. }) => Recovered::Corrupted,
        Err(e) => panic!("unexpected error: {e}"),
    }
}

fn pointer_files(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files: Vec<(String, Vec<u8>)> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap())
        .filter(|e| e.file_name().to_string_lossy().starts_with("CURRENT"))
        .map(|e| {
            (
                e.file_name().to_string_lossy().into_owned(),
                std::fs::read(e.path()).unwrap(),
            )
        })
        .collect();
    files.sort();
    files
}

#[test]
fn writable_recovery_table() {
    init_test_tracing();
    for scenario in crash_scenarios() {
        let dir = tempdir().unwrap();
        let layout = scenario.apply(dir.path()).unwrap();
        let storage = EncryptedStorage::open_path(dir.path(), &TEST_KEY_128, false).unwrap();

        let got = outcome(storage.get_meta());
        assert_eq!(got, scenario.expected, "{}", scenario.name);

        if let Recovered::Manifest(num) = got {
            let expected = format!("MANIFEST-{num:06}\n");
            assert_eq!(
                layout.read(PointerFile::Current).unwrap().unwrap(),
                expected.as_bytes(),
                "{}: CURRENT not normalized",
                scenario.name
            );
            assert!(
                layout.pending().unwrap().is_empty(),
                "{}: pending files left",
                scenario.name
            );
            // A second call sees a clean directory and agrees.
            assert_eq!(outcome(storage.get_meta()), got, "{}", scenario.name);
        }
        storage.close().unwrap();
    }
}

#[test]
fn read_only_recovery_table_touches_nothing() {
    init_test_tracing();
    for scenario in crash_scenarios() {
        let dir = tempdir().unwrap();
        scenario.apply(dir.path()).unwrap();
        let before = pointer_files(dir.path());

        let storage = EncryptedStorage::open_path(dir.path(), &TEST_KEY_128, true).unwrap();
        assert_eq!(
            outcome(storage.get_meta()),
            scenario.expected,
            "{}",
            scenario.name
        );
        assert_eq!(pointer_files(dir.path()), before, "{}", scenario.name);
        storage.close().unwrap();
    }
}

#[test]
fn failed_lookups_leave_files_alone() {
    for scenario in crash_scenarios() {
        if matches!(scenario.expected, Recovered::Manifest(_)) {
            continue;
        }
        let dir = tempdir().unwrap();
        scenario.apply(dir.path()).unwrap();
        let before = pointer_files(dir.path());

        let storage = EncryptedStorage::open_path(dir.path(), &TEST_KEY_128, false).unwrap();
        assert!(storage.get_meta().is_err());
        assert_eq!(pointer_files(dir.path()), before, "{}", scenario.name);
    }
}

/// Replays a commit from 1 to 2 cut off after each durable step.
#[test]
fn commit_interrupted_at_each_step() {
    init_test_tracing();
    let old = FileDesc::manifest(1);
    let new = FileDesc::manifest(2);

    // (backup written, pending written, renamed) -> expected manifest
    let steps = [
        (false, false, false, 1),
        (true, false, false, 1),
        (true, true, false, 2),
        (true, false, true, 2),
    ];

    for (backup, pending, renamed, expected) in steps {
        let dir = tempdir().unwrap();
        let layout = PointerLayout::new(dir.path());
        layout.create_target(old).unwrap();
        layout.create_target(new).unwrap();
        layout.point(PointerFile::Current, old).unwrap();
        if backup {
            layout.point(PointerFile::Backup, old).unwrap();
        }
        if pending {
            layout.point(PointerFile::Pending(2), new).unwrap();
        }
        if renamed {
            layout.point(PointerFile::Current, new).unwrap();
        }

        let storage = EncryptedStorage::open_path(dir.path(), &TEST_KEY_128, false).unwrap();
        assert_eq!(storage.get_meta().unwrap().num, expected);
        assert!(!layout.exists(PointerFile::Pending(2)));
    }
}

#[test]
fn torn_pending_is_reported_before_missing_current() {
    let dir = tempdir().unwrap();
    let layout = PointerLayout::new(dir.path());
    layout
        .point(PointerFile::Pending(3), FileDesc::manifest(3))
        .unwrap();
    layout.corrupt(PointerFile::Pending(3)).unwrap();
    layout
        .point(PointerFile::Current, FileDesc::manifest(1))
        .unwrap();

    let storage = EncryptedStorage::open_path(dir.path(), &TEST_KEY_128, false).unwrap();
    let err = storage.get_meta().unwrap_err();
    assert!(err.is_corrupted(), "got {err}");
    assert!(layout.exists(PointerFile::Pending(3)));
}

#[test]
fn set_meta_then_recover_after_reopen() {
    let dir = tempdir().unwrap();
    let storage = EncryptedStorage::open_path(dir.path(), &TEST_KEY_128, false).unwrap();
    for num in 1..=5 {
        sealdb_testkit::write_file(&storage, FileDesc::manifest(num), b"m").unwrap();
        storage.set_meta(FileDesc::manifest(num)).unwrap();
    }
    storage.close().unwrap();

    let layout = PointerLayout::new(dir.path());
    assert_eq!(
        layout.read(PointerFile::Backup).unwrap().unwrap(),
        b"MANIFEST-000004\n"
    );
    // Losing CURRENT falls back to the backup.
    layout.remove(PointerFile::Current).unwrap();

    let storage = EncryptedStorage::open_path(dir.path(), &TEST_KEY_128, false).unwrap();
    assert_eq!(storage.get_meta().unwrap(), FileDesc::manifest(4));
    assert_eq!(
        layout.read(PointerFile::Current).unwrap().unwrap(),
        b"MANIFEST-000004\n"
    );
    storage.close().unwrap();
}
