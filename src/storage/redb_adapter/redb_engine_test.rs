use std::time::Duration;

use tempfile::TempDir;

use super::*;
use crate::test_utils::enable_logger;
use crate::Cursor;
use crate::EngineOptions;
use crate::StorageEngine;
use crate::StorageError;
use crate::Transaction;

// Test setup helper
fn setup_engine() -> (RedbEngine, TempDir) {
    let tempdir = tempfile::tempdir().unwrap();
    let engine = RedbEngine::open(&tempdir.path().join("logs.redb"), &EngineOptions::default()).unwrap();
    (engine, tempdir)
}

fn seed(
    engine: &RedbEngine,
    keys: &[u8],
) {
    let txn = engine.begin(true).unwrap();
    txn.create_bucket_if_not_exists("b").unwrap();
    for k in keys {
        txn.put("b", &[*k], &[*k, *k]).unwrap();
    }
    txn.commit().unwrap();
}

#[test]
fn test_missing_bucket_is_reported() {
    enable_logger();
    let (engine, _dir) = setup_engine();
    seed(&engine, &[1]);

    let txn = engine.begin(false).unwrap();
    assert!(matches!(
        txn.get("nope", &[1]),
        Err(crate::Error::Storage(StorageError::BucketNotFound(_)))
    ));
    assert!(txn.cursor("nope").is_err());

    // A write transaction must not create the bucket as a side effect
    let txn = engine.begin(true).unwrap();
    assert!(matches!(
        txn.put("nope", &[1], &[1]),
        Err(crate::Error::Storage(StorageError::BucketNotFound(_)))
    ));
    txn.commit().unwrap();
    let txn = engine.begin(false).unwrap();
    assert!(txn.get("nope", &[1]).is_err());
}

#[test]
fn test_bucket_created_in_same_transaction_is_usable() {
    let (engine, _dir) = setup_engine();

    let txn = engine.begin(true).unwrap();
    txn.create_bucket_if_not_exists("fresh").unwrap();
    txn.put("fresh", b"k", b"v").unwrap();
    assert_eq!(txn.get("fresh", b"k").unwrap(), Some(b"v".to_vec()));
    txn.commit().unwrap();

    let txn = engine.begin(false).unwrap();
    assert_eq!(txn.get("fresh", b"k").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn test_cursor_walks_and_seeks() {
    let (engine, _dir) = setup_engine();
    seed(&engine, &[2, 4, 6]);

    let txn = engine.begin(false).unwrap();
    let mut cursor = txn.cursor("b").unwrap();
    assert_eq!(cursor.next().unwrap(), Some((vec![2], vec![2, 2])));
    assert_eq!(cursor.next().unwrap(), Some((vec![4], vec![4, 4])));
    assert_eq!(cursor.seek(&[5]).unwrap(), Some((vec![6], vec![6, 6])));
    assert_eq!(cursor.next().unwrap(), None);
    assert_eq!(cursor.next().unwrap(), None);
    assert_eq!(cursor.first().unwrap(), Some((vec![2], vec![2, 2])));
    assert_eq!(cursor.last().unwrap(), Some((vec![6], vec![6, 6])));
    assert_eq!(cursor.seek(&[7]).unwrap(), None);
}

#[test]
fn test_delete_while_iterating() {
    let (engine, _dir) = setup_engine();
    seed(&engine, &[1, 2, 3, 4]);

    let txn = engine.begin(true).unwrap();
    let mut cursor = txn.cursor("b").unwrap();
    let mut item = cursor.seek(&[2]).unwrap();
    while let Some((k, _)) = item {
        if k[0] > 3 {
            break;
        }
        txn.delete("b", &k).unwrap();
        item = cursor.next().unwrap();
    }
    drop(cursor);
    txn.commit().unwrap();

    let txn = engine.begin(false).unwrap();
    let mut keys = vec![];
    txn.for_each("b", |k, _| {
        keys.push(k[0]);
        Ok(())
    })
    .unwrap();
    assert_eq!(keys, vec![1, 4]);
}

#[test]
fn test_reader_keeps_snapshot() {
    let (engine, _dir) = setup_engine();
    seed(&engine, &[1]);

    let reader = engine.begin(false).unwrap();
    let txn = engine.begin(true).unwrap();
    txn.put("b", &[2], &[2]).unwrap();
    txn.commit().unwrap();

    assert_eq!(reader.get("b", &[2]).unwrap(), None);
    let fresh = engine.begin(false).unwrap();
    assert_eq!(fresh.get("b", &[2]).unwrap(), Some(vec![2]));
}

#[test]
fn test_rollback_discards_writes() {
    let (engine, _dir) = setup_engine();
    seed(&engine, &[1]);

    let txn = engine.begin(true).unwrap();
    txn.put("b", &[2], &[2]).unwrap();
    txn.delete("b", &[1]).unwrap();
    txn.rollback().unwrap();

    let txn = engine.begin(false).unwrap();
    assert_eq!(txn.get("b", &[1]).unwrap(), Some(vec![1, 1]));
    assert_eq!(txn.get("b", &[2]).unwrap(), None);
}

#[test]
fn test_read_transaction_rejects_writes() {
    let (engine, _dir) = setup_engine();
    seed(&engine, &[1]);

    let txn = engine.begin(false).unwrap();
    assert!(!txn.is_writable());
    assert!(matches!(
        txn.delete("b", &[1]),
        Err(crate::Error::Storage(StorageError::ReadOnly))
    ));
    assert!(matches!(
        txn.create_bucket_if_not_exists("c"),
        Err(crate::Error::Storage(StorageError::ReadOnly))
    ));
}

#[test]
fn test_read_only_open() {
    let tempdir = tempfile::tempdir().unwrap();
    let path = tempdir.path().join("logs.redb");
    let options = EngineOptions {
        read_only: true,
        ..Default::default()
    };

    assert!(matches!(
        RedbEngine::open(&path, &options),
        Err(crate::Error::Storage(StorageError::Open { .. }))
    ));
    assert!(!path.exists());

    {
        let engine = RedbEngine::open(&path, &EngineOptions::default()).unwrap();
        seed(&engine, &[9]);
    }

    let engine = RedbEngine::open(&path, &options).unwrap();
    assert!(engine.is_read_only());
    assert!(matches!(
        engine.begin(true),
        Err(crate::Error::Storage(StorageError::ReadOnly))
    ));
    let txn = engine.begin(false).unwrap();
    assert_eq!(txn.get("b", &[9]).unwrap(), Some(vec![9, 9]));
}

#[cfg(unix)]
#[test]
fn test_created_file_gets_owner_only_mode() {
    use std::os::unix::fs::PermissionsExt;

    let (engine, _dir) = setup_engine();
    let mode = std::fs::metadata(engine.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn test_second_open_times_out_while_locked() {
    let (engine, _dir) = setup_engine();
    let options = EngineOptions {
        open_timeout: Duration::from_millis(120),
        lock_retry_interval: Duration::from_millis(20),
        ..Default::default()
    };

    let started = std::time::Instant::now();
    assert!(matches!(
        RedbEngine::open(engine.path(), &options),
        Err(crate::Error::Storage(StorageError::OpenTimeout { .. }))
    ));
    assert!(started.elapsed() >= Duration::from_millis(120));
}

#[test]
fn test_open_waits_for_lock_release() {
    let (engine, dir) = setup_engine();
    let path = dir.path().join("logs.redb");

    let holder = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        drop(engine);
    });

    let options = EngineOptions {
        open_timeout: Duration::from_secs(5),
        lock_retry_interval: Duration::from_millis(10),
        ..Default::default()
    };
    let reopened = RedbEngine::open(&path, &options).unwrap();
    holder.join().unwrap();
    assert!(!reopened.is_read_only());
}

#[test]
fn test_no_sync_writes_survive_reopen_after_sync() {
    let tempdir = tempfile::tempdir().unwrap();
    let path = tempdir.path().join("logs.redb");
    let options = EngineOptions {
        no_sync: true,
        ..Default::default()
    };
    {
        let engine = RedbEngine::open(&path, &options).unwrap();
        seed(&engine, &[1, 2]);
        engine.sync().unwrap();
    }

    let engine = RedbEngine::open(&path, &EngineOptions::default()).unwrap();
    let txn = engine.begin(false).unwrap();
    assert_eq!(txn.get("b", &[2]).unwrap(), Some(vec![2, 2]));
}
