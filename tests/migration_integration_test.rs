//! Upgrade path as an operator runs it: a node writes through the legacy
//! container, is stopped, migrated, and restarted on the current one.

use raft_logstore::migrate;
use raft_logstore::migrate_to_redb;
use raft_logstore::Error;
use raft_logstore::LogEntry;
use raft_logstore::LogStore;
use raft_logstore::LogType;
use raft_logstore::MigrationError;
use raft_logstore::MigrationOptions;
use raft_logstore::RaftLogStore;
use raft_logstore::RedbEngine;
use raft_logstore::SledEngine;
use raft_logstore::StableStore;

fn entries() -> Vec<LogEntry> {
    (1..=50u64)
        .map(|i| LogEntry {
            entry_type: if i % 10 == 0 {
                LogType::Configuration
            } else {
                LogType::Command
            },
            extensions: vec![i as u8],
            ..LogEntry::new(i, 1 + i / 20, format!("log{i}"))
        })
        .collect()
}

#[test]
fn legacy_node_restarts_on_current_container() {
    let dir = tempfile::tempdir().unwrap();
    let legacy_path = dir.path().join("raft.sled");
    let current_path = dir.path().join("raft.redb");
    let entries = entries();

    {
        let legacy = LogStore::<SledEngine>::open(&legacy_path).unwrap();
        legacy.store_logs(&entries).unwrap();
        // Compaction already dropped the oldest entries
        legacy.delete_range(1, 10).unwrap();
        legacy.set_uint64(b"CurrentTerm", 3).unwrap();
        legacy.set(b"LastVoteCand", b"10.0.0.2:8300").unwrap();
        legacy.close();
    }

    let migrated = migrate_to_redb(&legacy_path, &current_path).unwrap();
    migrated.close();

    let current = LogStore::<RedbEngine>::open(&current_path).unwrap();
    assert_eq!(current.first_index().unwrap(), 11);
    assert_eq!(current.last_index().unwrap(), 50);
    assert_eq!(current.get_logs(11..=50).unwrap(), entries[10..].to_vec());
    assert!(current.get_log(10).unwrap_err().is_log_not_found());
    assert_eq!(current.get_uint64(b"CurrentTerm").unwrap(), 3);
    assert_eq!(current.get(b"LastVoteCand").unwrap(), b"10.0.0.2:8300".to_vec());

    // The node keeps appending after the upgrade
    current.store_log(&LogEntry::new(51, 3, "log51")).unwrap();
    assert_eq!(current.last_index().unwrap(), 51);

    // A second run refuses to clobber the upgraded database
    let err = migrate::<SledEngine, RedbEngine>(&legacy_path, &current_path, &MigrationOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::Migration(MigrationError::DestinationExists(_))));
}
