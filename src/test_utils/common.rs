use std::path::PathBuf;

use tempfile::TempDir;

use crate::LogStore;
use crate::StorageEngine;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    env_logger::init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

/// Fresh temporary directory plus a database path inside it that does not
/// exist yet.
pub fn temp_db_path(name: &str) -> (TempDir, PathBuf) {
    let tempdir = tempfile::tempdir().expect("create temp dir");
    let path = tempdir.path().join(name);
    (tempdir, path)
}

/// Opens a fresh read-write store in a temporary directory.
pub fn open_temp_store<E: StorageEngine>() -> (LogStore<E>, TempDir) {
    let (tempdir, path) = temp_db_path("raft.db");
    let store = LogStore::<E>::open(&path).expect("open store");
    (store, tempdir)
}
