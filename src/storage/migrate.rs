//! One-shot copy of a whole database from one container format to another.
//!
//! Keys and values are copied byte for byte, so the destination holds exactly
//! the same log entries and stable-store values as the source. The procedure
//! runs outside serving traffic: it holds the source lock for its whole
//! duration and creates the destination from scratch.

use std::fs;
use std::path::Path;
use std::time::Duration;

use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::constants::BUCKETS;
use crate::utils::file_io::discard_database;
use crate::Cursor;
use crate::EngineOptions;
use crate::Error;
use crate::LogStore;
use crate::MigrationError;
use crate::RedbEngine;
use crate::Result;
use crate::SledEngine;
use crate::StorageEngine;
use crate::StorageError;
use crate::StoreOptions;
use crate::Transaction;

#[derive(Debug, Clone)]
pub struct MigrationOptions {
    /// How long to wait for another process to release the source database
    pub source_open_timeout: Duration,

    /// Options for the destination; it is always opened read-write
    pub destination: EngineOptions,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            source_open_timeout: Duration::from_secs(60),
            destination: EngineOptions::default(),
        }
    }
}

/// Upgrades a legacy sled database at `source` to a new redb file at
/// `destination`, returning the open destination store.
pub fn migrate_to_redb(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
) -> Result<LogStore<RedbEngine>> {
    migrate::<SledEngine, RedbEngine>(source, destination, &MigrationOptions::default())
}

/// Copies the `"conf"` and `"logs"` buckets of the `S` database at `source`
/// into a new `D` database at `destination`.
///
/// The destination must not exist. On any failure after the destination was
/// created it is closed and removed again, so a failed migration leaves
/// nothing behind. The source is only ever read.
pub fn migrate<S, D>(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    options: &MigrationOptions,
) -> Result<LogStore<D>>
where
    S: StorageEngine,
    D: StorageEngine,
{
    let source = source.as_ref();
    let destination = destination.as_ref();

    if fs::symlink_metadata(destination).is_ok() {
        return Err(MigrationError::DestinationExists(destination.to_path_buf()).into());
    }

    info!(
        "migrating {} database {:?} to {} database {:?}",
        S::NAME,
        source,
        D::NAME,
        destination
    );

    let source_options = EngineOptions {
        read_only: true,
        open_timeout: options.source_open_timeout,
        ..Default::default()
    };
    let source_open_failed = |e: Error| -> Error {
        MigrationError::SourceOpen {
            path: source.to_path_buf(),
            source: Box::new(e),
        }
        .into()
    };
    let source_db = S::open(source, &source_options).map_err(source_open_failed)?;
    let source_txn = source_db.begin(false).map_err(source_open_failed)?;

    let migrated = create_and_copy::<_, D>(&source_txn, destination, options);

    if let Err(e) = source_txn.rollback() {
        warn!(?e, "failed to release source read transaction");
    }
    if migrated.is_ok() {
        info!("migration to {:?} complete", destination);
    }
    migrated
}

fn create_and_copy<T, D>(
    source_txn: &T,
    destination: &Path,
    options: &MigrationOptions,
) -> Result<LogStore<D>>
where
    T: Transaction,
    D: StorageEngine,
{
    let store_options = StoreOptions {
        path: destination.to_path_buf(),
        engine: EngineOptions {
            read_only: false,
            ..options.destination.clone()
        },
    };
    let dest = match LogStore::<D>::open_with_options(store_options) {
        Ok(dest) => dest,
        Err(e) => {
            discard_database(destination);
            return Err(MigrationError::DestinationCreate {
                path: destination.to_path_buf(),
                source: Box::new(e),
            }
            .into());
        }
    };

    match copy_buckets(source_txn, &dest) {
        Ok(()) => Ok(dest),
        Err(e) => {
            dest.close();
            discard_database(destination);
            Err(e)
        }
    }
}

/// Copies every bucket in one destination write transaction.
fn copy_buckets<T, D>(
    source_txn: &T,
    dest: &LogStore<D>,
) -> Result<()>
where
    T: Transaction,
    D: StorageEngine,
{
    let dest_txn = dest.engine().begin(true).map_err(|e| MigrationError::DestinationCreate {
        path: dest.path().to_path_buf(),
        source: Box::new(e),
    })?;

    for bucket in BUCKETS {
        match copy_bucket(source_txn, &dest_txn, bucket) {
            Ok(copied) => debug!("copied {} keys of bucket {}", copied, bucket),
            Err(e) => {
                if let Err(rollback_err) = dest_txn.rollback() {
                    error!(?rollback_err, "failed to roll back destination transaction");
                }
                return Err(MigrationError::CopyFailed {
                    bucket: bucket.to_string(),
                    source: Box::new(e),
                }
                .into());
            }
        }
    }

    dest_txn
        .commit()
        .map_err(|e| MigrationError::CommitFailed { source: Box::new(e) }.into())
}

fn copy_bucket<S, D>(
    source_txn: &S,
    dest_txn: &D,
    bucket: &str,
) -> Result<u64>
where
    S: Transaction,
    D: Transaction,
{
    let mut cursor = match source_txn.cursor(bucket) {
        Ok(cursor) => cursor,
        Err(Error::Storage(StorageError::BucketNotFound(_))) => {
            warn!("source has no {} bucket, copying it as empty", bucket);
            return Ok(0);
        }
        Err(e) => return Err(e),
    };

    let mut copied = 0;
    let mut item = cursor.first()?;
    while let Some((key, value)) = item {
        dest_txn.put(bucket, &key, &value)?;
        copied += 1;
        item = cursor.next()?;
    }
    Ok(copied)
}
