//! Current container: a single redb file whose tables are the buckets.
//!
//! redb refuses to hand out the same table twice inside one transaction, so
//! cursors hold no table open between moves. Each move reopens the bucket and
//! does one range probe from the remembered key.

use std::io;
use std::ops::Bound;
use std::path::Path;
use std::path::PathBuf;

use redb::Database;
use redb::DatabaseError;
use redb::Durability;
use redb::ReadTransaction;
use redb::ReadableTable;
use redb::TableDefinition;
use redb::TableError;
use redb::TableHandle;
use redb::WriteTransaction;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::storage::engine::open_with_lock_retry;
use crate::storage::engine::CursorPosition;
use crate::utils::file_io::set_file_mode;
use crate::Cursor;
use crate::EngineOptions;
use crate::Error;
use crate::KeyValue;
use crate::Result;
use crate::StorageEngine;
use crate::StorageError;
use crate::Transaction;

type Bucket<'b> = TableDefinition<'b, &'static [u8], &'static [u8]>;

fn bucket_definition(name: &str) -> Bucket<'_> {
    TableDefinition::new(name)
}

pub struct RedbEngine {
    db: Database,

    path: PathBuf,

    options: EngineOptions,
}

impl std::fmt::Debug for RedbEngine {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("RedbEngine")
            .field("path", &self.path)
            .field("read_only", &self.options.read_only)
            .finish()
    }
}

impl Drop for RedbEngine {
    fn drop(&mut self) {
        // Commits made with Durability::None are only persisted by a later durable commit
        if self.options.read_only || !self.options.no_sync {
            return;
        }
        match self.sync() {
            Ok(_) => debug!("Successfully synced redb database {:?}", self.path),
            Err(e) => error!(?e, "Failed to sync redb database {:?}", self.path),
        }
    }
}

impl RedbEngine {
    fn open_db(
        path: &Path,
        options: &EngineOptions,
    ) -> Result<Option<Database>> {
        let mut builder = Database::builder();
        builder.set_cache_size(options.cache_capacity as usize);

        let opened = if options.read_only {
            builder.open(path)
        } else {
            builder.create(path)
        };

        match opened {
            Ok(db) => Ok(Some(db)),
            Err(DatabaseError::DatabaseAlreadyOpen) => Ok(None),
            Err(e) => {
                warn!("Try to open DB at this location: {:?} and failed: {:?}", path, e);
                Err(StorageError::Open {
                    path: path.to_path_buf(),
                    source: Box::new(e),
                }
                .into())
            }
        }
    }
}

impl StorageEngine for RedbEngine {
    type Transaction<'a> = RedbTransaction;

    const NAME: &'static str = "redb";

    fn open(
        path: &Path,
        options: &EngineOptions,
    ) -> Result<Self> {
        debug!("open redb database from path: {:?}", path);

        let existed = path.exists();
        if options.read_only && !existed {
            return Err(StorageError::Open {
                path: path.to_path_buf(),
                source: Box::new(io::Error::new(
                    io::ErrorKind::NotFound,
                    "read-only open of a missing database",
                )),
            }
            .into());
        }

        let db = open_with_lock_retry(path, options, || Self::open_db(path, options))?;
        if !existed {
            set_file_mode(path, options.file_mode)?;
        }
        info!(
            "opened redb database {:?}, created={}, read_only={}",
            path, !existed, options.read_only
        );

        Ok(Self {
            db,
            path: path.to_path_buf(),
            options: options.clone(),
        })
    }

    fn begin(
        &self,
        writable: bool,
    ) -> Result<RedbTransaction> {
        if !writable {
            return Ok(RedbTransaction::Read(self.db.begin_read()?));
        }
        if self.options.read_only {
            return Err(StorageError::ReadOnly.into());
        }

        let mut tx = self.db.begin_write()?;
        if self.options.no_sync {
            tx.set_durability(Durability::None);
        }
        trace!("redb begin write transaction");
        Ok(RedbTransaction::Write(tx))
    }

    fn sync(&self) -> Result<()> {
        if self.options.read_only {
            return Ok(());
        }
        // An empty durable commit persists every earlier non-durable one
        let mut tx = self.db.begin_write()?;
        tx.set_durability(Durability::Immediate);
        tx.commit()?;
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn is_read_only(&self) -> bool {
        self.options.read_only
    }
}

#[allow(clippy::large_enum_variant)]
pub enum RedbTransaction {
    Read(ReadTransaction),
    Write(WriteTransaction),
}

/// One positioning step of a cursor.
#[derive(Clone, Copy)]
enum Probe<'k> {
    /// Smallest key satisfying the lower bound
    Forward(Bound<&'k [u8]>),
    /// Largest key satisfying the upper bound
    Backward(Bound<&'k [u8]>),
}

fn probe_table<T>(
    table: &T,
    probe: Probe<'_>,
) -> Result<Option<KeyValue>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let found = match probe {
        Probe::Forward(lower) => table.range::<&[u8]>((lower, Bound::Unbounded))?.next(),
        Probe::Backward(upper) => table.range::<&[u8]>((Bound::Unbounded, upper))?.next_back(),
    };

    match found.transpose()? {
        Some((k, v)) => Ok(Some((k.value().to_vec(), v.value().to_vec()))),
        None => Ok(None),
    }
}

fn missing_bucket(
    bucket: &str,
    e: TableError,
) -> Error {
    match e {
        TableError::TableDoesNotExist(_) => StorageError::BucketNotFound(bucket.to_string()).into(),
        e => e.into(),
    }
}

impl RedbTransaction {
    fn write_txn(&self) -> Result<&WriteTransaction> {
        match self {
            Self::Read(_) => Err(StorageError::ReadOnly.into()),
            Self::Write(tx) => Ok(tx),
        }
    }

    /// `open_table` on a write transaction creates the table, so existence is
    /// checked first.
    fn ensure_bucket(
        tx: &WriteTransaction,
        bucket: &str,
    ) -> Result<()> {
        if tx.list_tables()?.any(|handle| handle.name() == bucket) {
            Ok(())
        } else {
            Err(StorageError::BucketNotFound(bucket.to_string()).into())
        }
    }

    fn probe(
        &self,
        bucket: &str,
        probe: Probe<'_>,
    ) -> Result<Option<KeyValue>> {
        let definition = bucket_definition(bucket);
        match self {
            Self::Read(tx) => {
                let table = tx.open_table(definition).map_err(|e| missing_bucket(bucket, e))?;
                probe_table(&table, probe)
            }
            Self::Write(tx) => {
                Self::ensure_bucket(tx, bucket)?;
                let table = tx.open_table(definition)?;
                probe_table(&table, probe)
            }
        }
    }
}

impl Transaction for RedbTransaction {
    type Cursor<'c>
        = RedbCursor<'c>
    where
        Self: 'c;

    fn is_writable(&self) -> bool {
        matches!(self, Self::Write(_))
    }

    fn create_bucket_if_not_exists(
        &self,
        bucket: &str,
    ) -> Result<()> {
        let tx = self.write_txn()?;
        tx.open_table(bucket_definition(bucket))?;
        Ok(())
    }

    fn get(
        &self,
        bucket: &str,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        let definition = bucket_definition(bucket);
        match self {
            Self::Read(tx) => {
                let table = tx.open_table(definition).map_err(|e| missing_bucket(bucket, e))?;
                let value = table.get(key)?.map(|v| v.value().to_vec());
                Ok(value)
            }
            Self::Write(tx) => {
                Self::ensure_bucket(tx, bucket)?;
                let table = tx.open_table(definition)?;
                let value = table.get(key)?.map(|v| v.value().to_vec());
                Ok(value)
            }
        }
    }

    fn put(
        &self,
        bucket: &str,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        let tx = self.write_txn()?;
        Self::ensure_bucket(tx, bucket)?;
        let mut table = tx.open_table(bucket_definition(bucket))?;
        table.insert(key, value)?;
        Ok(())
    }

    fn delete(
        &self,
        bucket: &str,
        key: &[u8],
    ) -> Result<()> {
        let tx = self.write_txn()?;
        Self::ensure_bucket(tx, bucket)?;
        let mut table = tx.open_table(bucket_definition(bucket))?;
        table.remove(key)?;
        Ok(())
    }

    fn cursor(
        &self,
        bucket: &str,
    ) -> Result<RedbCursor<'_>> {
        // Fail on a missing bucket now rather than on the first move
        if let Self::Write(tx) = self {
            Self::ensure_bucket(tx, bucket)?;
        } else {
            self.probe(bucket, Probe::Forward(Bound::Unbounded))?;
        }

        Ok(RedbCursor {
            txn: self,
            bucket: bucket.to_string(),
            position: CursorPosition::default(),
        })
    }

    fn commit(self) -> Result<()> {
        match self {
            Self::Read(_) => Ok(()),
            Self::Write(tx) => {
                tx.commit()?;
                trace!("redb commit");
                Ok(())
            }
        }
    }

    fn rollback(self) -> Result<()> {
        match self {
            Self::Read(_) => Ok(()),
            Self::Write(tx) => {
                tx.abort()?;
                Ok(())
            }
        }
    }
}

pub struct RedbCursor<'c> {
    txn: &'c RedbTransaction,
    bucket: String,
    position: CursorPosition,
}

impl Cursor for RedbCursor<'_> {
    fn first(&mut self) -> Result<Option<KeyValue>> {
        let item = self.txn.probe(&self.bucket, Probe::Forward(Bound::Unbounded))?;
        Ok(self.position.track(item))
    }

    fn last(&mut self) -> Result<Option<KeyValue>> {
        let item = self.txn.probe(&self.bucket, Probe::Backward(Bound::Unbounded))?;
        Ok(self.position.track(item))
    }

    fn seek(
        &mut self,
        key: &[u8],
    ) -> Result<Option<KeyValue>> {
        let item = self.txn.probe(&self.bucket, Probe::Forward(Bound::Included(key)))?;
        Ok(self.position.track(item))
    }

    fn next(&mut self) -> Result<Option<KeyValue>> {
        let lower = match &self.position {
            CursorPosition::Unpositioned => Bound::Unbounded,
            CursorPosition::At(current) => Bound::Excluded(current.as_slice()),
            CursorPosition::Exhausted => return Ok(None),
        };
        let item = self.txn.probe(&self.bucket, Probe::Forward(lower))?;
        Ok(self.position.track(item))
    }
}
