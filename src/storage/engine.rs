//! Capability interface over an embedded ordered key-value engine.
//!
//! The log store only needs a small slice of what an embedded engine offers:
//! open a database file, begin read-only or read-write transactions, create
//! named buckets, point get/put/delete inside a bucket, and a forward cursor
//! that visits keys in ascending byte order with seek-to-key-or-successor.
//! [`SledEngine`](crate::SledEngine) (legacy container) and
//! [`RedbEngine`](crate::RedbEngine) (current container) both implement it,
//! so every store operation and the migration are written once.

use std::ops::Bound;
use std::path::Path;
use std::time::Duration;

use crate::constants::DB_FILE_MODE;
use crate::Result;

/// Owned key/value pair handed out by cursors.
///
/// Engines may reuse or invalidate their internal buffers once a transaction
/// ends, so nothing borrowed from the engine ever escapes.
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// Engine-level open options.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Skip the forced flush after each write transaction. Unsafe: a crash
    /// may lose acknowledged writes until [`StorageEngine::sync`] is called.
    pub no_sync: bool,

    /// Open without creating anything and refuse write transactions.
    pub read_only: bool,

    /// How long to keep retrying while another handle holds the database
    /// lock. Zero means a single attempt.
    pub open_timeout: Duration,

    /// Pause between two lock attempts while `open_timeout` has not elapsed.
    pub lock_retry_interval: Duration,

    /// Page cache size hint in bytes.
    pub cache_capacity: u64,

    /// Unix permission bits for a database file this engine had to create.
    pub file_mode: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            no_sync: false,
            read_only: false,
            open_timeout: Duration::ZERO,
            lock_retry_interval: Duration::from_millis(50),
            cache_capacity: 64 * 1024 * 1024,
            file_mode: DB_FILE_MODE,
        }
    }
}

/// An embedded ordered key-value engine owning one database on disk.
pub trait StorageEngine: Sized + Send + Sync + 'static {
    /// Transaction type; borrows the engine for its whole lifetime.
    type Transaction<'a>: Transaction
    where
        Self: 'a;

    /// Short engine name used in logs.
    const NAME: &'static str;

    /// Opens (or, unless read-only, creates) the database at `path`.
    fn open(
        path: &Path,
        options: &EngineOptions,
    ) -> Result<Self>;

    /// Begins a transaction. At most one writable transaction is in flight
    /// per engine; a second writer blocks until the first one finishes.
    fn begin(
        &self,
        writable: bool,
    ) -> Result<Self::Transaction<'_>>;

    /// Forces everything committed so far onto stable storage.
    fn sync(&self) -> Result<()>;

    /// Location of the database on disk.
    fn path(&self) -> &Path;

    fn is_read_only(&self) -> bool;
}

/// A read-only or read-write transaction.
///
/// Dropping a transaction without calling [`Transaction::commit`] discards
/// its writes.
pub trait Transaction {
    type Cursor<'c>: Cursor
    where
        Self: 'c;

    fn is_writable(&self) -> bool;

    /// Creates `bucket` unless it already exists. Write transactions only.
    fn create_bucket_if_not_exists(
        &self,
        bucket: &str,
    ) -> Result<()>;

    /// Point lookup; the returned value is an owned copy.
    fn get(
        &self,
        bucket: &str,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>>;

    /// Inserts or overwrites `key`.
    fn put(
        &self,
        bucket: &str,
        key: &[u8],
        value: &[u8],
    ) -> Result<()>;

    /// Removes `key`; removing an absent key is not an error.
    fn delete(
        &self,
        bucket: &str,
        key: &[u8],
    ) -> Result<()>;

    /// Opens an unpositioned cursor over `bucket`.
    ///
    /// Cursors of a write transaction observe the transaction's own pending
    /// writes, and keys deleted through [`Transaction::delete`] while a cursor
    /// is open are skipped by later cursor moves.
    fn cursor(
        &self,
        bucket: &str,
    ) -> Result<Self::Cursor<'_>>;

    /// Visits every key/value pair of `bucket` in ascending key order,
    /// stopping at the first error returned by `f`.
    fn for_each<F>(
        &self,
        bucket: &str,
        mut f: F,
    ) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> Result<()>,
    {
        let mut cursor = self.cursor(bucket)?;
        let mut item = cursor.first()?;
        while let Some((key, value)) = item {
            f(&key, &value)?;
            item = cursor.next()?;
        }
        Ok(())
    }

    fn commit(self) -> Result<()>;

    fn rollback(self) -> Result<()>;
}

/// Forward cursor over one bucket, in ascending byte order of keys.
pub trait Cursor {
    /// Moves to the smallest key.
    fn first(&mut self) -> Result<Option<KeyValue>>;

    /// Moves to the largest key.
    fn last(&mut self) -> Result<Option<KeyValue>>;

    /// Moves to `key`, or to its successor when `key` is absent.
    fn seek(
        &mut self,
        key: &[u8],
    ) -> Result<Option<KeyValue>>;

    /// Moves past the current key. An unpositioned cursor behaves like
    /// [`Cursor::first`]; an exhausted one keeps returning `None`.
    fn next(&mut self) -> Result<Option<KeyValue>>;
}

/// Where a position-based cursor currently sits.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) enum CursorPosition {
    #[default]
    Unpositioned,
    At(Vec<u8>),
    Exhausted,
}

impl CursorPosition {
    /// Records the outcome of a cursor move and passes it through.
    pub(crate) fn track(
        &mut self,
        item: Option<KeyValue>,
    ) -> Option<KeyValue> {
        *self = match &item {
            Some((key, _)) => CursorPosition::At(key.clone()),
            None => CursorPosition::Exhausted,
        };
        item
    }
}

/// Retries `attempt` while it reports a held lock, until `options.open_timeout`
/// has elapsed. `attempt` returns `Ok(None)` when the lock is held.
pub(crate) fn open_with_lock_retry<T, F>(
    path: &Path,
    options: &EngineOptions,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Result<Option<T>>,
{
    let started = std::time::Instant::now();
    loop {
        if let Some(opened) = attempt()? {
            return Ok(opened);
        }

        let elapsed = started.elapsed();
        if elapsed >= options.open_timeout {
            return Err(crate::StorageError::OpenTimeout {
                path: path.to_path_buf(),
                timeout: options.open_timeout,
            }
            .into());
        }
        tracing::debug!("database {:?} is locked, retrying", path);
        std::thread::sleep(options.lock_retry_interval.min(options.open_timeout - elapsed));
    }
}

pub(crate) fn owned_bound(bound: Bound<&[u8]>) -> Bound<Vec<u8>> {
    match bound {
        Bound::Included(k) => Bound::Included(k.to_vec()),
        Bound::Excluded(k) => Bound::Excluded(k.to_vec()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

pub(crate) fn borrowed_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(k) => Bound::Included(k.as_slice()),
        Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}
