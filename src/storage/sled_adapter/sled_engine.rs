//! Legacy container: a sled database whose trees are the buckets.
//!
//! sled has no begin/commit transaction object and no read-your-writes
//! iteration inside its closure-based transactions, so a write transaction
//! stages its writes in one [`PendingBatch`] per tree and applies them all in
//! a single multi-tree sled transaction on commit. Reads and cursors merge the
//! staged writes over the committed tree contents.
//!
//! sled iterators do not pin a snapshot, so a commit gate stands in for one:
//! read transactions hold it shared for their whole life and a commit holds
//! it exclusively while the batches are applied.

use std::cell::RefCell;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::io;
use std::ops::Bound;
use std::path::Path;
use std::path::PathBuf;

use parking_lot::Mutex;
use parking_lot::MutexGuard;
use parking_lot::RwLock;
use parking_lot::RwLockReadGuard;
use sled::transaction::TransactionError;
use sled::transaction::TransactionResult;
use sled::Transactional;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::sled_batch::PendingBatch;
use crate::constants::SLED_DEFAULT_TREE;
use crate::storage::engine::borrowed_bound;
use crate::storage::engine::open_with_lock_retry;
use crate::storage::engine::owned_bound;
use crate::storage::engine::CursorPosition;
use crate::Cursor;
use crate::EngineOptions;
use crate::Error;
use crate::KeyValue;
use crate::Result;
use crate::StorageEngine;
use crate::StorageError;
use crate::Transaction;

/// Background flush period used only when `no_sync` is set; otherwise every
/// commit flushes explicitly.
const NO_SYNC_FLUSH_EVERY_MS: u64 = 500;

pub struct SledEngine {
    db: sled::Db,

    path: PathBuf,

    options: EngineOptions,

    /// Buckets known to exist, by name
    trees: RwLock<HashMap<String, sled::Tree>>,

    /// sled itself admits concurrent writers; the log store does not
    write_lock: Mutex<()>,

    /// Shared by open read transactions, exclusive while a commit applies
    commit_gate: RwLock<()>,
}

impl std::fmt::Debug for SledEngine {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SledEngine")
            .field("path", &self.path)
            .field("buckets", &self.trees.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Drop for SledEngine {
    fn drop(&mut self) {
        if self.options.read_only {
            return;
        }
        match self.db.flush() {
            Ok(_) => debug!("Successfully flushed sled database {:?}", self.path),
            Err(e) => error!(?e, "Failed to flush sled database {:?}", self.path),
        }
    }
}

impl SledEngine {
    fn tree(
        &self,
        bucket: &str,
    ) -> Result<sled::Tree> {
        self.trees
            .read()
            .get(bucket)
            .cloned()
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()).into())
    }

    fn open_db(
        path: &Path,
        options: &EngineOptions,
    ) -> Result<Option<sled::Db>> {
        let flush_every_ms = options.no_sync.then_some(NO_SYNC_FLUSH_EVERY_MS);

        match sled::Config::default()
            .path(path)
            .cache_capacity(options.cache_capacity)
            .flush_every_ms(flush_every_ms)
            .open()
        {
            Ok(db) => Ok(Some(db)),
            Err(sled::Error::Io(e)) if is_lock_conflict(&e) => Ok(None),
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

/// sled wraps a failed `try_lock_exclusive` in an `io::ErrorKind::Other`
/// carrying the debug form of the original `WouldBlock` error.
pub(super) fn is_lock_conflict(e: &io::Error) -> bool {
    match e.kind() {
        io::ErrorKind::WouldBlock => true,
        io::ErrorKind::Other => {
            let message = e.to_string();
            message.starts_with("could not acquire lock on") && message.contains("WouldBlock")
        }
        _ => false,
    }
}

impl StorageEngine for SledEngine {
    type Transaction<'a> = SledTransaction<'a>;

    const NAME: &'static str = "sled";

    fn open(
        path: &Path,
        options: &EngineOptions,
    ) -> Result<Self> {
        debug!("open sled database from path: {:?}", path);

        // sled would happily create an empty database here
        if options.read_only && !path.exists() {
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

        let mut trees = HashMap::new();
        for name in db.tree_names() {
            if &name[..] == SLED_DEFAULT_TREE {
                continue;
            }
            let tree = db.open_tree(&name)?;
            trees.insert(String::from_utf8_lossy(&name).into_owned(), tree);
        }
        info!(
            "opened sled database {:?} with {} bucket(s), read_only={}",
            path,
            trees.len(),
            options.read_only
        );

        Ok(Self {
            db,
            path: path.to_path_buf(),
            options: options.clone(),
            trees: RwLock::new(trees),
            write_lock: Mutex::new(()),
            commit_gate: RwLock::new(()),
        })
    }

    fn begin(
        &self,
        writable: bool,
    ) -> Result<SledTransaction<'_>> {
        if writable && self.options.read_only {
            return Err(StorageError::ReadOnly.into());
        }
        let (write_guard, read_guard) = if writable {
            (Some(self.write_lock.lock()), None)
        } else {
            (None, Some(self.commit_gate.read()))
        };
        trace!("sled begin transaction, writable={}", writable);

        Ok(SledTransaction {
            engine: self,
            write_guard,
            read_guard,
            pending: RefCell::new(BTreeMap::new()),
        })
    }

    fn sync(&self) -> Result<()> {
        let flushed = self.db.flush()?;
        trace!("sled sync flushed {} bytes", flushed);
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn is_read_only(&self) -> bool {
        self.options.read_only
    }
}

struct PendingBucket {
    tree: sled::Tree,
    batch: PendingBatch,
}

pub struct SledTransaction<'a> {
    engine: &'a SledEngine,

    /// Held for the whole life of a write transaction
    write_guard: Option<MutexGuard<'a, ()>>,

    /// Held for the whole life of a read transaction; no commit lands while
    /// it is alive
    read_guard: Option<RwLockReadGuard<'a, ()>>,

    /// Staged writes by bucket name
    pending: RefCell<BTreeMap<String, PendingBucket>>,
}

impl SledTransaction<'_> {
    fn ensure_writable(&self) -> Result<()> {
        if self.write_guard.is_none() {
            return Err(StorageError::ReadOnly.into());
        }
        Ok(())
    }

    fn stage<F>(
        &self,
        bucket: &str,
        f: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut PendingBatch),
    {
        self.ensure_writable()?;
        let mut pending = self.pending.borrow_mut();
        let staged = match pending.entry(bucket.to_string()) {
            Entry::Occupied(o) => o.into_mut(),
            Entry::Vacant(v) => v.insert(PendingBucket {
                tree: self.engine.tree(bucket)?,
                batch: PendingBatch::default(),
            }),
        };
        f(&mut staged.batch);
        Ok(())
    }
}

impl<'a> Transaction for SledTransaction<'a> {
    type Cursor<'c>
        = SledCursor<'c, 'a>
    where
        Self: 'c;

    fn is_writable(&self) -> bool {
        self.write_guard.is_some()
    }

    fn create_bucket_if_not_exists(
        &self,
        bucket: &str,
    ) -> Result<()> {
        self.ensure_writable()?;
        let mut trees = self.engine.trees.write();
        if !trees.contains_key(bucket) {
            let tree = self.engine.db.open_tree(bucket)?;
            trees.insert(bucket.to_string(), tree);
            debug!("created sled bucket {}", bucket);
        }
        Ok(())
    }

    fn get(
        &self,
        bucket: &str,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        if let Some(staged) = self.pending.borrow().get(bucket) {
            if let Some(value) = staged.batch.get(key) {
                return Ok(value.map(<[u8]>::to_vec));
            }
        }
        let tree = self.engine.tree(bucket)?;
        Ok(tree.get(key)?.map(|ivec| ivec.to_vec()))
    }

    fn put(
        &self,
        bucket: &str,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        self.stage(bucket, |batch| batch.insert(key, value))
    }

    fn delete(
        &self,
        bucket: &str,
        key: &[u8],
    ) -> Result<()> {
        self.stage(bucket, |batch| batch.remove(key))
    }

    fn cursor(
        &self,
        bucket: &str,
    ) -> Result<SledCursor<'_, 'a>> {
        Ok(SledCursor {
            txn: self,
            bucket: bucket.to_string(),
            tree: self.engine.tree(bucket)?,
            position: CursorPosition::default(),
        })
    }

    fn commit(self) -> Result<()> {
        let SledTransaction {
            engine,
            write_guard,
            read_guard,
            pending,
        } = self;

        if write_guard.is_none() {
            drop(read_guard);
            return Ok(());
        }

        let (trees, batches): (Vec<sled::Tree>, Vec<sled::Batch>) = pending
            .into_inner()
            .into_values()
            .filter(|staged| !staged.batch.is_empty())
            .map(|staged| (staged.tree, staged.batch.to_sled_batch()))
            .unzip();

        if trees.is_empty() {
            return Ok(());
        }

        let gate = engine.commit_gate.write();
        let applied: TransactionResult<()> = trees.as_slice().transaction(|views| {
            for (view, batch) in views.iter().zip(&batches) {
                view.apply_batch(batch)?;
            }
            Ok(())
        });
        drop(gate);
        applied.map_err(|e| match e {
            TransactionError::Storage(e) => Error::from(e),
            TransactionError::Abort(()) => {
                Error::Fatal("sled transaction aborted without a reason".to_string())
            }
        })?;

        if !engine.options.no_sync {
            engine.db.flush()?;
        }
        trace!("sled commit applied {} batch(es)", trees.len());

        drop(write_guard);
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        // Staged writes never reached sled
        Ok(())
    }
}

/// Position-based cursor: each move is one O(log n) probe of the tree merged
/// with the transaction's staged writes, so deleting through the transaction
/// while the cursor is open is safe.
pub struct SledCursor<'c, 'a> {
    txn: &'c SledTransaction<'a>,
    bucket: String,
    tree: sled::Tree,
    position: CursorPosition,
}

impl SledCursor<'_, '_> {
    /// Smallest live key satisfying `lower`.
    fn forward(
        &self,
        lower: Bound<&[u8]>,
    ) -> Result<Option<KeyValue>> {
        let pending = self.txn.pending.borrow();
        let staged = pending.get(&self.bucket).map(|p| &p.batch);
        let mut lower = owned_bound(lower);

        loop {
            let bound = borrowed_bound(&lower);
            let stored = self
                .tree
                .range::<&[u8], _>((bound, Bound::Unbounded))
                .next()
                .transpose()?;
            let staged_next = staged.and_then(|b| b.next_from(bound));

            match (stored, staged_next) {
                (None, None) => return Ok(None),
                (Some((k, v)), None) => return Ok(Some((k.to_vec(), v.to_vec()))),
                (Some((k, v)), Some((sk, _))) if &k[..] < sk => {
                    return Ok(Some((k.to_vec(), v.to_vec())))
                }
                (_, Some((sk, Some(sv)))) => return Ok(Some((sk.to_vec(), sv.to_vec()))),
                // staged deletion shadows the stored key
                (_, Some((sk, None))) => lower = Bound::Excluded(sk.to_vec()),
            }
        }
    }

    /// Largest live key satisfying `upper`.
    fn backward(
        &self,
        upper: Bound<&[u8]>,
    ) -> Result<Option<KeyValue>> {
        let pending = self.txn.pending.borrow();
        let staged = pending.get(&self.bucket).map(|p| &p.batch);
        let mut upper = owned_bound(upper);

        loop {
            let bound = borrowed_bound(&upper);
            let stored = self
                .tree
                .range::<&[u8], _>((Bound::Unbounded, bound))
                .next_back()
                .transpose()?;
            let staged_prev = staged.and_then(|b| b.prev_from(bound));

            match (stored, staged_prev) {
                (None, None) => return Ok(None),
                (Some((k, v)), None) => return Ok(Some((k.to_vec(), v.to_vec()))),
                (Some((k, v)), Some((sk, _))) if &k[..] > sk => {
                    return Ok(Some((k.to_vec(), v.to_vec())))
                }
                (_, Some((sk, Some(sv)))) => return Ok(Some((sk.to_vec(), sv.to_vec()))),
                (_, Some((sk, None))) => upper = Bound::Excluded(sk.to_vec()),
            }
        }
    }
}

impl Cursor for SledCursor<'_, '_> {
    fn first(&mut self) -> Result<Option<KeyValue>> {
        let item = self.forward(Bound::Unbounded)?;
        Ok(self.position.track(item))
    }

    fn last(&mut self) -> Result<Option<KeyValue>> {
        let item = self.backward(Bound::Unbounded)?;
        Ok(self.position.track(item))
    }

    fn seek(
        &mut self,
        key: &[u8],
    ) -> Result<Option<KeyValue>> {
        let item = self.forward(Bound::Included(key))?;
        Ok(self.position.track(item))
    }

    fn next(&mut self) -> Result<Option<KeyValue>> {
        let item = match &self.position {
            CursorPosition::Unpositioned => self.forward(Bound::Unbounded)?,
            CursorPosition::At(current) => self.forward(Bound::Excluded(current.as_slice()))?,
            CursorPosition::Exhausted => return Ok(None),
        };
        Ok(self.position.track(item))
    }
}
