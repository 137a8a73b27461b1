//! Raft log and stable store over an embedded ordered key-value engine.
//!
//! Log entries live in the `"logs"` bucket under their 8-byte big-endian
//! index, so engine key order is log order and the first/last index are a
//! single cursor probe. Stable-store keys live in the `"conf"` bucket.

use std::fmt;
use std::ops::RangeInclusive;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::constants::BUCKETS;
use crate::constants::CONF_BUCKET;
use crate::constants::LOGS_BUCKET;
use crate::constants::METRIC_LOGS_PER_BATCH;
use crate::constants::METRIC_LOG_BATCH_SIZE;
use crate::constants::METRIC_LOG_SIZE;
use crate::constants::METRIC_STORE_LOGS;
use crate::constants::METRIC_WRITE_CAPACITY;
use crate::convert::decode_index;
use crate::convert::encode_index;
use crate::convert::try_decode_index;
use crate::BincodeCodec;
use crate::Cursor;
use crate::EngineOptions;
use crate::Error;
use crate::LogEntry;
use crate::MetricsHook;
use crate::RaftLogStore;
use crate::RecordCodec;
use crate::Result;
use crate::StableStore;
use crate::StorageEngine;
use crate::StorageError;
use crate::Transaction;

/// Where and how to open a [`LogStore`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Database location: a directory for sled, a single file for redb
    pub path: PathBuf,

    pub engine: EngineOptions,
}

impl StoreOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            engine: EngineOptions::default(),
        }
    }
}

/// Durable log and stable store. Every operation runs in its own engine
/// transaction, so a handle can be shared between threads through an `Arc`.
pub struct LogStore<E: StorageEngine, C: RecordCodec = BincodeCodec> {
    engine: E,

    codec: C,

    metrics: Option<Arc<dyn MetricsHook>>,
}

impl<E: StorageEngine, C: RecordCodec> fmt::Debug for LogStore<E, C> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("LogStore")
            .field("engine", &E::NAME)
            .field("path", &self.engine.path())
            .field("read_only", &self.engine.is_read_only())
            .finish()
    }
}

impl<E: StorageEngine, C: RecordCodec + Default> LogStore<E, C> {
    /// Opens a read-write store at `path` with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(StoreOptions::new(path.as_ref()))
    }

    pub fn open_with_options(options: StoreOptions) -> Result<Self> {
        Self::open_with_codec(options, C::default())
    }
}

impl<E: StorageEngine, C: RecordCodec> LogStore<E, C> {
    pub fn open_with_codec(
        options: StoreOptions,
        codec: C,
    ) -> Result<Self> {
        let engine = E::open(&options.path, &options.engine).map_err(|e| match e {
            Error::Storage(StorageError::Open { .. }) | Error::Storage(StorageError::OpenTimeout { .. }) => e,
            e => StorageError::Open {
                path: options.path.clone(),
                source: Box::new(e),
            }
            .into(),
        })?;

        let store = Self {
            engine,
            codec,
            metrics: None,
        };

        if !options.engine.read_only {
            // On failure the handle is dropped, which closes the engine
            store.write(|txn| {
                for bucket in BUCKETS {
                    txn.create_bucket_if_not_exists(bucket)?;
                }
                Ok(())
            })?;
        }

        info!(
            "{} log store ready at {:?}, read_only={}",
            E::NAME,
            options.path,
            options.engine.read_only
        );
        Ok(store)
    }

    /// Attaches a hook that receives write-path measurements after every
    /// batch of logs is stored.
    pub fn with_metrics(
        mut self,
        metrics: Arc<dyn MetricsHook>,
    ) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Releases the database. Pending writes were committed already.
    pub fn close(self) {
        debug!("closing {} log store at {:?}", E::NAME, self.engine.path());
    }

    /// Flushes committed writes to stable storage; only needed with `no_sync`.
    pub fn sync(&self) -> Result<()> {
        self.engine.sync()
    }

    pub fn path(&self) -> &Path {
        self.engine.path()
    }

    pub fn is_read_only(&self) -> bool {
        self.engine.is_read_only()
    }

    /// Stored entries with an index in `range`, in index order. Missing
    /// indices are skipped.
    pub fn get_logs(
        &self,
        range: RangeInclusive<u64>,
    ) -> Result<Vec<LogEntry>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }

        let raw = self.read(|txn| {
            let mut values = Vec::new();
            let mut cursor = txn.cursor(LOGS_BUCKET)?;
            let mut item = cursor.seek(&encode_index(*range.start()))?;
            while let Some((key, value)) = item {
                if decode_index(&key) > *range.end() {
                    break;
                }
                values.push(value);
                item = cursor.next()?;
            }
            Ok(values)
        })?;

        raw.iter().map(|bytes| self.codec.decode(bytes)).collect()
    }

    pub(crate) fn engine(&self) -> &E {
        &self.engine
    }

    /// Runs `f` in a write transaction: commit on success, rollback on error.
    fn write<'s, T, F>(
        &'s self,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce(&E::Transaction<'s>) -> Result<T>,
    {
        let txn = self.engine.begin(true)?;
        match f(&txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                Self::abandon(txn);
                Err(e)
            }
        }
    }

    fn abandon(txn: E::Transaction<'_>) {
        if let Err(rollback_err) = txn.rollback() {
            error!(?rollback_err, "failed to roll back {} write transaction", E::NAME);
        }
    }

    /// Runs `f` in a read transaction, which is always rolled back.
    fn read<'s, T, F>(
        &'s self,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce(&E::Transaction<'s>) -> Result<T>,
    {
        let txn = self.engine.begin(false)?;
        let result = f(&txn);
        if let Err(e) = txn.rollback() {
            warn!(?e, "failed to release {} read transaction", E::NAME);
        }
        result
    }

    /// Encodes and stages `entries`, returning the encoded size of each.
    fn stage_logs(
        &self,
        txn: &E::Transaction<'_>,
        entries: &[LogEntry],
    ) -> Result<Vec<usize>> {
        let mut sizes = Vec::with_capacity(entries.len());
        for entry in entries {
            let value = self.codec.encode(entry)?;
            txn.put(LOGS_BUCKET, &encode_index(entry.index), &value)?;
            sizes.push(value.len());
        }
        Ok(sizes)
    }

    fn record_batch_sizes(
        &self,
        sizes: &[usize],
    ) {
        let Some(metrics) = &self.metrics else {
            return;
        };

        let batch_size: usize = sizes.iter().sum();
        for size in sizes {
            metrics.record(METRIC_LOG_SIZE, *size as f64);
        }
        metrics.record(METRIC_LOGS_PER_BATCH, sizes.len() as f64);
        metrics.record(METRIC_LOG_BATCH_SIZE, batch_size as f64);
    }

    /// Measured once the commit has returned, whatever its outcome.
    fn record_batch_timing(
        &self,
        count: usize,
        started: Instant,
    ) {
        let Some(metrics) = &self.metrics else {
            return;
        };

        let secs = started.elapsed().as_secs_f64();
        if secs > 0.0 {
            metrics.record(METRIC_WRITE_CAPACITY, count as f64 / secs);
        }
        metrics.record(METRIC_STORE_LOGS, secs * 1000.0);
    }
}

impl<E: StorageEngine, C: RecordCodec> RaftLogStore for LogStore<E, C> {
    fn first_index(&self) -> Result<u64> {
        self.read(|txn| {
            let mut cursor = txn.cursor(LOGS_BUCKET)?;
            Ok(cursor.first()?.map(|(key, _)| decode_index(&key)).unwrap_or(0))
        })
    }

    fn last_index(&self) -> Result<u64> {
        self.read(|txn| {
            let mut cursor = txn.cursor(LOGS_BUCKET)?;
            Ok(cursor.last()?.map(|(key, _)| decode_index(&key)).unwrap_or(0))
        })
    }

    fn get_log(
        &self,
        index: u64,
    ) -> Result<LogEntry> {
        let bytes = self
            .read(|txn| txn.get(LOGS_BUCKET, &encode_index(index)))?
            .ok_or(StorageError::LogNotFound(index))?;
        self.codec.decode(&bytes)
    }

    fn store_log(
        &self,
        entry: &LogEntry,
    ) -> Result<()> {
        self.store_logs(std::slice::from_ref(entry))
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    fn store_logs(
        &self,
        entries: &[LogEntry],
    ) -> Result<()> {
        let started = Instant::now();
        let txn = self.engine.begin(true)?;

        let sizes = match self.stage_logs(&txn, entries) {
            Ok(sizes) => sizes,
            Err(e) => {
                Self::abandon(txn);
                return Err(e);
            }
        };
        self.record_batch_sizes(&sizes);

        let committed = txn.commit();
        self.record_batch_timing(entries.len(), started);
        committed
    }

    #[instrument(skip(self))]
    fn delete_range(
        &self,
        min: u64,
        max: u64,
    ) -> Result<()> {
        if min > max {
            return Ok(());
        }

        let deleted = self.write(|txn| {
            let mut deleted = 0u64;
            let mut cursor = txn.cursor(LOGS_BUCKET)?;
            let mut item = cursor.seek(&encode_index(min))?;
            while let Some((key, _)) = item {
                if decode_index(&key) > max {
                    break;
                }
                txn.delete(LOGS_BUCKET, &key)?;
                deleted += 1;
                item = cursor.next()?;
            }
            Ok(deleted)
        })?;
        debug!("deleted {} log entries in [{}, {}]", deleted, min, max);
        Ok(())
    }
}

impl<E: StorageEngine, C: RecordCodec> StableStore for LogStore<E, C> {
    fn set(
        &self,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        self.write(|txn| txn.put(CONF_BUCKET, key, value))
    }

    fn get(
        &self,
        key: &[u8],
    ) -> Result<Vec<u8>> {
        self.read(|txn| txn.get(CONF_BUCKET, key))?
            .ok_or_else(|| StorageError::KeyNotFound.into())
    }

    fn set_uint64(
        &self,
        key: &[u8],
        value: u64,
    ) -> Result<()> {
        self.set(key, &encode_index(value))
    }

    fn get_uint64(
        &self,
        key: &[u8],
    ) -> Result<u64> {
        try_decode_index(self.get(key)?)
    }
}
