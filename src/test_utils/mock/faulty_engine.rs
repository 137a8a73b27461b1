//! redb engine wrapper that fails on demand, for exercising cleanup paths.
//!
//! Faults are armed per thread, so they only affect the test that armed them.

use std::cell::Cell;
use std::path::Path;

use crate::EngineOptions;
use crate::Error;
use crate::RedbCursor;
use crate::RedbEngine;
use crate::RedbTransaction;
use crate::Result;
use crate::StorageEngine;
use crate::Transaction;

thread_local! {
    static PUTS_BEFORE_FAILURE: Cell<Option<usize>> = const { Cell::new(None) };
    static FAIL_NEXT_COMMIT: Cell<bool> = const { Cell::new(false) };
}

/// The `n + 1`-th put from now on fails.
pub fn fail_puts_after(n: usize) {
    PUTS_BEFORE_FAILURE.with(|c| c.set(Some(n)));
}

/// The next commit of a transaction that stored anything fails after
/// discarding its writes.
pub fn fail_next_commit() {
    FAIL_NEXT_COMMIT.with(|c| c.set(true));
}

pub fn reset_faults() {
    PUTS_BEFORE_FAILURE.with(|c| c.set(None));
    FAIL_NEXT_COMMIT.with(|c| c.set(false));
}

pub struct FaultyEngine(RedbEngine);

impl StorageEngine for FaultyEngine {
    type Transaction<'a> = FaultyTransaction;

    const NAME: &'static str = "faulty-redb";

    fn open(
        path: &Path,
        options: &EngineOptions,
    ) -> Result<Self> {
        RedbEngine::open(path, options).map(FaultyEngine)
    }

    fn begin(
        &self,
        writable: bool,
    ) -> Result<FaultyTransaction> {
        Ok(FaultyTransaction {
            inner: self.0.begin(writable)?,
            puts: Cell::new(0),
        })
    }

    fn sync(&self) -> Result<()> {
        self.0.sync()
    }

    fn path(&self) -> &Path {
        self.0.path()
    }

    fn is_read_only(&self) -> bool {
        self.0.is_read_only()
    }
}

pub struct FaultyTransaction {
    inner: RedbTransaction,
    puts: Cell<usize>,
}

impl Transaction for FaultyTransaction {
    type Cursor<'c>
        = RedbCursor<'c>
    where
        Self: 'c;

    fn is_writable(&self) -> bool {
        self.inner.is_writable()
    }

    fn create_bucket_if_not_exists(
        &self,
        bucket: &str,
    ) -> Result<()> {
        self.inner.create_bucket_if_not_exists(bucket)
    }

    fn get(
        &self,
        bucket: &str,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        self.inner.get(bucket, key)
    }

    fn put(
        &self,
        bucket: &str,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        let armed = PUTS_BEFORE_FAILURE.with(|c| c.get());
        match armed {
            Some(0) => {
                PUTS_BEFORE_FAILURE.with(|c| c.set(None));
                return Err(Error::Fatal("injected put failure".to_string()));
            }
            Some(n) => PUTS_BEFORE_FAILURE.with(|c| c.set(Some(n - 1))),
            None => {}
        }
        self.inner.put(bucket, key, value)?;
        self.puts.set(self.puts.get() + 1);
        Ok(())
    }

    fn delete(
        &self,
        bucket: &str,
        key: &[u8],
    ) -> Result<()> {
        self.inner.delete(bucket, key)
    }

    fn cursor(
        &self,
        bucket: &str,
    ) -> Result<RedbCursor<'_>> {
        self.inner.cursor(bucket)
    }

    fn commit(self) -> Result<()> {
        if self.puts.get() > 0 && FAIL_NEXT_COMMIT.with(|c| c.replace(false)) {
            self.inner.rollback()?;
            return Err(Error::Fatal("injected commit failure".to_string()));
        }
        self.inner.commit()
    }

    fn rollback(self) -> Result<()> {
        self.inner.rollback()
    }
}
