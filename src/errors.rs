//! Log Store Error Hierarchy
//!
//! Errors are grouped by the layer that raised them: the storage adapter and
//! its engines, the record codec, and the one-shot migration procedure.
//! Not-found conditions are ordinary, expected outcomes for the consensus
//! library and can be told apart with [`Error::is_log_not_found`] and
//! [`Error::is_key_not_found`].

use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error used where the failing layer is one of several engines.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Storage adapter and embedded engine failures
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Record encode/decode failures
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// Legacy-to-current container migration failures
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The engine could not lock, create or read the database at `path`
    #[error("Failed to open database at {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// Another handle kept the database locked for the whole open timeout
    #[error("Timed out after {timeout:?} waiting for the lock on {}", .path.display())]
    OpenTimeout { path: PathBuf, timeout: Duration },

    /// Requested log index is absent (e.g. already compacted)
    #[error("Log not found at index {0}")]
    LogNotFound(u64),

    /// Requested stable-store key is absent
    #[error("Key not found")]
    KeyNotFound,

    /// The named bucket was never created in this database
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    /// Write attempted through a read-only handle or transaction
    #[error("Database or transaction is read-only")]
    ReadOnly,

    /// Legacy engine errors
    #[error("Sled engine error: {0}")]
    Sled(#[from] sled::Error),

    /// Current engine errors
    #[error("Redb engine error: {0}")]
    Redb(#[from] redb::Error),

    /// Disk I/O failures outside the engines (e.g. removing a database)
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// Error type for value conversion operations
    #[error("Value convert failed")]
    Convert(#[from] ConvertError),
}

/// Error type for value conversion operations
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// Invalid input length error
    ///
    /// This occurs when the input byte slice length doesn't match the required 8 bytes.
    #[error("invalid byte length: expected 8 bytes, received {0} bytes")]
    InvalidLength(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    /// A log entry could not be turned into bytes
    #[error("Failed to encode log entry at index {index}: {source}")]
    Encode {
        index: u64,
        #[source]
        source: BoxError,
    },

    /// Stored bytes do not parse as a log entry; indicates on-disk corruption
    #[error("Corrupt log record: {0}")]
    CorruptRecord(#[source] BoxError),
}

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("File exists in destination {}", .0.display())]
    DestinationExists(PathBuf),

    #[error("Failed opening source database {}: {source}", .path.display())]
    SourceOpen {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("Failed creating destination database {}: {source}", .path.display())]
    DestinationCreate {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("Failed to copy {bucket} bucket: {source}")]
    CopyFailed {
        bucket: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Failed committing data to destination: {source}")]
    CommitFailed {
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// `true` when the error only says the requested log index is absent.
    pub fn is_log_not_found(&self) -> bool {
        matches!(self, Error::Storage(StorageError::LogNotFound(_)))
    }

    /// `true` when the error only says the requested stable-store key is absent.
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, Error::Storage(StorageError::KeyNotFound))
    }
}

// ============== Conversion Implementations ============== //

impl From<ConvertError> for Error {
    fn from(e: ConvertError) -> Self {
        Error::Storage(StorageError::Convert(e))
    }
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        StorageError::Sled(err).into()
    }
}

impl From<redb::Error> for Error {
    fn from(err: redb::Error) -> Self {
        StorageError::Redb(err).into()
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError(err).into()
    }
}

/// Engine-specific redb errors all funnel through `redb::Error`.
macro_rules! impl_from_redb {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Error {
                fn from(err: $ty) -> Self {
                    Error::from(redb::Error::from(err))
                }
            }
        )*
    };
}

impl_from_redb!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
