//! Log entry record and the pluggable codec that turns it into stored bytes.

use std::time::SystemTime;

use serde::Deserialize;
use serde::Serialize;

use crate::Result;
use crate::SerializationError;

#[cfg(test)]
use mockall::automock;

/// Kind of a replicated log entry; opaque to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogType {
    /// Application command applied to the state machine
    #[default]
    Command,
    /// Leader's no-op issued on election
    Noop,
    /// Barrier used to confirm all preceding entries are applied
    Barrier,
    /// Cluster membership change
    Configuration,
}

/// One replicated log entry, stored under `encode_index(index)` in `"logs"`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogEntry {
    pub index: u64,
    pub term: u64,
    pub entry_type: LogType,
    pub data: Vec<u8>,
    pub extensions: Vec<u8>,
    /// When the leader appended the entry, if it recorded it
    pub appended_at: Option<SystemTime>,
}

impl LogEntry {
    pub fn new(
        index: u64,
        term: u64,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            index,
            term,
            data: data.into(),
            ..Default::default()
        }
    }
}

/// Converts log entries to and from their stored representation.
#[cfg_attr(test, automock)]
pub trait RecordCodec: Send + Sync + 'static {
    fn encode(
        &self,
        entry: &LogEntry,
    ) -> Result<Vec<u8>>;

    fn decode(
        &self,
        bytes: &[u8],
    ) -> Result<LogEntry>;
}

/// Default codec: bincode over the serde representation of [`LogEntry`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl RecordCodec for BincodeCodec {
    fn encode(
        &self,
        entry: &LogEntry,
    ) -> Result<Vec<u8>> {
        bincode::serialize(entry).map_err(|e| {
            SerializationError::Encode {
                index: entry.index,
                source: e,
            }
            .into()
        })
    }

    fn decode(
        &self,
        bytes: &[u8],
    ) -> Result<LogEntry> {
        bincode::deserialize(bytes).map_err(|e| SerializationError::CorruptRecord(e).into())
    }
}
