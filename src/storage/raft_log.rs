//! Log storage contract consumed by the consensus library.

use crate::LogEntry;
use crate::Result;

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
pub trait RaftLogStore: Send + Sync + 'static {
    /// Smallest stored index, 0 when the log is empty.
    fn first_index(&self) -> Result<u64>;

    /// Largest stored index, 0 when the log is empty.
    fn last_index(&self) -> Result<u64>;

    /// Fails with `LogNotFound` when nothing is stored at `index`.
    fn get_log(
        &self,
        index: u64,
    ) -> Result<LogEntry>;

    fn store_log(
        &self,
        entry: &LogEntry,
    ) -> Result<()>;

    /// Stores all entries atomically: either every entry is persisted or none.
    fn store_logs(
        &self,
        entries: &[LogEntry],
    ) -> Result<()>;

    /// Deletes every entry with `min <= index <= max`.
    fn delete_range(
        &self,
        min: u64,
        max: u64,
    ) -> Result<()>;
}
