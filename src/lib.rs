//! Durable Raft log and stable store over embedded ordered key-value engines.
//!
//! A [`LogStore`] keeps replicated log entries in a `"logs"` bucket keyed by
//! their big-endian index and consensus metadata in a `"conf"` bucket. It runs
//! over either engine implementing [`StorageEngine`]: [`SledEngine`] (the
//! legacy container) or [`RedbEngine`] (the current one). [`migrate_to_redb`]
//! copies a legacy database into a new current-format one.
//!
//! ```no_run
//! use raft_logstore::LogEntry;
//! use raft_logstore::LogStore;
//! use raft_logstore::RaftLogStore;
//! use raft_logstore::RedbEngine;
//! use raft_logstore::StableStore;
//!
//! let store = LogStore::<RedbEngine>::open("/var/lib/raft/logs.redb")?;
//! store.store_log(&LogEntry::new(1, 1, "set x=1"))?;
//! store.set_uint64(b"CurrentTerm", 1)?;
//! assert_eq!(store.last_index()?, 1);
//! # Ok::<(), raft_logstore::Error>(())
//! ```

mod config;
mod constants;
mod errors;
mod metrics;
mod storage;
pub mod utils;

pub use config::*;
pub use constants::*;
pub use errors::*;
pub use metrics::*;
pub use storage::*;
pub use utils::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
