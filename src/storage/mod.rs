//! Storage adapter: engine abstraction, the two engines, the log store built
//! on top of them, and the legacy-to-current migration.

mod engine;
mod log_store;
mod migrate;
mod raft_log;
mod record;
mod redb_adapter;
mod sled_adapter;
mod stable_store;

pub use engine::*;
pub use log_store::*;
pub use migrate::*;
pub use raft_log::*;
pub use record::*;
pub use redb_adapter::*;
pub use sled_adapter::*;
pub use stable_store::*;
