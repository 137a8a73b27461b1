//! Current container backed by redb.

mod redb_engine;

pub use redb_engine::*;

#[cfg(test)]
mod redb_engine_test;
