//! Legacy container backed by sled.

mod sled_batch;
mod sled_engine;

pub use sled_engine::*;
