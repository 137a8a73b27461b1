//! the test_utils folder here will share utils or test components between unit
//! tests
mod common;
mod entry_builder;
mod mock;

pub use common::*;
pub use entry_builder::*;
pub use mock::*;
