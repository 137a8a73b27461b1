pub mod convert;

pub(crate) mod file_io;

#[cfg(test)]
mod utils_test;
