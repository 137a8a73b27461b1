//! Stable key-value storage for consensus metadata, e.g. current term and vote.

use crate::Result;

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
pub trait StableStore: Send + Sync + 'static {
    fn set(
        &self,
        key: &[u8],
        value: &[u8],
    ) -> Result<()>;

    /// Fails with `KeyNotFound` when `key` was never set.
    fn get(
        &self,
        key: &[u8],
    ) -> Result<Vec<u8>>;

    fn set_uint64(
        &self,
        key: &[u8],
        value: u64,
    ) -> Result<()>;

    fn get_uint64(
        &self,
        key: &[u8],
    ) -> Result<u64>;
}
