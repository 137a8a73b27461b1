//! Order-preserving conversions between log indices and 8-byte keys.

use crate::ConvertError;
use crate::Result;

/// Converts a `u64` to an 8-byte array in big-endian byte order.
///
/// Byte-lexicographic order of the output equals numeric order of the input,
/// which is what makes cursor order over the `logs` bucket index order.
///
/// # Examples
/// ```
/// use raft_logstore::convert::encode_index;
///
/// let bytes = encode_index(0x1234_5678_9ABC_DEF0);
/// assert_eq!(bytes, [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0]);
/// ```
pub const fn encode_index(index: u64) -> [u8; 8] {
    index.to_be_bytes()
}

/// Reads the index stored in the first 8 bytes of `bytes`.
///
/// # Panics
/// Panics when fewer than 8 bytes are given. Every key of the `logs` bucket
/// is produced by [`encode_index`], so a short key is an invariant violation.
pub fn decode_index(bytes: &[u8]) -> u64 {
    assert!(
        bytes.len() >= 8,
        "log index key must be at least 8 bytes, got {}",
        bytes.len()
    );
    let mut array = [0u8; 8];
    array.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(array)
}

/// Fallible variant of [`decode_index`] for caller-supplied bytes.
pub fn try_decode_index<K: AsRef<[u8]>>(bytes: K) -> Result<u64> {
    let bytes = bytes.as_ref();
    let array: [u8; 8] = bytes
        .try_into()
        .map_err(|_| ConvertError::InvalidLength(bytes.len()))?;
    Ok(u64::from_be_bytes(array))
}
