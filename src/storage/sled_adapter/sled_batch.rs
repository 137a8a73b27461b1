use std::collections::BTreeMap;
use std::ops::Bound;

use sled::Batch;

/// Writes staged by an uncommitted sled transaction for one tree.
///
/// `None` marks a deletion. Kept ordered so cursors can merge the staged
/// writes over the committed tree contents.
#[derive(Debug, Default, Clone)]
pub(crate) struct PendingBatch {
    pub(crate) writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl PendingBatch {
    /// Set a key to a new value
    pub(crate) fn insert(
        &mut self,
        key: &[u8],
        value: &[u8],
    ) {
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
    }

    /// Remove a key
    pub(crate) fn remove(
        &mut self,
        key: &[u8],
    ) {
        self.writes.insert(key.to_vec(), None);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// `Some(None)` when the key is staged for deletion, `None` when the
    /// batch does not touch it.
    pub(crate) fn get(
        &self,
        key: &[u8],
    ) -> Option<Option<&[u8]>> {
        self.writes.get(key).map(|v| v.as_deref())
    }

    /// Smallest staged key satisfying `lower`.
    pub(crate) fn next_from(
        &self,
        lower: Bound<&[u8]>,
    ) -> Option<(&[u8], Option<&[u8]>)> {
        self.writes
            .range::<[u8], _>((lower, Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.as_slice(), v.as_deref()))
    }

    /// Largest staged key satisfying `upper`.
    pub(crate) fn prev_from(
        &self,
        upper: Bound<&[u8]>,
    ) -> Option<(&[u8], Option<&[u8]>)> {
        self.writes
            .range::<[u8], _>((Bound::Unbounded, upper))
            .next_back()
            .map(|(k, v)| (k.as_slice(), v.as_deref()))
    }

    pub(crate) fn to_sled_batch(&self) -> Batch {
        let mut batch = Batch::default();
        for (key, value) in &self.writes {
            match value {
                Some(value) => batch.insert(key.as_slice(), value.as_slice()),
                None => batch.remove(key.as_slice()),
            }
        }
        batch
    }
}
