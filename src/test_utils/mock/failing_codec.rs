use crate::BincodeCodec;
use crate::LogEntry;
use crate::RecordCodec;
use crate::Result;
use crate::SerializationError;

/// Bincode codec that refuses to encode the entry at one index.
#[derive(Debug, Clone, Copy)]
pub struct FailingCodec {
    pub fail_at: u64,
}

impl RecordCodec for FailingCodec {
    fn encode(
        &self,
        entry: &LogEntry,
    ) -> Result<Vec<u8>> {
        if entry.index == self.fail_at {
            return Err(SerializationError::Encode {
                index: entry.index,
                source: "injected encode failure".into(),
            }
            .into());
        }
        BincodeCodec.encode(entry)
    }

    fn decode(
        &self,
        bytes: &[u8],
    ) -> Result<LogEntry> {
        BincodeCodec.decode(bytes)
    }
}
