use crate::LogEntry;
use crate::LogType;

pub struct EntryBuilder {
    index: u64,
    term: u64,
}

impl EntryBuilder {
    pub fn new(
        start_index: u64,
        term: u64,
    ) -> Self {
        Self {
            index: start_index,
            term,
        }
    }

    pub fn command(
        mut self,
        data: &[u8],
    ) -> (Self, LogEntry) {
        let entry = LogEntry::new(self.index, self.term, data);
        self.index += 1;
        (self, entry)
    }

    pub fn config(
        mut self,
        membership: &[u8],
    ) -> (Self, LogEntry) {
        let entry = LogEntry {
            entry_type: LogType::Configuration,
            ..LogEntry::new(self.index, self.term, membership)
        };
        self.index += 1;
        (self, entry)
    }

    pub fn noop(mut self) -> (Self, LogEntry) {
        let entry = LogEntry {
            entry_type: LogType::Noop,
            ..LogEntry::new(self.index, self.term, Vec::new())
        };
        self.index += 1;
        (self, entry)
    }
}

/// Command entries `log{i}` for every index in `range`, all in `term`.
pub fn command_entries(
    range: std::ops::RangeInclusive<u64>,
    term: u64,
) -> Vec<LogEntry> {
    range.map(|i| LogEntry::new(i, term, format!("log{i}"))).collect()
}
