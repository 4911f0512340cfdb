use std::collections::HashSet;

use crate::models::EpisodeRecord;

/// Fixed-capacity ring buffer. Never blocks: a full buffer hands the record
/// back to the caller, an empty one returns `None`.
#[derive(Debug)]
pub(crate) struct MemoryTier {
    slots: Vec<Option<EpisodeRecord>>,
    head: usize,
    len: usize,
    bytes: u64,
    ids: HashSet<String>,
}

impl MemoryTier {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            bytes: 0,
            ids: HashSet::with_capacity(capacity),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    pub(crate) fn bytes(&self) -> u64 {
        self.bytes
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub(crate) fn try_push(&mut self, record: EpisodeRecord) -> Result<(), EpisodeRecord> {
        if self.is_full() {
            return Err(record);
        }
        let tail = (self.head + self.len) % self.slots.len();
        self.bytes += record.size_bytes;
        self.ids.insert(record.id.clone());
        self.slots[tail] = Some(record);
        self.len += 1;
        Ok(())
    }

    pub(crate) fn peek(&self) -> Option<&EpisodeRecord> {
        if self.len == 0 {
            return None;
        }
        self.slots[self.head].as_ref()
    }

    pub(crate) fn try_pop(&mut self) -> Option<EpisodeRecord> {
        if self.len == 0 {
            return None;
        }
        let record = self.slots[self.head].take()?;
        self.head = (self.head + 1) % self.slots.len();
        self.len -= 1;
        self.bytes -= record.size_bytes;
        self.ids.remove(&record.id);
        Some(record)
    }

    /// Empties the buffer, returning how many records were dropped.
    pub(crate) fn clear(&mut self) -> usize {
        let dropped = self.len;
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
        self.bytes = 0;
        self.ids.clear();
        dropped
    }
}
