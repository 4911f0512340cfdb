/// Hands out strictly increasing sequence numbers starting after the highest
/// number the disk tier has seen.
#[derive(Debug)]
pub(crate) struct Sequencer {
    next: u64,
}

impl Sequencer {
    pub(crate) fn resume_after(last_issued: Option<u64>) -> Self {
        Self {
            next: last_issued.map_or(1, |last| last.saturating_add(1)),
        }
    }

    pub(crate) fn next(&mut self) -> u64 {
        let sequence = self.next;
        self.next = self.next.saturating_add(1);
        sequence
    }

    pub(crate) fn peek(&self) -> u64 {
        self.next
    }

    pub(crate) fn last_issued(&self) -> Option<u64> {
        self.next.checked_sub(1).filter(|last| *last > 0)
    }
}
