use crate::error::{KeystoneError, Result};

/// Byte ceiling shared by both tiers. Callers hold the queue lock across
/// `check` and `admit` so two producers cannot both pass the check.
#[derive(Debug)]
pub(crate) struct CapacityPolicy {
    max_bytes: u64,
    used_bytes: u64,
}

impl CapacityPolicy {
    pub(crate) fn new(max_bytes: u64, used_bytes: u64) -> Self {
        Self {
            max_bytes,
            used_bytes,
        }
    }

    pub(crate) fn check(&self, size_bytes: u64) -> Result<()> {
        let fits = self
            .used_bytes
            .checked_add(size_bytes)
            .is_some_and(|total| total <= self.max_bytes);
        if fits {
            Ok(())
        } else {
            Err(KeystoneError::CapacityExceeded {
                requested: size_bytes,
                used: self.used_bytes,
                limit: self.max_bytes,
            })
        }
    }

    pub(crate) fn admit(&mut self, size_bytes: u64) {
        self.used_bytes = self.used_bytes.saturating_add(size_bytes);
    }

    pub(crate) fn release(&mut self, size_bytes: u64) {
        self.used_bytes = self.used_bytes.saturating_sub(size_bytes);
    }

    pub(crate) fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    pub(crate) fn max_bytes(&self) -> u64 {
        self.max_bytes
    }
}
