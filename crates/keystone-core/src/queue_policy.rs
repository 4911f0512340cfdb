use serde::{Deserialize, Serialize};

use crate::error::{KeystoneError, Result};

/// Uploader-side retry budget applied by [`SyncQueue::requeue`](crate::queue::SyncQueue::requeue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Requeues allowed before an episode is dead-lettered.
    pub max_retries: u32,
    pub base_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_backoff_secs: 1,
            max_backoff_secs: 300,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.base_backoff_secs == 0 {
            return Err(KeystoneError::Validation(
                "base_backoff_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_backoff_secs < self.base_backoff_secs {
            return Err(KeystoneError::Validation(format!(
                "max_backoff_secs ({}) cannot be below base_backoff_secs ({})",
                self.max_backoff_secs, self.base_backoff_secs
            )));
        }
        Ok(())
    }

    /// `attempt` is the retry count the episode would carry after requeueing.
    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }

    /// Exponential backoff capped at `max_backoff_secs`, with jitter derived
    /// from the episode id so repeated calls agree.
    #[must_use]
    pub fn backoff_seconds(&self, attempt: u32, episode_id: &str) -> u64 {
        let capped_exp = attempt.saturating_sub(1).min(16);
        let baseline = self
            .base_backoff_secs
            .saturating_mul(1_u64 << capped_exp)
            .min(self.max_backoff_secs);
        let jitter_bound = (baseline / 4).max(1);
        let jitter_seed = format!("{episode_id}:{attempt}");
        let hash = blake3::hash(jitter_seed.as_bytes());
        let bytes = hash.as_bytes();
        let rand = u64::from(u16::from_be_bytes([bytes[0], bytes[1]]));
        let jitter = rand % (jitter_bound + 1);
        (baseline + jitter).min(self.max_backoff_secs)
    }
}
