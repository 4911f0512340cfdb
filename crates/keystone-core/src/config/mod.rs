use std::path::PathBuf;

use crate::error::{KeystoneError, Result};
use crate::queue_policy::RetryPolicy;

mod env;

const ENV_DB_PATH: &str = "KEYSTONE_QUEUE_DB_PATH";
const ENV_MEMORY_SIZE: &str = "KEYSTONE_QUEUE_MEMORY_SIZE";
const ENV_BATCH_SIZE: &str = "KEYSTONE_SYNC_BATCH_SIZE";
const ENV_MAX_BYTES: &str = "KEYSTONE_SYNC_MAX_BYTES";
const ENV_MAX_RETRIES: &str = "KEYSTONE_SYNC_MAX_RETRIES";
const ENV_BACKOFF_MAX_SECS: &str = "KEYSTONE_SYNC_BACKOFF_MAX_SECS";
const ENV_DEGRADED_RATIO: &str = "KEYSTONE_QUEUE_DEGRADED_RATIO";

pub const DEFAULT_DB_PATH: &str = "/var/lib/keystone/sync-queue.db";
pub const DEFAULT_MEMORY_CAPACITY: usize = 1000;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024 * 1024;
pub const DEFAULT_DEGRADED_RATIO: f64 = 0.9;

/// Settings for one [`SyncQueue`](crate::queue::SyncQueue) instance.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    pub db_path: PathBuf,
    /// Memory tier slots. Zero sends every admission straight to disk.
    pub memory_capacity: usize,
    pub batch_size: usize,
    /// Aggregate payload ceiling across both tiers.
    pub max_bytes: u64,
    /// Fraction of `max_bytes` at which status reports degraded health.
    pub degraded_ratio: f64,
    pub retry: RetryPolicy,
}

impl QueueConfig {
    #[must_use]
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_memory_capacity(mut self, memory_capacity: usize) -> Self {
        self.memory_capacity = memory_capacity;
        self
    }

    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn from_env() -> Result<Self> {
        let defaults = RetryPolicy::default();
        let config = Self {
            db_path: env::read_env_path(ENV_DB_PATH, DEFAULT_DB_PATH),
            memory_capacity: env::read_env_usize(ENV_MEMORY_SIZE, DEFAULT_MEMORY_CAPACITY, 0),
            batch_size: env::read_env_usize(ENV_BATCH_SIZE, DEFAULT_BATCH_SIZE, 1),
            max_bytes: env::read_env_u64(ENV_MAX_BYTES, DEFAULT_MAX_BYTES, 1),
            degraded_ratio: env::read_env_f64(ENV_DEGRADED_RATIO, DEFAULT_DEGRADED_RATIO),
            retry: RetryPolicy {
                max_retries: env::read_env_u32(ENV_MAX_RETRIES, defaults.max_retries),
                max_backoff_secs: env::read_env_u64(
                    ENV_BACKOFF_MAX_SECS,
                    defaults.max_backoff_secs,
                    1,
                ),
                ..defaults
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.db_path.as_os_str().is_empty() {
            return Err(KeystoneError::Validation(
                "queue db path must not be empty".to_string(),
            ));
        }
        if self.max_bytes == 0 {
            return Err(KeystoneError::Validation(
                "max_bytes must be greater than zero".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(KeystoneError::Validation(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if !(self.degraded_ratio > 0.0 && self.degraded_ratio <= 1.0) {
            return Err(KeystoneError::Validation(format!(
                "degraded_ratio must be within (0, 1], got {}",
                self.degraded_ratio
            )));
        }
        self.retry.validate()
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            max_bytes: DEFAULT_MAX_BYTES,
            degraded_ratio: DEFAULT_DEGRADED_RATIO,
            retry: RetryPolicy::default(),
        }
    }
}
