// Public fallible APIs in this crate share one concrete error contract (`KeystoneError`).
// Repeating per-function `# Errors` boilerplate obscures behavior more than it clarifies.
#![allow(
    clippy::missing_errors_doc,
    reason = "crate-wide fallible API uses one explicit error type; per-item boilerplate would duplicate contract"
)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod queue;
pub mod queue_policy;
pub mod store;

pub use config::QueueConfig;
pub use error::{ErrorPayload, KeystoneError, Result};
pub use metrics::QueueMetrics;
pub use models::{Episode, EpisodeRecord};
pub use queue::SyncQueue;
pub use queue_policy::RetryPolicy;
