use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub memory_items: u64,
    pub memory_capacity: u64,
    pub disk_items: u64,
    pub total_items: u64,
    pub used_bytes: u64,
    pub max_bytes: u64,
    pub next_sequence: u64,
    pub dead_letters: u64,
    /// Parked payload bytes; not counted against `max_bytes`.
    pub dead_letter_bytes: u64,
    pub health: HealthStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RequeueOutcome {
    Requeued {
        sequence: u64,
        retry_count: u32,
        backoff_secs: u64,
    },
    DeadLettered {
        retry_count: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayedEpisode {
    pub id: String,
    pub sequence: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterReplay {
    pub replayed: Vec<ReplayedEpisode>,
    /// Dead letters left after the replay.
    pub remaining: u64,
    /// Id the queue refused, ending the replay early.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub pushed_memory: u64,
    pub spilled_disk: u64,
    pub popped: u64,
    pub rejected_capacity: u64,
    pub rejected_duplicate: u64,
    pub persistence_failures: u64,
    pub requeued: u64,
    pub dead_lettered: u64,
    pub uptime_secs: u64,
}
