use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Admission input for [`SyncQueue::push_episode`](crate::queue::SyncQueue::push_episode).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub payload: Vec<u8>,
    #[serde(default)]
    pub retry_count: u32,
}

impl Episode {
    pub fn new(id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
            retry_count: 0,
        }
    }

    pub fn from_json(id: impl Into<String>, value: &impl Serialize) -> Result<Self> {
        Ok(Self::new(id, serde_json::to_vec(value)?))
    }
}

/// An admitted episode. `sequence` is the total delivery order across tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub id: String,
    pub payload: Vec<u8>,
    pub sequence: u64,
    pub size_bytes: u64,
    /// Unix milliseconds (UTC).
    pub enqueued_at: i64,
    pub retry_count: u32,
}

impl EpisodeRecord {
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    #[must_use]
    pub fn summary(&self) -> EpisodeSummary {
        EpisodeSummary {
            id: self.id.clone(),
            sequence: self.sequence,
            size_bytes: self.size_bytes,
            enqueued_at: self.enqueued_at,
            retry_count: self.retry_count,
            payload_utf8: std::str::from_utf8(&self.payload).ok().map(str::to_string),
        }
    }
}

impl From<EpisodeRecord> for Episode {
    fn from(record: EpisodeRecord) -> Self {
        Self {
            id: record.id,
            payload: record.payload,
            retry_count: record.retry_count,
        }
    }
}

/// Payload-light view of a record for operator output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub id: String,
    pub sequence: u64,
    pub size_bytes: u64,
    pub enqueued_at: i64,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_utf8: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    pub episode: EpisodeRecord,
    pub reason: String,
    /// Unix milliseconds (UTC).
    pub dead_lettered_at: i64,
}
