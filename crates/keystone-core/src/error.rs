use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, KeystoneError>;

#[derive(Debug, Error)]
pub enum KeystoneError {
    #[error("duplicate episode id: {0}")]
    DuplicateId(String),

    #[error("capacity exceeded: {requested} bytes requested, {used}/{limit} bytes in use")]
    CapacityExceeded { requested: u64, used: u64, limit: u64 },

    #[error("failed to persist episode {id}: {source}")]
    PersistenceFailure {
        id: String,
        #[source]
        source: Box<KeystoneError>,
    },

    #[error("queue is closed")]
    QueueClosed,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub operation: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_id: Option<String>,
}

impl ErrorPayload {
    /// Payload for failures raised outside the queue itself, such as bad
    /// command-line input.
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            operation: operation.into(),
            trace_id: Uuid::new_v4().to_string(),
            episode_id: None,
        }
    }
}

impl KeystoneError {
    pub(crate) fn mutex_poisoned(name: &str) -> Self {
        Self::Internal(format!("{name} mutex poisoned"))
    }

    pub(crate) fn persistence(id: &str, source: Self) -> Self {
        Self::PersistenceFailure {
            id: id.to_string(),
            source: Box::new(source),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateId(_) => "DUPLICATE_ID",
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::PersistenceFailure { .. } => "PERSISTENCE_FAILURE",
            Self::QueueClosed => "QUEUE_CLOSED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Sqlite(_) => "SQLITE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Load-shedding errors are safe to drop or retry later; everything else
    /// is a hard failure for the episode involved.
    pub fn is_backpressure(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }

    fn episode_id(&self) -> Option<String> {
        match self {
            Self::DuplicateId(id) | Self::PersistenceFailure { id, .. } => Some(id.clone()),
            _ => None,
        }
    }

    pub fn to_payload(&self, operation: impl Into<String>) -> ErrorPayload {
        ErrorPayload {
            episode_id: self.episode_id(),
            ..ErrorPayload::new(self.code(), self.to_string(), operation)
        }
    }
}
