mod episode;
mod queue;

pub use episode::{DeadLetterRecord, Episode, EpisodeRecord, EpisodeSummary};
pub use queue::{
    DeadLetterReplay, HealthStatus, MetricsSnapshot, QueueStatus, ReplayedEpisode, RequeueOutcome,
};
