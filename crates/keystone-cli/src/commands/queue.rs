use anyhow::Result;
use base64::{Engine, engine::general_purpose};
use keystone_core::SyncQueue;
use keystone_core::models::{EpisodeRecord, EpisodeSummary};
use serde::Serialize;

use crate::cli::QueueCommand;

use super::support::{print_json, read_payload};

pub(super) fn execute(queue: &SyncQueue, command: QueueCommand) -> Result<()> {
    match command {
        QueueCommand::Status => {
            print_json(&queue.status()?)?;
        }
        QueueCommand::Push {
            id,
            data,
            file,
            stdin,
        } => {
            let payload = read_payload(data, file, stdin)?;
            let sequence = queue.push(id.clone(), payload)?;
            print_json(&serde_json::json!({
                "id": id,
                "sequence": sequence,
            }))?;
        }
        QueueCommand::Pop { count } => {
            let popped = queue
                .pop_batch(count)?
                .iter()
                .map(PoppedEpisode::from_record)
                .collect::<Vec<_>>();
            print_json(&popped)?;
        }
        QueueCommand::DeadLetters { limit } => {
            let parked = queue
                .dead_letters(limit)?
                .into_iter()
                .map(|entry| {
                    serde_json::json!({
                        "episode": entry.episode.summary(),
                        "reason": entry.reason,
                        "dead_lettered_at": entry.dead_lettered_at,
                    })
                })
                .collect::<Vec<_>>();
            print_json(&parked)?;
        }
        QueueCommand::ReplayDeadLetters { limit } => {
            print_json(&queue.replay_dead_letters(limit)?)?;
        }
        QueueCommand::PurgeDeadLetters => {
            let purged = queue.purge_dead_letters()?;
            print_json(&serde_json::json!({ "purged": purged }))?;
        }
    }
    Ok(())
}

/// Popped episodes are gone from the queue, so the full payload is printed
/// alongside the summary.
#[derive(Debug, Serialize)]
pub(super) struct PoppedEpisode {
    #[serde(flatten)]
    summary: EpisodeSummary,
    payload_base64: String,
}

impl PoppedEpisode {
    pub(super) fn from_record(record: &EpisodeRecord) -> Self {
        Self {
            summary: record.summary(),
            payload_base64: general_purpose::STANDARD.encode(&record.payload),
        }
    }
}
