use std::path::Path;

use anyhow::{Context, Result};
use keystone_core::{QueueConfig, SyncQueue};
use tracing::warn;

use crate::cli::{Commands, QueueCommand};

mod queue;
mod support;


pub(crate) fn run(db: Option<&Path>, command: Commands) -> Result<()> {
    match command {
        Commands::Queue(args) => run_queue(db, args.command),
    }
}

fn run_queue(db: Option<&Path>, command: QueueCommand) -> Result<()> {
    let config = resolve_config(db, &command)?;
    let queue = SyncQueue::open(&config).with_context(|| {
        format!("failed to open sync queue at {}", config.db_path.display())
    })?;

    let outcome = queue::execute(&queue, command);
    if let Err(err) = queue.close() {
        if outcome.is_ok() {
            return Err(err).context("failed to close sync queue");
        }
        warn!(error = %err, "failed to close sync queue after command error");
    }
    outcome
}

fn resolve_config(db: Option<&Path>, command: &QueueCommand) -> Result<QueueConfig> {
    let mut config = QueueConfig::from_env().context("invalid queue configuration")?;
    if let Some(db) = db {
        config.db_path = db.to_path_buf();
    }
    // A one-shot process has nothing to hold in memory past exit.
    if matches!(command, QueueCommand::Push { .. }) {
        config.memory_capacity = 0;
    }
    Ok(config)
}
