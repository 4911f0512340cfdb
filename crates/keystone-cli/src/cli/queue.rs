use std::path::PathBuf;

use clap::{Args, Subcommand};

#[derive(Debug, Args)]
pub struct QueueArgs {
    #[command(subcommand)]
    pub command: QueueCommand,
}

#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    Status,
    Push {
        #[arg(long)]
        id: String,
        #[arg(long, allow_hyphen_values = true)]
        data: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        stdin: bool,
    },
    /// Removes episodes for good; output carries each payload as base64.
    Pop {
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    DeadLetters {
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Moves dead letters back onto the queue with a fresh retry budget.
    ReplayDeadLetters {
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    PurgeDeadLetters,
}
