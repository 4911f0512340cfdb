use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod queue;


pub use queue::{QueueArgs, QueueCommand};

#[derive(Debug, Parser)]
#[command(name = "keystone")]
#[command(about = "Keystone edge episode sync queue", version)]
pub struct Cli {
    /// Queue database; overrides `KEYSTONE_QUEUE_DB_PATH`.
    #[arg(long)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Queue(QueueArgs),
}

impl Commands {
    /// Stable label used as `operation` in error payloads.
    pub fn operation_name(&self) -> &'static str {
        match self {
            Self::Queue(args) => match args.command {
                QueueCommand::Status => "queue.status",
                QueueCommand::Push { .. } => "queue.push",
                QueueCommand::Pop { .. } => "queue.pop",
                QueueCommand::DeadLetters { .. } => "queue.dead_letters",
                QueueCommand::ReplayDeadLetters { .. } => "queue.replay_dead_letters",
                QueueCommand::PurgeDeadLetters => "queue.purge_dead_letters",
            },
        }
    }
}
