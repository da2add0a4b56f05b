mod enqueue;
mod migrate;
mod stats;
mod worker;

pub use enqueue::EnqueueCommand;
pub use migrate::MigrateCommand;
pub use stats::StatsCommand;
pub use worker::WorkerCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// courier - background task processing
#[derive(Parser)]
#[command(name = "courier")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path.
    #[arg(short, long, default_value = "courier.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the task processor until interrupted.
    Worker(WorkerCommand),

    /// Submit a task.
    Enqueue(EnqueueCommand),

    /// Show per-queue task counts.
    Stats(StatsCommand),

    /// Create the broker and account tables.
    Migrate(MigrateCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        let config = crate::app::load_config(&self.config)?;
        match self.command {
            Commands::Worker(cmd) => cmd.execute(config).await,
            Commands::Enqueue(cmd) => cmd.execute(config).await,
            Commands::Stats(cmd) => cmd.execute(config).await,
            Commands::Migrate(cmd) => cmd.execute(config).await,
        }
    }
}
