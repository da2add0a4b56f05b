use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use courier_core::config::{BrokerBackend, CourierConfig};
use courier_core::task::TaskOptions;
use courier_runtime::handlers::PayloadSendVerifyEmail;
use courier_runtime::{broker, TaskDistributor};

use crate::logging::init_tracing;

/// Submit a task.
#[derive(Parser)]
pub struct EnqueueCommand {
    #[command(subcommand)]
    pub task: EnqueueTask,
}

#[derive(Subcommand)]
pub enum EnqueueTask {
    /// Send a verification email to a user.
    VerifyEmail {
        /// Username to verify.
        username: String,

        /// Queue to place the task in.
        #[arg(long, default_value = "critical")]
        queue: String,

        /// Retries after the first attempt.
        #[arg(long, default_value_t = 10)]
        max_retry: u32,

        /// Delay before the first attempt, in seconds.
        #[arg(long, default_value_t = 10)]
        delay_secs: u64,
    },
}

impl EnqueueCommand {
    pub async fn execute(self, config: CourierConfig) -> Result<()> {
        init_tracing(&config)?;

        if config.broker.backend == BrokerBackend::Memory {
            println!(
                "  {} broker.backend is memory; the task is lost when this command exits",
                style("!").yellow()
            );
        }

        let distributor = TaskDistributor::new(broker::connect(&config).await?);

        match self.task {
            EnqueueTask::VerifyEmail {
                username,
                queue,
                max_retry,
                delay_secs,
            } => {
                let options = TaskOptions::default()
                    .with_queue(queue)
                    .with_max_retry(max_retry)
                    .with_process_in(Duration::from_secs(delay_secs));
                let info = distributor
                    .distribute_send_verify_email(&PayloadSendVerifyEmail { username }, options)
                    .await?;

                println!(
                    "  {} Enqueued {} id={} queue={} process_at={}",
                    style("✓").green(),
                    style(&info.task_type).bold(),
                    info.id,
                    info.queue,
                    info.process_at
                );
            }
        }

        Ok(())
    }
}
