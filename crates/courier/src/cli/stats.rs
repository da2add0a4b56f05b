use anyhow::Result;
use clap::Parser;
use console::style;
use courier_core::config::CourierConfig;
use courier_core::QueueStats;
use courier_runtime::broker;

/// Show per-queue task counts.
#[derive(Parser)]
pub struct StatsCommand {}

impl StatsCommand {
    pub async fn execute(self, config: CourierConfig) -> Result<()> {
        let broker = broker::connect(&config).await?;
        let stats = broker.stats().await?;
        broker.close().await;

        println!();
        if stats.is_empty() {
            println!("  {} No tasks", style("ℹ").blue());
            println!();
            return Ok(());
        }

        println!("{}", style(header()).bold());
        for queue in &stats {
            println!("{}", row(queue));
        }
        println!();
        Ok(())
    }
}

fn header() -> String {
    format!(
        "  {:<16} {:>8} {:>10} {:>8} {:>8} {:>8}",
        "QUEUE", "PENDING", "SCHEDULED", "RUNNING", "DONE", "DEAD"
    )
}

fn row(stats: &QueueStats) -> String {
    format!(
        "  {:<16} {:>8} {:>10} {:>8} {:>8} {:>8}",
        stats.queue, stats.pending, stats.scheduled, stats.running, stats.done, stats.dead
    )
}
