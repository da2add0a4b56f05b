use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use console::style;
use courier_core::config::CourierConfig;
use courier_runtime::handlers::register_builtin;
use courier_runtime::{broker, DispatchTable, LogMailer, Processor, ProcessorConfig};

use crate::app;
use crate::logging::init_tracing;

/// Run the task processor.
#[derive(Parser)]
pub struct WorkerCommand {
    /// Maximum concurrent handlers (overrides config).
    #[arg(long)]
    pub concurrency: Option<usize>,
}

impl WorkerCommand {
    pub async fn execute(self, mut config: CourierConfig) -> Result<()> {
        if let Some(concurrency) = self.concurrency {
            config.processor.concurrency = concurrency;
        }
        init_tracing(&config)?;

        println!();
        println!(
            "  {} v{}  {} worker",
            style("courier").bold().cyan(),
            env!("CARGO_PKG_VERSION"),
            style(&config.app.name).dim()
        );
        println!();

        let broker = broker::connect(&config).await?;
        let store = app::connect_store(&config).await?;
        let mailer = Arc::new(LogMailer::from_config(&config.mail));

        let mut table = DispatchTable::new();
        register_builtin(&mut table, store, mailer, &config.mail)?;

        let processor = Arc::new(Processor::new(
            ProcessorConfig::from_config(&config),
            broker,
            table,
        )?);

        let mut runner = tokio::spawn({
            let processor = processor.clone();
            async move { processor.start().await }
        });

        tokio::select! {
            finished = &mut runner => {
                // start only returns on its own when it could not start.
                finished??;
                return Ok(());
            }
            _ = app::shutdown_signal() => {}
        }

        tracing::info!("Starting graceful shutdown");
        processor.shutdown().await;
        runner.await??;

        println!("\n  {} Stopped", style("✓").green());
        Ok(())
    }
}
