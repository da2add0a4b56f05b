use anyhow::Result;
use clap::Parser;
use console::style;
use courier_core::config::CourierConfig;
use courier_runtime::db::{broker_migrations, run_migrations, store_migrations};
use courier_runtime::Database;

use crate::logging::init_tracing;

/// Create the broker and account tables.
#[derive(Parser)]
pub struct MigrateCommand {}

impl MigrateCommand {
    pub async fn execute(self, config: CourierConfig) -> Result<()> {
        init_tracing(&config)?;

        let broker_url = config.broker.url_or(&config.database).to_string();
        if broker_url.trim().is_empty() {
            anyhow::bail!("database.url (or broker.url) must be set to run migrations");
        }

        println!();
        println!("  {} Migrations", style("courier").bold().cyan());
        println!();

        let broker_db = Database::connect(
            &broker_url,
            config.broker.pool_size,
            config.database.pool_timeout_secs,
        )
        .await?;
        run_migrations(broker_db.pool(), &broker_migrations()).await?;
        println!("  {} Broker tables ready", style("✓").green());

        if config.database.is_configured() {
            let store_db = Database::from_config(&config.database).await?;
            run_migrations(store_db.pool(), &store_migrations()).await?;
            println!("  {} Account tables ready", style("✓").green());
            store_db.close().await;
        }

        broker_db.close().await;
        println!();
        Ok(())
    }
}
