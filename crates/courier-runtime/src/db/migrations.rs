//! Built-in schema.
//!
//! Every statement is idempotent (`IF NOT EXISTS`), so applying the full set
//! on each `migrate` run is safe.

use sqlx::PgPool;

use courier_core::error::{CourierError, Result};

const TASKS_SQL: &str = include_str!("../../migrations/0001_courier_tasks.sql");
const ACCOUNTS_SQL: &str = include_str!("../../migrations/0002_accounts.sql");

/// A named schema script.
#[derive(Debug, Clone)]
pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

/// Tables used by the PostgreSQL broker.
pub fn broker_migrations() -> Vec<Migration> {
    vec![Migration {
        name: "0001_courier_tasks",
        sql: TASKS_SQL,
    }]
}

/// Tables used by the PostgreSQL store.
pub fn store_migrations() -> Vec<Migration> {
    vec![Migration {
        name: "0002_accounts",
        sql: ACCOUNTS_SQL,
    }]
}

/// Broker tables first, then the account tables handlers use.
pub fn builtin_migrations() -> Vec<Migration> {
    let mut migrations = broker_migrations();
    migrations.extend(store_migrations());
    migrations
}

/// Apply migrations in order.
pub async fn run_migrations(pool: &PgPool, migrations: &[Migration]) -> Result<()> {
    for migration in migrations {
        sqlx::raw_sql(migration.sql)
            .execute(pool)
            .await
            .map_err(|e| {
                CourierError::Database(format!("Migration {} failed: {}", migration.name, e))
            })?;
        tracing::info!(migration = migration.name, "Applied migration");
    }
    Ok(())
}
