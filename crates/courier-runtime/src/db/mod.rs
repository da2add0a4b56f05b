mod memory;
mod migrations;
mod pool;
mod store;

pub use migrations::{
    broker_migrations, builtin_migrations, run_migrations, store_migrations, Migration,
};
pub use memory::MemoryStore;
pub use pool::Database;
pub use store::PgStore;
