//! Runtime for courier: task distribution, the processor worker pool,
//! broker backends and the built-in handlers.

pub mod broker;
pub mod db;
pub mod handlers;
pub mod mail;
pub mod tasks;
pub mod testing;

pub use broker::{MemoryBroker, PgBroker};
pub use db::{Database, PgStore};
pub use mail::LogMailer;
pub use tasks::{
    DispatchTable, ErrorObserver, ExecutionResult, FailureKind, LogObserver, Processor,
    ProcessorConfig, ProcessorState, QueueSelector, QueueWeights, TaskDistributor, TaskExecutor,
    TaskFailure,
};
