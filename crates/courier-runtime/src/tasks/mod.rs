mod distributor;
mod executor;
mod observer;
mod priority;
mod processor;
mod registry;

pub use distributor::TaskDistributor;
pub use executor::{ExecutionResult, TaskExecutor};
pub use observer::{ErrorObserver, FailureKind, LogObserver, TaskFailure};
pub use priority::{QueueSelector, QueueWeights};
pub use processor::{Processor, ProcessorConfig, ProcessorState};
pub use registry::DispatchTable;
