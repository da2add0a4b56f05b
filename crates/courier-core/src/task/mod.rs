mod context;
mod error;
mod options;
mod record;
mod retry;
mod traits;

pub use context::TaskContext;
pub use error::TaskError;
pub use options::{Schedule, TaskOptions, DEFAULT_MAX_RETRY, DEFAULT_QUEUE};
pub use record::{EnqueueInfo, Task, TaskState};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use traits::{TaskHandler, TaskPayload};
