use futures::future::BoxFuture;
use serde::{de::DeserializeOwned, Serialize};

use super::context::TaskContext;
use super::error::TaskError;
use super::record::Task;

/// Business logic bound to one task type.
pub trait TaskHandler: Send + Sync + 'static {
    /// Process one attempt of `task`.
    fn handle<'a>(
        &'a self,
        ctx: &'a TaskContext,
        task: &'a Task,
    ) -> BoxFuture<'a, Result<(), TaskError>>;
}

/// A payload type bound to the task type tag that carries it.
pub trait TaskPayload: Serialize + DeserializeOwned + Send + Sync {
    /// Type tag, e.g. `task:send_verify_email`.
    const TASK_TYPE: &'static str;
}
