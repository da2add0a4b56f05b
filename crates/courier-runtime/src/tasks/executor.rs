use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use courier_core::broker::{Broker, BrokerError};
use courier_core::task::{RetryPolicy, Task, TaskContext, TaskError};
use futures::FutureExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::observer::{ErrorObserver, FailureKind, TaskFailure};
use super::registry::DispatchTable;

/// Time a cancelled handler gets to return before its task is requeued.
const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(1);

/// Runs one leased task and records the outcome with the broker.
pub struct TaskExecutor {
    broker: Arc<dyn Broker>,
    table: Arc<DispatchTable>,
    retry_policy: RetryPolicy,
    default_timeout: Duration,
    cancel_grace: Duration,
    observer: Arc<dyn ErrorObserver>,
}

impl TaskExecutor {
    pub fn new(
        broker: Arc<dyn Broker>,
        table: Arc<DispatchTable>,
        retry_policy: RetryPolicy,
        default_timeout: Duration,
        observer: Arc<dyn ErrorObserver>,
    ) -> Self {
        Self {
            broker,
            table,
            retry_policy,
            default_timeout,
            cancel_grace: DEFAULT_CANCEL_GRACE,
            observer,
        }
    }

    /// Set how long a cancelled handler may keep running.
    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    /// Execute a leased task.
    ///
    /// `abort` is the processor's hard-stop signal. The handler's context is
    /// cancelled with it and the handler gets `cancel_grace` to return. Unless
    /// it returns success in that window, the lease is handed back without
    /// counting an attempt.
    pub async fn execute(&self, task: &Task, abort: &CancellationToken) -> ExecutionResult {
        let handler = match self.table.get(&task.task_type) {
            Some(h) => h,
            None => {
                let error = format!("no handler registered for task type '{}'", task.task_type);
                return self.dead(task, error, FailureKind::Unroutable).await;
            }
        };

        let now = Utc::now();
        let deadline = self.deadline_for(task, now);
        let remaining = match (deadline - now).to_std() {
            Ok(d) if !d.is_zero() => d,
            _ => {
                let error = format!("deadline exceeded at {}", deadline);
                return self.failed(task, error).await;
            }
        };

        let ctx = TaskContext::new(task, deadline, abort.child_token());

        tracing::debug!(
            task_id = %task.id,
            task_type = %task.task_type,
            queue = %task.queue,
            retried = task.retried,
            "Running task"
        );

        let run = timeout(
            remaining,
            AssertUnwindSafe(handler.handle(&ctx, task)).catch_unwind(),
        );
        let mut run = std::pin::pin!(run);

        let outcome = tokio::select! {
            biased;
            result = &mut run => Some(result),
            _ = abort.cancelled() => None,
        };

        // `ctx` shares `abort`, so the handler has been told to stop.
        let outcome = match outcome {
            Some(result) => Some(result),
            None => match timeout(self.cancel_grace, &mut run).await {
                Ok(Ok(Ok(Ok(())))) => Some(Ok(Ok(Ok(())))),
                Ok(_) => None,
                Err(_) => {
                    tracing::warn!(
                        task_id = %task.id,
                        task_type = %task.task_type,
                        grace = ?self.cancel_grace,
                        "Handler ignored cancellation"
                    );
                    None
                }
            },
        };

        match outcome {
            None => self.requeue(task).await,
            Some(Ok(Ok(Ok(())))) => self.completed(task).await,
            Some(Ok(Ok(Err(e)))) => match e {
                TaskError::SkipRetry(_) => {
                    self.dead(task, e.to_string(), FailureKind::Terminal).await
                }
                TaskError::Retry(_) => self.failed(task, e.to_string()).await,
            },
            Some(Ok(Err(panic))) => {
                let error = format!("handler panicked: {}", panic_message(panic.as_ref()));
                self.failed(task, error).await
            }
            Some(Err(_)) => {
                let error = format!("task timed out after {:?}", remaining);
                self.failed(task, error).await
            }
        }
    }

    /// Earliest of `now + timeout` and the task's own deadline.
    fn deadline_for(&self, task: &Task, now: DateTime<Utc>) -> DateTime<Utc> {
        let timeout = task.timeout.unwrap_or(self.default_timeout);
        let timeout =
            chrono::Duration::from_std(timeout).unwrap_or_else(|_| chrono::Duration::days(365));
        let by_timeout = now
            .checked_add_signed(timeout)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        match task.deadline {
            Some(deadline) if deadline < by_timeout => deadline,
            _ => by_timeout,
        }
    }

    async fn completed(&self, task: &Task) -> ExecutionResult {
        if let Err(e) = self.broker.complete(task).await {
            log_ack_error(task, "complete", &e);
        }
        tracing::info!(
            task_id = %task.id,
            task_type = %task.task_type,
            queue = %task.queue,
            "Task completed"
        );
        ExecutionResult::Completed
    }

    /// A retryable failure: retry while the budget lasts, otherwise dead.
    async fn failed(&self, task: &Task, error: String) -> ExecutionResult {
        if !task.can_retry() {
            return self.dead(task, error, FailureKind::RetriesExhausted).await;
        }

        let delay = self.retry_policy.backoff_for(task.retried + 1);
        if let Err(e) = self.broker.retry(task, &error, delay).await {
            log_ack_error(task, "retry", &e);
        }
        tracing::warn!(
            task_id = %task.id,
            task_type = %task.task_type,
            queue = %task.queue,
            retried = task.retried + 1,
            max_retry = task.max_retry,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Task failed, retrying"
        );
        ExecutionResult::Retrying { error, delay }
    }

    async fn dead(&self, task: &Task, error: String, kind: FailureKind) -> ExecutionResult {
        if let Err(e) = self.broker.kill(task, &error).await {
            log_ack_error(task, "kill", &e);
        }
        self.observer.on_failure(&TaskFailure {
            task,
            error: &error,
            kind,
        });
        ExecutionResult::Dead { error, kind }
    }

    async fn requeue(&self, task: &Task) -> ExecutionResult {
        if let Err(e) = self.broker.requeue(task).await {
            log_ack_error(task, "requeue", &e);
        }
        tracing::warn!(
            task_id = %task.id,
            task_type = %task.task_type,
            "Task aborted by shutdown, returned to queue"
        );
        ExecutionResult::Requeued
    }
}

/// Outcome of one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Handler succeeded and the task is done.
    Completed,
    /// Task is pending again after `delay`.
    Retrying { error: String, delay: Duration },
    /// Task will not run again.
    Dead { error: String, kind: FailureKind },
    /// Shutdown interrupted the handler; the task is pending with no attempt counted.
    Requeued,
}

impl ExecutionResult {
    /// Check if execution was successful.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Check if the task will be retried.
    pub fn should_retry(&self) -> bool {
        matches!(self, Self::Retrying { .. })
    }
}

fn log_ack_error(task: &Task, action: &str, error: &BrokerError) {
    tracing::error!(
        task_id = %task.id,
        task_type = %task.task_type,
        action,
        error = %error,
        "Failed to record task outcome"
    );
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
