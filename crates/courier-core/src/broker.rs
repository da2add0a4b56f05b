//! Contract with the external message broker.
//!
//! The broker is the only place task state lives. Distributors submit through
//! it, processors lease from it, and every state transition a processor decides
//! on is recorded back into it.

use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;
use uuid::Uuid;

use crate::task::{EnqueueInfo, Task};

/// Broker failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Broker closed")]
    Closed,

    #[error("Broker error: {0}")]
    Internal(String),
}

/// Per-queue task counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub queue: String,
    /// Ready to run now.
    pub pending: u64,
    /// Pending but not yet due.
    pub scheduled: u64,
    pub running: u64,
    pub done: u64,
    pub dead: u64,
}

/// Message queue service holding tasks across process boundaries.
pub trait Broker: Send + Sync + 'static {
    /// Check connectivity.
    fn ping(&self) -> BoxFuture<'_, Result<(), BrokerError>>;

    /// Accept a task. It becomes visible at its `process_at`.
    fn enqueue(&self, task: Task) -> BoxFuture<'_, Result<EnqueueInfo, BrokerError>>;

    /// Lease the next due task, trying `queues` in the given order.
    ///
    /// Returns `None` when no queue has a due task.
    fn dequeue<'a>(&'a self, queues: &'a [String])
        -> BoxFuture<'a, Result<Option<Task>, BrokerError>>;

    /// Suspend until a task may be ready or `max_wait` elapses.
    fn wait_for_ready(&self, max_wait: Duration) -> BoxFuture<'_, ()> {
        Box::pin(tokio::time::sleep(max_wait))
    }

    /// Mark a leased task as done.
    fn complete<'a>(&'a self, task: &'a Task) -> BoxFuture<'a, Result<(), BrokerError>>;

    /// Put a leased task back as pending after `delay`, counting one retry.
    fn retry<'a>(
        &'a self,
        task: &'a Task,
        error: &'a str,
        delay: Duration,
    ) -> BoxFuture<'a, Result<(), BrokerError>>;

    /// Move a leased task to the dead set.
    fn kill<'a>(&'a self, task: &'a Task, error: &'a str) -> BoxFuture<'a, Result<(), BrokerError>>;

    /// Release a lease without counting an attempt.
    fn requeue<'a>(&'a self, task: &'a Task) -> BoxFuture<'a, Result<(), BrokerError>>;

    /// Return leases older than `older_than` to pending. Returns how many were released.
    fn recover_stale(&self, _older_than: Duration) -> BoxFuture<'_, Result<u64, BrokerError>> {
        Box::pin(async { Ok(0) })
    }

    /// Per-queue counts.
    fn stats(&self) -> BoxFuture<'_, Result<Vec<QueueStats>, BrokerError>>;

    /// Release the connection.
    fn close(&self) -> BoxFuture<'_, ()>;
}
