use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use courier_core::broker::{Broker, BrokerError, QueueStats};
use courier_core::task::{EnqueueInfo, Task, TaskState};
use futures::future::BoxFuture;
use tokio::sync::Notify;
use uuid::Uuid;

/// In-process broker.
///
/// Tasks live only as long as the process. Suitable for single-process
/// deployments where the distributor and processor share a broker handle,
/// and for tests.
pub struct MemoryBroker {
    inner: Mutex<Inner>,
    ready: Notify,
    available: AtomicBool,
}

#[derive(Default)]
struct Inner {
    /// Every task not yet completed, including dead ones.
    tasks: HashMap<Uuid, Task>,
    /// Pending task IDs per queue, in arrival order.
    queues: HashMap<String, VecDeque<Uuid>>,
    /// Completed task count per queue.
    done: HashMap<String, u64>,
    closed: bool,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    /// Create an empty broker.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ready: Notify::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate losing (or regaining) connectivity.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Look up a task by ID. Completed tasks are not retained.
    pub fn task(&self, id: Uuid) -> Option<Task> {
        self.lock().ok()?.tasks.get(&id).cloned()
    }

    /// Tasks in the dead set.
    pub fn dead_tasks(&self) -> Vec<Task> {
        self.lock()
            .map(|inner| {
                inner
                    .tasks
                    .values()
                    .filter(|t| t.state == TaskState::Dead)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of completed tasks across all queues.
    pub fn completed_count(&self) -> u64 {
        self.lock()
            .map(|inner| inner.done.values().sum())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, BrokerError> {
        self.inner
            .lock()
            .map_err(|_| BrokerError::Internal("broker state lock poisoned".to_string()))
    }

    /// Lock after checking the broker is reachable and open.
    fn connect(&self) -> Result<MutexGuard<'_, Inner>, BrokerError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable(
                "memory broker is offline".to_string(),
            ));
        }
        let inner = self.lock()?;
        if inner.closed {
            return Err(BrokerError::Closed);
        }
        Ok(inner)
    }

    /// Time until the earliest scheduled task becomes due.
    ///
    /// Tasks that are already due are skipped: the caller just failed to
    /// dequeue them, so they sit in queues it does not serve.
    fn next_due_in(&self) -> Option<Duration> {
        let inner = self.lock().ok()?;
        let now = Utc::now();
        inner
            .tasks
            .values()
            .filter(|t| t.state == TaskState::Pending && t.process_at > now)
            .filter_map(|t| (t.process_at - now).to_std().ok())
            .min()
    }

    fn leased<'a>(inner: &'a mut Inner, task: &Task) -> Result<&'a mut Task, BrokerError> {
        match inner.tasks.get_mut(&task.id) {
            Some(stored) if stored.state == TaskState::Running => Ok(stored),
            _ => Err(BrokerError::TaskNotFound(task.id)),
        }
    }
}

impl Broker for MemoryBroker {
    fn ping(&self) -> BoxFuture<'_, Result<(), BrokerError>> {
        Box::pin(async move { self.connect().map(|_| ()) })
    }

    fn enqueue(&self, mut task: Task) -> BoxFuture<'_, Result<EnqueueInfo, BrokerError>> {
        Box::pin(async move {
            let mut inner = self.connect()?;
            task.state = TaskState::Pending;
            let info = task.enqueue_info();

            inner
                .queues
                .entry(task.queue.clone())
                .or_default()
                .push_back(task.id);
            inner.tasks.insert(task.id, task);
            drop(inner);

            self.ready.notify_one();
            Ok(info)
        })
    }

    fn dequeue<'a>(
        &'a self,
        queues: &'a [String],
    ) -> BoxFuture<'a, Result<Option<Task>, BrokerError>> {
        Box::pin(async move {
            let mut inner = self.connect()?;
            let now = Utc::now();
            let Inner {
                tasks,
                queues: pending,
                ..
            } = &mut *inner;

            for queue in queues {
                let Some(ids) = pending.get_mut(queue) else {
                    continue;
                };
                let due = ids
                    .iter()
                    .position(|id| tasks.get(id).is_some_and(|t| t.process_at <= now));

                if let Some(pos) = due {
                    let Some(id) = ids.remove(pos) else {
                        continue;
                    };
                    if let Some(task) = tasks.get_mut(&id) {
                        task.state = TaskState::Running;
                        return Ok(Some(task.clone()));
                    }
                }
            }

            Ok(None)
        })
    }

    fn wait_for_ready(&self, max_wait: Duration) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let wait = match self.next_due_in() {
                Some(due_in) => due_in.min(max_wait),
                None => max_wait,
            };
            if wait.is_zero() {
                return;
            }
            tokio::select! {
                _ = self.ready.notified() => {}
                _ = tokio::time::sleep(wait) => {}
            }
        })
    }

    fn complete<'a>(&'a self, task: &'a Task) -> BoxFuture<'a, Result<(), BrokerError>> {
        Box::pin(async move {
            let mut inner = self.connect()?;
            Self::leased(&mut inner, task)?;
            inner.tasks.remove(&task.id);
            *inner.done.entry(task.queue.clone()).or_default() += 1;
            Ok(())
        })
    }

    fn retry<'a>(
        &'a self,
        task: &'a Task,
        error: &'a str,
        delay: Duration,
    ) -> BoxFuture<'a, Result<(), BrokerError>> {
        Box::pin(async move {
            let mut inner = self.connect()?;
            let stored = Self::leased(&mut inner, task)?;
            stored.state = TaskState::Pending;
            stored.retried += 1;
            stored.last_error = Some(error.to_string());
            stored.process_at = chrono::Duration::from_std(delay)
                .ok()
                .and_then(|delay| Utc::now().checked_add_signed(delay))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);

            inner
                .queues
                .entry(task.queue.clone())
                .or_default()
                .push_back(task.id);
            drop(inner);

            self.ready.notify_one();
            Ok(())
        })
    }

    fn kill<'a>(&'a self, task: &'a Task, error: &'a str) -> BoxFuture<'a, Result<(), BrokerError>> {
        Box::pin(async move {
            let mut inner = self.connect()?;
            let stored = Self::leased(&mut inner, task)?;
            stored.state = TaskState::Dead;
            stored.last_error = Some(error.to_string());
            Ok(())
        })
    }

    fn requeue<'a>(&'a self, task: &'a Task) -> BoxFuture<'a, Result<(), BrokerError>> {
        Box::pin(async move {
            // Requeue runs during shutdown, after close may have been requested elsewhere.
            let mut inner = self.lock()?;
            let stored = Self::leased(&mut inner, task)?;
            stored.state = TaskState::Pending;

            inner
                .queues
                .entry(task.queue.clone())
                .or_default()
                .push_front(task.id);
            drop(inner);

            self.ready.notify_one();
            Ok(())
        })
    }

    fn stats(&self) -> BoxFuture<'_, Result<Vec<QueueStats>, BrokerError>> {
        Box::pin(async move {
            let inner = self.connect()?;
            let now = Utc::now();
            let mut by_queue: BTreeMap<&str, QueueStats> = BTreeMap::new();

            for queue in inner.queues.keys().chain(inner.done.keys()) {
                by_queue.entry(queue.as_str()).or_insert_with(|| QueueStats {
                    queue: queue.clone(),
                    ..Default::default()
                });
            }

            for task in inner.tasks.values() {
                let stats = by_queue
                    .entry(task.queue.as_str())
                    .or_insert_with(|| QueueStats {
                        queue: task.queue.clone(),
                        ..Default::default()
                    });
                match task.state {
                    TaskState::Pending if task.process_at > now => stats.scheduled += 1,
                    TaskState::Pending => stats.pending += 1,
                    TaskState::Running => stats.running += 1,
                    TaskState::Dead => stats.dead += 1,
                    TaskState::Done => stats.done += 1,
                }
            }

            for (queue, count) in &inner.done {
                if let Some(stats) = by_queue.get_mut(queue.as_str()) {
                    stats.done += count;
                }
            }

            Ok(by_queue.into_values().collect())
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if let Ok(mut inner) = self.lock() {
                inner.closed = true;
            }
            self.ready.notify_waiters();
        })
    }
}
