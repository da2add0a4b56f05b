use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use courier_core::broker::Broker;
use courier_core::config::CourierConfig;
use courier_core::error::{CourierError, Result};
use courier_core::task::RetryPolicy;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::executor::{ExecutionResult, TaskExecutor};
use super::observer::{ErrorObserver, LogObserver};
use super::priority::{QueueSelector, QueueWeights};
use super::registry::DispatchTable;

/// Processor configuration.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Maximum concurrently running handlers.
    pub concurrency: usize,
    /// Queue name to relative weight.
    pub queues: BTreeMap<String, u32>,
    /// Always try heavier queues first.
    pub strict_priority: bool,
    /// Longest idle wait between dequeue attempts.
    pub poll_interval: Duration,
    /// How long shutdown waits for in-flight handlers.
    pub shutdown_timeout: Duration,
    /// How long cancelled handlers get to return once the shutdown timeout has passed.
    pub cancel_grace: Duration,
    /// Per-attempt timeout for tasks without their own.
    pub task_timeout: Duration,
    pub retry_policy: RetryPolicy,
    /// Leases older than this are handed back to pending.
    pub stale_lease: Duration,
    /// Stale lease sweep interval. Zero disables the sweep.
    pub recovery_interval: Duration,
    /// Payload bytes included in failure logs.
    pub payload_preview_bytes: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self::from_config(&CourierConfig::default())
    }
}

impl ProcessorConfig {
    pub fn from_config(config: &CourierConfig) -> Self {
        let settings = &config.processor;
        Self {
            concurrency: settings.concurrency,
            queues: settings.queues.clone(),
            strict_priority: settings.strict_priority,
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            shutdown_timeout: Duration::from_secs(settings.shutdown_timeout_secs),
            cancel_grace: Duration::from_millis(settings.cancel_grace_ms),
            task_timeout: Duration::from_secs(settings.task_timeout_secs),
            retry_policy: settings.retry_policy(),
            stale_lease: Duration::from_secs(config.broker.stale_lease_secs),
            recovery_interval: Duration::from_secs(config.broker.recovery_interval_secs),
            payload_preview_bytes: config.observability.payload_preview_bytes,
        }
    }
}

/// Lifecycle of a [`Processor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Worker pool pulling tasks from the broker.
///
/// `start` runs until `shutdown` is called from another task, or returns an
/// error straight away if the broker cannot be reached. A processor runs once.
pub struct Processor {
    config: ProcessorConfig,
    broker: Arc<dyn Broker>,
    table: Arc<DispatchTable>,
    selector: QueueSelector,
    observer: Arc<dyn ErrorObserver>,
    /// Stops dequeuing.
    stop: CancellationToken,
    /// Cancels in-flight handlers once the drain timeout has passed.
    abort: CancellationToken,
    state: watch::Sender<ProcessorState>,
}

impl Processor {
    /// Create a processor. Fails on an unusable configuration.
    pub fn new(
        config: ProcessorConfig,
        broker: Arc<dyn Broker>,
        table: DispatchTable,
    ) -> Result<Self> {
        if config.concurrency == 0 {
            return Err(CourierError::Config(
                "processor concurrency must be at least 1".to_string(),
            ));
        }
        let weights = QueueWeights::new(&config.queues)?;
        let selector = QueueSelector::new(weights, config.strict_priority);
        let observer: Arc<dyn ErrorObserver> =
            Arc::new(LogObserver::new(config.payload_preview_bytes));
        let (state, _) = watch::channel(ProcessorState::Idle);

        Ok(Self {
            config,
            broker,
            table: Arc::new(table),
            selector,
            observer,
            stop: CancellationToken::new(),
            abort: CancellationToken::new(),
            state,
        })
    }

    /// Replace the default logging error observer.
    pub fn with_observer(mut self, observer: Arc<dyn ErrorObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Seed queue selection, for reproducible ordering.
    pub fn with_queue_seed(mut self, seed: u64) -> Self {
        let weights = self.selector.weights().clone();
        self.selector = QueueSelector::with_seed(weights, self.config.strict_priority, seed);
        self
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn state(&self) -> ProcessorState {
        *self.state.borrow()
    }

    /// Run until shutdown.
    ///
    /// Returns an error only when the broker is unreachable at startup or the
    /// processor was already started.
    pub async fn start(&self) -> Result<()> {
        let claimed = self.state.send_if_modified(|state| {
            if *state == ProcessorState::Idle {
                *state = ProcessorState::Running;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(CourierError::InvalidState(
                "processor has already been started".to_string(),
            ));
        }

        if let Err(e) = self.broker.ping().await {
            tracing::error!(error = %e, "Broker unreachable, processor not started");
            self.state.send_replace(ProcessorState::Stopped);
            return Err(e.into());
        }

        tracing::info!(
            concurrency = self.config.concurrency,
            queues = ?self.config.queues,
            strict_priority = self.config.strict_priority,
            task_types = ?self.table.task_types(),
            "Processor started"
        );

        let recovery = self.spawn_recovery();
        let mut in_flight = self.run_loop().await;

        self.state.send_replace(ProcessorState::Stopping);
        self.drain(&mut in_flight).await;

        if let Some(handle) = recovery {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Stale lease recovery aborted unexpectedly");
            }
        }
        self.broker.close().await;
        self.state.send_replace(ProcessorState::Stopped);

        tracing::info!("Processor stopped");
        Ok(())
    }

    /// Stop dequeuing, wait for in-flight handlers, release the broker.
    ///
    /// Handlers still running after the shutdown timeout are cancelled through
    /// their context. Those that do not finish within the cancel grace have
    /// their tasks handed back to the broker. Returns once the processor has
    /// fully stopped.
    pub async fn shutdown(&self) {
        let never_started = self.state.send_if_modified(|state| {
            if *state == ProcessorState::Idle {
                *state = ProcessorState::Stopped;
                true
            } else {
                false
            }
        });

        self.stop.cancel();

        if never_started {
            self.broker.close().await;
            return;
        }

        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|state| *state == ProcessorState::Stopped).await;
    }

    /// Dequeue and dispatch until stopped. Returns the handlers still running.
    async fn run_loop(&self) -> JoinSet<ExecutionResult> {
        let executor = Arc::new(TaskExecutor::new(
            self.broker.clone(),
            self.table.clone(),
            self.config.retry_policy.clone(),
            self.config.task_timeout,
            self.observer.clone(),
        )
        .with_cancel_grace(self.config.cancel_grace));
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut in_flight = JoinSet::new();

        loop {
            while let Some(joined) = in_flight.try_join_next() {
                log_join(joined);
            }

            let permit = tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let queues = self.selector.order();
            match self.broker.dequeue(&queues).await {
                Ok(Some(task)) => {
                    if self.stop.is_cancelled() {
                        if let Err(e) = self.broker.requeue(&task).await {
                            tracing::error!(task_id = %task.id, error = %e, "Failed to requeue task");
                        }
                        break;
                    }

                    tracing::debug!(
                        task_id = %task.id,
                        task_type = %task.task_type,
                        queue = %task.queue,
                        "Dequeued task"
                    );

                    let executor = executor.clone();
                    let abort = self.abort.clone();
                    in_flight.spawn(async move {
                        let result = executor.execute(&task, &abort).await;
                        drop(permit);
                        result
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tokio::select! {
                        _ = self.stop.cancelled() => break,
                        _ = self.broker.wait_for_ready(self.config.poll_interval) => {}
                    }
                }
                Err(e) => {
                    drop(permit);
                    tracing::warn!(error = %e, "Dequeue failed");
                    tokio::select! {
                        _ = self.stop.cancelled() => break,
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
            }
        }

        in_flight
    }

    /// Wait for in-flight handlers, aborting them after the shutdown timeout.
    async fn drain(&self, in_flight: &mut JoinSet<ExecutionResult>) {
        if in_flight.is_empty() {
            return;
        }

        tracing::info!(in_flight = in_flight.len(), "Waiting for in-flight tasks");

        let drained = tokio::time::timeout(self.config.shutdown_timeout, async {
            while let Some(joined) = in_flight.join_next().await {
                log_join(joined);
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = in_flight.len(),
                timeout = ?self.config.shutdown_timeout,
                "Shutdown timeout elapsed, returning in-flight tasks to the queue"
            );
            self.abort.cancel();
            while let Some(joined) = in_flight.join_next().await {
                log_join(joined);
            }
        }
    }

    fn spawn_recovery(&self) -> Option<tokio::task::JoinHandle<()>> {
        if self.config.recovery_interval.is_zero() {
            return None;
        }

        let broker = self.broker.clone();
        let stop = self.stop.clone();
        let interval = self.config.recovery_interval;
        let older_than = self.config.stale_lease;

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        match broker.recover_stale(older_than).await {
                            Ok(0) => {}
                            Ok(count) => tracing::warn!(count, "Recovered stale task leases"),
                            Err(e) => tracing::warn!(error = %e, "Stale lease recovery failed"),
                        }
                    }
                }
            }
        }))
    }
}

fn log_join(joined: std::result::Result<ExecutionResult, tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "Task execution aborted unexpectedly");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use courier_core::broker::{BrokerError, QueueStats};
    use courier_core::task::{
        BackoffStrategy, EnqueueInfo, Task, TaskContext, TaskError, TaskHandler, TaskOptions,
        TaskState,
    };
    use futures::future::BoxFuture;

    use super::*;
    use crate::broker::MemoryBroker;
    use crate::tasks::test_support::{Behavior, ScriptedHandler};
    use crate::tasks::TaskDistributor;

    const TYPE: &str = "task:test";

    fn fast_config() -> ProcessorConfig {
        ProcessorConfig {
            concurrency: 4,
            queues: BTreeMap::from([("default".to_string(), 1)]),
            poll_interval: Duration::from_millis(20),
            shutdown_timeout: Duration::from_secs(2),
            task_timeout: Duration::from_secs(5),
            retry_policy: RetryPolicy {
                backoff: BackoffStrategy::Fixed,
                base: Duration::ZERO,
                max_backoff: Duration::ZERO,
            },
            recovery_interval: Duration::ZERO,
            ..ProcessorConfig::default()
        }
    }

    fn spawn(processor: &Arc<Processor>) -> tokio::task::JoinHandle<Result<()>> {
        let processor = processor.clone();
        tokio::spawn(async move { processor.start().await })
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "condition not met in time"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn processor_with(
        config: ProcessorConfig,
        broker: &Arc<MemoryBroker>,
        handler: Arc<dyn TaskHandler>,
    ) -> Arc<Processor> {
        let table = DispatchTable::new().with_handler(TYPE, handler).unwrap();
        Arc::new(Processor::new(config, broker.clone(), table).unwrap())
    }

    async fn enqueue(broker: &Arc<MemoryBroker>, options: TaskOptions) -> Task {
        let task = Task::new(TYPE, b"{}".to_vec(), &options);
        broker.enqueue(task.clone()).await.unwrap();
        task
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = ProcessorConfig {
            concurrency: 0,
            ..fast_config()
        };
        let result = Processor::new(config, Arc::new(MemoryBroker::new()), DispatchTable::new());
        assert!(matches!(result, Err(CourierError::Config(_))));
    }

    #[test]
    fn test_config_from_defaults() {
        let config = ProcessorConfig::default();
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.queues.get("critical"), Some(&10));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(8));
        assert_eq!(config.task_timeout, Duration::from_secs(1800));
    }

    #[tokio::test]
    async fn test_transient_failure_invoked_max_retry_plus_one() {
        let broker = Arc::new(MemoryBroker::new());
        let handler = ScriptedHandler::new(Behavior::Fail);
        let processor = processor_with(fast_config(), &broker, handler.clone());
        let runner = spawn(&processor);

        let task = enqueue(&broker, TaskOptions::default().with_max_retry(3)).await;
        wait_until(|| broker.dead_tasks().len() == 1).await;

        processor.shutdown().await;
        runner.await.unwrap().unwrap();

        assert_eq!(handler.calls(), 4);
        let dead = broker.task(task.id).unwrap();
        assert_eq!(dead.state, TaskState::Dead);
        assert_eq!(dead.retried, 3);
    }

    #[tokio::test]
    async fn test_terminal_error_invoked_once() {
        let broker = Arc::new(MemoryBroker::new());
        let handler = ScriptedHandler::new(Behavior::SkipRetry);
        let processor = processor_with(fast_config(), &broker, handler.clone());
        let runner = spawn(&processor);

        enqueue(&broker, TaskOptions::default().with_max_retry(10)).await;
        wait_until(|| broker.dead_tasks().len() == 1).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        processor.shutdown().await;
        runner.await.unwrap().unwrap();
        assert_eq!(handler.calls(), 1);
    }

    #[tokio::test]
    async fn test_unregistered_type_dies_at_dispatch() {
        let broker = Arc::new(MemoryBroker::new());
        let handler = ScriptedHandler::new(Behavior::Succeed);
        let processor = processor_with(fast_config(), &broker, handler.clone());
        let runner = spawn(&processor);

        let distributor = TaskDistributor::new(broker.clone());
        let info = distributor
            .enqueue("task:unknown", &serde_json::json!({}), TaskOptions::default())
            .await
            .unwrap();

        wait_until(|| broker.dead_tasks().len() == 1).await;
        processor.shutdown().await;
        runner.await.unwrap().unwrap();

        let dead = broker.task(info.id).unwrap();
        assert_eq!(dead.retried, 0);
        assert!(dead.last_error.unwrap().contains("no handler"));
        assert_eq!(handler.calls(), 0);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_retry() {
        let broker = Arc::new(MemoryBroker::new());
        let handler = ScriptedHandler::new(Behavior::Sleep(Duration::from_secs(30)));
        let processor = processor_with(fast_config(), &broker, handler.clone());
        let runner = spawn(&processor);

        let options = TaskOptions::default()
            .with_max_retry(1)
            .with_timeout(Duration::from_millis(50));
        enqueue(&broker, options).await;

        wait_until(|| broker.dead_tasks().len() == 1).await;
        processor.shutdown().await;
        runner.await.unwrap().unwrap();
        assert_eq!(handler.calls(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_in_flight() {
        let broker = Arc::new(MemoryBroker::new());
        let handler = ScriptedHandler::new(Behavior::Sleep(Duration::from_millis(200)));
        let processor = processor_with(fast_config(), &broker, handler.clone());
        let runner = spawn(&processor);

        for _ in 0..3 {
            enqueue(&broker, TaskOptions::default()).await;
        }
        wait_until(|| handler.calls() == 3).await;

        processor.shutdown().await;
        assert_eq!(processor.state(), ProcessorState::Stopped);
        assert_eq!(broker.completed_count(), 3);
        runner.await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handler.calls(), 3);
    }

    #[tokio::test]
    async fn test_shutdown_timeout_requeues() {
        let broker = Arc::new(MemoryBroker::new());
        let handler = ScriptedHandler::new(Behavior::WaitForCancel);
        let config = ProcessorConfig {
            shutdown_timeout: Duration::from_millis(100),
            ..fast_config()
        };
        let processor = processor_with(config, &broker, handler.clone());
        let runner = spawn(&processor);

        let task = enqueue(&broker, TaskOptions::default()).await;
        wait_until(|| handler.calls() == 1).await;

        processor.shutdown().await;
        runner.await.unwrap().unwrap();

        assert_eq!(handler.cancellations(), 1);
        let stored = broker.task(task.id).unwrap();
        assert_eq!(stored.state, TaskState::Pending);
        assert_eq!(stored.retried, 0);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_handler_context() {
        let broker = Arc::new(MemoryBroker::new());
        let handler = ScriptedHandler::new(Behavior::FinishOnCancel);
        let config = ProcessorConfig {
            shutdown_timeout: Duration::from_millis(100),
            ..fast_config()
        };
        let processor = processor_with(config, &broker, handler.clone());
        let runner = spawn(&processor);

        enqueue(&broker, TaskOptions::default()).await;
        wait_until(|| handler.calls() == 1).await;

        processor.shutdown().await;
        runner.await.unwrap().unwrap();

        assert_eq!(handler.cancellations(), 1);
        assert_eq!(broker.completed_count(), 1);
    }

    /// Shares a memory broker but leaves it open when the processor closes it,
    /// like a database other producers keep writing to.
    struct SharedBroker {
        inner: Arc<MemoryBroker>,
        panic_on_recover: bool,
    }

    impl SharedBroker {
        fn new(inner: &Arc<MemoryBroker>) -> Arc<Self> {
            Arc::new(Self {
                inner: inner.clone(),
                panic_on_recover: false,
            })
        }
    }

    impl Broker for SharedBroker {
        fn ping(&self) -> BoxFuture<'_, std::result::Result<(), BrokerError>> {
            self.inner.ping()
        }

        fn enqueue(
            &self,
            task: Task,
        ) -> BoxFuture<'_, std::result::Result<EnqueueInfo, BrokerError>> {
            self.inner.enqueue(task)
        }

        fn dequeue<'a>(
            &'a self,
            queues: &'a [String],
        ) -> BoxFuture<'a, std::result::Result<Option<Task>, BrokerError>> {
            self.inner.dequeue(queues)
        }

        fn wait_for_ready(&self, max_wait: Duration) -> BoxFuture<'_, ()> {
            self.inner.wait_for_ready(max_wait)
        }

        fn complete<'a>(
            &'a self,
            task: &'a Task,
        ) -> BoxFuture<'a, std::result::Result<(), BrokerError>> {
            self.inner.complete(task)
        }

        fn retry<'a>(
            &'a self,
            task: &'a Task,
            error: &'a str,
            delay: Duration,
        ) -> BoxFuture<'a, std::result::Result<(), BrokerError>> {
            self.inner.retry(task, error, delay)
        }

        fn kill<'a>(
            &'a self,
            task: &'a Task,
            error: &'a str,
        ) -> BoxFuture<'a, std::result::Result<(), BrokerError>> {
            self.inner.kill(task, error)
        }

        fn requeue<'a>(
            &'a self,
            task: &'a Task,
        ) -> BoxFuture<'a, std::result::Result<(), BrokerError>> {
            self.inner.requeue(task)
        }

        fn recover_stale(
            &self,
            older_than: Duration,
        ) -> BoxFuture<'_, std::result::Result<u64, BrokerError>> {
            if self.panic_on_recover {
                panic!("recovery sweep blew up");
            }
            self.inner.recover_stale(older_than)
        }

        fn stats(&self) -> BoxFuture<'_, std::result::Result<Vec<QueueStats>, BrokerError>> {
            self.inner.stats()
        }

        fn close(&self) -> BoxFuture<'_, ()> {
            Box::pin(async {})
        }
    }

    #[tokio::test]
    async fn test_no_dequeue_after_shutdown() {
        let memory = Arc::new(MemoryBroker::new());
        let handler = ScriptedHandler::new(Behavior::Succeed);
        let table = DispatchTable::new()
            .with_handler(TYPE, handler.clone())
            .unwrap();
        let processor =
            Arc::new(Processor::new(fast_config(), SharedBroker::new(&memory), table).unwrap());
        let runner = spawn(&processor);

        enqueue(&memory, TaskOptions::default()).await;
        wait_until(|| memory.completed_count() == 1).await;

        processor.shutdown().await;
        runner.await.unwrap().unwrap();

        let late = enqueue(&memory, TaskOptions::default()).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(handler.calls(), 1);
        assert_eq!(memory.task(late.id).unwrap().state, TaskState::Pending);
    }

    #[tokio::test]
    async fn test_recovery_panic_does_not_fail_shutdown() {
        let memory = Arc::new(MemoryBroker::new());
        let broker = Arc::new(SharedBroker {
            inner: memory.clone(),
            panic_on_recover: true,
        });
        let config = ProcessorConfig {
            recovery_interval: Duration::from_millis(10),
            ..fast_config()
        };
        let table = DispatchTable::new()
            .with_handler(TYPE, ScriptedHandler::new(Behavior::Succeed))
            .unwrap();
        let processor = Arc::new(Processor::new(config, broker, table).unwrap());
        let runner = spawn(&processor);

        tokio::time::sleep(Duration::from_millis(50)).await;
        processor.shutdown().await;
        runner.await.unwrap().unwrap();
        assert_eq!(processor.state(), ProcessorState::Stopped);
    }

    #[tokio::test]
    async fn test_start_fails_when_broker_unreachable() {
        let broker = Arc::new(MemoryBroker::new());
        broker.set_available(false);
        let processor = processor_with(
            fast_config(),
            &broker,
            ScriptedHandler::new(Behavior::Succeed),
        );

        let err = processor.start().await.unwrap_err();
        assert!(matches!(err, CourierError::Broker(_)));
        assert_eq!(processor.state(), ProcessorState::Stopped);

        // Shutdown after a failed start returns immediately.
        processor.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let broker = Arc::new(MemoryBroker::new());
        let processor = processor_with(
            fast_config(),
            &broker,
            ScriptedHandler::new(Behavior::Succeed),
        );
        let runner = spawn(&processor);
        wait_until(|| processor.state() == ProcessorState::Running).await;

        let err = processor.start().await.unwrap_err();
        assert!(matches!(err, CourierError::InvalidState(_)));

        processor.shutdown().await;
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_before_start() {
        let broker = Arc::new(MemoryBroker::new());
        let processor = processor_with(
            fast_config(),
            &broker,
            ScriptedHandler::new(Behavior::Succeed),
        );
        processor.shutdown().await;
        assert_eq!(processor.state(), ProcessorState::Stopped);
        assert!(processor.start().await.is_err());
    }

    struct QueueRecorder {
        seen: Mutex<Vec<String>>,
    }

    impl TaskHandler for QueueRecorder {
        fn handle<'a>(
            &'a self,
            ctx: &'a TaskContext,
            _task: &'a Task,
        ) -> BoxFuture<'a, std::result::Result<(), TaskError>> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(ctx.queue.clone());
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_weighted_queues_share_capacity() {
        let broker = Arc::new(MemoryBroker::new());
        let recorder = Arc::new(QueueRecorder {
            seen: Mutex::new(Vec::new()),
        });
        let config = ProcessorConfig {
            concurrency: 1,
            queues: BTreeMap::from([("critical".to_string(), 10), ("default".to_string(), 5)]),
            ..fast_config()
        };
        let table = DispatchTable::new()
            .with_handler(TYPE, recorder.clone())
            .unwrap();
        let processor = Arc::new(
            Processor::new(config, broker.clone(), table)
                .unwrap()
                .with_queue_seed(11),
        );

        for _ in 0..600 {
            enqueue(&broker, TaskOptions::default().with_queue("critical")).await;
            enqueue(&broker, TaskOptions::default()).await;
        }

        let runner = spawn(&processor);
        let sample = 450;
        wait_until(|| recorder.seen.lock().unwrap().len() >= sample).await;
        processor.shutdown().await;
        runner.await.unwrap().unwrap();

        let seen = recorder.seen.lock().unwrap();
        let critical = seen[..sample].iter().filter(|q| *q == "critical").count();
        let share = critical as f64 / sample as f64;
        assert!(share > 0.58 && share < 0.75, "critical share was {}", share);
    }
}
