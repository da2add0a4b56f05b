use std::sync::Arc;

use courier_core::broker::Broker;
use courier_core::error::{CourierError, Result};
use courier_core::task::{EnqueueInfo, Task, TaskOptions, TaskPayload};
use serde::Serialize;

/// Submits tasks to the broker.
///
/// Holds only the broker handle. It never waits for or inspects the outcome of
/// what it submits, and it does not know which task types have handlers.
#[derive(Clone)]
pub struct TaskDistributor {
    broker: Arc<dyn Broker>,
}

impl TaskDistributor {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    /// Serialize `payload` and enqueue it under `task_type`.
    ///
    /// Serialization and option errors are returned without contacting the
    /// broker. Broker errors are returned as-is and never retried here.
    pub async fn enqueue<P: Serialize + ?Sized>(
        &self,
        task_type: &str,
        payload: &P,
        options: TaskOptions,
    ) -> Result<EnqueueInfo> {
        let bytes = serde_json::to_vec(payload)?;
        self.enqueue_raw(task_type, bytes, options).await
    }

    /// Enqueue a typed payload under its own task type.
    pub async fn enqueue_payload<P: TaskPayload>(
        &self,
        payload: &P,
        options: TaskOptions,
    ) -> Result<EnqueueInfo> {
        self.enqueue(P::TASK_TYPE, payload, options).await
    }

    /// Enqueue already-serialized payload bytes.
    pub async fn enqueue_raw(
        &self,
        task_type: &str,
        payload: Vec<u8>,
        options: TaskOptions,
    ) -> Result<EnqueueInfo> {
        if task_type.trim().is_empty() {
            return Err(CourierError::InvalidArgument(
                "task type must not be empty".to_string(),
            ));
        }
        options.validate()?;

        let task = Task::new(task_type, payload, &options);
        let info = self.broker.enqueue(task).await?;

        tracing::info!(
            task_id = %info.id,
            task_type = %info.task_type,
            queue = %info.queue,
            max_retry = info.max_retry,
            process_at = %info.process_at,
            "Enqueued task"
        );

        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use chrono::Utc;
    use courier_core::broker::BrokerError;
    use courier_core::task::TaskState;

    use super::*;
    use crate::broker::MemoryBroker;

    #[derive(Serialize, serde::Deserialize)]
    struct Ping {
        n: u32,
    }

    impl TaskPayload for Ping {
        const TASK_TYPE: &'static str = "task:ping";
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refused"))
        }
    }

    fn setup() -> (Arc<MemoryBroker>, TaskDistributor) {
        let broker = Arc::new(MemoryBroker::new());
        let distributor = TaskDistributor::new(broker.clone());
        (broker, distributor)
    }

    #[tokio::test]
    async fn test_enqueue_returns_ack() {
        let (broker, distributor) = setup();
        let options = TaskOptions::default()
            .with_queue("critical")
            .with_max_retry(10)
            .with_process_in(Duration::from_secs(10));

        let before = Utc::now();
        let info = distributor
            .enqueue_payload(&Ping { n: 1 }, options)
            .await
            .unwrap();

        assert!(!info.id.is_nil());
        assert_eq!(info.queue, "critical");
        assert_eq!(info.task_type, "task:ping");
        assert!(info.process_at >= before + chrono::Duration::seconds(10));

        let stored = broker.task(info.id).unwrap();
        assert_eq!(stored.state, TaskState::Pending);
        assert_eq!(stored.max_retry, 10);
        assert_eq!(stored.payload, br#"{"n":1}"#.to_vec());
    }

    #[tokio::test]
    async fn test_serialization_failure_skips_broker() {
        let (broker, distributor) = setup();
        broker.set_available(false);

        let err = distributor
            .enqueue("task:x", &Unserializable, TaskOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_invalid_options_rejected() {
        let (_broker, distributor) = setup();
        let err = distributor
            .enqueue_raw("task:x", Vec::new(), TaskOptions::default().with_queue(""))
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_out_of_range_delay_rejected() {
        let (broker, distributor) = setup();
        let options = TaskOptions::default().with_process_in(Duration::from_secs(u64::MAX));

        let err = distributor
            .enqueue_payload(&Ping { n: 1 }, options)
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::InvalidArgument(_)));
        assert!(broker.stats().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_broker_error_returned_verbatim() {
        let (broker, distributor) = setup();
        broker.set_available(false);

        let err = distributor
            .enqueue_payload(&Ping { n: 1 }, TaskOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CourierError::Broker(BrokerError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_unregistered_type_is_accepted() {
        let (broker, distributor) = setup();
        let payload: BTreeMap<String, u32> = BTreeMap::new();
        distributor
            .enqueue("task:nobody_handles_this", &payload, TaskOptions::default())
            .await
            .unwrap();

        let stats = broker.stats().await.unwrap();
        assert_eq!(stats[0].pending, 1);
    }
}
