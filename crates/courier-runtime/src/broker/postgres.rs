use std::time::Duration;

use courier_core::broker::{Broker, BrokerError, QueueStats};
use courier_core::task::{EnqueueInfo, Task, TaskState};
use futures::future::BoxFuture;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const TASK_COLUMNS: &str = "id, task_type, payload, queue, state, retried, max_retry, \
                            timeout_ms, deadline, process_at, created_at, last_error";

/// PostgreSQL-backed broker.
///
/// Tasks are rows in `courier_tasks`; leases are taken with `FOR UPDATE SKIP LOCKED`
/// so any number of processors can share the table.
#[derive(Clone)]
pub struct PgBroker {
    pool: PgPool,
}

impl PgBroker {
    /// Create a broker over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lease the next due task from a single queue.
    async fn dequeue_from(&self, queue: &str) -> Result<Option<Task>, BrokerError> {
        let sql = format!(
            r#"
            WITH next AS (
                SELECT id
                FROM courier_tasks
                WHERE queue = $1
                  AND state = 'pending'
                  AND process_at <= NOW()
                ORDER BY process_at ASC, created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE courier_tasks
            SET state = 'running', leased_at = NOW()
            WHERE id IN (SELECT id FROM next)
            RETURNING {}
            "#,
            TASK_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(queue)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(task_from_row).transpose()
    }

    /// Run an update against a leased task, failing if the lease is gone.
    async fn update_leased(
        &self,
        task: &Task,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<(), BrokerError> {
        let result = query.execute(&self.pool).await.map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(BrokerError::TaskNotFound(task.id));
        }
        Ok(())
    }
}

impl Broker for PgBroker {
    fn ping(&self) -> BoxFuture<'_, Result<(), BrokerError>> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            Ok(())
        })
    }

    fn enqueue(&self, task: Task) -> BoxFuture<'_, Result<EnqueueInfo, BrokerError>> {
        Box::pin(async move {
            sqlx::query(
                r#"
                INSERT INTO courier_tasks (
                    id, task_type, payload, queue, state, retried, max_retry,
                    timeout_ms, deadline, process_at, created_at
                ) VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11
                )
                "#,
            )
            .bind(task.id)
            .bind(&task.task_type)
            .bind(&task.payload)
            .bind(&task.queue)
            .bind(TaskState::Pending.as_str())
            .bind(to_i32(task.retried))
            .bind(to_i32(task.max_retry))
            .bind(task.timeout.map(to_millis))
            .bind(task.deadline)
            .bind(task.process_at)
            .bind(task.created_at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

            Ok(task.enqueue_info())
        })
    }

    fn dequeue<'a>(
        &'a self,
        queues: &'a [String],
    ) -> BoxFuture<'a, Result<Option<Task>, BrokerError>> {
        Box::pin(async move {
            for queue in queues {
                if let Some(task) = self.dequeue_from(queue).await? {
                    return Ok(Some(task));
                }
            }
            Ok(None)
        })
    }

    fn complete<'a>(&'a self, task: &'a Task) -> BoxFuture<'a, Result<(), BrokerError>> {
        Box::pin(async move {
            let query = sqlx::query(
                r#"
                UPDATE courier_tasks
                SET state = 'done', completed_at = NOW()
                WHERE id = $1 AND state = 'running'
                "#,
            )
            .bind(task.id);
            self.update_leased(task, query).await
        })
    }

    fn retry<'a>(
        &'a self,
        task: &'a Task,
        error: &'a str,
        delay: Duration,
    ) -> BoxFuture<'a, Result<(), BrokerError>> {
        Box::pin(async move {
            let query = sqlx::query(
                r#"
                UPDATE courier_tasks
                SET
                    state = 'pending',
                    retried = retried + 1,
                    leased_at = NULL,
                    last_error = $2,
                    process_at = NOW() + ($3::BIGINT * INTERVAL '1 millisecond')
                WHERE id = $1 AND state = 'running'
                "#,
            )
            .bind(task.id)
            .bind(error)
            .bind(to_millis(delay));
            self.update_leased(task, query).await
        })
    }

    fn kill<'a>(&'a self, task: &'a Task, error: &'a str) -> BoxFuture<'a, Result<(), BrokerError>> {
        Box::pin(async move {
            let query = sqlx::query(
                r#"
                UPDATE courier_tasks
                SET state = 'dead', last_error = $2, failed_at = NOW()
                WHERE id = $1 AND state = 'running'
                "#,
            )
            .bind(task.id)
            .bind(error);
            self.update_leased(task, query).await
        })
    }

    fn requeue<'a>(&'a self, task: &'a Task) -> BoxFuture<'a, Result<(), BrokerError>> {
        Box::pin(async move {
            let query = sqlx::query(
                r#"
                UPDATE courier_tasks
                SET state = 'pending', leased_at = NULL
                WHERE id = $1 AND state = 'running'
                "#,
            )
            .bind(task.id);
            self.update_leased(task, query).await
        })
    }

    fn recover_stale(&self, older_than: Duration) -> BoxFuture<'_, Result<u64, BrokerError>> {
        Box::pin(async move {
            let result = sqlx::query(
                r#"
                UPDATE courier_tasks
                SET state = 'pending', leased_at = NULL
                WHERE state = 'running'
                  AND leased_at < NOW() - ($1::BIGINT * INTERVAL '1 millisecond')
                "#,
            )
            .bind(to_millis(older_than))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

            Ok(result.rows_affected())
        })
    }

    fn stats(&self) -> BoxFuture<'_, Result<Vec<QueueStats>, BrokerError>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r#"
                SELECT
                    queue,
                    COUNT(*) FILTER (WHERE state = 'pending' AND process_at <= NOW()) AS pending,
                    COUNT(*) FILTER (WHERE state = 'pending' AND process_at > NOW()) AS scheduled,
                    COUNT(*) FILTER (WHERE state = 'running') AS running,
                    COUNT(*) FILTER (WHERE state = 'done') AS done,
                    COUNT(*) FILTER (WHERE state = 'dead') AS dead
                FROM courier_tasks
                GROUP BY queue
                ORDER BY queue
                "#,
            )
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

            rows.iter()
                .map(|row| {
                    Ok(QueueStats {
                        queue: row.try_get("queue").map_err(db_err)?,
                        pending: count(row, "pending")?,
                        scheduled: count(row, "scheduled")?,
                        running: count(row, "running")?,
                        done: count(row, "done")?,
                        dead: count(row, "dead")?,
                    })
                })
                .collect()
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.pool.close().await;
        })
    }
}

fn task_from_row(row: &PgRow) -> Result<Task, BrokerError> {
    let state: String = row.try_get("state").map_err(db_err)?;
    let retried: i32 = row.try_get("retried").map_err(db_err)?;
    let max_retry: i32 = row.try_get("max_retry").map_err(db_err)?;
    let timeout_ms: Option<i64> = row.try_get("timeout_ms").map_err(db_err)?;

    Ok(Task {
        id: row.try_get("id").map_err(db_err)?,
        task_type: row.try_get("task_type").map_err(db_err)?,
        payload: row.try_get("payload").map_err(db_err)?,
        queue: row.try_get("queue").map_err(db_err)?,
        state: state.parse().map_err(BrokerError::Internal)?,
        retried: u32::try_from(retried).unwrap_or_default(),
        max_retry: u32::try_from(max_retry).unwrap_or_default(),
        timeout: timeout_ms.map(|ms| Duration::from_millis(u64::try_from(ms).unwrap_or_default())),
        deadline: row.try_get("deadline").map_err(db_err)?,
        process_at: row.try_get("process_at").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        last_error: row.try_get("last_error").map_err(db_err)?,
    })
}

fn count(row: &PgRow, column: &str) -> Result<u64, BrokerError> {
    let value: i64 = row.try_get(column).map_err(db_err)?;
    Ok(u64::try_from(value).unwrap_or_default())
}

/// Connectivity problems surface as `Unavailable`; everything else is internal.
fn db_err(e: sqlx::Error) -> BrokerError {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => BrokerError::Unavailable(e.to_string()),
        other => BrokerError::Internal(other.to_string()),
    }
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn to_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
