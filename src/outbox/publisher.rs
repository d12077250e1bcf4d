use crate::config::Config;
use crate::outbox::consumers::OutboxConsumer;
use crate::utils::error::{AppError, AppResult};
use chrono::{Duration as ChronoDuration, Utc};
use futures::stream::{self, StreamExt};
use sqlx::MySqlPool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const CONCURRENCY: usize = 10;
const VISIBILITY_TIMEOUT_MINUTES: i64 = 5;

#[derive(sqlx::FromRow)]
struct OutboxRow {
    id: Uuid,
    event_type: String,
    payload: Vec<u8>,
    retry_count: i32,
}

/// Background publisher per spec.md §4.H: poll-claim a batch under `FOR
/// UPDATE SKIP LOCKED`, dispatch concurrently to the consumer registered for
/// each row's `event_type`, retry failures with backoff, dead-letter after
/// `max_retries`. Grounded in `other_examples`' `identity-service` outbox
/// consumer (poll/claim/dispatch/backoff shape) and `solver-ralph`'s outbox
/// (event_type → handler dispatch table), adapted from Postgres to MySQL.
pub struct OutboxPublisher {
    pool: MySqlPool,
    poll_interval: Duration,
    batch: i64,
    max_retries: i32,
    retry_delays: Vec<Duration>,
    shutdown_grace: Duration,
    consumers: HashMap<String, Arc<dyn OutboxConsumer>>,
}

impl OutboxPublisher {
    pub fn new(pool: MySqlPool, config: &Config) -> Self {
        OutboxPublisher {
            pool,
            poll_interval: config.outbox_poll,
            batch: config.outbox_batch,
            max_retries: config.outbox_max_retries,
            retry_delays: config.outbox_retry_delays.clone(),
            shutdown_grace: config.shutdown_grace,
            consumers: HashMap::new(),
        }
    }

    /// An event type with no registered consumer is marked published on
    /// first sight rather than dead-lettered: nothing downstream needs it,
    /// so retrying it would only waste `retry_count` budget.
    pub fn register(&mut self, event_type: &str, consumer: Arc<dyn OutboxConsumer>) {
        self.consumers.insert(event_type.to_string(), consumer);
    }

    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                poll_interval_ms = %self.poll_interval.as_millis(),
                batch = self.batch,
                max_retries = self.max_retries,
                "outbox publisher starting"
            );
            loop {
                if *shutdown.borrow() {
                    break;
                }

                match self.poll_once().await {
                    Ok(0) => {}
                    Ok(n) => debug!(claimed = n, "outbox batch dispatched"),
                    Err(e) => error!(error = %e, "outbox poll failed"),
                }

                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    _ = shutdown.changed() => {}
                }
            }
            info!("outbox publisher stopping, draining in-flight work");
        })
    }

    async fn poll_once(&self) -> AppResult<usize> {
        let rows = self.claim_batch().await?;
        let count = rows.len();
        let _ = tokio::time::timeout(
            self.shutdown_grace,
            stream::iter(rows).map(|row| self.dispatch(row)).buffer_unordered(CONCURRENCY).collect::<Vec<_>>(),
        )
        .await;
        Ok(count)
    }

    async fn claim_batch(&self) -> AppResult<Vec<OutboxRow>> {
        let mut tx = self.pool.begin().await?;
        let stale_before = Utc::now() - ChronoDuration::minutes(VISIBILITY_TIMEOUT_MINUTES);

        let rows = sqlx::query_as!(
            OutboxRow,
            r#"
            SELECT id, event_type, payload, retry_count
            FROM event_outbox
            WHERE published_at IS NULL
              AND (processing_at IS NULL OR processing_at < ?)
              AND retry_count < ?
            ORDER BY created_at ASC
            LIMIT ?
            FOR UPDATE SKIP LOCKED
            "#,
            stale_before,
            self.max_retries,
            self.batch,
        )
        .fetch_all(&mut *tx)
        .await?;

        let now = Utc::now();
        for row in &rows {
            sqlx::query!("UPDATE event_outbox SET processing_at = ? WHERE id = ?", now, row.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(rows)
    }

    async fn dispatch(&self, row: OutboxRow) {
        let Some(consumer) = self.consumers.get(&row.event_type) else {
            debug!(event_type = %row.event_type, "no consumer registered, acking without delivery");
            self.mark_published(row.id).await;
            return;
        };

        let event = match serde_json::from_slice(&row.payload) {
            Ok(event) => event,
            Err(e) => {
                error!(event_id = %row.id, error = %e, "outbox payload failed to deserialize, dead-lettering");
                self.mark_failed(row.id, row.retry_count, &AppError::MalformedPayload(e.to_string())).await;
                return;
            }
        };

        match consumer.handle(&event).await {
            Ok(()) => self.mark_published(row.id).await,
            Err(e) => {
                warn!(event_id = %row.id, event_type = %row.event_type, error = %e, retry_count = row.retry_count, "consumer failed, scheduling retry");
                self.mark_failed(row.id, row.retry_count, &e).await;
            }
        }
    }

    async fn mark_published(&self, id: Uuid) {
        let now = Utc::now();
        if let Err(e) = sqlx::query!(
            "UPDATE event_outbox SET published_at = ?, processing_at = NULL WHERE id = ?",
            now,
            id
        )
        .execute(&self.pool)
        .await
        {
            error!(event_id = %id, error = %e, "failed to mark outbox row published");
        }
    }

    async fn mark_failed(&self, id: Uuid, retry_count: i32, error: &AppError) {
        let delay = self
            .retry_delays
            .get(retry_count as usize)
            .copied()
            .unwrap_or_else(|| self.retry_delays.last().copied().unwrap_or(Duration::from_secs(4)));
        tokio::time::sleep(delay).await;

        let last_error = error.to_string();
        if let Err(e) = sqlx::query!(
            r#"UPDATE event_outbox SET retry_count = retry_count + 1, processing_at = NULL, last_error = ? WHERE id = ?"#,
            last_error,
            id
        )
        .execute(&self.pool)
        .await
        {
            error!(event_id = %id, error = %e, "failed to record outbox retry");
        }
    }
}
