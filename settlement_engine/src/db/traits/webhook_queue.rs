use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{RetryStatus, WebhookRetry};

#[derive(Debug, Clone, Error)]
pub enum WebhookQueueError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Retry entry {0} does not exist")]
    RetryNotFound(i64),
}

impl From<sqlx::Error> for WebhookQueueError {
    fn from(e: sqlx::Error) -> Self {
        WebhookQueueError::DatabaseError(e.to_string())
    }
}

/// Durable storage for webhook notifications whose processing failed. Entries are keyed by the notification id, so
/// queuing the same notification twice leaves a single entry.
#[allow(async_fn_in_trait)]
pub trait WebhookQueue {
    /// Queues a notification for another attempt at `next_attempt_at`. A pending entry for the notification is left as
    /// is. A finished or abandoned entry is re-armed with a fresh attempt count.
    async fn enqueue_retry(
        &self,
        notification_id: &str,
        payment_id: &str,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<WebhookRetry, WebhookQueueError>;

    /// Pending entries whose next attempt is due at `now`, oldest first.
    async fn fetch_due_retries(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<WebhookRetry>, WebhookQueueError>;

    async fn mark_retry_done(&self, retry_id: i64) -> Result<(), WebhookQueueError>;

    /// Records a failed attempt. Once `attempts` reaches `max_attempts` the entry is abandoned, otherwise it is
    /// rescheduled at `next_attempt_at`.
    async fn record_retry_failure(
        &self,
        retry_id: i64,
        error: &str,
        next_attempt_at: DateTime<Utc>,
        max_attempts: i64,
    ) -> Result<RetryStatus, WebhookQueueError>;
}
