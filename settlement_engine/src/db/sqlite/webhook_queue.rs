use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db_types::{RetryStatus, WebhookRetry};

/// Queues a notification for another attempt.
///
/// An entry that is still pending is returned unchanged. An entry that was already retried to completion (or
/// abandoned) is re-armed, since the same notification id can be redelivered for a later change to the payment.
pub async fn enqueue_retry(
    notification_id: &str,
    payment_id: &str,
    error: &str,
    next_attempt_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<WebhookRetry, sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO webhook_retries (notification_id, payment_id, last_error, next_attempt_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (notification_id) DO UPDATE SET
            status = 'pending',
            attempts = 1,
            payment_id = excluded.payment_id,
            last_error = excluded.last_error,
            next_attempt_at = excluded.next_attempt_at,
            updated_at = CURRENT_TIMESTAMP
        WHERE webhook_retries.status <> 'pending'"#,
    )
    .bind(notification_id)
    .bind(payment_id)
    .bind(error)
    .bind(next_attempt_at)
    .execute(&mut *conn)
    .await?;
    let retry = sqlx::query_as("SELECT * FROM webhook_retries WHERE notification_id = $1")
        .bind(notification_id)
        .fetch_one(conn)
        .await?;
    Ok(retry)
}

pub async fn fetch_due_retries(
    now: DateTime<Utc>,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<WebhookRetry>, sqlx::Error> {
    let retries = sqlx::query_as(
        r#"SELECT * FROM webhook_retries
        WHERE status = 'pending' AND datetime(next_attempt_at) <= datetime($1)
        ORDER BY datetime(next_attempt_at), id
        LIMIT $2"#,
    )
    .bind(now)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(retries)
}

/// Returns `false` if there is no such entry.
pub async fn mark_retry_done(retry_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE webhook_retries SET status = 'done', updated_at = CURRENT_TIMESTAMP WHERE id = $1")
            .bind(retry_id)
            .execute(conn)
            .await?;
    Ok(result.rows_affected() == 1)
}

/// Counts a failed attempt. Once `max_attempts` is reached the entry is abandoned.
pub async fn record_retry_failure(
    retry_id: i64,
    error: &str,
    next_attempt_at: DateTime<Utc>,
    max_attempts: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<RetryStatus>, sqlx::Error> {
    let status = sqlx::query_scalar(
        r#"UPDATE webhook_retries SET
            attempts = attempts + 1,
            last_error = $1,
            next_attempt_at = $2,
            status = CASE WHEN attempts + 1 >= $3 THEN 'abandoned' ELSE 'pending' END,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $4 AND status = 'pending'
        RETURNING status"#,
    )
    .bind(error)
    .bind(next_attempt_at)
    .bind(max_attempts)
    .bind(retry_id)
    .fetch_optional(conn)
    .await?;
    Ok(status)
}
