use sqlx::SqliteConnection;

use crate::db_types::{NewNotification, Notification};

pub async fn insert_notification(
    notification: NewNotification,
    conn: &mut SqliteConnection,
) -> Result<Notification, sqlx::Error> {
    let data = notification.data.map(|d| d.to_string());
    let notification = sqlx::query_as(
        r#"INSERT INTO notifications (user_id, kind, title, message, data)
        VALUES ($1, $2, $3, $4, $5) RETURNING *"#,
    )
    .bind(notification.user_id)
    .bind(notification.kind)
    .bind(notification.title)
    .bind(notification.message)
    .bind(data)
    .fetch_one(conn)
    .await?;
    Ok(notification)
}

pub async fn fetch_notifications(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Notification>, sqlx::Error> {
    let notifications = sqlx::query_as("SELECT * FROM notifications WHERE user_id = $1 ORDER BY id DESC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(notifications)
}
