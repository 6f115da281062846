use sqlx::SqliteConnection;

use crate::db_types::{NewShippingLabel, ShippingLabel};

/// Fails with a unique violation if the order already has a purchased label.
pub async fn insert_label(label: NewShippingLabel, conn: &mut SqliteConnection) -> Result<ShippingLabel, sqlx::Error> {
    let label = sqlx::query_as(
        r#"INSERT INTO shipping_labels (order_id, label_id, service_id, protocol, price)
        VALUES ($1, $2, $3, $4, $5) RETURNING *"#,
    )
    .bind(label.order_id)
    .bind(label.label_id)
    .bind(label.service_id)
    .bind(label.protocol)
    .bind(label.price)
    .fetch_one(conn)
    .await?;
    Ok(label)
}

pub async fn fetch_live_label(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<ShippingLabel>, sqlx::Error> {
    let label = sqlx::query_as("SELECT * FROM shipping_labels WHERE order_id = $1 AND status = 'purchased'")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(label)
}

/// Returns `None` if the label was not live, i.e. it was cancelled already.
pub async fn cancel_label(id: i64, conn: &mut SqliteConnection) -> Result<Option<ShippingLabel>, sqlx::Error> {
    let label = sqlx::query_as(
        r#"UPDATE shipping_labels SET status = 'cancelled', updated_at = CURRENT_TIMESTAMP
        WHERE id = $1 AND status = 'purchased'
        RETURNING *"#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(label)
}
