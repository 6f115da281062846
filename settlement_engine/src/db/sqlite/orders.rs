use chrono::{DateTime, Utc};
use log::trace;
use settle_common::Cents;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderNumber, OrderPayment, OrderStatusType, OrderTransition, PaymentMethod},
    order_objects::{OrderQueryFilter, SalesStats},
};

/// Inserts a new order. This is not atomic with the product reservation. [`super::SqliteDatabase`] wraps both calls
/// in a transaction.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let b = order.breakdown;
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_number,
                buyer_id,
                seller_id,
                product_id,
                product_price,
                shipping_price,
                shipping_service,
                commission_rate,
                commission_amount,
                seller_receives,
                total_amount,
                payment_method,
                shipping_address_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *;
        "#,
    )
    .bind(order.order_number)
    .bind(order.buyer_id)
    .bind(order.seller_id)
    .bind(order.product_id)
    .bind(b.product_price)
    .bind(b.shipping_price)
    .bind(order.shipping_service)
    .bind(b.commission_rate)
    .bind(b.commission_amount)
    .bind(b.seller_receives)
    .bind(b.total_amount)
    .bind(order.payment_method)
    .bind(order.shipping_address_id)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_number(
    number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_number = $1")
        .bind(number.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// Finds the order for a gateway payment id. The current payment id on the order is checked first, then the history
/// of attempts, so notifications for an earlier attempt still resolve.
pub async fn fetch_order_by_payment_id(
    payment_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
        SELECT * FROM orders
        WHERE payment_id = $1 OR id IN (SELECT order_id FROM order_payments WHERE payment_id = $1)
        ORDER BY payment_id = $1 DESC
        LIMIT 1
        "#,
    )
    .bind(payment_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Appends to the attempt history (idempotently) and makes `payment_id` the order's current payment.
pub async fn record_payment_attempt(
    order_id: i64,
    payment_id: &str,
    method: PaymentMethod,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query(
        "INSERT INTO order_payments (order_id, payment_id, payment_method) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
    )
    .bind(order_id)
    .bind(payment_id)
    .bind(method)
    .execute(&mut *conn)
    .await?;
    let order = sqlx::query_as(
        r#"UPDATE orders SET payment_id = $1, payment_method = $2, updated_at = CURRENT_TIMESTAMP
        WHERE id = $3 RETURNING *"#,
    )
    .bind(payment_id)
    .bind(method)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_payment_attempts(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderPayment>, sqlx::Error> {
    let attempts = sqlx::query_as("SELECT * FROM order_payments WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(attempts)
}

/// Moves the order to `transition.target`, but only if its current status is one of the legal predecessors of the
/// target. Returns `None` when the order does not exist or is in any other state, and nothing is changed.
///
/// The timestamp column belonging to the target state is filled in as part of the same statement.
pub async fn transition_order(
    order_id: i64,
    transition: OrderTransition,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let target = transition.target;
    let predecessors = OrderStatusType::predecessors(target);
    if predecessors.is_empty() {
        return Ok(None);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE orders SET status = ");
    builder.push_bind(target);
    builder.push(", updated_at = CURRENT_TIMESTAMP");
    match target {
        OrderStatusType::PendingShipment => {
            builder.push(", paid_at = COALESCE(paid_at, CURRENT_TIMESTAMP)");
        },
        OrderStatusType::Shipped => {
            builder.push(", shipped_at = CURRENT_TIMESTAMP, tracking_code = ");
            builder.push_bind(transition.tracking_code);
            builder.push(", shipping_carrier = ");
            builder.push_bind(transition.carrier);
        },
        OrderStatusType::Delivered => {
            builder.push(", delivered_at = CURRENT_TIMESTAMP");
        },
        OrderStatusType::Completed => {
            builder.push(", completed_at = CURRENT_TIMESTAMP");
        },
        OrderStatusType::Cancelled | OrderStatusType::PaymentFailed => {
            builder.push(", cancelled_at = CURRENT_TIMESTAMP, cancel_reason = ");
            builder.push_bind(transition.reason);
        },
        OrderStatusType::Refunded | OrderStatusType::Chargeback => {
            builder.push(", cancel_reason = COALESCE(");
            builder.push_bind(transition.reason);
            builder.push(", cancel_reason)");
        },
        _ => {},
    }
    builder.push(" WHERE id = ");
    builder.push_bind(order_id);
    builder.push(" AND status IN (");
    let mut statuses = builder.separated(", ");
    for status in predecessors {
        statuses.push_bind(status);
    }
    statuses.push_unseparated(") RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let order = builder.build_query_as::<Order>().fetch_optional(conn).await?;
    Ok(order)
}

/// Fetches orders according to the criteria in the `OrderQueryFilter`, newest first.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(buyer_id) = query.buyer_id {
        where_clause.push("buyer_id = ");
        where_clause.push_bind_unseparated(buyer_id);
    }
    if let Some(seller_id) = query.seller_id {
        where_clause.push("seller_id = ");
        where_clause.push_bind_unseparated(seller_id);
    }
    if !query.statuses.is_empty() {
        let statuses = query.statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    if let Some(method) = query.payment_method {
        where_clause.push("payment_method = ");
        where_clause.push_bind_unseparated(method);
    }
    if let Some(since) = query.since {
        where_clause.push("datetime(created_at) >= datetime(");
        where_clause.push_bind_unseparated(since);
        where_clause.push_unseparated(")");
    }
    if let Some(until) = query.until {
        where_clause.push("datetime(created_at) <= datetime(");
        where_clause.push_bind_unseparated(until);
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY created_at DESC, id DESC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    Ok(orders)
}

pub async fn fetch_unpaid_orders_older_than(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"SELECT * FROM orders WHERE status = 'pending_payment' AND datetime(created_at) < datetime($1)
        ORDER BY id"#,
    )
    .bind(cutoff)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

pub async fn fetch_delivered_orders_older_than(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"SELECT * FROM orders WHERE status = 'delivered' AND datetime(delivered_at) < datetime($1)
        ORDER BY id"#,
    )
    .bind(cutoff)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

pub async fn fetch_orders_in_transit(conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"SELECT * FROM orders WHERE status IN ('shipped', 'in_transit') AND tracking_code IS NOT NULL
        ORDER BY id"#,
    )
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

/// Revenue and order count cover paid orders created since `since`. The shipment counters are current totals.
pub async fn sales_stats(
    seller_id: i64,
    since: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<SalesStats, sqlx::Error> {
    let paid = OrderStatusType::ALL
        .iter()
        .filter(|s| s.is_paid())
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(",");
    let sql = format!(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN status IN ({paid}) AND datetime(created_at) >= datetime($2) THEN seller_receives END), 0),
            COALESCE(SUM(CASE WHEN status IN ({paid}) AND datetime(created_at) >= datetime($2) THEN 1 END), 0),
            COALESCE(SUM(CASE WHEN status = 'pending_shipment' THEN 1 END), 0),
            COALESCE(SUM(CASE WHEN status IN ('shipped', 'in_transit') THEN 1 END), 0)
        FROM orders WHERE seller_id = $1
        "#
    );
    let (revenue, total_orders, pending_shipment, in_transit): (i64, i64, i64, i64) =
        sqlx::query_as(&sql).bind(seller_id).bind(since).fetch_one(conn).await?;
    Ok(SalesStats { total_revenue: Cents::from(revenue), total_orders, pending_shipment, in_transit })
}
