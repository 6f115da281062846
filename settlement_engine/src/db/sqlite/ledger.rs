use log::trace;
use settle_common::Cents;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewTransaction, Transaction, TransactionStatus, TransactionType},
    ledger_objects::{LedgerTotals, TransactionQueryFilter},
};

/// Appends an entry to the ledger. Entries are never updated, except for the status of withdrawals.
///
/// This does not touch the cached balances. Use it inside a transaction together with
/// [`super::users::adjust_balance`].
pub async fn insert_transaction(entry: NewTransaction, conn: &mut SqliteConnection) -> Result<Transaction, sqlx::Error> {
    let tx = sqlx::query_as(
        r#"
        INSERT INTO transactions (user_id, order_id, type, amount, status, description, reference_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(entry.user_id)
    .bind(entry.order_id)
    .bind(entry.tx_type)
    .bind(entry.amount)
    .bind(entry.status)
    .bind(entry.description)
    .bind(entry.reference_id)
    .fetch_one(conn)
    .await?;
    Ok(tx)
}

pub async fn fetch_transaction(tx_id: i64, conn: &mut SqliteConnection) -> Result<Option<Transaction>, sqlx::Error> {
    let tx = sqlx::query_as("SELECT * FROM transactions WHERE id = $1").bind(tx_id).fetch_optional(conn).await?;
    Ok(tx)
}

/// Moves a withdrawal out of `pending`. Returns `None` if the entry was not pending, so two admins resolving the same
/// withdrawal at the same time cannot both succeed.
pub async fn resolve_pending_withdrawal(
    tx_id: i64,
    status: TransactionStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    let tx = sqlx::query_as(
        r#"UPDATE transactions SET status = $1, updated_at = CURRENT_TIMESTAMP
        WHERE id = $2 AND type = 'withdrawal' AND status = 'pending'
        RETURNING *"#,
    )
    .bind(status)
    .bind(tx_id)
    .fetch_optional(conn)
    .await?;
    Ok(tx)
}

/// Fetches ledger entries matching the filter, newest first.
pub async fn search_transactions(
    query: TransactionQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM transactions ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(user_id) = query.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(user_id);
    }
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id);
    }
    if !query.tx_types.is_empty() {
        let types = query.tx_types.iter().map(|t| format!("'{t}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("type IN ({types})"));
    }
    if !query.statuses.is_empty() {
        let statuses = query.statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    builder.push(" ORDER BY created_at DESC, id DESC");
    if let Some(limit) = query.limit {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
    }
    trace!("🗃️ Executing query: {}", builder.sql());
    let entries = builder.build_query_as::<Transaction>().fetch_all(conn).await?;
    Ok(entries)
}

/// Replays every entry the user has, summed per balance kind.
pub async fn ledger_totals(user_id: i64, conn: &mut SqliteConnection) -> Result<LedgerTotals, sqlx::Error> {
    let rows: Vec<(TransactionType, i64)> =
        sqlx::query_as("SELECT type, COALESCE(SUM(amount), 0) FROM transactions WHERE user_id = $1 GROUP BY type")
            .bind(user_id)
            .fetch_all(conn)
            .await?;
    let totals = rows.into_iter().fold(LedgerTotals::default(), |mut totals, (tx_type, sum)| {
        match tx_type.balance_kind() {
            crate::db_types::BalanceKind::Earnings => totals.earnings += Cents::from(sum),
            crate::db_types::BalanceKind::Cashback => totals.cashback += Cents::from(sum),
        }
        totals
    });
    Ok(totals)
}
