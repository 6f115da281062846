use log::trace;
use settle_common::Cents;
use sqlx::SqliteConnection;

use crate::db_types::{Address, BalanceKind, NewAddress, NewUser, UserBalance, UserProfile};

pub async fn insert_user(user: NewUser, conn: &mut SqliteConnection) -> Result<UserProfile, sqlx::Error> {
    let user = sqlx::query_as(
        r#"INSERT INTO users (name, email, cpf, subscription_tier, promo_type)
        VALUES ($1, $2, $3, $4, $5) RETURNING *"#,
    )
    .bind(user.name)
    .bind(user.email)
    .bind(user.cpf)
    .bind(user.subscription_tier)
    .bind(user.promo_type)
    .fetch_one(conn)
    .await?;
    Ok(user)
}

pub async fn fetch_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<UserProfile>, sqlx::Error> {
    let user = sqlx::query_as("SELECT * FROM users WHERE id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(user)
}

pub async fn insert_address(address: NewAddress, conn: &mut SqliteConnection) -> Result<Address, sqlx::Error> {
    let address = sqlx::query_as(
        r#"INSERT INTO addresses (user_id, street, number, neighborhood, city, state, zipcode)
        VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *"#,
    )
    .bind(address.user_id)
    .bind(address.street)
    .bind(address.number)
    .bind(address.neighborhood)
    .bind(address.city)
    .bind(address.state)
    .bind(address.zipcode)
    .fetch_one(conn)
    .await?;
    Ok(address)
}

pub async fn fetch_address(address_id: i64, conn: &mut SqliteConnection) -> Result<Option<Address>, sqlx::Error> {
    let address =
        sqlx::query_as("SELECT * FROM addresses WHERE id = $1").bind(address_id).fetch_optional(conn).await?;
    Ok(address)
}

/// The user's first registered address, used as the origin of their parcels.
pub async fn fetch_default_address(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<Address>, sqlx::Error> {
    let address = sqlx::query_as("SELECT * FROM addresses WHERE user_id = $1 ORDER BY id LIMIT 1")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(address)
}

pub async fn fetch_balance(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<UserBalance>, sqlx::Error> {
    let balance = sqlx::query_as("SELECT id AS user_id, balance, cashback_balance FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(balance)
}

/// Moves one of the user's cached balances by `delta`.
///
/// The update only goes through if the resulting balance is non-negative. `None` means either the user does not exist
/// or the balance would have gone below zero; callers tell these apart with [`fetch_balance`].
pub async fn adjust_balance(
    user_id: i64,
    kind: BalanceKind,
    delta: Cents,
    conn: &mut SqliteConnection,
) -> Result<Option<UserBalance>, sqlx::Error> {
    let sql = match kind {
        BalanceKind::Earnings => {
            r#"UPDATE users SET balance = balance + $1 WHERE id = $2 AND balance + $1 >= 0
            RETURNING id AS user_id, balance, cashback_balance"#
        },
        BalanceKind::Cashback => {
            r#"UPDATE users SET cashback_balance = cashback_balance + $1 WHERE id = $2 AND cashback_balance + $1 >= 0
            RETURNING id AS user_id, balance, cashback_balance"#
        },
    };
    let balance: Option<UserBalance> = sqlx::query_as(sql).bind(delta).bind(user_id).fetch_optional(conn).await?;
    trace!("🗃️ Adjusted {kind:?} balance of user #{user_id} by {delta}: {balance:?}");
    Ok(balance)
}

pub async fn incr_total_sales(user_id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET total_sales = total_sales + 1 WHERE id = $1").bind(user_id).execute(conn).await?;
    Ok(())
}
