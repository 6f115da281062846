//! # SQLite backend
//!
//! The submodules hold the "low-level" SQLite interactions. They are plain functions that accept a
//! `&mut SqliteConnection`, so callers can run them on a pooled connection or compose several of them inside one
//! atomic transaction by passing `&mut *tx`. [`SqliteDatabase`] does the composing and implements the backend traits.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

mod sqlite_impl;

pub mod labels;
pub mod ledger;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod users;
pub mod webhook_queue;

pub use sqlite_impl::SqliteDatabase;

const SQLITE_DB_URL: &str = "sqlite://data/marketplace.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

pub fn db_url() -> String {
    let result = env::var("MKT_DATABASE_URL").unwrap_or_else(|_| {
        info!("🪛️ MKT_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    // Writers queue on the database lock instead of failing straight away
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

/// True if the error is a `UNIQUE` constraint violation.
pub(crate) fn is_unique_violation(e: &SqlxError) -> bool {
    matches!(e, SqlxError::Database(db) if db.is_unique_violation())
}

/// True if the error is a `CHECK` constraint violation.
pub(crate) fn is_check_violation(e: &SqlxError) -> bool {
    matches!(e, SqlxError::Database(db) if db.is_check_violation())
}
