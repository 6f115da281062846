use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{NewProduct, Product};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, sqlx::Error> {
    let product = sqlx::query_as("INSERT INTO products (seller_id, title, price) VALUES ($1, $2, $3) RETURNING *")
        .bind(product.seller_id)
        .bind(product.title)
        .bind(product.price)
        .fetch_one(conn)
        .await?;
    Ok(product)
}

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let product =
        sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await?;
    Ok(product)
}

/// Marks an `active` product as `sold`. Returns `false` if the product was not active, i.e. someone else got there
/// first, or it was withdrawn from sale.
pub async fn reserve_product(product_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE products SET status = 'sold', updated_at = CURRENT_TIMESTAMP WHERE id = $1 AND status = 'active'",
    )
    .bind(product_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Puts a sold or reserved product back on sale. Deleted products stay deleted.
pub async fn release_product(product_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE products SET status = 'active', updated_at = CURRENT_TIMESTAMP
        WHERE id = $1 AND status IN ('sold', 'reserved')"#,
    )
    .bind(product_id)
    .execute(conn)
    .await?;
    trace!("🗃️ Release of product {product_id} affected {} rows", result.rows_affected());
    Ok(result.rows_affected() == 1)
}

pub async fn add_to_cart(user_id: i64, product_id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO cart_items (user_id, product_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
        .bind(user_id)
        .bind(product_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn remove_product_from_carts(product_id: i64, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cart_items WHERE product_id = $1").bind(product_id).execute(conn).await?;
    Ok(result.rows_affected())
}

pub async fn cart_count(product_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE product_id = $1")
        .bind(product_id)
        .fetch_one(conn)
        .await?;
    Ok(count)
}
