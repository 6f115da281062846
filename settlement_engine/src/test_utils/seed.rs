//! Seeds the tables the engine reads but never writes: users, addresses, products and carts.
use chrono::Duration;
use settle_common::Cents;

use crate::{
    db::sqlite::{products, users},
    db_types::{Address, NewAddress, NewProduct, NewUser, Product, PromoType, SubscriptionTier, UserProfile},
    SqliteDatabase,
};

pub async fn seed_user(db: &SqliteDatabase, name: &str, tier: SubscriptionTier) -> UserProfile {
    seed_user_with_promo(db, name, tier, None).await
}

pub async fn seed_user_with_promo(
    db: &SqliteDatabase,
    name: &str,
    tier: SubscriptionTier,
    promo: Option<PromoType>,
) -> UserProfile {
    let email = format!("{}.{}@example.com", name.to_lowercase().replace(' ', "."), rand::random::<u32>());
    let mut user = NewUser::new(name, email).with_tier(tier).with_cpf("123.456.789-09");
    if let Some(promo) = promo {
        user = user.with_promo(promo);
    }
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    users::insert_user(user, &mut conn).await.expect("Error inserting user")
}

pub async fn seed_address(db: &SqliteDatabase, user_id: i64) -> Address {
    let address = NewAddress {
        user_id,
        street: "Rua Augusta".into(),
        number: "1500".into(),
        neighborhood: "Consolação".into(),
        city: "São Paulo".into(),
        state: "SP".into(),
        zipcode: "01304-001".into(),
    };
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    users::insert_address(address, &mut conn).await.expect("Error inserting address")
}

pub async fn seed_product(db: &SqliteDatabase, seller_id: i64, price: Cents) -> Product {
    let product = NewProduct { seller_id, title: format!("Jaqueta jeans #{}", rand::random::<u16>()), price };
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    products::insert_product(product, &mut conn).await.expect("Error inserting product")
}

pub async fn add_to_cart(db: &SqliteDatabase, user_id: i64, product_id: i64) {
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    products::add_to_cart(user_id, product_id, &mut conn).await.expect("Error adding to cart");
}

pub async fn cart_count(db: &SqliteDatabase, product_id: i64) -> i64 {
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    products::cart_count(product_id, &mut conn).await.expect("Error counting carts")
}

/// Moves an order's creation time into the past, so that expiry sweeps pick it up.
pub async fn age_order(db: &SqliteDatabase, order_id: i64, age: Duration) {
    sqlx::query("UPDATE orders SET created_at = datetime('now', $1) WHERE id = $2")
        .bind(format!("-{} minutes", age.num_minutes()))
        .bind(order_id)
        .execute(db.pool())
        .await
        .expect("Error ageing order");
}

/// Moves an order's delivery time into the past, so that the completion sweep picks it up.
pub async fn age_delivery(db: &SqliteDatabase, order_id: i64, age: Duration) {
    sqlx::query("UPDATE orders SET delivered_at = datetime('now', $1) WHERE id = $2")
        .bind(format!("-{} minutes", age.num_minutes()))
        .bind(order_id)
        .execute(db.pool())
        .await
        .expect("Error ageing delivery");
}
