use thiserror::Error;

use crate::db_types::{Address, Product, UserProfile};

#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("User {0} does not exist")]
    UserNotFound(i64),
}

impl From<sqlx::Error> for CatalogError {
    fn from(e: sqlx::Error) -> Self {
        CatalogError::DatabaseError(e.to_string())
    }
}

/// Product lookups and cart maintenance.
///
/// Product *reservation* is not part of this trait. It happens inside [`crate::OrderManagement::insert_order`] so that
/// reserving the product and creating the order are a single atomic step.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, CatalogError>;

    /// Removes the product from every shopping cart. Returns the number of cart rows removed.
    async fn remove_product_from_carts(&self, product_id: i64) -> Result<u64, CatalogError>;
}

/// Read access to user profiles and addresses.
#[allow(async_fn_in_trait)]
pub trait UserDirectory {
    async fn fetch_user(&self, user_id: i64) -> Result<Option<UserProfile>, CatalogError>;

    async fn fetch_address(&self, address_id: i64) -> Result<Option<Address>, CatalogError>;

    /// The address parcels from this user are sent from. `None` if the user has not registered one.
    async fn fetch_default_address(&self, user_id: i64) -> Result<Option<Address>, CatalogError>;
}
