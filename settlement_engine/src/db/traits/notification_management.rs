use crate::{
    db_types::{NewNotification, Notification},
    traits::CatalogError,
};

/// The notification sink. Notifications belong to users, so failures are reported as [`CatalogError`]s.
#[allow(async_fn_in_trait)]
pub trait NotificationManagement {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, CatalogError>;

    /// Most recent first.
    async fn fetch_notifications(&self, user_id: i64) -> Result<Vec<Notification>, CatalogError>;
}
