use crate::traits::{
    CatalogError,
    CatalogManagement,
    LabelManagement,
    LedgerManagement,
    NotificationManagement,
    OrderManagement,
    UserDirectory,
    WebhookQueue,
};

/// The highest level of behaviour for a storage backend: every capability the engine and its workers use.
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase:
    Clone
    + OrderManagement
    + CatalogManagement
    + UserDirectory
    + LedgerManagement
    + WebhookQueue
    + NotificationManagement
    + LabelManagement
{
    /// The URL of the database
    fn url(&self) -> &str;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), CatalogError> {
        Ok(())
    }
}
