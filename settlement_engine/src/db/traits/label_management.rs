use crate::{
    db_types::{NewShippingLabel, ShippingLabel},
    traits::OrderFlowError,
};

/// Storage for the postage labels bought for orders.
#[allow(async_fn_in_trait)]
pub trait LabelManagement {
    /// Stores a purchased label. Fails with [`OrderFlowError::LabelAlreadyPurchased`] if the order already has a
    /// purchased label.
    async fn insert_shipping_label(&self, label: NewShippingLabel) -> Result<ShippingLabel, OrderFlowError>;

    /// The order's purchased label, if it has one.
    async fn fetch_shipping_label(&self, order_id: i64) -> Result<Option<ShippingLabel>, OrderFlowError>;

    /// Marks the label cancelled. Returns `None` if it was no longer purchased.
    async fn cancel_shipping_label(&self, id: i64) -> Result<Option<ShippingLabel>, OrderFlowError>;
}
