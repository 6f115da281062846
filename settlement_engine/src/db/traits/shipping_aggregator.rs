use crate::{
    shipping_objects::{LabelRequest, PurchasedLabel, ShippingOption, ShippingQuoteRequest, TrackingInfo},
    traits::GatewayError,
};

/// The external shipping aggregator.
#[allow(async_fn_in_trait)]
pub trait ShippingAggregator {
    async fn quote(&self, request: ShippingQuoteRequest) -> Result<Vec<ShippingOption>, GatewayError>;

    async fn track(&self, tracking_code: &str) -> Result<TrackingInfo, GatewayError>;

    /// Buys a postage label and queues it for generation. The label is paid from the marketplace's aggregator
    /// account.
    async fn purchase_label(&self, request: LabelRequest) -> Result<PurchasedLabel, GatewayError>;

    /// A printable URL for a purchased label.
    async fn label_url(&self, label_id: &str) -> Result<String, GatewayError>;

    async fn cancel_label(&self, label_id: &str) -> Result<(), GatewayError>;
}
