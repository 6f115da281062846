//! Marketplace Settlement Engine
//!
//! The settlement engine turns a purchase intent into a paid, shipped and settled transaction while keeping seller
//! balances, buyer cashback and platform commission consistent. It is provider-agnostic: payment gateways and
//! shipping aggregators plug in through the [`traits::PaymentGateway`] and [`traits::ShippingAggregator`] traits.
//!
//! The library is divided into two main sections:
//! 1. Storage ([`mod@traits`] and the SQLite backend, [`SqliteDatabase`]). You should not need to talk to the database
//!    directly. The data types stored in it are defined in [`db_types`] and are public.
//! 2. The engine API: [`OrderFactoryApi`], [`PaymentApi`], [`WebhookReconcilerApi`], [`ShipmentApi`], [`LedgerApi`],
//!    [`WithdrawalApi`] and [`AccountApi`]. Each one is generic over the backend traits it needs.
//!
//! The engine also publishes events (see [`events`]) when orders are created, paid, annulled, shipped or settled and
//! when withdrawals are resolved. Notifications for users are published as events too, so that the host decides where
//! they end up.
mod db;

pub mod db_types;
pub mod events;
pub mod helpers;
mod settle_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use db::traits;
pub use db::traits::{
    CatalogError,
    CatalogManagement,
    GatewayError,
    LabelManagement,
    LedgerError,
    LedgerManagement,
    MarketplaceDatabase,
    NotificationManagement,
    OrderFlowError,
    OrderManagement,
    PaymentGateway,
    ShippingAggregator,
    UserDirectory,
    WebhookQueue,
    WebhookQueueError,
};
pub use settle_api::{
    accounts_api::AccountApi,
    commission_policy::CommissionPolicy,
    ledger_api::LedgerApi,
    ledger_objects,
    notifications,
    order_factory::{OrderFactoryApi, PricePreview, PurchaseRequest, ShippingChoice, DEFAULT_SHIPPING_PRICE},
    order_flow_api::OrderFlowApi,
    order_objects,
    payment_api::PaymentApi,
    payment_objects,
    reconciler_api::{RetryPolicy, RetrySweep, WebhookOutcome, WebhookReconcilerApi},
    shipment_api::ShipmentApi,
    shipping_objects,
    withdrawal_api::{WithdrawalApi, DEFAULT_MIN_WITHDRAWAL},
};
