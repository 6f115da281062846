//! # Backend contracts
//!
//! The traits in this module define what a storage backend, or an external collaborator, must provide for the
//! settlement engine to work. The engine APIs are generic over these traits, so each API only asks for the behaviour
//! it actually uses.
//!
//! * [`OrderManagement`] stores orders and moves them through their lifecycle with conditional updates.
//! * [`CatalogManagement`] and [`UserDirectory`] are the read side of the catalog and user collaborators, plus cart
//!   cleanup once a product has been paid for.
//! * [`LedgerManagement`] is the only place where balances change.
//! * [`WebhookQueue`] is the durable retry queue for gateway notifications that could not be processed.
//! * [`NotificationManagement`] persists in-app notifications.
//! * [`LabelManagement`] keeps the postage labels bought for orders.
//! * [`MarketplaceDatabase`] bundles all of the above for a single backend.
//!
//! [`PaymentGateway`] and [`ShippingAggregator`] describe the external HTTP collaborators. The server crate provides
//! the implementations.
mod catalog_management;
mod label_management;
mod ledger_management;
mod marketplace_database;
mod notification_management;
mod order_management;
mod payment_gateway;
mod shipping_aggregator;
mod webhook_queue;

pub use catalog_management::{CatalogError, CatalogManagement, UserDirectory};
pub use label_management::LabelManagement;
pub use ledger_management::{LedgerError, LedgerManagement};
pub use marketplace_database::MarketplaceDatabase;
pub use notification_management::NotificationManagement;
pub use order_management::{OrderFlowError, OrderManagement};
pub use payment_gateway::{GatewayError, PaymentGateway};
pub use shipping_aggregator::ShippingAggregator;
pub use webhook_queue::{WebhookQueue, WebhookQueueError};
