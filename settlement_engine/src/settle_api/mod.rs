//! # Settlement engine public API
//!
//! Each API is a thin struct over a backend that implements the traits it needs, plus the event producers it
//! publishes to. Construct one per concern:
//!
//! * [`order_factory`] creates orders from purchase intents.
//! * [`payment_api`] starts gateway payments for existing orders.
//! * [`reconciler_api`] applies gateway notifications and retries the ones that failed.
//! * [`order_flow_api`] is the shared logic that applies payment outcomes to orders.
//! * [`shipment_api`] handles shipping, delivery and completion (the only path that credits sellers).
//! * [`ledger_api`] and [`withdrawal_api`] manage balances and payouts.
//! * [`accounts_api`] provides read access to a user's orders.
//!
//! ```rust,ignore
//! use settlement_engine::{events::EventProducers, AccountApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/marketplace.db", 5).await?;
//! let api = AccountApi::new(db);
//! let purchases = api.purchases(buyer_id, None).await?;
//! ```
pub mod accounts_api;
pub mod commission_policy;
pub mod ledger_api;
pub mod ledger_objects;
pub mod notifications;
pub mod order_factory;
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_api;
pub mod payment_objects;
pub mod reconciler_api;
pub mod shipment_api;
pub mod shipping_objects;
pub mod withdrawal_api;
