//! # Marketplace settlement server
//! The HTTP front end for the settlement engine. It is responsible for:
//! * Authenticating buyers, sellers and admins with the bearer tokens issued by the marketplace's auth service.
//! * Taking orders and walking them through payment, shipping, delivery and settlement.
//! * Receiving payment notifications from the gateway and reconciling them against orders.
//! * Running the background jobs that expire unpaid orders, complete delivered ones and poll carriers.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! Open routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/checkout/webhook`: Payment notifications from the gateway. Always answers 200.
//!
//! Routes under `/api` need a valid bearer token:
//! * `/orders`, `/orders/purchases`, `/orders/sales`, `/orders/stats/sales`, `/orders/{id}`, `/orders/{id}/status`
//! * `/checkout/pix`, `/checkout/card`, `/checkout/boleto`, `/checkout/payment/{payment_id}`
//! * `/shipping/calculate`, `/shipping/mark-shipped`, `/shipping/track/{code}`
//! * `/shipping/create`, `/shipping/label/{order_id}`, `/shipping/cancel` (seller or admin)
//! * `/payments/balance`, `/payments/transactions`, `/payments/withdraw`
//! * `/payments/withdrawals`, `/payments/withdrawals/{id}/{action}`, `/payments/ledger/{user_id}/verify` (admin only)

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod workers;

#[cfg(test)]
mod endpoint_tests;
