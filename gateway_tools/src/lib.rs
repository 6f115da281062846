//! HTTP clients for the marketplace's external collaborators.
//!
//! * [`MercadoPagoApi`] creates PIX, card and boleto payments and fetches their status.
//! * [`MelhorEnvioApi`] quotes shipping options, buys and cancels labels and tracks parcels.
//!
//! The clients speak the providers' wire formats ([`mp_objects`], [`me_objects`]). Mapping to the settlement engine's
//! types happens in the server.
mod config;
mod error;
mod helpers;
mod melhorenvio;
mod mercadopago;

pub mod me_objects;
pub mod mp_objects;

pub use config::{MelhorEnvioConfig, MercadoPagoConfig};
pub use error::GatewayApiError;
pub use helpers::{digits_only, parse_decimal_amount};
pub use melhorenvio::MelhorEnvioApi;
pub use mercadopago::MercadoPagoApi;
