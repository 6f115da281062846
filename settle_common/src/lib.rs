mod cents;
mod helpers;
mod rate;
mod secret;

pub mod op;

pub use cents::{Cents, CentsConversionError, CURRENCY_CODE};
pub use helpers::{env_flag, parse_boolean_flag};
pub use rate::BasisPoints;
pub use secret::Secret;
