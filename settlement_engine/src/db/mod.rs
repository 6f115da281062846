//! Storage for the settlement engine.
//!
//! [`traits`] defines what the engine needs from a backend. [`sqlite`] is the only backend shipped with the crate.
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;
