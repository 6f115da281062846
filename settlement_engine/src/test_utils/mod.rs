//! Helpers for tests that need a real database, seeded marketplace data, or stand-ins for the external
//! collaborators. Enabled with the `test_utils` feature.
pub mod fakes;
pub mod prepare_env;
pub mod seed;
