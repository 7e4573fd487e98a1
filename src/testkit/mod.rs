//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`module`] - `ScriptedModule`: a module whose hooks record every call
//!   and can be told to fail or stall per phase.
//! - [`loader`] - Loaders that count calls, fail, recover, or break the
//!   loader contract.

pub mod loader;
pub mod module;
