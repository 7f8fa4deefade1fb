//! Error types for the training operator core.
//!
//! Core domain errors ([`OperatorError`], [`HookValidationError`], [`RegistryError`]) are
//! hand-written with manual `Display` impls: callers branch on their variants, and several
//! variants carry runtime-collected context that doesn't template cleanly. Peripheral
//! concerns ([`ConfigError`]) use `thiserror` instead.

mod config;
mod hook;
mod operator;
mod registry;

pub use config::ConfigError;
pub use hook::HookValidationError;
pub use operator::OperatorError;
pub use registry::RegistryError;
