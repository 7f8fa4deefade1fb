//! Centralized message types for structured logging and distributed tracing.
//!
//! Each message type implements:
//!
//! * `Display` - human-readable output (supports future i18n)
//! * `StructuredLog` - machine-readable fields + span creation
//!
//! # Usage
//!
//! ```rust
//! use training_operator_core::observability::messages::{StructuredLog, operator::EpochMerged};
//!
//! let msg = EpochMerged { epoch: 3, worker_count: 4 };
//! tracing::info!("{}", msg);
//! msg.log();
//! ```

pub mod hooks;
pub mod operator;
pub mod registry;

use tracing::Span;

/// Trait for messages that support structured logging and distributed tracing.
pub trait StructuredLog {
    /// Emit a log event: human-readable message plus machine-readable fields.
    fn log(&self);

    /// Create a span carrying this message's fields as attributes.
    fn span(&self, name: &str) -> Span;
}
