//! Observability module for structured logging and tracing.
//!
//! Message types follow a struct-based pattern with `Display` implemented to:
//!
//! * Eliminate magic strings scattered throughout the codebase
//! * Enable future internationalization without code changes
//! * Provide consistent, structured logging output
//!
//! Messages are organized by subsystem:
//! * `messages::operator` - lifecycle transitions, barrier crossings, merges
//! * `messages::hooks` - attach/detach/dedup/cascade/liveness events
//! * `messages::registry` - resolver cache invalidation, type-mismatch rejections

pub mod messages;
