//! Message types for registry resolver cache and type-check events.

use super::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A resolver cache entry was invalidated because a referred registry changed.
///
/// # Log Level
/// `debug!`
pub struct CacheEntryInvalidated<'a> {
    pub match_identifier: &'a str,
}

impl Display for CacheEntryInvalidated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "invalidated resolver cache entry '{}'", self.match_identifier)
    }
}

impl StructuredLog for CacheEntryInvalidated<'_> {
    fn log(&self) {
        tracing::debug!(match_identifier = self.match_identifier, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("cache_invalidated", span_name = name, match_identifier = self.match_identifier)
    }
}

/// `resolve_set` found no existing match and created missing intermediate
/// registries starting under `from_path` to land the value.
///
/// # Log Level
/// `debug!`
pub struct ResolveSetCreatedMissingPath<'a> {
    pub match_identifier: &'a str,
    pub from_path: &'a str,
}

impl Display for ResolveSetCreatedMissingPath<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "resolve_set '{}' created missing registries below '{}'",
            self.match_identifier, self.from_path
        )
    }
}

impl StructuredLog for ResolveSetCreatedMissingPath<'_> {
    fn log(&self) {
        tracing::debug!(
            match_identifier = self.match_identifier,
            from_path = self.from_path,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "resolve_set_created_missing_path",
            span_name = name,
            match_identifier = self.match_identifier,
            from_path = self.from_path
        )
    }
}

/// A `set` was rejected because the key is type-associated with an incompatible type.
///
/// # Log Level
/// `warn!`
pub struct TypeMismatchRejected<'a> {
    pub key: &'a str,
    pub expected: &'a str,
    pub found: &'a str,
}

impl Display for TypeMismatchRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "rejected set of key '{}': expected type '{}', found '{}'",
            self.key, self.expected, self.found
        )
    }
}

impl StructuredLog for TypeMismatchRejected<'_> {
    fn log(&self) {
        tracing::warn!(key = self.key, expected = self.expected, found = self.found, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("type_mismatch_rejected", span_name = name, key = self.key)
    }
}
