//! Message types for hook attach/detach/cascade/liveness events.

use super::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A hook was attached.
///
/// # Log Level
/// `info!`
pub struct HookAttached<'a> {
    pub hook: &'a str,
    pub tier: &'a str,
    pub invocation_index: usize,
    pub invocation_target: usize,
}

impl Display for HookAttached<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "attached {} hook '{}' (index={}, target={})",
            self.tier, self.hook, self.invocation_index, self.invocation_target
        )
    }
}

impl StructuredLog for HookAttached<'_> {
    fn log(&self) {
        tracing::info!(
            hook = self.hook,
            tier = self.tier,
            invocation_index = self.invocation_index,
            invocation_target = self.invocation_target,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("hook_attached", span_name = name, hook = self.hook, tier = self.tier)
    }
}

/// An attach was rejected, either for physical identity or functional equivalence.
///
/// # Log Level
/// `debug!` - expected, not exceptional
pub struct HookAttachRejected<'a> {
    pub hook: &'a str,
    pub reason: &'static str,
}

impl Display for HookAttachRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "rejected attach of hook '{}': {}", self.hook, self.reason)
    }
}

impl StructuredLog for HookAttachRejected<'_> {
    fn log(&self) {
        tracing::debug!(hook = self.hook, reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("hook_attach_rejected", span_name = name, hook = self.hook)
    }
}

/// A hook was detached, possibly cascading through required hooks.
///
/// # Log Level
/// `info!`
pub struct HookDetached<'a> {
    pub hook: &'a str,
    pub tier: &'a str,
    pub cascaded: bool,
}

impl Display for HookDetached<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.cascaded {
            write!(f, "detached {} hook '{}' (cascaded from a dependent)", self.tier, self.hook)
        } else {
            write!(f, "detached {} hook '{}'", self.tier, self.hook)
        }
    }
}

impl StructuredLog for HookDetached<'_> {
    fn log(&self) {
        tracing::info!(hook = self.hook, tier = self.tier, cascaded = self.cascaded, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("hook_detached", span_name = name, hook = self.hook, cascaded = self.cascaded)
    }
}

/// A local hook was auto-detached because all workers marked it dead.
///
/// # Log Level
/// `info!`
pub struct HookLivenessExhausted<'a> {
    pub hook: &'a str,
    pub worker_count: usize,
}

impl Display for HookLivenessExhausted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "local hook '{}' auto-detached: all {} workers marked it dead",
            self.hook, self.worker_count
        )
    }
}

impl StructuredLog for HookLivenessExhausted<'_> {
    fn log(&self) {
        tracing::info!(hook = self.hook, worker_count = self.worker_count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("hook_liveness_exhausted", span_name = name, hook = self.hook)
    }
}

/// A foreground hook raised an error during invocation; the operator logs and continues.
///
/// # Log Level
/// `error!`
pub struct HookInvocationFailed<'a> {
    pub hook: &'a str,
    pub background: bool,
    pub error: &'a dyn std::error::Error,
}

impl Display for HookInvocationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} hook '{}' failed: {}",
            if self.background { "background" } else { "foreground" },
            self.hook,
            self.error
        )
    }
}

impl StructuredLog for HookInvocationFailed<'_> {
    fn log(&self) {
        tracing::error!(hook = self.hook, background = self.background, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("hook_invocation_failed", span_name = name, hook = self.hook)
    }
}
