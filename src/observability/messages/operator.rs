//! Message types for operator lifecycle, barrier, and merge events.

use super::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// The operator completed a state transition.
///
/// # Log Level
/// `info!` - important operational event
pub struct StateTransitioned<'a> {
    pub from: &'a str,
    pub to: &'a str,
}

impl Display for StateTransitioned<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "operator transitioned from '{}' to '{}'", self.from, self.to)
    }
}

impl StructuredLog for StateTransitioned<'_> {
    fn log(&self) {
        tracing::info!(from = self.from, to = self.to, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("state_transition", span_name = name, from = self.from, to = self.to)
    }
}

/// A transition was rejected because the operator was in the wrong state.
///
/// # Log Level
/// `warn!` - caller misuse, not a system fault
pub struct StateTransitionRejected<'a> {
    pub attempted: &'a str,
    pub current: &'a str,
}

impl Display for StateTransitionRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "rejected '{}' while operator is in state '{}'",
            self.attempted, self.current
        )
    }
}

impl StructuredLog for StateTransitionRejected<'_> {
    fn log(&self) {
        tracing::warn!(attempted = self.attempted, current = self.current, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "state_transition_rejected",
            span_name = name,
            attempted = self.attempted,
            current = self.current
        )
    }
}

/// The iteration barrier was satisfied by all workers.
///
/// # Log Level
/// `debug!` - frequent, high-volume event
pub struct IterationBarrierReached {
    pub epoch: u64,
    pub iteration: u64,
    pub worker_count: usize,
}

impl Display for IterationBarrierReached {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "iteration barrier reached: epoch={} iteration={} ({} workers)",
            self.epoch, self.iteration, self.worker_count
        )
    }
}

impl StructuredLog for IterationBarrierReached {
    fn log(&self) {
        tracing::debug!(
            epoch = self.epoch,
            iteration = self.iteration,
            worker_count = self.worker_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "iteration_barrier",
            span_name = name,
            epoch = self.epoch,
            iteration = self.iteration,
        )
    }
}

/// The epoch barrier was satisfied; the network merger ran and the epoch advanced.
///
/// # Log Level
/// `info!` - important operational event
pub struct EpochMerged {
    pub epoch: u64,
    pub worker_count: usize,
}

impl Display for EpochMerged {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "epoch {} merged across {} workers",
            self.epoch, self.worker_count
        )
    }
}

impl StructuredLog for EpochMerged {
    fn log(&self) {
        tracing::info!(epoch = self.epoch, worker_count = self.worker_count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("epoch_merged", span_name = name, epoch = self.epoch)
    }
}

/// A worker pushed an out-of-range iteration count for an already-full epoch slot array.
///
/// # Log Level
/// `error!` - misuse surfaced as [`crate::errors::OperatorError::TooManyPushers`]
pub struct TooManyPushersRejected {
    pub epoch: u64,
    pub worker: usize,
}

impl Display for TooManyPushersRejected {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "worker {} rejected: epoch {} network slots already full",
            self.worker, self.epoch
        )
    }
}

impl StructuredLog for TooManyPushersRejected {
    fn log(&self) {
        tracing::error!(epoch = self.epoch, worker = self.worker, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("too_many_pushers", span_name = name, epoch = self.epoch, worker = self.worker)
    }
}
