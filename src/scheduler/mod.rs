//! Hook scheduler (§4.3): attach/detach with dedup and required-hook cascade,
//! invocation-index/target rebuild, time-scale ejection, and dispatch.
//!
//! [`HookTier`] holds one tier's bookkeeping (used for both the local and global
//! tiers by [`crate::operator::Operator`]); [`LivenessTracker`] adds the
//! per-worker liveness bookkeeping that only applies to local hooks.

mod dispatch;
mod liveness;
mod tier;

pub use dispatch::{dispatch_background, dispatch_foreground};
pub use liveness::LivenessTracker;
pub use tier::{snapshot_for_background, validate_hook, HookTier};
