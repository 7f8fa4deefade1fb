use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::errors::OperatorError;
use crate::hooks::{hook_id, Hook, HookId};
use crate::observability::messages::{hooks::HookLivenessExhausted, StructuredLog};

use super::tier::HookTier;

/// Per-local-hook liveness, one boolean per worker (§3
/// `alive_hooks_by_in_worker_states`, §4.3 "Liveness").
///
/// Open Question resolution (DESIGN.md #1): entries are auto-initialized to "alive
/// in all workers" the first time any worker is observed for a hook, rather than
/// requiring an explicit worker-side bootstrap call the external API never names.
pub struct LivenessTracker {
    worker_count: usize,
    alive: Mutex<HashMap<HookId, Vec<bool>>>,
}

impl LivenessTracker {
    pub fn new(worker_count: usize) -> Self {
        LivenessTracker { worker_count, alive: Mutex::new(HashMap::new()) }
    }

    pub fn forget(&self, id: HookId) {
        self.alive.lock().unwrap().remove(&id);
    }

    /// Mark `hook` dead in worker `worker_index`. If this was the last live worker
    /// for the hook, detaches it from `tier` (cascading through dependents) and
    /// returns `true`.
    pub fn mark_dead(&self, tier: &HookTier, hook: &Arc<dyn Hook>, worker_index: usize) -> Result<bool, OperatorError> {
        if !tier.is_attached(hook) {
            return Err(OperatorError::UnknownHook { hook: hook.name().to_string() });
        }

        let id = hook_id(hook);
        let exhausted = {
            let mut alive = self.alive.lock().unwrap();
            let flags = alive.entry(id).or_insert_with(|| vec![true; self.worker_count]);
            if worker_index < flags.len() {
                flags[worker_index] = false;
            }
            flags.iter().all(|&f| !f)
        };

        if exhausted {
            self.forget(id);
            tier.detach(hook)?;
            HookLivenessExhausted { hook: hook.name(), worker_count: self.worker_count }.log();
        }

        Ok(exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{HookError, TimeScale, TimeStep};
    use crate::registry::{Registry, RegistryResolver};
    use async_trait::async_trait;

    struct L(&'static str);

    #[async_trait]
    impl Hook for L {
        fn name(&self) -> &str {
            self.0
        }
        fn time_step(&self) -> TimeStep {
            TimeStep::forever(TimeScale::Iteration, 1)
        }
        fn functionally_equals(&self, other: &dyn Hook) -> bool {
            self.0 == other.name()
        }
        async fn invoke(&self, _r: &Arc<Registry>, _s: &Arc<RegistryResolver>) -> Result<(), HookError> {
            Ok(())
        }
    }

    #[test]
    fn s5_liveness_auto_detach_after_all_workers_mark_dead() {
        let tier = HookTier::new("local");
        let tracker = LivenessTracker::new(3);
        let l: Arc<dyn Hook> = Arc::new(L("L"));
        tier.attach(l.clone()).unwrap();

        assert!(!tracker.mark_dead(&tier, &l, 0).unwrap());
        assert!(tier.is_attached(&l));
        assert!(!tracker.mark_dead(&tier, &l, 1).unwrap());
        assert!(tier.is_attached(&l));
        assert!(tracker.mark_dead(&tier, &l, 2).unwrap());
        assert!(!tier.is_attached(&l));
    }
}
