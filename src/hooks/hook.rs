use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;

use crate::registry::{Registry, RegistryResolver};

use super::time_step::TimeStep;

/// Error a hook invocation may surface. Never propagates through the operator
/// (§7): a foreground failure is logged and the next hook proceeds; a background
/// failure is contained within its task.
pub type HookError = Box<dyn Error + Send + Sync>;

/// A scheduled callback attached to an operator (§3, §4.2).
///
/// The data model's mutable `operator` back-reference is tracked by the scheduler
/// alongside each attached hook rather than on the trait itself: hook objects are
/// shared (`Arc<dyn Hook>`) and the operator assigns the back-reference out-of-band
/// immediately before invocation (§5 "hooks are not shared across operators").
#[async_trait]
pub trait Hook: Send + Sync {
    /// Stable name, used for logging and as the dedup/debug identity.
    fn name(&self) -> &str;

    fn time_step(&self) -> TimeStep;

    /// Whether this hook is dispatched to the background task pool rather than run
    /// inline on the emitting thread.
    fn invoke_in_background(&self) -> bool {
        false
    }

    /// Hooks this one depends on; attaching this hook attempts to attach each of
    /// these first (§4.3 step 4).
    fn required_hooks(&self) -> Vec<Arc<dyn Hook>> {
        Vec::new()
    }

    /// Registry keys to snapshot before background invocation (§4.3 "Dispatch").
    fn required_registry_entries(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether `other` produces the same observable effect as `self`, for
    /// deduplication (§4.2). MUST be reflexive and symmetric.
    fn functionally_equals(&self, other: &dyn Hook) -> bool;

    async fn invoke(&self, registry: &Arc<Registry>, resolver: &Arc<RegistryResolver>) -> Result<(), HookError>;
}

/// Stable identity of a hook object for "physically present" checks (§4.3 step 1),
/// independent of `functionally_equals`. Trait objects have no intrinsic `Eq`, so we
/// key on the `Arc`'s allocation address, following the pointer-equality convention
/// used for hook-registry dedup in comparable hook-pipeline designs.
pub type HookId = usize;

pub fn hook_id(hook: &Arc<dyn Hook>) -> HookId {
    Arc::as_ptr(hook) as *const () as HookId
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::time_step::TimeScale;

    struct NamedHook(&'static str);

    #[async_trait]
    impl Hook for NamedHook {
        fn name(&self) -> &str {
            self.0
        }

        fn time_step(&self) -> TimeStep {
            TimeStep::forever(TimeScale::Iteration, 1)
        }

        fn functionally_equals(&self, other: &dyn Hook) -> bool {
            self.0 == other.name()
        }

        async fn invoke(&self, _registry: &Arc<Registry>, _resolver: &Arc<RegistryResolver>) -> Result<(), HookError> {
            Ok(())
        }
    }

    #[test]
    fn hook_id_is_stable_for_same_arc_and_distinct_across_clones_of_different_hooks() {
        let a: Arc<dyn Hook> = Arc::new(NamedHook("a"));
        let b: Arc<dyn Hook> = Arc::new(NamedHook("b"));
        assert_eq!(hook_id(&a), hook_id(&a.clone()));
        assert_ne!(hook_id(&a), hook_id(&b));
    }

    #[test]
    fn functionally_equals_is_reflexive() {
        let a = NamedHook("a");
        assert!(a.functionally_equals(&a));
    }
}
