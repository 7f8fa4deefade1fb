use std::collections::HashMap;
use std::sync::Arc;

use crate::hooks::Hook;
use crate::observability::messages::{hooks::HookInvocationFailed, StructuredLog};
use crate::registry::{Registry, RegistryResolver};

/// Run foreground hooks inline, in index order, on the calling task. A failing hook
/// is logged and the next hook proceeds (§7: hook failures never propagate).
pub async fn dispatch_foreground(hooks: Vec<Arc<dyn Hook>>, registry: &Arc<Registry>, resolver: &Arc<RegistryResolver>) {
    for hook in hooks {
        if let Err(error) = hook.invoke(registry, resolver).await {
            HookInvocationFailed { hook: hook.name(), background: false, error: error.as_ref() }.log();
        }
    }
}

/// Dispatch background hooks, one `tokio` task per invocation-target bucket; hooks
/// sharing a bucket run serially in index order, buckets run concurrently (§4.3
/// "Dispatch" -- the bucket-serial upgrade the design explicitly sanctions, see
/// DESIGN.md Open Question 2).
pub async fn dispatch_background(
    buckets: HashMap<usize, Vec<Arc<dyn Hook>>>,
    registry: Arc<Registry>,
    resolver: Arc<RegistryResolver>,
) {
    let mut join_set = tokio::task::JoinSet::new();
    for (_target, hooks) in buckets {
        let registry = registry.clone();
        let resolver = resolver.clone();
        join_set.spawn(async move {
            for hook in hooks {
                if let Err(error) = hook.invoke(&registry, &resolver).await {
                    HookInvocationFailed { hook: hook.name(), background: true, error: error.as_ref() }.log();
                }
            }
        });
    }
    while join_set.join_next().await.is_some() {}
}
