use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::errors::{HookValidationError, OperatorError};
use crate::hooks::{hook_id, Hook, HookId, LocalTimeStep, TimeScale};
use crate::observability::messages::{
    hooks::{HookAttachRejected, HookAttached, HookDetached},
    StructuredLog,
};
use crate::registry::{parse_match_identifier, Registry, RegistryResolver};

/// Bookkeeping shared by the local and global hook tiers (§3 Operator fields,
/// §4.3 scheduler algorithms). One `HookTier` instance models either
/// `local_hooks`/`local_hooks_by_time_scale`/... or the global counterparts.
pub struct HookTier {
    tier_name: &'static str,
    state: Mutex<TierState>,
}

#[derive(Default)]
struct TierState {
    order: Vec<Arc<dyn Hook>>,
    by_time_scale: HashMap<TimeScale, Vec<Arc<dyn Hook>>>,
    dependents_by_required: HashMap<HookId, HashSet<HookId>>,
    invocation_index: HashMap<HookId, usize>,
    invocation_target: HashMap<HookId, usize>,
    local_time_steps: HashMap<HookId, LocalTimeStep>,
}

fn find_by_id(order: &[Arc<dyn Hook>], id: HookId) -> Option<Arc<dyn Hook>> {
    order.iter().find(|h| hook_id(h) == id).cloned()
}

fn find_functionally_equal(order: &[Arc<dyn Hook>], hook: &dyn Hook) -> Option<Arc<dyn Hook>> {
    order.iter().find(|h| h.functionally_equals(hook)).cloned()
}

/// Resolve `hook` to whichever attached representative it corresponds to: itself if
/// physically present, its functional equivalent otherwise, or `None` if neither is
/// attached (shouldn't happen for a hook that went through `attach_recursive`).
fn resolve_existing(order: &[Arc<dyn Hook>], hook: &Arc<dyn Hook>) -> Option<Arc<dyn Hook>> {
    find_by_id(order, hook_id(hook)).or_else(|| find_functionally_equal(order, hook.as_ref()))
}

/// Validate a hook before it is attached (§7 Validation kind): non-positive
/// interval, cyclic `required_hooks`, or (for background hooks) a
/// required-registry-entry that isn't even a well-formed match identifier.
pub fn validate_hook(hook: &Arc<dyn Hook>) -> Result<(), HookValidationError> {
    let ts = hook.time_step();
    if ts.interval <= 0 {
        return Err(HookValidationError::NullTimeStep { hook: hook.name().to_string() });
    }

    let mut stack = Vec::new();
    detect_cycle(hook, &mut stack)?;

    if hook.invoke_in_background() {
        for key in hook.required_registry_entries() {
            if parse_match_identifier(&key).is_err() {
                return Err(HookValidationError::UnserializableRegistryEntry {
                    hook: hook.name().to_string(),
                    key,
                });
            }
        }
    }

    Ok(())
}

fn detect_cycle(hook: &Arc<dyn Hook>, stack: &mut Vec<String>) -> Result<(), HookValidationError> {
    let name = hook.name().to_string();
    if stack.contains(&name) {
        let mut cycle = stack.clone();
        cycle.push(name);
        return Err(HookValidationError::CyclicRequiredHooks { cycle });
    }
    stack.push(name);
    for r in hook.required_hooks() {
        detect_cycle(&r, stack)?;
    }
    stack.pop();
    Ok(())
}

impl HookTier {
    pub fn new(tier_name: &'static str) -> Self {
        HookTier { tier_name, state: Mutex::new(TierState::default()) }
    }

    /// §4.3 Attach. Returns `Ok(false)` if rejected (already present, or a functional
    /// equivalent is already attached); `Ok(true)` on success.
    pub fn attach(&self, hook: Arc<dyn Hook>) -> Result<bool, HookValidationError> {
        validate_hook(&hook)?;

        let mut state = self.state.lock().unwrap();
        if find_by_id(&state.order, hook_id(&hook)).is_some() {
            HookAttachRejected { hook: hook.name(), reason: "physically already attached" }.log();
            return Ok(false);
        }
        if find_functionally_equal(&state.order, hook.as_ref()).is_some() {
            HookAttachRejected { hook: hook.name(), reason: "functionally equivalent hook already attached" }.log();
            return Ok(false);
        }

        attach_recursive(&mut state, &hook);
        rebuild_invocation_ordering(&mut state);

        let id = hook_id(&hook);
        HookAttached {
            hook: hook.name(),
            tier: self.tier_name,
            invocation_index: state.invocation_index.get(&id).copied().unwrap_or(0),
            invocation_target: state.invocation_target.get(&id).copied().unwrap_or(0),
        }
        .log();

        Ok(true)
    }

    /// §4.3 Detach, including the required-hook cascade.
    pub fn detach(&self, hook: &Arc<dyn Hook>) -> Result<(), OperatorError> {
        let mut state = self.state.lock().unwrap();
        let id = hook_id(hook);
        if find_by_id(&state.order, id).is_none() {
            return Err(OperatorError::UnknownHook { hook: hook.name().to_string() });
        }
        detach_checked(&mut state, id, hook.name())?;
        rebuild_invocation_ordering(&mut state);
        Ok(())
    }

    pub fn is_attached(&self, hook: &Arc<dyn Hook>) -> bool {
        let state = self.state.lock().unwrap();
        find_by_id(&state.order, hook_id(hook)).is_some()
    }

    pub fn attached_hooks(&self) -> Vec<Arc<dyn Hook>> {
        self.state.lock().unwrap().order.clone()
    }

    pub fn invocation_index(&self, hook: &Arc<dyn Hook>) -> Option<usize> {
        self.state.lock().unwrap().invocation_index.get(&hook_id(hook)).copied()
    }

    pub fn invocation_target(&self, hook: &Arc<dyn Hook>) -> Option<usize> {
        self.state.lock().unwrap().invocation_target.get(&hook_id(hook)).copied()
    }

    /// §4.3 "Time-scale event ejection": returns hooks due this tick, sorted by
    /// invocation index.
    pub fn eject(&self, scale: TimeScale) -> Vec<Arc<dyn Hook>> {
        let mut state = self.state.lock().unwrap();
        let bucket = state.by_time_scale.get(&scale).cloned().unwrap_or_default();
        let mut due = Vec::new();
        for h in bucket {
            let id = hook_id(&h);
            let ts = h.time_step();
            let local = state.local_time_steps.entry(id).or_insert_with(|| LocalTimeStep::new(ts));
            if local.tick() {
                due.push(h);
            }
        }
        due.sort_by_key(|h| state.invocation_index.get(&hook_id(h)).copied().unwrap_or(usize::MAX));
        due
    }

    /// Partitions `due` into (foreground in index order, background grouped by
    /// invocation target, each sub-list in index order).
    pub fn partition_dispatch(&self, due: Vec<Arc<dyn Hook>>) -> (Vec<Arc<dyn Hook>>, HashMap<usize, Vec<Arc<dyn Hook>>>) {
        let state = self.state.lock().unwrap();
        let mut foreground = Vec::new();
        let mut background: HashMap<usize, Vec<Arc<dyn Hook>>> = HashMap::new();
        for h in due {
            let target = state.invocation_target.get(&hook_id(&h)).copied().unwrap_or(0);
            if target == 0 {
                foreground.push(h);
            } else {
                background.entry(target).or_default().push(h);
            }
        }
        (foreground, background)
    }
}

fn attach_recursive(state: &mut TierState, hook: &Arc<dyn Hook>) -> Arc<dyn Hook> {
    if let Some(existing) = resolve_existing(&state.order, hook) {
        return existing;
    }

    state.order.push(hook.clone());
    state
        .by_time_scale
        .entry(hook.time_step().scale)
        .or_default()
        .push(hook.clone());
    state.dependents_by_required.entry(hook_id(hook)).or_default();

    let required: Vec<Arc<dyn Hook>> = hook.required_hooks();
    for r in required {
        let resolved_r = attach_recursive(state, &r);
        state
            .dependents_by_required
            .entry(hook_id(&resolved_r))
            .or_default()
            .insert(hook_id(hook));
    }

    hook.clone()
}

fn detach_checked(state: &mut TierState, id: HookId, name: &str) -> Result<(), OperatorError> {
    let dependents = state.dependents_by_required.get(&id).cloned().unwrap_or_default();
    if !dependents.is_empty() {
        let dependent_names = dependents
            .iter()
            .filter_map(|d| find_by_id(&state.order, *d))
            .map(|h| h.name().to_string())
            .collect();
        return Err(OperatorError::RequiredByDependents {
            hook: name.to_string(),
            dependents: dependent_names,
        });
    }
    detach_unconditional(state, id, false);
    Ok(())
}

fn detach_unconditional(state: &mut TierState, id: HookId, cascaded: bool) {
    let Some(pos) = state.order.iter().position(|h| hook_id(h) == id) else { return };
    let hook = state.order.remove(pos);

    if let Some(bucket) = state.by_time_scale.get_mut(&hook.time_step().scale) {
        bucket.retain(|h| hook_id(h) != id);
    }
    state.dependents_by_required.remove(&id);
    state.local_time_steps.remove(&id);

    HookDetached { hook: hook.name(), tier: "hook", cascaded }.log();

    for r in hook.required_hooks() {
        let Some(resolved_r) = resolve_existing(&state.order, &r) else { continue };
        let resolved_id = hook_id(&resolved_r);
        let now_empty = if let Some(deps) = state.dependents_by_required.get_mut(&resolved_id) {
            deps.remove(&id);
            deps.is_empty()
        } else {
            false
        };
        if now_empty {
            detach_unconditional(state, resolved_id, true);
        }
    }
}

/// §4.3 "Invocation ordering rebuild": DFS post-order per invocation target.
fn rebuild_invocation_ordering(state: &mut TierState) {
    let mut remaining: HashSet<HookId> = state.order.iter().map(hook_id).collect();
    let mut l: Vec<Arc<dyn Hook>> = Vec::new();
    let mut targets: HashMap<HookId, usize> = HashMap::new();
    let mut next_target = 1usize;

    let candidates = state.order.clone();
    for h in &candidates {
        let id = hook_id(h);
        if !remaining.contains(&id) {
            continue;
        }
        let target = if h.invoke_in_background() {
            let t = next_target;
            next_target += 1;
            t
        } else {
            0
        };
        dfs_post_order(h, &state.order, &mut remaining, &mut l, &mut targets, target);
    }

    state.invocation_index = l.iter().enumerate().map(|(i, h)| (hook_id(h), i)).collect();
    state.invocation_target = targets;
}

fn dfs_post_order(
    hook: &Arc<dyn Hook>,
    order: &[Arc<dyn Hook>],
    remaining: &mut HashSet<HookId>,
    l: &mut Vec<Arc<dyn Hook>>,
    targets: &mut HashMap<HookId, usize>,
    target: usize,
) {
    let id = hook_id(hook);
    if !remaining.remove(&id) {
        return;
    }
    for r in hook.required_hooks() {
        if let Some(resolved_r) = resolve_existing(order, &r) {
            dfs_post_order(&resolved_r, order, remaining, l, targets, target);
        }
    }
    targets.insert(id, target);
    l.push(hook.clone());
}

/// Builds a snapshot registry containing exactly the union of `required_registry_entries`
/// resolved from `source` via `resolver`, for background dispatch (§4.3 "Dispatch").
pub fn snapshot_for_background(
    hooks: &[Arc<dyn Hook>],
    resolver: &Arc<RegistryResolver>,
) -> Arc<Registry> {
    let snapshot = Registry::new(Vec::<String>::new());
    let mut seen = HashSet::new();
    for hook in hooks {
        for key in hook.required_registry_entries() {
            if !seen.insert(key.clone()) {
                continue;
            }
            if let Ok(entries) = resolver.resolve(&key) {
                for entry in entries {
                    if let Some(value) = entry.value() {
                        let _ = snapshot.set(entry.key.clone(), value);
                    }
                }
            }
        }
    }
    snapshot
}
