//! The coordinator (§4.4, §4.5, §6): lifecycle state machine, push/pull
//! barriers, network merge, time-scale event emission, and the public hook
//! attach/detach surface.
//!
//! Split across three files the way a single large source file's
//! responsibilities are grouped here: [`state`] owns the `None/Running/
//! Paused/Stopped` transitions and `prepare_workers`; [`barriers`] owns
//! `push_progress`/`pull_progress` and time-scale event emission; this file
//! owns construction and the hook/registry surface.

mod barriers;
mod state;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex as AsyncMutex, RwLock as AsyncRwLock};

use crate::collaborators::{ComputationHandler, DataIterator, Network, Optimiser, Trainer};
use crate::config::OperatorConfig;
use crate::errors::OperatorError;
use crate::hooks::Hook;
use crate::merger::{AverageMerger, NetworkMerger};
use crate::registry::{Registry, RegistryResolver, RegistryValue};
use crate::scheduler::{HookTier, LivenessTracker};
use crate::worker::{Worker, WorkerRuntime};

pub use barriers::PushProgressError;
pub use state::OperatorState;

struct NetworkState {
    authoritative: Arc<dyn Network>,
    epoch_number: u64,
}

#[derive(Default)]
struct IterationPushState {
    pushed_local_iteration_numbers: HashMap<u64, Vec<u64>>,
    highest_iteration_number: u64,
}

/// Collaborator handles an [`Operator`] is constructed with (§1, §6): the
/// opaque services the core treats as boundary strategies.
pub struct OperatorCollaborators {
    pub network: Arc<dyn Network>,
    pub optimiser: Arc<dyn Optimiser>,
    pub iterator: Arc<dyn DataIterator>,
    pub worker_runtime: Arc<dyn WorkerRuntime>,
    pub handler: Option<Arc<dyn ComputationHandler>>,
    pub network_merger: Option<Arc<dyn NetworkMerger>>,
    pub trainer: Option<Arc<dyn Trainer>>,
}

/// The training operator core (§3 Operator, §4.4-§4.6).
///
/// Shared mutable state is split across the named locks §9 describes:
/// `state_machine` (state-change), `network_state` (network-changed),
/// `epoch_push_state` (`pushed_epoch_networks`), `iteration_push_state`
/// (`pushed_local_iteration_numbers`). Nesting, when unavoidable, always
/// follows state → network → pushed_epoch → pushed_iter.
pub struct Operator {
    worker_count: usize,
    workers: AsyncRwLock<Vec<Arc<Worker>>>,
    worker_runtime: Arc<dyn WorkerRuntime>,

    state_machine: state::StateMachine,

    network_state: AsyncRwLock<NetworkState>,
    handler: Arc<dyn ComputationHandler>,
    network_merger: Arc<dyn NetworkMerger>,

    canonical_optimiser: Arc<dyn Optimiser>,
    canonical_iterator: Arc<dyn DataIterator>,
    trainer: Option<Arc<dyn Trainer>>,

    epoch_push_state: AsyncMutex<HashMap<u64, Vec<Option<Arc<dyn Network>>>>>,
    iteration_push_state: AsyncMutex<IterationPushState>,

    local_hooks: HookTier,
    global_hooks: HookTier,
    local_liveness: LivenessTracker,

    registry: Arc<Registry>,
    resolver: Arc<RegistryResolver>,
    /// The `"shared"` child of `registry` (§6, §4.3: "the canonical
    /// communication channel between hooks"), kept as its own handle so it
    /// can be linked into both the global registry and every worker's
    /// per-invocation local registry -- local and global hooks read and
    /// write the very same [`Registry`] here.
    shared: Arc<Registry>,
}

impl Operator {
    /// Builds an operator from a validated [`OperatorConfig`] plus the
    /// collaborator handles §1 treats as opaque (§6 configuration defaults:
    /// `handler` defaults to a CPU float32 handler, `network_merger` defaults
    /// to average-merge over `layers.*.*`).
    pub fn new(config: &OperatorConfig, collaborators: OperatorCollaborators) -> Arc<Self> {
        let registry = Registry::new(["operator"]);
        let shared = Registry::new(["shared"]);
        shared.set_parent(&registry);
        registry
            .set("shared", RegistryValue::child(shared.clone()))
            .expect("fresh registry key cannot be type-mismatched");
        let resolver = RegistryResolver::new(registry.clone());

        let handler = collaborators
            .handler
            .unwrap_or_else(|| Arc::new(crate::collaborators::CpuFloat32Handler));
        let network_merger = collaborators
            .network_merger
            .unwrap_or_else(|| Arc::new(AverageMerger::new(config.merge_pattern.clone())));

        Arc::new(Operator {
            worker_count: config.worker_count,
            workers: AsyncRwLock::new(Vec::new()),
            worker_runtime: collaborators.worker_runtime,
            state_machine: state::StateMachine::new(),
            network_state: AsyncRwLock::new(NetworkState {
                authoritative: collaborators.network,
                epoch_number: 0,
            }),
            handler,
            network_merger,
            canonical_optimiser: collaborators.optimiser,
            canonical_iterator: collaborators.iterator,
            trainer: collaborators.trainer,
            epoch_push_state: AsyncMutex::new(HashMap::new()),
            iteration_push_state: AsyncMutex::new(IterationPushState::default()),
            local_hooks: HookTier::new("local"),
            global_hooks: HookTier::new("global"),
            local_liveness: LivenessTracker::new(config.worker_count),
            registry,
            resolver,
            shared,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn resolver(&self) -> &Arc<RegistryResolver> {
        &self.resolver
    }

    pub async fn epoch_number(&self) -> u64 {
        self.network_state.read().await.epoch_number
    }

    pub async fn highest_iteration_number(&self) -> u64 {
        self.iteration_push_state.lock().await.highest_iteration_number
    }

    pub async fn workers(&self) -> Vec<Arc<Worker>> {
        self.workers.read().await.clone()
    }

    // -- Hook attach/detach surface (§6, §4.3) --------------------------------

    pub fn attach_local_hook(&self, hook: Arc<dyn Hook>) -> Result<bool, crate::errors::HookValidationError> {
        self.local_hooks.attach(hook)
    }

    pub fn detach_local_hook(&self, hook: &Arc<dyn Hook>) -> Result<(), OperatorError> {
        self.local_hooks.detach(hook)
    }

    pub fn attach_global_hook(&self, hook: Arc<dyn Hook>) -> Result<bool, crate::errors::HookValidationError> {
        self.global_hooks.attach(hook)
    }

    pub fn detach_global_hook(&self, hook: &Arc<dyn Hook>) -> Result<(), OperatorError> {
        self.global_hooks.detach(hook)
    }

    /// §4.3 "Liveness": a worker declares a local hook dead in itself; once
    /// every worker has, the hook auto-detaches (cascading through its
    /// dependents).
    pub fn mark_hook_dead(&self, hook: &Arc<dyn Hook>, worker: &Arc<Worker>) -> Result<bool, OperatorError> {
        self.local_liveness.mark_dead(&self.local_hooks, hook, worker.index())
    }

    pub fn get_local_hook_invocation_index(&self, hook: &Arc<dyn Hook>) -> Option<usize> {
        self.local_hooks.invocation_index(hook)
    }

    pub fn get_local_hook_invocation_target(&self, hook: &Arc<dyn Hook>) -> Option<usize> {
        self.local_hooks.invocation_target(hook)
    }

    pub fn get_global_hook_invocation_index(&self, hook: &Arc<dyn Hook>) -> Option<usize> {
        self.global_hooks.invocation_index(hook)
    }

    pub fn get_global_hook_invocation_target(&self, hook: &Arc<dyn Hook>) -> Option<usize> {
        self.global_hooks.invocation_target(hook)
    }

    pub fn local_hooks(&self) -> Vec<Arc<dyn Hook>> {
        self.local_hooks.attached_hooks()
    }

    pub fn global_hooks(&self) -> Vec<Arc<dyn Hook>> {
        self.global_hooks.attached_hooks()
    }

    /// §6 "populate_worker_registry(reg, w)": fills a caller-owned registry
    /// (typically a worker's per-invocation scratch registry) with worker
    /// `w`'s local collaborators and tick counters, for use as a local hook's
    /// invocation context. Also links in the operator's `"shared"` registry
    /// (§4.3) -- the same `Arc<Registry>` a global hook's invocation context
    /// resolves against -- so a value a global hook writes to `shared` is
    /// visible to a local hook's resolver, and vice versa.
    pub fn populate_worker_registry(&self, reg: &Arc<Registry>, worker: &Arc<Worker>) {
        if let Some(network) = worker.local_network() {
            let _ = reg.set("network", RegistryValue::scalar(network));
        }
        if let Some(optimiser) = worker.local_optimiser() {
            let _ = reg.set("optimiser", RegistryValue::scalar(optimiser));
        }
        if let Some(iterator) = worker.local_training_data_iterator() {
            let _ = reg.set("iterator", RegistryValue::scalar(iterator));
        }
        let _ = reg.set("epoch", RegistryValue::scalar(worker.local_epoch_number()));
        let _ = reg.set("iteration", RegistryValue::scalar(worker.local_iteration_number()));
        let _ = reg.set("shared", RegistryValue::child(self.shared.clone()));
    }
}
