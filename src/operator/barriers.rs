//! Epoch/iteration barriers and time-scale event emission (§4.5).

use std::fmt;
use std::sync::Arc;

use crate::errors::OperatorError;
use crate::hooks::TimeScale;
use crate::merger::MergeError;
use crate::observability::messages::{
    operator::{EpochMerged, IterationBarrierReached, TooManyPushersRejected},
    StructuredLog,
};
use crate::registry::{Registry, RegistryResolver, RegistryValue};
use crate::scheduler::{dispatch_background, dispatch_foreground, snapshot_for_background};
use crate::worker::Worker;

use super::Operator;

/// `push_progress` can fail either at the operator's own boundary (§6) or
/// because the network merger rejected the pushed networks (§7 "collaborator
/// errors propagate ... leaving the authoritative network untouched").
#[derive(Debug)]
pub enum PushProgressError {
    Operator(OperatorError),
    Merge(MergeError),
}

impl fmt::Display for PushProgressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushProgressError::Operator(e) => write!(f, "{e}"),
            PushProgressError::Merge(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PushProgressError {}

impl From<OperatorError> for PushProgressError {
    fn from(e: OperatorError) -> Self {
        PushProgressError::Operator(e)
    }
}

impl From<MergeError> for PushProgressError {
    fn from(e: MergeError) -> Self {
        PushProgressError::Merge(e)
    }
}

impl Operator {
    /// §4.5 `push_progress(w)`: records a worker's epoch network (on an epoch
    /// transition) and iteration number, merging and/or emitting time-scale
    /// events when the corresponding barrier is satisfied.
    ///
    /// At most one epoch barrier can be crossed per call (§3 invariant 4):
    /// `w` is expected to report monotonically non-decreasing
    /// `(local_epoch_number, local_iteration_number)`.
    pub async fn push_progress(&self, worker: &Arc<Worker>) -> Result<(), PushProgressError> {
        let index = worker.index();
        let epoch = worker.local_epoch_number();
        let iteration = worker.local_iteration_number();

        let current_epoch = self.network_state.read().await.epoch_number;
        if epoch > current_epoch && iteration == 1 {
            self.handle_epoch_push(worker, epoch, index).await?;
        }

        self.handle_iteration_push(epoch, iteration, index).await?;

        Ok(())
    }

    async fn handle_epoch_push(
        &self,
        worker: &Arc<Worker>,
        epoch: u64,
        index: usize,
    ) -> Result<(), PushProgressError> {
        let network = worker
            .local_network()
            .ok_or(OperatorError::UnassignedNetwork { worker: index })?;
        let pushed_network = network.deep_clone();

        let filled = {
            let mut epoch_pushes = self.epoch_push_state.lock().await;
            let slots = epoch_pushes
                .entry(epoch)
                .or_insert_with(|| vec![None; self.worker_count]);

            let Some(free_slot) = slots.iter().position(Option::is_none) else {
                TooManyPushersRejected { epoch, worker: index }.log();
                return Err(OperatorError::TooManyPushers { epoch, worker: index }.into());
            };
            slots[free_slot] = Some(pushed_network);

            if slots.iter().all(Option::is_some) {
                let completed = epoch_pushes.remove(&epoch).expect("just inserted");
                Some(completed.into_iter().map(|n| n.expect("slot array full")).collect::<Vec<_>>())
            } else {
                None
            }
        };

        if let Some(networks) = filled {
            let mut net_state = self.network_state.write().await;
            net_state.epoch_number += 1;
            let new_epoch = net_state.epoch_number;
            self.network_merger
                .merge(net_state.authoritative.as_ref(), &networks, self.handler.as_ref())?;
            drop(net_state);

            EpochMerged { epoch: new_epoch, worker_count: self.worker_count }.log();
            self.emit_global_time_scale_event(TimeScale::Epoch).await;
        }

        Ok(())
    }

    async fn handle_iteration_push(
        &self,
        epoch: u64,
        iteration: u64,
        index: usize,
    ) -> Result<(), PushProgressError> {
        let barrier_reached = {
            let mut state = self.iteration_push_state.lock().await;
            let slots = state
                .pushed_local_iteration_numbers
                .entry(epoch)
                .or_insert_with(|| vec![0u64; self.worker_count]);
            slots[index] = iteration;
            slots.iter().all(|&v| v == iteration)
        };

        if barrier_reached {
            let current_epoch = self.network_state.read().await.epoch_number;
            if epoch == current_epoch {
                self.iteration_push_state.lock().await.highest_iteration_number = iteration;
            }
            IterationBarrierReached { epoch, iteration, worker_count: self.worker_count }.log();
            self.emit_global_time_scale_event(TimeScale::Iteration).await;
        }

        Ok(())
    }

    /// §4.5 `pull_progress(w)`: assigns `w`'s local network, deep-copying the
    /// authoritative network except in the single-worker skip-copy
    /// optimization, where the worker aliases it directly.
    pub async fn pull_progress(&self, worker: &Arc<Worker>) {
        let first_pull = worker.local_network().is_none();
        let needs_copy = (worker.local_iteration_number() == 0 && self.worker_count > 1) || first_pull;
        if !needs_copy {
            return;
        }

        let net_state = self.network_state.read().await;
        let assigned = if self.worker_count == 1 {
            net_state.authoritative.clone()
        } else {
            net_state.authoritative.deep_clone()
        };
        drop(net_state);
        worker.set_local_network(assigned);
    }

    /// §4.5 "Time-scale event emission" for the global tier: run ejection,
    /// populate the operator's own registry, sort by invocation index, then
    /// dispatch foreground inline and background onto the task pool.
    async fn emit_global_time_scale_event(&self, scale: TimeScale) {
        let due = self.global_hooks.eject(scale);
        if due.is_empty() {
            return;
        }

        self.populate_operator_registry().await;

        let (foreground, background) = self.global_hooks.partition_dispatch(due);
        dispatch_foreground(foreground, &self.registry, &self.resolver).await;

        if !background.is_empty() {
            let all_background: Vec<_> = background.values().flatten().cloned().collect();
            let snapshot = snapshot_for_background(&all_background, &self.resolver);
            let snapshot_resolver = RegistryResolver::new(snapshot.clone());
            dispatch_background(background, snapshot, snapshot_resolver).await;
        }
    }

    /// Emits a local time-scale event for one worker (§4.5: "Local hooks are
    /// emitted by the worker on its own thread"). A concrete [`WorkerRuntime`]
    /// implementation calls this at its own iteration/epoch boundaries.
    ///
    /// [`WorkerRuntime`]: crate::worker::WorkerRuntime
    pub async fn emit_local_time_scale_event(&self, worker: &Arc<Worker>, scale: TimeScale) {
        let due = self.local_hooks.eject(scale);
        if due.is_empty() {
            return;
        }

        let worker_registry = Registry::new(Vec::<String>::new());
        self.populate_worker_registry(&worker_registry, worker);
        let worker_resolver = RegistryResolver::new(worker_registry.clone());

        let (foreground, background) = self.local_hooks.partition_dispatch(due);
        dispatch_foreground(foreground, &worker_registry, &worker_resolver).await;

        if !background.is_empty() {
            let all_background: Vec<_> = background.values().flatten().cloned().collect();
            let snapshot = snapshot_for_background(&all_background, &worker_resolver);
            let snapshot_resolver = RegistryResolver::new(snapshot.clone());
            dispatch_background(background, snapshot, snapshot_resolver).await;
        }
    }

    async fn populate_operator_registry(&self) {
        {
            let net_state = self.network_state.read().await;
            let _ = self.registry.set("network", RegistryValue::scalar(net_state.authoritative.clone()));
            let _ = self.registry.set("epoch", RegistryValue::scalar(net_state.epoch_number));
        }
        let _ = self.registry.set("optimiser", RegistryValue::scalar(self.canonical_optimiser.clone()));
        let _ = self.registry.set("iterator", RegistryValue::scalar(self.canonical_iterator.clone()));
        if let Some(trainer) = &self.trainer {
            let _ = self.registry.set("trainer", RegistryValue::scalar(trainer.clone()));
        }
        let highest_iteration = self.iteration_push_state.lock().await.highest_iteration_number;
        let _ = self.registry.set("iteration", RegistryValue::scalar(highest_iteration));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CpuFloat32Handler, DataIterator, Network, Optimiser};
    use crate::config::OperatorConfig;
    use crate::merger::AverageMerger;
    use crate::operator::OperatorCollaborators;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Debug)]
    struct FakeNetwork(StdMutex<std::collections::HashMap<String, Vec<f32>>>);
    impl Network for FakeNetwork {
        fn deep_clone(&self) -> Arc<dyn Network> {
            Arc::new(FakeNetwork(StdMutex::new(self.0.lock().unwrap().clone())))
        }
        fn parameter_keys(&self) -> Vec<String> {
            self.0.lock().unwrap().keys().cloned().collect()
        }
        fn get_parameter(&self, key: &str) -> Option<Vec<f32>> {
            self.0.lock().unwrap().get(key).cloned()
        }
        fn set_parameter(&self, key: &str, values: Vec<f32>) {
            self.0.lock().unwrap().insert(key.to_string(), values);
        }
    }

    #[derive(Debug)]
    struct FakeOptimiser;
    impl Optimiser for FakeOptimiser {
        fn deep_clone(&self) -> Arc<dyn Optimiser> {
            Arc::new(FakeOptimiser)
        }
    }

    #[derive(Debug)]
    struct FakeIterator;
    impl DataIterator for FakeIterator {
        fn shallow_clone(&self) -> Arc<dyn DataIterator> {
            Arc::new(FakeIterator)
        }
    }

    struct NoopRuntime;
    #[async_trait]
    impl crate::worker::WorkerRuntime for NoopRuntime {
        async fn start_worker(&self, _worker: Arc<Worker>) {}
        async fn run_worker_once(&self, _worker: Arc<Worker>) {}
        async fn pause_worker(&self, _worker: Arc<Worker>) {}
        async fn resume_worker(&self, _worker: Arc<Worker>) {}
        async fn stop_worker(&self, _worker: Arc<Worker>) {}
    }

    fn make_operator(worker_count: usize) -> Arc<Operator> {
        let config = OperatorConfig { worker_count, merge_pattern: "layers.*.*".to_string() };
        Operator::new(
            &config,
            OperatorCollaborators {
                network: Arc::new(FakeNetwork(StdMutex::new(
                    [("layers.0.weight".to_string(), vec![0.0])].into_iter().collect(),
                ))),
                optimiser: Arc::new(FakeOptimiser),
                iterator: Arc::new(FakeIterator),
                worker_runtime: Arc::new(NoopRuntime),
                handler: Some(Arc::new(CpuFloat32Handler)),
                network_merger: Some(Arc::new(AverageMerger::default())),
                trainer: None,
            },
        )
    }

    /// §8 S1: two workers, epoch barrier then iteration barrier.
    #[tokio::test]
    async fn s1_two_worker_epoch_and_iteration_barrier() {
        let op = make_operator(2);
        op.prepare_workers().await;
        let workers = op.workers().await;
        let w0 = &workers[0];
        let w1 = &workers[1];

        w0.set_local_epoch_number(0);
        w0.set_local_iteration_number(1);
        op.pull_progress(w0).await;
        w1.set_local_epoch_number(0);
        w1.set_local_iteration_number(1);
        op.pull_progress(w1).await;

        op.push_progress(w0).await.unwrap();
        assert_eq!(op.highest_iteration_number().await, 0);

        op.push_progress(w1).await.unwrap();
        assert_eq!(op.highest_iteration_number().await, 1);

        w0.set_local_network(Arc::new(FakeNetwork(StdMutex::new(
            [("layers.0.weight".to_string(), vec![2.0])].into_iter().collect(),
        ))));
        w0.set_local_epoch_number(1);
        w0.set_local_iteration_number(1);
        op.push_progress(w0).await.unwrap();
        assert_eq!(op.epoch_number().await, 0);

        w1.set_local_network(Arc::new(FakeNetwork(StdMutex::new(
            [("layers.0.weight".to_string(), vec![4.0])].into_iter().collect(),
        ))));
        w1.set_local_epoch_number(1);
        w1.set_local_iteration_number(1);
        op.push_progress(w1).await.unwrap();
        assert_eq!(op.epoch_number().await, 1);
    }

    #[tokio::test]
    async fn too_many_pushers_is_a_hard_error() {
        let op = make_operator(1);
        op.prepare_workers().await;
        let workers = op.workers().await;
        let w0 = &workers[0];
        w0.set_local_network(Arc::new(FakeNetwork(StdMutex::new(Default::default()))));
        w0.set_local_epoch_number(1);
        w0.set_local_iteration_number(1);

        // Simulate the slot array for epoch 1 already being full (the
        // operator's own epoch counter is still 0) -- a further push for
        // that epoch has nowhere to land.
        op.epoch_push_state.lock().await.insert(1, vec![Some(w0.local_network().unwrap())]);

        let err = op.push_progress(w0).await;
        assert!(matches!(err, Err(PushProgressError::Operator(OperatorError::TooManyPushers { .. }))));
    }

    #[tokio::test]
    async fn single_worker_pull_progress_skips_copy() {
        let op = make_operator(1);
        op.prepare_workers().await;
        let workers = op.workers().await;
        let w0 = &workers[0];

        op.pull_progress(w0).await;
        let first = w0.local_network().unwrap();
        assert!(Arc::ptr_eq(&first, &op.network_state.read().await.authoritative));

        w0.set_local_iteration_number(5);
        op.pull_progress(w0).await;
        let second = w0.local_network().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    /// §4.3/§6: the `shared` registry is "the canonical communication channel
    /// between hooks" -- both tiers, not just global ones. A value a global
    /// hook would see under `shared` must be visible through a worker's local
    /// registry and resolver too.
    #[tokio::test]
    async fn shared_registry_is_linked_into_both_hook_tiers() {
        let op = make_operator(1);
        op.prepare_workers().await;
        let workers = op.workers().await;
        let w0 = &workers[0];

        // A global hook writes into `shared` through the operator's own registry.
        let shared = op.registry().get("shared").unwrap().as_child().unwrap().clone();
        shared.set("note", RegistryValue::scalar("left-by-global-hook")).unwrap();

        let worker_registry = Registry::new(Vec::<String>::new());
        op.populate_worker_registry(&worker_registry, w0);
        let worker_resolver = RegistryResolver::new(worker_registry.clone());

        let seen = worker_resolver
            .resolve_get_single("shared.note")
            .unwrap();
        assert_eq!(*seen.downcast_ref::<&str>().unwrap(), "left-by-global-hook");
    }

    #[tokio::test]
    async fn multi_worker_pull_progress_deep_copies() {
        let op = make_operator(2);
        op.prepare_workers().await;
        let workers = op.workers().await;
        let w0 = &workers[0];

        op.pull_progress(w0).await;
        let copy = w0.local_network().unwrap();
        assert!(!Arc::ptr_eq(&copy, &op.network_state.read().await.authoritative));
    }
}
