//! Operator lifecycle state machine (§4.4).
//!
//! Each public transition validates synchronously against the operator's
//! currently-published state -- illegal transitions fail with `BadState`
//! before anything is spawned -- then hands the actual work (`prepare_workers`
//! plus the per-worker command) to a detached task so the caller returns
//! immediately. `wait_for_state_changed` blocks on the same `state_change_lock`
//! the spawned task holds for the duration of its work.

use std::sync::{Arc, RwLock};

use tokio::sync::Mutex as AsyncMutex;

use crate::errors::OperatorError;
use crate::observability::messages::{
    operator::{StateTransitioned, StateTransitionRejected},
    StructuredLog,
};
use crate::worker::{reset_workers, Worker};

use super::Operator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorState {
    None,
    Running,
    Paused,
    Stopped,
}

impl OperatorState {
    fn label(&self) -> &'static str {
        match self {
            OperatorState::None => "none",
            OperatorState::Running => "running",
            OperatorState::Paused => "paused",
            OperatorState::Stopped => "stopped",
        }
    }
}

pub(super) struct StateMachine {
    current: RwLock<OperatorState>,
    lock: AsyncMutex<()>,
}

impl StateMachine {
    pub(super) fn new() -> Self {
        StateMachine { current: RwLock::new(OperatorState::None), lock: AsyncMutex::new(()) }
    }
}

impl Operator {
    fn peek_state(&self) -> OperatorState {
        *self.state_machine.current.read().unwrap()
    }

    pub fn current_state(&self) -> OperatorState {
        self.peek_state()
    }

    fn set_state(&self, new: OperatorState) {
        let mut guard = self.state_machine.current.write().unwrap();
        let from = guard.label();
        StateTransitioned { from, to: new.label() }.log();
        *guard = new;
    }

    fn validate_transition(
        &self,
        attempted: &'static str,
        allowed: &[OperatorState],
    ) -> Result<OperatorState, OperatorError> {
        let current = self.peek_state();
        if allowed.contains(&current) {
            Ok(current)
        } else {
            StateTransitionRejected { attempted, current: current.label() }.log();
            Err(OperatorError::BadState { attempted, current: current.label().to_string() })
        }
    }

    /// `None|Stopped -> Running`, dispatching `start_worker` to each worker.
    pub fn start(self: &Arc<Self>) -> Result<(), OperatorError> {
        let before = self.validate_transition("started", &[OperatorState::None, OperatorState::Stopped])?;
        let op = self.clone();
        tokio::spawn(async move {
            let _guard = op.state_machine.lock.lock().await;
            if op.validate_transition("started", &[OperatorState::None, OperatorState::Stopped]).is_err() {
                return;
            }
            op.prepare_workers().await;
            let workers = op.workers.read().await.clone();
            if before == OperatorState::Stopped {
                reset_workers(&workers);
            }
            for w in &workers {
                op.worker_runtime.start_worker(w.clone()).await;
            }
            op.set_state(OperatorState::Running);
        });
        Ok(())
    }

    /// `None|Stopped -> Running`, dispatching `run_worker_once` instead of
    /// `start_worker` to each worker.
    pub fn start_once(self: &Arc<Self>) -> Result<(), OperatorError> {
        let before = self.validate_transition("started_once", &[OperatorState::None, OperatorState::Stopped])?;
        let op = self.clone();
        tokio::spawn(async move {
            let _guard = op.state_machine.lock.lock().await;
            if op
                .validate_transition("started_once", &[OperatorState::None, OperatorState::Stopped])
                .is_err()
            {
                return;
            }
            op.prepare_workers().await;
            let workers = op.workers.read().await.clone();
            if before == OperatorState::Stopped {
                reset_workers(&workers);
            }
            for w in &workers {
                op.worker_runtime.run_worker_once(w.clone()).await;
            }
            op.set_state(OperatorState::Running);
        });
        Ok(())
    }

    /// `Running -> Paused`.
    pub fn signal_pause(self: &Arc<Self>) -> Result<(), OperatorError> {
        self.validate_transition("paused", &[OperatorState::Running])?;
        let op = self.clone();
        tokio::spawn(async move {
            let _guard = op.state_machine.lock.lock().await;
            if op.validate_transition("paused", &[OperatorState::Running]).is_err() {
                return;
            }
            let workers = op.workers.read().await.clone();
            for w in &workers {
                op.worker_runtime.pause_worker(w.clone()).await;
            }
            op.set_state(OperatorState::Paused);
        });
        Ok(())
    }

    /// `Paused -> Running`.
    pub fn signal_resume(self: &Arc<Self>) -> Result<(), OperatorError> {
        self.validate_transition("resumed", &[OperatorState::Paused])?;
        let op = self.clone();
        tokio::spawn(async move {
            let _guard = op.state_machine.lock.lock().await;
            if op.validate_transition("resumed", &[OperatorState::Paused]).is_err() {
                return;
            }
            let workers = op.workers.read().await.clone();
            for w in &workers {
                op.worker_runtime.resume_worker(w.clone()).await;
            }
            op.set_state(OperatorState::Running);
        });
        Ok(())
    }

    /// `{Running, Paused} -> Stopped`. Pauses then stops every worker (§4.4).
    pub fn signal_stop(self: &Arc<Self>) -> Result<(), OperatorError> {
        self.validate_transition("stopped", &[OperatorState::Running, OperatorState::Paused])?;
        let op = self.clone();
        tokio::spawn(async move {
            let _guard = op.state_machine.lock.lock().await;
            if op
                .validate_transition("stopped", &[OperatorState::Running, OperatorState::Paused])
                .is_err()
            {
                return;
            }
            let workers = op.workers.read().await.clone();
            for w in &workers {
                op.worker_runtime.pause_worker(w.clone()).await;
            }
            for w in &workers {
                op.worker_runtime.stop_worker(w.clone()).await;
            }
            op.set_state(OperatorState::Stopped);
        });
        Ok(())
    }

    /// Blocks on the state-change lock until any in-flight transition completes.
    pub async fn wait_for_state_changed(&self) {
        let _ = self.state_machine.lock.lock().await;
    }

    /// Idempotent: creates exactly `worker_count` workers on the first call,
    /// deep-copying the canonical optimiser and shallow-copying the canonical
    /// iterator into each; a no-op on every subsequent call (§4.4, §8).
    pub(super) async fn prepare_workers(&self) {
        let mut workers = self.workers.write().await;
        if !workers.is_empty() {
            return;
        }
        let mut built = Vec::with_capacity(self.worker_count);
        for i in 0..self.worker_count {
            let worker = Worker::new(i);
            worker.set_local_optimiser(self.canonical_optimiser.deep_clone());
            worker.set_local_training_data_iterator(self.canonical_iterator.shallow_clone());
            built.push(worker);
        }
        *workers = built;
        drop(workers);

        self.iteration_push_state.lock().await.pushed_local_iteration_numbers.clear();
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
    use std::time::Duration;

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
                network: Arc::new(FakeNetwork(StdMutex::new(Default::default()))),
                optimiser: Arc::new(FakeOptimiser),
                iterator: Arc::new(FakeIterator),
                worker_runtime: Arc::new(NoopRuntime),
                handler: Some(Arc::new(CpuFloat32Handler)),
                network_merger: Some(Arc::new(AverageMerger::default())),
                trainer: None,
            },
        )
    }

    #[tokio::test]
    async fn s6_start_from_running_is_bad_state() {
        let op = make_operator(1);
        op.start().unwrap();
        op.wait_for_state_changed().await;
        assert_eq!(op.current_state(), OperatorState::Running);

        let err = op.start().unwrap_err();
        assert_eq!(err, OperatorError::BadState { attempted: "started", current: "running".to_string() });
    }

    #[tokio::test]
    async fn s6_resume_from_running_is_bad_state() {
        let op = make_operator(1);
        op.start().unwrap();
        op.wait_for_state_changed().await;

        let err = op.signal_resume().unwrap_err();
        assert_eq!(err, OperatorError::BadState { attempted: "resumed", current: "running".to_string() });
    }

    #[tokio::test]
    async fn s6_stop_from_stopped_is_bad_state() {
        let op = make_operator(1);
        op.start().unwrap();
        op.wait_for_state_changed().await;
        op.signal_stop().unwrap();
        op.wait_for_state_changed().await;
        assert_eq!(op.current_state(), OperatorState::Stopped);

        let err = op.signal_stop().unwrap_err();
        assert_eq!(err, OperatorError::BadState { attempted: "stopped", current: "stopped".to_string() });
    }

    #[tokio::test]
    async fn pause_then_resume_preserves_epoch_and_highest_iteration() {
        let op = make_operator(1);
        op.start().unwrap();
        op.wait_for_state_changed().await;

        let before_epoch = op.epoch_number().await;
        let before_iter = op.highest_iteration_number().await;

        op.signal_pause().unwrap();
        op.wait_for_state_changed().await;
        op.signal_resume().unwrap();
        op.wait_for_state_changed().await;

        assert_eq!(op.epoch_number().await, before_epoch);
        assert_eq!(op.highest_iteration_number().await, before_iter);
    }

    #[tokio::test]
    async fn prepare_workers_called_twice_is_a_no_op() {
        let op = make_operator(3);
        op.prepare_workers().await;
        let first = op.workers().await;
        op.prepare_workers().await;
        let second = op.workers().await;
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 3);
        for (a, b) in first.iter().zip(second.iter()) {
            assert!(Arc::ptr_eq(a, b));
        }
    }

    #[tokio::test]
    async fn wait_for_state_changed_blocks_until_transition_completes() {
        let op = make_operator(1);
        op.start().unwrap();
        // Give the spawned transition a moment; wait_for_state_changed must
        // not return before it does.
        tokio::time::sleep(Duration::from_millis(5)).await;
        op.wait_for_state_changed().await;
        assert_eq!(op.current_state(), OperatorState::Running);
    }
}
