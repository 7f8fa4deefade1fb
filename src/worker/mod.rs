//! The unit of parallel training (§3 Worker) and the operator/worker control
//! inversion (§9 "callback/control inversion" -- modeled as two traits, never a
//! single callback bag): workers call into the operator via `push_progress` /
//! `pull_progress` (on [`crate::operator::Operator`] directly), the operator
//! calls into workers via [`WorkerRuntime`].

use std::sync::Mutex;
use std::sync::Arc;

use async_trait::async_trait;

use crate::collaborators::{DataIterator, Network, Optimiser};

struct WorkerState {
    local_network: Option<Arc<dyn Network>>,
    local_optimiser: Option<Arc<dyn Optimiser>>,
    local_training_data_iterator: Option<Arc<dyn DataIterator>>,
    local_epoch_number: u64,
    local_iteration_number: u64,
}

/// Owns a worker's local copies and tick counters, identified by a stable index
/// in `[0, worker_count)` (§3 Worker).
pub struct Worker {
    index: usize,
    state: Mutex<WorkerState>,
}

impl Worker {
    pub fn new(index: usize) -> Arc<Self> {
        Arc::new(Worker {
            index,
            state: Mutex::new(WorkerState {
                local_network: None,
                local_optimiser: None,
                local_training_data_iterator: None,
                local_epoch_number: 0,
                local_iteration_number: 0,
            }),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn local_network(&self) -> Option<Arc<dyn Network>> {
        self.state.lock().unwrap().local_network.clone()
    }

    pub fn set_local_network(&self, network: Arc<dyn Network>) {
        self.state.lock().unwrap().local_network = Some(network);
    }

    pub fn local_optimiser(&self) -> Option<Arc<dyn Optimiser>> {
        self.state.lock().unwrap().local_optimiser.clone()
    }

    pub fn set_local_optimiser(&self, optimiser: Arc<dyn Optimiser>) {
        self.state.lock().unwrap().local_optimiser = Some(optimiser);
    }

    pub fn local_training_data_iterator(&self) -> Option<Arc<dyn DataIterator>> {
        self.state.lock().unwrap().local_training_data_iterator.clone()
    }

    pub fn set_local_training_data_iterator(&self, iterator: Arc<dyn DataIterator>) {
        self.state.lock().unwrap().local_training_data_iterator = Some(iterator);
    }

    pub fn local_epoch_number(&self) -> u64 {
        self.state.lock().unwrap().local_epoch_number
    }

    pub fn set_local_epoch_number(&self, epoch: u64) {
        self.state.lock().unwrap().local_epoch_number = epoch;
    }

    pub fn local_iteration_number(&self) -> u64 {
        self.state.lock().unwrap().local_iteration_number
    }

    pub fn set_local_iteration_number(&self, iteration: u64) {
        self.state.lock().unwrap().local_iteration_number = iteration;
    }

    /// Resets everything `prepare_workers` is responsible for re-establishing
    /// (§4.4 "reset pushed_local_iteration_numbers"), leaving the index untouched.
    fn reset_tick_counters(&self) {
        let mut state = self.state.lock().unwrap();
        state.local_epoch_number = 0;
        state.local_iteration_number = 0;
    }
}

/// Operator-to-worker calls (§4.4, §9): the concrete worker kind is the sole open
/// extension point, everything else in the operator is polymorphic only through
/// this trait.
#[async_trait]
pub trait WorkerRuntime: Send + Sync {
    async fn start_worker(&self, worker: Arc<Worker>);
    async fn run_worker_once(&self, worker: Arc<Worker>);
    async fn pause_worker(&self, worker: Arc<Worker>);
    async fn resume_worker(&self, worker: Arc<Worker>);
    async fn stop_worker(&self, worker: Arc<Worker>);
}

pub(crate) fn reset_workers(workers: &[Arc<Worker>]) {
    for w in workers {
        w.reset_tick_counters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_worker_starts_with_no_local_network_and_zeroed_counters() {
        let worker = Worker::new(2);
        assert_eq!(worker.index(), 2);
        assert!(worker.local_network().is_none());
        assert_eq!(worker.local_epoch_number(), 0);
        assert_eq!(worker.local_iteration_number(), 0);
    }

    #[test]
    fn setters_roundtrip() {
        let worker = Worker::new(0);
        worker.set_local_epoch_number(3);
        worker.set_local_iteration_number(7);
        assert_eq!(worker.local_epoch_number(), 3);
        assert_eq!(worker.local_iteration_number(), 7);
    }
}
