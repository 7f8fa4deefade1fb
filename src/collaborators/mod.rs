//! Collaborator traits deliberately out of scope for this crate (§1): the numerical
//! tensor backend, dataset loading, network topology, and the concrete optimiser.
//! These are opaque services the operator core consumes only through the
//! boundary described in §6 -- concrete implementations live outside this crate.

use std::fmt::Debug;
use std::sync::Arc;

/// A deep-copyable network: the authoritative parameter set the operator merges
/// into and each worker trains a local copy of (§3 Worker.local_network).
pub trait Network: Send + Sync + Debug {
    /// A fresh, independent copy -- mutating the clone must never affect `self`.
    fn deep_clone(&self) -> Arc<dyn Network>;

    /// Parameter keys addressable through the registry, e.g. for
    /// `layers.*.*`-style merger match patterns.
    fn parameter_keys(&self) -> Vec<String>;

    fn get_parameter(&self, key: &str) -> Option<Vec<f32>>;

    /// Concrete implementations are expected to synchronize this internally --
    /// the authoritative network is addressed through a shared `Arc` so that
    /// single-worker operators can alias it directly with the worker's copy
    /// (the "skip-copy" optimization).
    fn set_parameter(&self, key: &str, values: Vec<f32>);
}

/// A deep-copyable optimiser state (§3 Worker.local_optimiser).
pub trait Optimiser: Send + Sync + Debug {
    fn deep_clone(&self) -> Arc<dyn Optimiser>;
}

/// A shallow-copyable training data iterator (§3 Worker.local_training_data_iterator).
/// Shallow copy means independent cursors over shared underlying data.
pub trait DataIterator: Send + Sync + Debug {
    fn shallow_clone(&self) -> Arc<dyn DataIterator>;
}

/// The computation backend a [`crate::merger::NetworkMerger`] uses to combine
/// parameter tensors (§3 Operator.handler, §6 "handler: ComputationHandler").
pub trait ComputationHandler: Send + Sync + Debug {
    /// Elementwise mean of `values` (all same length); used by the default
    /// average-merge policy.
    fn mean(&self, values: &[Vec<f32>]) -> Vec<f32>;
}

/// Opaque back-reference to the trainer that owns this operator (§3
/// Operator.trainer). Exposed to hooks only through the registry's reserved
/// `trainer` key; this crate never inspects it.
pub trait Trainer: Send + Sync + Debug {}

/// Default CPU float32 handler (§6 configuration default).
#[derive(Debug, Default)]
pub struct CpuFloat32Handler;

impl ComputationHandler for CpuFloat32Handler {
    fn mean(&self, values: &[Vec<f32>]) -> Vec<f32> {
        if values.is_empty() {
            return Vec::new();
        }
        let len = values[0].len();
        let mut acc = vec![0.0f32; len];
        for v in values {
            for (a, x) in acc.iter_mut().zip(v.iter()) {
                *a += x;
            }
        }
        let n = values.len() as f32;
        for a in acc.iter_mut() {
            *a /= n;
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_handler_means_elementwise() {
        let handler = CpuFloat32Handler;
        let result = handler.mean(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(result, vec![2.0, 3.0]);
    }

    #[test]
    fn cpu_handler_handles_empty_input() {
        let handler = CpuFloat32Handler;
        assert_eq!(handler.mean(&[]), Vec::<f32>::new());
    }
}
