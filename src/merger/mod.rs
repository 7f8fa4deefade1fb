//! Network merger (§4.6): reduces N per-worker networks into the authoritative one.

use std::fmt;
use std::sync::Arc;

use crate::collaborators::{ComputationHandler, Network};
use crate::registry::{parse_match_identifier, MatchSegment};

/// A collaborator error raised by a merger (§7 "Collaborator errors"): propagated
/// under the network-changed lock, leaving the authoritative network untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeError {
    pub reason: String,
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "network merge failed: {}", self.reason)
    }
}

impl std::error::Error for MergeError {}

/// A strategy consuming `(authoritative, array_of_N_networks, handler)` (§4.6).
/// Must be all-or-nothing on `authoritative` and pure with respect to everything
/// outside its parameters.
pub trait NetworkMerger: Send + Sync {
    fn merge(
        &self,
        authoritative: &dyn Network,
        pushed: &[Arc<dyn Network>],
        handler: &dyn ComputationHandler,
    ) -> Result<(), MergeError>;
}

/// Default policy: elementwise-average every parameter selected by a match pattern
/// (default `layers.*.*`), via the handler's `mean`.
pub struct AverageMerger {
    pattern: String,
}

impl AverageMerger {
    pub fn new(pattern: impl Into<String>) -> Self {
        AverageMerger { pattern: pattern.into() }
    }
}

impl Default for AverageMerger {
    fn default() -> Self {
        AverageMerger::new("layers.*.*")
    }
}

impl NetworkMerger for AverageMerger {
    fn merge(
        &self,
        authoritative: &dyn Network,
        pushed: &[Arc<dyn Network>],
        handler: &dyn ComputationHandler,
    ) -> Result<(), MergeError> {
        let segments = parse_match_identifier(&self.pattern).map_err(|e| MergeError { reason: e.to_string() })?;

        let selected: Vec<String> = authoritative
            .parameter_keys()
            .into_iter()
            .filter(|key| matches_pattern(key, &segments))
            .collect();

        // Collect before mutating so a missing parameter on any worker leaves
        // `authoritative` untouched (all-or-nothing).
        let mut by_key = Vec::with_capacity(selected.len());
        for key in &selected {
            let mut values = Vec::with_capacity(pushed.len());
            for network in pushed {
                let value = network.get_parameter(key).ok_or_else(|| MergeError {
                    reason: format!("worker network missing parameter '{key}'"),
                })?;
                values.push(value);
            }
            by_key.push((key.clone(), values));
        }

        for (key, values) in by_key {
            let merged = handler.mean(&values);
            authoritative.set_parameter(&key, merged);
        }

        Ok(())
    }
}

fn matches_pattern(key: &str, segments: &[MatchSegment]) -> bool {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.len() != segments.len() {
        return false;
    }
    parts.iter().zip(segments).all(|(part, segment)| segment.matches_key(part))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::CpuFloat32Handler;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct FakeNetwork {
        params: Mutex<std::collections::HashMap<String, Vec<f32>>>,
    }

    impl FakeNetwork {
        fn new(params: &[(&str, Vec<f32>)]) -> Self {
            FakeNetwork {
                params: Mutex::new(params.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()),
            }
        }
    }

    impl Network for FakeNetwork {
        fn deep_clone(&self) -> Arc<dyn Network> {
            Arc::new(FakeNetwork { params: Mutex::new(self.params.lock().unwrap().clone()) })
        }

        fn parameter_keys(&self) -> Vec<String> {
            self.params.lock().unwrap().keys().cloned().collect()
        }

        fn get_parameter(&self, key: &str) -> Option<Vec<f32>> {
            self.params.lock().unwrap().get(key).cloned()
        }

        fn set_parameter(&self, key: &str, values: Vec<f32>) {
            self.params.lock().unwrap().insert(key.to_string(), values);
        }
    }

    #[test]
    fn average_merger_averages_matched_parameters_only() {
        let authoritative = FakeNetwork::new(&[("layers.0.weight", vec![0.0]), ("trainer.lr", vec![0.1])]);
        let w0: Arc<dyn Network> = Arc::new(FakeNetwork::new(&[("layers.0.weight", vec![2.0]), ("trainer.lr", vec![99.0])]));
        let w1: Arc<dyn Network> = Arc::new(FakeNetwork::new(&[("layers.0.weight", vec![4.0]), ("trainer.lr", vec![1.0])]));

        let merger = AverageMerger::default();
        let handler = CpuFloat32Handler;
        merger.merge(&authoritative, &[w0, w1], &handler).unwrap();

        assert_eq!(authoritative.get_parameter("layers.0.weight"), Some(vec![3.0]));
        // trainer.lr doesn't match `layers.*.*` and must be left untouched.
        assert_eq!(authoritative.get_parameter("trainer.lr"), Some(vec![0.1]));
    }

    #[test]
    fn missing_parameter_on_any_worker_leaves_authoritative_untouched() {
        let authoritative = FakeNetwork::new(&[("layers.0.weight", vec![0.0])]);
        let w0: Arc<dyn Network> = Arc::new(FakeNetwork::new(&[("layers.0.weight", vec![2.0])]));
        let w1: Arc<dyn Network> = Arc::new(FakeNetwork::new(&[]));

        let merger = AverageMerger::default();
        let handler = CpuFloat32Handler;
        let err = merger.merge(&authoritative, &[w0, w1], &handler);

        assert!(err.is_err());
        assert_eq!(authoritative.get_parameter("layers.0.weight"), Some(vec![0.0]));
    }
}
