use thiserror::Error;

/// Errors raised while loading or validating an [`crate::config::OperatorConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("worker_count must be greater than zero, got {0}")]
    ZeroWorkerCount(usize),
}
