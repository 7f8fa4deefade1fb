// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::errors::ConfigError;

/// Declarative operator construction settings (§6).
///
/// # Fields
/// * `worker_count` - Number of parallel workers; must be greater than zero.
/// * `merge_pattern` - Match pattern the default average-merge policy selects
///   parameters with (defaults to `"layers.*.*"`).
///
/// # Example
/// ```yaml
/// worker_count: 4
/// merge_pattern: "layers.*.*"
/// ```
#[derive(Debug, Deserialize, Clone)]
pub struct OperatorConfig {
    pub worker_count: usize,
    #[serde(default = "default_merge_pattern")]
    pub merge_pattern: String,
}

fn default_merge_pattern() -> String {
    "layers.*.*".to_string()
}

/// Loads an [`OperatorConfig`] from a YAML file without validating it.
pub fn load_config(path: impl AsRef<Path>) -> Result<OperatorConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let config: OperatorConfig = serde_yaml::from_str(&contents)?;
    Ok(config)
}

/// Loads and validates an [`OperatorConfig`] (§3 invariant 1: `worker_count > 0`).
pub fn load_and_validate_config(path: impl AsRef<Path>) -> Result<OperatorConfig, ConfigError> {
    let config = load_config(path)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &OperatorConfig) -> Result<(), ConfigError> {
    if config.worker_count == 0 {
        return Err(ConfigError::ZeroWorkerCount(config.worker_count));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestCase {
        name: &'static str,
        yaml: &'static str,
        expect_worker_count: Option<usize>,
        expect_merge_pattern: Option<&'static str>,
    }

    #[test]
    fn load_config_table_driven() {
        let cases = vec![
            TestCase {
                name: "explicit merge pattern",
                yaml: "worker_count: 4\nmerge_pattern: \"net.*.*\"\n",
                expect_worker_count: Some(4),
                expect_merge_pattern: Some("net.*.*"),
            },
            TestCase {
                name: "default merge pattern",
                yaml: "worker_count: 2\n",
                expect_worker_count: Some(2),
                expect_merge_pattern: Some("layers.*.*"),
            },
        ];

        for case in cases {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("operator.yaml");
            fs::write(&path, case.yaml).unwrap();

            let config = load_config(&path).unwrap_or_else(|e| panic!("case '{}' failed: {e}", case.name));
            if let Some(expected) = case.expect_worker_count {
                assert_eq!(config.worker_count, expected, "case '{}'", case.name);
            }
            if let Some(expected) = case.expect_merge_pattern {
                assert_eq!(config.merge_pattern, expected, "case '{}'", case.name);
            }
        }
    }

    #[test]
    fn load_and_validate_config_rejects_zero_worker_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("operator.yaml");
        fs::write(&path, "worker_count: 0\n").unwrap();

        let err = load_and_validate_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroWorkerCount(0)));
    }

    #[test]
    fn load_config_missing_file_is_a_read_error() {
        let err = load_config("/nonexistent/operator.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_config_rejects_malformed_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("operator.yaml");
        fs::write(&path, "worker_count: [this is not a number]\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
