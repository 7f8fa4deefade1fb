// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Thin illustrative driver: loads an [`training_operator_core::config::OperatorConfig`]
//! from a YAML file and reports what was parsed. The concrete network,
//! optimiser, iterator, and worker runtime an [`training_operator_core::Operator`]
//! needs are boundary collaborators (§1) this crate doesn't implement, so this
//! binary stops short of constructing and running one -- see the library's
//! rustdoc and tests for that.

use std::env;
use std::process::ExitCode;

use training_operator_core::config::load_and_validate_config;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <operator.yaml>", args[0]);
        return ExitCode::FAILURE;
    }

    match load_and_validate_config(&args[1]) {
        Ok(config) => {
            println!("worker_count: {}", config.worker_count);
            println!("merge_pattern: {}", config.merge_pattern);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("failed to load {}: {}", args[1], err);
            ExitCode::FAILURE
        }
    }
}
