// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! A data-parallel training operator: coordinates a fixed pool of workers
//! through the iteration/epoch barriers that keep their local networks in
//! sync with one authoritative network, and dispatches the local/global hook
//! tiers at each time-scale boundary.

pub mod collaborators;
pub mod config;
pub mod errors;
pub mod hooks;
pub mod merger;
pub mod observability;
pub mod operator;
pub mod registry;
pub mod scheduler;
pub mod worker;

pub use operator::{Operator, OperatorCollaborators, OperatorState, PushProgressError};
