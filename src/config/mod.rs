// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Operator construction configuration (§6 "Configuration (operator
//! construction)"): the declarative, serializable settings an
//! [`crate::operator::Operator`] is built from. The collaborator handles
//! (network, optimiser, iterator, worker runtime) are not configuration --
//! they're passed directly to [`crate::operator::Operator::new`] as
//! [`crate::operator::OperatorCollaborators`].

mod loader;


pub use loader::{load_and_validate_config, load_config, OperatorConfig};
