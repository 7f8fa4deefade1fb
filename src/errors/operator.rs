use std::fmt;

/// Errors raised at the operator's public boundary (§6 error codes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorError {
    /// An operation was attempted from a state that does not permit it.
    BadState { attempted: &'static str, current: String },
    /// A hook could not be detached because dependents still require it.
    RequiredByDependents { hook: String, dependents: Vec<String> },
    /// A worker pushed progress for an epoch whose slot array is already full.
    TooManyPushers { epoch: u64, worker: usize },
    /// A query referenced a hook that is not attached.
    UnknownHook { hook: String },
    /// A worker attempted to use a local network that was never assigned.
    UnassignedNetwork { worker: usize },
}

impl fmt::Display for OperatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorError::BadState { attempted, current } => {
                write!(f, "cannot {attempted} operator while in state '{current}'")
            }
            OperatorError::RequiredByDependents { hook, dependents } => {
                write!(
                    f,
                    "cannot detach hook '{}': required by dependents [{}]",
                    hook,
                    dependents.join(", ")
                )
            }
            OperatorError::TooManyPushers { epoch, worker } => {
                write!(
                    f,
                    "worker {worker} pushed progress for epoch {epoch} but its network slot array is already full"
                )
            }
            OperatorError::UnknownHook { hook } => {
                write!(f, "hook '{hook}' is not attached")
            }
            OperatorError::UnassignedNetwork { worker } => {
                write!(f, "worker {worker} has no local network assigned yet")
            }
        }
    }
}

impl std::error::Error for OperatorError {}
