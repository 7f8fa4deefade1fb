use std::fmt;

/// Errors raised by `validate_hook` before a hook is attached (§7 Validation kind).
///
/// Attach fails atomically on any of these -- no partial bookkeeping is left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookValidationError {
    /// The hook's time step is missing or has a non-positive interval.
    NullTimeStep { hook: String },
    /// The hook's `required_hooks` form a cycle.
    CyclicRequiredHooks { cycle: Vec<String> },
    /// A background hook names a required-registry-entry key that cannot be resolved.
    UnserializableRegistryEntry { hook: String, key: String },
}

impl fmt::Display for HookValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookValidationError::NullTimeStep { hook } => {
                write!(f, "hook '{hook}' has no valid time step")
            }
            HookValidationError::CyclicRequiredHooks { cycle } => {
                write!(f, "cyclic required-hook dependency: {}", cycle.join(" -> "))
            }
            HookValidationError::UnserializableRegistryEntry { hook, key } => {
                write!(
                    f,
                    "background hook '{hook}' requires registry entry '{key}' which cannot be resolved for snapshotting"
                )
            }
        }
    }
}

impl std::error::Error for HookValidationError {}
