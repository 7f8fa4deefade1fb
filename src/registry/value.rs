use std::any::Any;
use std::sync::Arc;

use super::Registry;

/// A value stored under a registry key: either a leaf scalar or a child registry,
/// forming the tree described in §3 ("A value may itself be a registry").
#[derive(Clone)]
pub enum RegistryValue {
    Scalar(Arc<dyn Any + Send + Sync>),
    Child(Arc<Registry>),
}

impl RegistryValue {
    pub fn scalar<T: Any + Send + Sync>(value: T) -> Self {
        RegistryValue::Scalar(Arc::new(value))
    }

    pub fn child(registry: Arc<Registry>) -> Self {
        RegistryValue::Child(registry)
    }

    pub fn as_child(&self) -> Option<&Arc<Registry>> {
        match self {
            RegistryValue::Child(r) => Some(r),
            RegistryValue::Scalar(_) => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            RegistryValue::Scalar(v) => v.downcast_ref::<T>(),
            RegistryValue::Child(_) => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            RegistryValue::Scalar(_) => "scalar",
            RegistryValue::Child(_) => "registry",
        }
    }
}
