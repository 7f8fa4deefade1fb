use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use crate::errors::RegistryError;
use crate::observability::messages::{registry::TypeMismatchRejected, StructuredLog};

use super::value::RegistryValue;

/// Identity of a registry for cache-invalidation bookkeeping; stable for the
/// registry's lifetime (its allocation address).
pub type RegistryId = usize;

/// Notified when a registry's `set` replaces a child registry with something else
/// (§3 "hierarchy-change listeners"). `registry_id` identifies the registry on which
/// the change happened, not the child itself.
pub trait HierarchyListener: Send + Sync {
    fn on_hierarchy_changed(
        &self,
        registry_id: RegistryId,
        key: &str,
        previous: Option<Arc<super::Registry>>,
        new: Option<RegistryValue>,
    );
}

struct Inner {
    entries: HashMap<String, RegistryValue>,
    declared_types: HashMap<String, (TypeId, &'static str)>,
}

/// A hierarchical, tagged key/value store. Values may themselves be registries,
/// forming a tree (§3). Mutations are serialized by the registry's own lock; the
/// parent back-reference is a weak edge so the tree can be freed normally.
pub struct Registry {
    tags: Vec<String>,
    parent: Mutex<Option<Weak<Registry>>>,
    inner: Mutex<Inner>,
    listeners: Mutex<Vec<Arc<dyn HierarchyListener>>>,
}

impl Registry {
    pub fn new(tags: impl IntoIterator<Item = impl Into<String>>) -> Arc<Self> {
        Arc::new(Registry {
            tags: tags.into_iter().map(Into::into).collect(),
            parent: Mutex::new(None),
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                declared_types: HashMap::new(),
            }),
            listeners: Mutex::new(Vec::new()),
        })
    }

    pub fn id(self: &Arc<Self>) -> RegistryId {
        Arc::as_ptr(self) as RegistryId
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tags(&self, required: &[String]) -> bool {
        required.iter().all(|t| self.tags.contains(t))
    }

    pub fn parent(&self) -> Option<Arc<Registry>> {
        self.parent.lock().unwrap().as_ref().and_then(Weak::upgrade)
    }

    pub fn set_parent(&self, parent: &Arc<Registry>) {
        *self.parent.lock().unwrap() = Some(Arc::downgrade(parent));
    }

    pub fn add_hierarchy_listener(&self, listener: Arc<dyn HierarchyListener>) {
        self.listeners.lock().unwrap().push(listener);
    }

    /// Snapshot of current keys, used by the resolver to tolerate concurrent inserts
    /// while it iterates (§4.1 thread safety).
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().unwrap().entries.keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<RegistryValue> {
        self.inner.lock().unwrap().entries.values().cloned().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().unwrap().entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<RegistryValue> {
        self.inner.lock().unwrap().entries.get(key).cloned()
    }

    /// Plain `set`, untyped: any later `set` on the same key is permitted regardless
    /// of value type.
    pub fn set(self: &Arc<Self>, key: impl Into<String>, value: RegistryValue) -> Result<(), RegistryError> {
        self.set_checked(key, value, None)
    }

    /// Type-associated `set` (§3 "Each key may be type-associated"): the first call
    /// with `declared_type = Some(T)` binds the key to `T`'s `TypeId`; subsequent
    /// `set` calls on the same key, typed or not, are rejected if the value's
    /// concrete type differs.
    pub fn set_typed<T: 'static>(
        self: &Arc<Self>,
        key: impl Into<String>,
        value: RegistryValue,
    ) -> Result<(), RegistryError> {
        self.set_checked(key, value, Some((TypeId::of::<T>(), std::any::type_name::<T>())))
    }

    fn set_checked(
        self: &Arc<Self>,
        key: impl Into<String>,
        value: RegistryValue,
        declared_type: Option<(TypeId, &'static str)>,
    ) -> Result<(), RegistryError> {
        let key = key.into();
        let mut inner = self.inner.lock().unwrap();

        if let Some((expected, expected_name)) = inner.declared_types.get(&key).copied() {
            if let RegistryValue::Scalar(ref v) = value {
                if (**v).type_id() != expected {
                    let msg = TypeMismatchRejected {
                        key: &key,
                        expected: expected_name,
                        found: "incompatible scalar",
                    };
                    msg.log();
                    return Err(RegistryError::TypeMismatch {
                        key,
                        expected: expected_name,
                        found: "incompatible scalar",
                    });
                }
            }
        } else if let Some((type_id, name)) = declared_type {
            inner.declared_types.insert(key.clone(), (type_id, name));
        }

        let previous = inner.entries.insert(key.clone(), value.clone());
        drop(inner);

        if let Some(RegistryValue::Child(_)) = &previous {
            self.notify_listeners(&key, previous.and_then(|v| v.as_child().cloned()), Some(value));
        }

        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<RegistryValue> {
        let mut inner = self.inner.lock().unwrap();
        let previous = inner.entries.remove(key);
        inner.declared_types.remove(key);
        previous
    }

    fn notify_listeners(
        &self,
        key: &str,
        previous: Option<Arc<Registry>>,
        new: Option<RegistryValue>,
    ) {
        let id = self as *const Registry as RegistryId;
        for listener in self.listeners.lock().unwrap().iter() {
            listener.on_hierarchy_changed(id, key, previous.clone(), new.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_roundtrips() {
        let reg = Registry::new(["operator"]);
        reg.set("epoch", RegistryValue::scalar(3u64)).unwrap();
        let v = reg.get("epoch").unwrap();
        assert_eq!(*v.downcast_ref::<u64>().unwrap(), 3u64);
    }

    #[test]
    fn typed_set_rejects_incompatible_type() {
        let reg = Registry::new(Vec::<String>::new());
        reg.set_typed::<u64>("epoch", RegistryValue::scalar(3u64)).unwrap();
        let err = reg.set_typed::<u64>("epoch", RegistryValue::scalar("nope".to_string()));
        assert!(matches!(err, Err(RegistryError::TypeMismatch { .. })));
    }

    #[test]
    fn replacing_child_registry_notifies_listeners() {
        struct Recorder(Mutex<Vec<String>>);
        impl HierarchyListener for Recorder {
            fn on_hierarchy_changed(
                &self,
                _id: RegistryId,
                key: &str,
                _previous: Option<Arc<Registry>>,
                _new: Option<RegistryValue>,
            ) {
                self.0.lock().unwrap().push(key.to_string());
            }
        }

        let root = Registry::new(["operator"]);
        let child = Registry::new(["shared"]);
        root.set("shared", RegistryValue::child(child)).unwrap();

        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        root.add_hierarchy_listener(recorder.clone());

        let replacement = Registry::new(["shared"]);
        root.set("shared", RegistryValue::child(replacement)).unwrap();

        assert_eq!(recorder.0.lock().unwrap().as_slice(), ["shared"]);
    }

    #[test]
    fn has_tags_requires_full_superset() {
        let reg = Registry::new(["shared", "operator"]);
        assert!(reg.has_tags(&["shared".to_string()]));
        assert!(!reg.has_tags(&["missing".to_string()]));
    }
}
