// ABOUTME: Phantom-typed attachment keys and the per-unit attachment store.
// ABOUTME: A key name is bound to one value type, so lookups never hand back the wrong type.

use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

/// A typed key into a unit's attachments.
///
/// The phantom parameter ties the key name to the value type it stores, so
/// one deployer's output and a later deployer's input agree on both.
#[must_use = "attachment keys are only useful for lookups"]
pub struct AttachmentKey<T> {
    name: Cow<'static, str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> AttachmentKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            _marker: PhantomData,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

// Manual trait implementations so `T` needs no bounds.

impl<T> std::fmt::Debug for AttachmentKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentKey")
            .field("name", &self.name)
            .finish()
    }
}

impl<T> Clone for AttachmentKey<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for AttachmentKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<T> Eq for AttachmentKey<T> {}

impl<T> Hash for AttachmentKey<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl<T> std::fmt::Display for AttachmentKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Attachments held by one deployment unit, keyed by name.
///
/// Predetermined attachments are declared before deployment and survive
/// undeploy. Transient attachments are produced by deployers and are dropped
/// by [`Attachments::clear_transient`]. A transient entry shadows a
/// predetermined one of the same name.
#[derive(Default, Clone)]
pub struct Attachments {
    predetermined: HashMap<String, Arc<dyn Any + Send + Sync>>,
    transient: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for Attachments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachments")
            .field("predetermined", &sorted_keys(&self.predetermined))
            .field("transient", &sorted_keys(&self.transient))
            .finish()
    }
}

fn sorted_keys(map: &HashMap<String, Arc<dyn Any + Send + Sync>>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}

impl Attachments {
    /// Store a transient `value` under `key`, replacing whatever was there.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: &AttachmentKey<T>, value: T) {
        self.transient.insert(key.name().to_string(), Arc::new(value));
    }

    /// Record that `name` is present without carrying data.
    pub fn insert_marker(&mut self, name: impl Into<String>) {
        self.transient.insert(name.into(), Arc::new(()));
    }

    pub fn insert_predetermined<T: Any + Send + Sync>(&mut self, key: &AttachmentKey<T>, value: T) {
        self.predetermined
            .insert(key.name().to_string(), Arc::new(value));
    }

    pub fn insert_predetermined_marker(&mut self, name: impl Into<String>) {
        self.predetermined.insert(name.into(), Arc::new(()));
    }

    /// Value under `key`, or `None` if missing or stored with another type.
    pub fn get<T: Any + Send + Sync>(&self, key: &AttachmentKey<T>) -> Option<Arc<T>> {
        let value = self
            .transient
            .get(key.name())
            .or_else(|| self.predetermined.get(key.name()))?;
        Arc::clone(value).downcast::<T>().ok()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transient.contains_key(name) || self.predetermined.contains_key(name)
    }

    /// Drop the transient entry for `name`. Predetermined entries stay.
    pub fn remove(&mut self, name: &str) -> bool {
        self.transient.remove(name).is_some()
    }

    /// Attachment names of both kinds, sorted and deduplicated.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .predetermined
            .keys()
            .chain(self.transient.keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.predetermined.is_empty() && self.transient.is_empty()
    }

    /// Forget everything deployers produced.
    pub fn clear_transient(&mut self) {
        self.transient.clear();
    }

    pub fn clear(&mut self) {
        self.predetermined.clear();
        self.transient.clear();
    }
}
