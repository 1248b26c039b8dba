//! Named root bindings.
//!
//! A root is the analog of a local variable in an active scope or a static
//! field: whatever it names is reachable unconditionally.

use crate::object::ObjectId;
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone)]
pub struct RootSet {
    bindings: BTreeMap<String, ObjectId>,
}

impl RootSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `id`, returning the previous binding if any.
    pub fn bind(&mut self, name: impl Into<String>, id: ObjectId) -> Option<ObjectId> {
        self.bindings.insert(name.into(), id)
    }

    /// Unbinding a name that is not bound is a no-op.
    pub fn unbind(&mut self, name: &str) -> Option<ObjectId> {
        self.bindings.remove(name)
    }

    /// Drop every binding that names `id`. Returns the names removed.
    pub fn unbind_object(&mut self, id: ObjectId) -> Vec<String> {
        let names: Vec<String> = self
            .bindings
            .iter()
            .filter(|(_, bound)| **bound == id)
            .map(|(name, _)| name.clone())
            .collect();

        for name in &names {
            self.bindings.remove(name);
        }

        names
    }

    pub fn get(&self, name: &str) -> Option<ObjectId> {
        self.bindings.get(name).copied()
    }

    pub fn contains_object(&self, id: ObjectId) -> bool {
        self.bindings.values().any(|bound| *bound == id)
    }

    pub fn object_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.bindings.values().copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
