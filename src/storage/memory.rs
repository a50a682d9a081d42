use super::types::{Entry, ReplicaRole};
use std::collections::HashMap;

/// What a stabilizing upsert did to the local copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated,
    Unchanged,
}

/// The node-local key-value map. Unbounded, no expiry.
#[derive(Debug, Default)]
pub struct LocalStore {
    entries: HashMap<String, Entry>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fails if the key already exists.
    pub fn create(&mut self, key: &str, entry: Entry) -> bool {
        if self.entries.contains_key(key) {
            return false;
        }
        self.entries.insert(key.to_string(), entry);
        true
    }

    pub fn read(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Fails if the key does not exist.
    pub fn update(&mut self, key: &str, entry: Entry) -> bool {
        match self.entries.get_mut(key) {
            Some(existing) => {
                *existing = entry;
                true
            }
            None => false,
        }
    }

    /// Fails if the key does not exist.
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Applies a pushed repair copy: create if absent, overwrite if the value
    /// differs, otherwise leave the local copy alone.
    pub fn upsert(&mut self, key: &str, entry: Entry) -> Upsert {
        match self.entries.get_mut(key) {
            None => {
                self.entries.insert(key.to_string(), entry);
                Upsert::Created
            }
            Some(existing) if existing.value != entry.value => {
                *existing = entry;
                Upsert::Updated
            }
            Some(_) => Upsert::Unchanged,
        }
    }

    pub fn relabel(&mut self, key: &str, role: ReplicaRole) -> bool {
        match self.entries.get_mut(key) {
            Some(existing) if existing.role != role => {
                existing.role = role;
                true
            }
            _ => false,
        }
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Entry)> {
        self.entries.iter()
    }
}
