//! Keyed in-memory store shared by both entity kinds.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{RegistryError, Result};
use crate::model::Versioned;

type Key = (String, u64);

/// Mutex-guarded map from `(name, version)` to an owned entity.
pub struct InMemoryStore<T> {
    entries: Mutex<HashMap<Key, T>>,
}

impl<T> Default for InMemoryStore<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Versioned + Clone> InMemoryStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entity. Fails with `Conflict` if the slot is taken.
    pub fn add(&self, entity: T) -> Result<()> {
        let key = key_of(&entity);
        let mut entries = self.entries.lock().expect("store mutex poisoned");
        if entries.contains_key(&key) {
            return Err(conflict::<T>(key));
        }
        tracing::debug!(kind = T::KIND, name = %key.0, version = key.1, "Entity added");
        entries.insert(key, entity);
        Ok(())
    }

    /// Copy of the entity stored under `(name, version)`.
    pub fn get(&self, name: &str, version: u64) -> Result<T> {
        let entries = self.entries.lock().expect("store mutex poisoned");
        entries
            .get(&(name.to_string(), version))
            .cloned()
            .ok_or_else(|| not_found::<T>(name, version))
    }

    /// Copies of every stored entity, in no particular order.
    pub fn get_all(&self) -> Vec<T> {
        let entries = self.entries.lock().expect("store mutex poisoned");
        entries.values().cloned().collect()
    }

    /// Replace an existing entity in place.
    ///
    /// Reserved for corrective bookkeeping. Group membership changes go
    /// through the versioning engine, which never rewrites a stored version.
    pub fn update(&self, entity: T) -> Result<()> {
        let key = key_of(&entity);
        let mut entries = self.entries.lock().expect("store mutex poisoned");
        match entries.get_mut(&key) {
            Some(slot) => {
                *slot = entity;
                Ok(())
            }
            None => Err(not_found::<T>(&key.0, key.1)),
        }
    }

    /// Remove and return the entity under `(name, version)`.
    pub fn delete(&self, name: &str, version: u64) -> Result<T> {
        let mut entries = self.entries.lock().expect("store mutex poisoned");
        let removed = entries
            .remove(&(name.to_string(), version))
            .ok_or_else(|| not_found::<T>(name, version))?;
        tracing::debug!(kind = T::KIND, name = %name, version, "Entity deleted");
        Ok(removed)
    }

    /// Stored versions of `name`, ascending.
    pub fn versions(&self, name: &str) -> Vec<u64> {
        let entries = self.entries.lock().expect("store mutex poisoned");
        let mut versions: Vec<u64> = entries
            .keys()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| *v)
            .collect();
        versions.sort_unstable();
        versions
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn key_of<T: Versioned>(entity: &T) -> Key {
    (entity.name().to_string(), entity.version())
}

fn not_found<T: Versioned>(name: &str, version: u64) -> RegistryError {
    RegistryError::NotFound {
        kind: T::KIND,
        name: name.to_string(),
        version,
    }
}

fn conflict<T: Versioned>((name, version): Key) -> RegistryError {
    RegistryError::Conflict {
        kind: T::KIND,
        name,
        version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Config, ConfigGroup, GroupEntry};
    use std::sync::Arc;

    fn db_config(version: u64) -> Config {
        let mut config = Config::new("db_config", version);
        config.add_parameter("username", "pera");
        config.add_parameter("port", "5432");
        config
    }

    #[test]
    fn test_add_then_get_round_trip() {
        let store = InMemoryStore::new();
        store.add(db_config(2)).unwrap();

        let fetched = store.get("db_config", 2).unwrap();
        assert_eq!(fetched, db_config(2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_add_conflict() {
        let store = InMemoryStore::new();
        store.add(db_config(1)).unwrap();

        let err = store.add(db_config(1)).unwrap_err();
        assert!(matches!(err, RegistryError::Conflict { version: 1, .. }));
        // Another version of the same name is a different slot.
        store.add(db_config(2)).unwrap();
        assert_eq!(store.versions("db_config"), vec![1, 2]);
    }

    #[test]
    fn test_delete_then_get_not_found() {
        let store = InMemoryStore::new();
        store.add(db_config(1)).unwrap();

        let removed = store.delete("db_config", 1).unwrap();
        assert_eq!(removed.version, 1);
        assert!(store.get("db_config", 1).unwrap_err().is_not_found());
        assert!(store.delete("db_config", 1).unwrap_err().is_not_found());
        assert!(store.is_empty());

        // A freed slot can be created again.
        store.add(db_config(1)).unwrap();
    }

    #[test]
    fn test_returned_copy_is_detached() {
        let store = InMemoryStore::new();
        let mut group = ConfigGroup::new("web_configs", 1);
        group.push_entry(GroupEntry::new("web_server"));
        store.add(group).unwrap();

        let mut copy = store.get("web_configs", 1).unwrap();
        copy.push_entry(GroupEntry::new("intruder"));

        assert_eq!(store.get("web_configs", 1).unwrap().entry_count(), 1);
    }

    #[test]
    fn test_update() {
        let store = InMemoryStore::new();
        assert!(store.update(db_config(1)).unwrap_err().is_not_found());

        store.add(db_config(1)).unwrap();
        let mut changed = db_config(1);
        changed.add_parameter("host", "localhost");
        store.update(changed.clone()).unwrap();
        assert_eq!(store.get("db_config", 1).unwrap(), changed);
    }

    #[test]
    fn test_get_all() {
        let store = InMemoryStore::new();
        for v in 1..=3 {
            store.add(db_config(v)).unwrap();
        }
        let mut versions: Vec<u64> = store.get_all().iter().map(|c| c.version).collect();
        versions.sort();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[test]
    fn test_concurrent_adds_to_same_slot() {
        let store = Arc::new(InMemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.add(db_config(7)).is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(store.len(), 1);
    }
}
