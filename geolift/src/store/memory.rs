//! In-process store backend.

use super::{SharedStore, StoreError};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One stored value. Type confusion (list op on a string key) is a
/// programming error and reported as a command failure, matching the
/// behavior of the production backend.
#[derive(Debug, Clone)]
enum Value {
    Text(String),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Text(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

/// Process-local [`SharedStore`] backed by a concurrent map.
///
/// Used by the test suite and by single-node runs that have no shared
/// store deployed. Cloning is cheap and all clones see the same data.
/// The availability switch lets tests simulate a store outage.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Value>>,
    available: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Creates an empty, available store.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Toggles simulated availability. While unavailable every
    /// operation fails with [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(
                "memory store marked unavailable".to_string(),
            ))
        }
    }

    fn wrong_type(key: &str, found: &Value, wanted: &str) -> StoreError {
        StoreError::Command(format!(
            "key {key} holds a {} value, expected {wanted}",
            found.kind()
        ))
    }
}

impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_available()?;
        match self.entries.get(key) {
            None => Ok(None),
            Some(entry) => match entry.value() {
                Value::Text(s) => Ok(Some(s.clone())),
                other => Err(Self::wrong_type(key, other, "string")),
            },
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check_available()?;
        self.entries
            .insert(key.to_string(), Value::Text(value.to_string()));
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        self.check_available()?;
        // The entry API holds the shard lock, making check-then-insert atomic.
        let entry = self.entries.entry(key.to_string());
        match entry {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Value::Text(value.to_string()));
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.check_available()?;
        Ok(self.entries.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.check_available()?;
        Ok(self.entries.contains_key(key))
    }

    async fn append(&self, key: &str, values: &[String]) -> Result<(), StoreError> {
        self.check_available()?;
        if values.is_empty() {
            return Ok(());
        }
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Value::List(Vec::new()));
        match entry.value_mut() {
            Value::List(list) => {
                list.extend(values.iter().cloned());
                Ok(())
            }
            other => Err(Self::wrong_type(key, other, "list")),
        }
    }

    async fn list(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.check_available()?;
        match self.entries.get(key) {
            None => Ok(Vec::new()),
            Some(entry) => match entry.value() {
                Value::List(list) => Ok(list.clone()),
                other => Err(Self::wrong_type(key, other, "list")),
            },
        }
    }

    async fn map_set(&self, key: &str, entries: &[(String, String)]) -> Result<(), StoreError> {
        self.check_available()?;
        if entries.is_empty() {
            return Ok(());
        }
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Value::Map(BTreeMap::new()));
        match entry.value_mut() {
            Value::Map(map) => {
                for (field, value) in entries {
                    map.insert(field.clone(), value.clone());
                }
                Ok(())
            }
            other => Err(Self::wrong_type(key, other, "map")),
        }
    }

    async fn map_get_all(&self, key: &str) -> Result<Vec<(String, String)>, StoreError> {
        self.check_available()?;
        match self.entries.get(key) {
            None => Ok(Vec::new()),
            Some(entry) => match entry.value() {
                Value::Map(map) => Ok(map
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()),
                other => Err(Self::wrong_type(key, other, "map")),
            },
        }
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.check_available()?;
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}
