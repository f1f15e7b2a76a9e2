use std::{collections::HashMap, sync::RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::{KvStore, StoreError};

/// In-process store backed by a map.
///
/// Values are kept as documents; reads hand out copies.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.len())
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Value>>, StoreError> {
        self.entries.read().map_err(|e| StoreError::Internal { reason: e.to_string() })
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.read()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let mut entries =
            self.entries.write().map_err(|e| StoreError::Internal { reason: e.to_string() })?;
        entries.insert(key.to_owned(), value.clone());
        Ok(())
    }

    async fn count_by_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        Ok(self.read()?.keys().filter(|key| key.starts_with(prefix)).count())
    }
}
