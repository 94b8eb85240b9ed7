//! In-memory store for tests and ephemeral contexts.
//!
//! Satisfies the same contract as the platform stores without touching the
//! host keychain, so every test can run against a fresh, isolated context.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{SecureStorage, StorageError};

#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecureStorage for MemoryStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.map
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.map.lock().unwrap().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.map.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip() {
        let store = MemoryStore::new();
        store.set("username", "student").await.unwrap();
        assert_eq!(
            store.get("username").await.unwrap(),
            Some("student".to_string())
        );
        store.delete("username").await.unwrap();
        assert_eq!(store.get("username").await.unwrap(), None);
    }
}
