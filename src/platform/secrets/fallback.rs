//! File-backed fallback store.
//!
//! Used on hosts without a native secure store. Values are kept as a JSON map
//! in the platform data directory: durable, but not encrypted at rest. A
//! warning is logged at construction so the degraded security posture is
//! visible.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{SecureStorage, StorageError};

const STORE_FILE: &str = "credentials.json";

/// Plain-file key-value store.
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the backing file.
    lock: Mutex<()>,
}

impl FileStore {
    /// Store backed by a file inside the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        tracing::warn!(
            "no secure store on this platform; credentials stored unencrypted under {:?}",
            dir
        );
        Self {
            path: dir.join(STORE_FILE),
            lock: Mutex::new(()),
        }
    }

    /// Store under the platform data directory, falling back to the temp dir.
    pub fn at_default_location() -> Self {
        let dir = dirs::data_dir()
            .map(|d| d.join("recal-client"))
            .unwrap_or_else(std::env::temp_dir);
        Self::new(dir)
    }

    fn read_map(&self) -> Result<HashMap<String, String>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| StorageError::Platform(format!("corrupt store file: {}", e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(StorageError::Platform(format!(
                "failed to read store file: {}",
                e
            ))),
        }
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Platform(format!("failed to create dir: {}", e)))?;
        }
        let contents = serde_json::to_string_pretty(map)
            .map_err(|e| StorageError::Platform(format!("failed to encode store: {}", e)))?;
        std::fs::write(&self.path, contents)
            .map_err(|e| StorageError::Platform(format!("failed to write store file: {}", e)))
    }
}

#[async_trait]
impl SecureStorage for FileStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap();
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().unwrap();
        Ok(self.read_map()?.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap();
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> FileStore {
        let dir = std::env::temp_dir().join(format!("recal-store-{}", uuid::Uuid::new_v4()));
        FileStore::new(dir)
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let store = temp_store();
        assert_eq!(store.get("username").await.unwrap(), None);

        store.set("username", "student").await.unwrap();
        store.set("password", "hunter22").await.unwrap();
        assert_eq!(
            store.get("username").await.unwrap(),
            Some("student".to_string())
        );

        store.delete("username").await.unwrap();
        assert_eq!(store.get("username").await.unwrap(), None);
        // Other keys survive a delete
        assert_eq!(
            store.get("password").await.unwrap(),
            Some("hunter22".to_string())
        );
    }

    #[tokio::test]
    async fn test_delete_absent_key_is_noop() {
        let store = temp_store();
        store.delete("never-set").await.unwrap();
    }

    #[tokio::test]
    async fn test_overwrite() {
        let store = temp_store();
        store.set("access_token", "old").await.unwrap();
        store.set("access_token", "new").await.unwrap();
        assert_eq!(
            store.get("access_token").await.unwrap(),
            Some("new".to_string())
        );
    }
}
