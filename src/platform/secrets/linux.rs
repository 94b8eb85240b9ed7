//! Linux Secret Service implementation
//!
//! Uses the freedesktop.org Secret Service API to store credentials in
//! GNOME Keyring, KDE Wallet, or any other Secret Service provider.

use std::collections::HashMap;

use async_trait::async_trait;
use secret_service::{Collection, EncryptionType, SecretService};

use super::{SecureStorage, StorageError, SERVICE_NAME};

const APPLICATION_ATTR: &str = "recal-client";

/// Linux Secret Service secure storage implementation
pub struct LinuxSecretService {
    service_name: String,
}

impl LinuxSecretService {
    pub fn new() -> Self {
        Self {
            service_name: SERVICE_NAME.to_string(),
        }
    }

    /// Create with a custom service name (for testing)
    #[allow(dead_code)]
    pub fn with_service(service: &str) -> Self {
        Self {
            service_name: service.to_string(),
        }
    }

    async fn connect(&self) -> Result<SecretService<'static>, StorageError> {
        SecretService::connect(EncryptionType::Dh).await.map_err(|e| {
            StorageError::Platform(format!("failed to connect to Secret Service: {}", e))
        })
    }

    async fn collection<'a>(
        &self,
        service: &'a SecretService<'a>,
    ) -> Result<Collection<'a>, StorageError> {
        let collection = service.get_default_collection().await.map_err(|e| {
            StorageError::Platform(format!("failed to get default collection: {}", e))
        })?;

        if collection.is_locked().await.unwrap_or(true) {
            collection
                .unlock()
                .await
                .map_err(|_| StorageError::Locked)?;
        }

        Ok(collection)
    }

    fn attributes<'a>(&self, key: &'a str) -> HashMap<&'a str, &'a str> {
        let mut attrs = HashMap::new();
        attrs.insert("application", APPLICATION_ATTR);
        attrs.insert("key", key);
        attrs
    }
}

impl Default for LinuxSecretService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecureStorage for LinuxSecretService {
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let service = self.connect().await?;
        let collection = self.collection(&service).await?;

        let label = format!("{}: {}", self.service_name, key);
        collection
            .create_item(
                &label,
                self.attributes(key),
                value.as_bytes(),
                true, // replace if exists
                "text/plain",
            )
            .await
            .map_err(|e| StorageError::Platform(format!("failed to create secret: {}", e)))?;

        tracing::debug!("stored '{}' in Secret Service", key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let service = self.connect().await?;
        let collection = self.collection(&service).await?;

        let items = collection
            .search_items(self.attributes(key))
            .await
            .map_err(|e| StorageError::Platform(format!("failed to search secrets: {}", e)))?;

        let Some(item) = items.first() else {
            return Ok(None);
        };

        if item.is_locked().await.unwrap_or(true) {
            item.unlock().await.map_err(|_| StorageError::Locked)?;
        }

        let secret = item
            .get_secret()
            .await
            .map_err(|e| StorageError::Platform(format!("failed to get secret: {}", e)))?;

        let value = String::from_utf8(secret)
            .map_err(|e| StorageError::Platform(format!("invalid UTF-8: {}", e)))?;

        Ok(Some(value))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let service = self.connect().await?;
        let collection = self.collection(&service).await?;

        let items = collection
            .search_items(self.attributes(key))
            .await
            .map_err(|e| StorageError::Platform(format!("failed to search secrets: {}", e)))?;

        for item in items {
            item.delete()
                .await
                .map_err(|e| StorageError::Platform(format!("failed to delete secret: {}", e)))?;
        }

        Ok(())
    }
}
