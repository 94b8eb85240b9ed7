//! macOS and iOS Keychain implementation using Security.framework
//!
//! Stores login credentials and the cached token with hardware-backed
//! encryption on devices with a Secure Enclave.

use async_trait::async_trait;
use security_framework::passwords::{
    delete_generic_password, get_generic_password, set_generic_password,
};

use super::{SecureStorage, StorageError, SERVICE_NAME};

/// Apple Keychain secure storage implementation
pub struct AppleKeychain {
    service: String,
}

impl AppleKeychain {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
        }
    }

    /// Create with a custom service name (for testing)
    #[allow(dead_code)]
    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }
}

impl Default for AppleKeychain {
    fn default() -> Self {
        Self::new()
    }
}

fn classify(msg: String) -> StorageError {
    if msg.contains("denied") || msg.contains("authorized") {
        StorageError::AccessDenied
    } else {
        StorageError::Platform(msg)
    }
}

// Security.framework reports "missing item" through error messages rather than
// a dedicated code on all OS versions; -25300 is errSecItemNotFound.
fn is_not_found(msg: &str) -> bool {
    msg.contains("not found") || msg.contains("could not be found") || msg.contains("-25300")
}

#[async_trait]
impl SecureStorage for AppleKeychain {
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        // Delete existing entry first (update not directly supported)
        let _ = delete_generic_password(&self.service, key);

        set_generic_password(&self.service, key, value.as_bytes())
            .map_err(|e| classify(e.to_string()))?;

        tracing::debug!("stored '{}' in Keychain", key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match get_generic_password(&self.service, key) {
            Ok(bytes) => {
                let value = String::from_utf8(bytes).map_err(|e| {
                    StorageError::Platform(format!("invalid UTF-8 in keychain: {}", e))
                })?;
                Ok(Some(value))
            }
            Err(e) => {
                let msg = e.to_string();
                if is_not_found(&msg) {
                    Ok(None)
                } else {
                    Err(classify(msg))
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match delete_generic_password(&self.service, key) {
            Ok(()) => Ok(()),
            Err(e) => {
                let msg = e.to_string();
                if is_not_found(&msg) {
                    Ok(())
                } else {
                    Err(classify(msg))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keychain_roundtrip() {
        let storage = AppleKeychain::with_service("com.recal.activerecall.test");
        let key = "username";
        let value = "student@example.com";

        let _ = storage.delete(key).await;

        storage.set(key, value).await.expect("Failed to set");
        let retrieved = storage.get(key).await.expect("Failed to get");
        assert_eq!(retrieved, Some(value.to_string()));

        storage.delete(key).await.expect("Failed to delete");
        let after_delete = storage.get(key).await.expect("Failed to get after delete");
        assert_eq!(after_delete, None);
    }
}
