//! Cross-platform secure credential storage.
//!
//! Platform implementations:
//! - macOS/iOS: Security.framework Keychain
//! - Linux: Secret Service (libsecret/GNOME Keyring)
//! - Other hosts: file-backed fallback store
//!
//! The backing is chosen once at startup via [`default_storage`]; callers hold
//! an `Arc<dyn SecureStorage>` and never branch on platform at call sites.
//! Reads and writes are suspension points, so the trait is async.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for secure storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// Platform-specific error with message
    #[error("platform error: {0}")]
    Platform(String),
    /// Storage is locked (e.g., keychain locked)
    #[error("secure storage is locked")]
    Locked,
    /// Access denied (e.g., app not authorized)
    #[error("access denied to secure storage")]
    AccessDenied,
}

/// Trait for platform-specific secure storage implementations
#[async_trait]
pub trait SecureStorage: Send + Sync {
    /// Store a secret value
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Retrieve a secret value; `Ok(None)` if the key is absent
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Delete a secret; deleting an absent key is a no-op
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

// Platform-specific implementations
#[cfg(any(target_os = "macos", target_os = "ios"))]
mod apple;

#[cfg(target_os = "linux")]
mod linux;

mod fallback;
mod memory;

#[cfg(any(target_os = "macos", target_os = "ios"))]
pub use apple::AppleKeychain;

#[cfg(target_os = "linux")]
pub use linux::LinuxSecretService;

pub use fallback::FileStore;
pub use memory::MemoryStore;

/// Service name used for keychain entries
pub const SERVICE_NAME: &str = "com.recal.activerecall";

/// Cached session token, persisted so it survives process restart.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Expiry instant of the cached token, as epoch milliseconds.
pub const TOKEN_EXPIRY_KEY: &str = "token_expiry";
/// Stored login credentials, written at login and deleted at logout.
pub const USERNAME_KEY: &str = "username";
pub const PASSWORD_KEY: &str = "password";
/// Logged-in flag, "true" while a login is in effect.
pub const LOGGED_IN_KEY: &str = "is_logged_in";

/// Every key the auth client persists; logout clears all of them.
pub const CREDENTIAL_KEYS: &[&str] = &[
    ACCESS_TOKEN_KEY,
    TOKEN_EXPIRY_KEY,
    USERNAME_KEY,
    PASSWORD_KEY,
    LOGGED_IN_KEY,
];

/// Get the platform-appropriate storage backing.
pub fn default_storage() -> Arc<dyn SecureStorage> {
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        Arc::new(AppleKeychain::new())
    }
    #[cfg(target_os = "linux")]
    {
        Arc::new(LinuxSecretService::new())
    }
    #[cfg(not(any(target_os = "macos", target_os = "ios", target_os = "linux")))]
    {
        Arc::new(FileStore::at_default_location())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_keys_cover_token_cache() {
        assert!(CREDENTIAL_KEYS.contains(&ACCESS_TOKEN_KEY));
        assert!(CREDENTIAL_KEYS.contains(&TOKEN_EXPIRY_KEY));
        assert!(CREDENTIAL_KEYS.contains(&PASSWORD_KEY));
    }
}
