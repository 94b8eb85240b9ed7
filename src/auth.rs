//! Token-caching authentication client.
//!
//! Token lookup walks three tiers: the in-process cache (no I/O), the
//! persisted cache (survives restart), and finally a credential-based refresh
//! against the token endpoint. "No stored credentials" is a normal outcome —
//! the caller treats it as "not authenticated" — not an error.
//!
//! Concurrent refreshes are tolerated rather than serialized: the token
//! exchange is idempotent per credential pair, so the last writer wins.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::models::{AuthResponse, TokenRequest};
use crate::platform::secrets::{
    SecureStorage, StorageError, ACCESS_TOKEN_KEY, CREDENTIAL_KEYS, LOGGED_IN_KEY, PASSWORD_KEY,
    TOKEN_EXPIRY_KEY, USERNAME_KEY,
};

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

#[derive(Clone)]
pub struct AuthClient {
    config: Config,
    http: reqwest::Client,
    storage: Arc<dyn SecureStorage>,
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl AuthClient {
    pub fn new(config: Config, http: reqwest::Client, storage: Arc<dyn SecureStorage>) -> Self {
        Self {
            config,
            http,
            storage,
            token: Arc::new(Mutex::new(None)),
        }
    }

    /// Get a token that is currently valid, or `None` if the user is not
    /// authenticated. Performs no network I/O while the in-process cache is hot.
    pub async fn valid_token(&self) -> Option<String> {
        {
            let cached = self.token.lock().await;
            if let Some(token) = cached.as_ref() {
                if token.is_valid() {
                    return Some(token.access_token.clone());
                }
            }
        }

        if let Some(token) = self.read_persisted_token().await {
            if token.is_valid() {
                tracing::debug!("promoting persisted token to memory cache");
                let access = token.access_token.clone();
                *self.token.lock().await = Some(token);
                return Some(access);
            }
        }

        self.refresh_with_stored_credentials().await
    }

    /// Exchange credentials for a token. Returns `false` on any rejection or
    /// transport failure; nothing propagates to the caller.
    pub async fn authenticate(&self, username: &str, password: &str) -> bool {
        let body = TokenRequest {
            client_name: username.to_string(),
            client_secret: password.to_string(),
            audience: self.config.audience.clone(),
        };

        let response = match self
            .http
            .post(format!("{}/tokens", self.config.api_base))
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("token exchange failed: {}", e);
                return false;
            }
        };

        if !response.status().is_success() {
            tracing::warn!("authentication rejected with status {}", response.status());
            return false;
        }

        let auth: AuthResponse = match response.json().await {
            Ok(auth) => auth,
            Err(e) => {
                tracing::warn!("malformed token response: {}", e);
                return false;
            }
        };

        let expires_in: i64 = match auth.expires_in.parse() {
            Ok(seconds) => seconds,
            Err(_) => {
                tracing::warn!("unparseable expiresIn {:?}", auth.expires_in);
                return false;
            }
        };

        let token = CachedToken {
            access_token: auth.access_token,
            expires_at: Utc::now() + Duration::seconds(expires_in),
        };

        self.persist(ACCESS_TOKEN_KEY, &token.access_token).await;
        self.persist(
            TOKEN_EXPIRY_KEY,
            &token.expires_at.timestamp_millis().to_string(),
        )
        .await;
        *self.token.lock().await = Some(token);

        tracing::info!("authentication successful, token cached");
        true
    }

    /// Authenticate and persist the credentials for later refreshes.
    /// `Ok(false)` means the backend rejected the credentials; storage write
    /// failures during login propagate.
    pub async fn login(&self, username: &str, password: &str) -> Result<bool, StorageError> {
        let username = username.trim();
        if !self.authenticate(username, password).await {
            return Ok(false);
        }

        self.storage.set(USERNAME_KEY, username).await?;
        self.storage.set(PASSWORD_KEY, password).await?;
        self.storage.set(LOGGED_IN_KEY, "true").await?;
        Ok(true)
    }

    pub async fn is_logged_in(&self) -> bool {
        let flag = self.read_secret(LOGGED_IN_KEY).await;
        flag.as_deref() == Some("true") && self.valid_token().await.is_some()
    }

    /// Clear the in-memory token, persisted token cache, and all stored
    /// credentials. Irreversible; deletes are best-effort.
    pub async fn logout(&self) {
        *self.token.lock().await = None;
        for key in CREDENTIAL_KEYS {
            if let Err(e) = self.storage.delete(key).await {
                tracing::warn!("failed to delete '{}' during logout: {}", key, e);
            }
        }
        tracing::info!("logged out, credentials cleared");
    }

    /// Clear only the cached token (memory + persisted), forcing the next
    /// `valid_token` to re-authenticate. Stored credentials are untouched.
    pub async fn clear_token(&self) {
        *self.token.lock().await = None;
        for key in [ACCESS_TOKEN_KEY, TOKEN_EXPIRY_KEY] {
            if let Err(e) = self.storage.delete(key).await {
                tracing::warn!("failed to delete '{}': {}", key, e);
            }
        }
    }

    async fn refresh_with_stored_credentials(&self) -> Option<String> {
        let username = self.read_secret(USERNAME_KEY).await?;
        let password = self.read_secret(PASSWORD_KEY).await?;

        tracing::debug!("refreshing token with stored credentials");
        if self.authenticate(&username, &password).await {
            let cached = self.token.lock().await;
            cached.as_ref().map(|t| t.access_token.clone())
        } else {
            // The stored credentials no longer work; clear them so the caller
            // lands on the login flow instead of refresh-looping.
            tracing::warn!("credential refresh rejected, logging out");
            self.logout().await;
            None
        }
    }

    async fn read_persisted_token(&self) -> Option<CachedToken> {
        let access_token = self.read_secret(ACCESS_TOKEN_KEY).await?;
        let expiry_millis: i64 = self.read_secret(TOKEN_EXPIRY_KEY).await?.parse().ok()?;
        let expires_at = DateTime::from_timestamp_millis(expiry_millis)?;
        Some(CachedToken {
            access_token,
            expires_at,
        })
    }

    // Storage read failures are logged and treated as "absent": the refresh
    // chain then decides whether the user counts as authenticated.
    async fn read_secret(&self, key: &str) -> Option<String> {
        match self.storage.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("failed to read '{}' from secure storage: {}", key, e);
                None
            }
        }
    }

    async fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.storage.set(key, value).await {
            tracing::warn!("failed to persist '{}': {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::secrets::MemoryStore;

    fn client_with_store(store: Arc<MemoryStore>) -> AuthClient {
        // Unroutable base: these tests must not perform network I/O
        let config = Config::with_base("http://127.0.0.1:1/api");
        AuthClient::new(config, reqwest::Client::new(), store)
    }

    async fn seed_token(store: &MemoryStore, token: &str, expires_at: DateTime<Utc>) {
        store.set(ACCESS_TOKEN_KEY, token).await.unwrap();
        store
            .set(TOKEN_EXPIRY_KEY, &expires_at.timestamp_millis().to_string())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_persisted_token_promoted_without_network() {
        let store = Arc::new(MemoryStore::new());
        seed_token(&store, "persisted-token", Utc::now() + Duration::hours(1)).await;

        let auth = client_with_store(store);
        assert_eq!(auth.valid_token().await, Some("persisted-token".to_string()));
        // Second call hits the memory cache
        assert_eq!(auth.valid_token().await, Some("persisted-token".to_string()));
    }

    #[tokio::test]
    async fn test_expired_token_without_credentials_yields_none() {
        let store = Arc::new(MemoryStore::new());
        seed_token(&store, "stale-token", Utc::now() - Duration::hours(1)).await;

        let auth = client_with_store(store);
        assert_eq!(auth.valid_token().await, None);
    }

    #[tokio::test]
    async fn test_clear_token_keeps_credentials() {
        let store = Arc::new(MemoryStore::new());
        seed_token(&store, "token", Utc::now() + Duration::hours(1)).await;
        store.set(USERNAME_KEY, "student").await.unwrap();
        store.set(PASSWORD_KEY, "hunter22").await.unwrap();

        let auth = client_with_store(store.clone());
        auth.clear_token().await;

        assert_eq!(store.get(ACCESS_TOKEN_KEY).await.unwrap(), None);
        assert_eq!(store.get(TOKEN_EXPIRY_KEY).await.unwrap(), None);
        assert_eq!(
            store.get(USERNAME_KEY).await.unwrap(),
            Some("student".to_string())
        );
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let store = Arc::new(MemoryStore::new());
        seed_token(&store, "token", Utc::now() + Duration::hours(1)).await;
        store.set(USERNAME_KEY, "student").await.unwrap();
        store.set(PASSWORD_KEY, "hunter22").await.unwrap();
        store.set(LOGGED_IN_KEY, "true").await.unwrap();

        let auth = client_with_store(store.clone());
        auth.logout().await;

        for key in CREDENTIAL_KEYS {
            assert_eq!(store.get(key).await.unwrap(), None, "{} survived logout", key);
        }
        assert!(!auth.is_logged_in().await);
    }

    #[tokio::test]
    async fn test_not_logged_in_without_flag() {
        let store = Arc::new(MemoryStore::new());
        seed_token(&store, "token", Utc::now() + Duration::hours(1)).await;

        let auth = client_with_store(store);
        // Valid token but no logged-in flag
        assert!(!auth.is_logged_in().await);
    }
}
