//! Client core for an active-recall study app.
//!
//! The crate is the full non-UI client: secure credential storage, a
//! token-caching auth client, the authenticated webhook API client, native
//! audio recording/playback engines, and the practice session state machine
//! that ties them together. A host shell (mobile or desktop) renders screens
//! and forwards user intent; everything stateful lives here.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod platform;
pub mod playback;
pub mod recording;
pub mod session;

use std::sync::Arc;

pub use api::ApiClient;
pub use auth::AuthClient;
pub use config::Config;
pub use error::{ApiError, AudioError, SessionError};
pub use platform::secrets::SecureStorage;
pub use playback::Player;
pub use recording::Recorder;
pub use session::{FetchFallback, Phase, PracticeFlow, SubmitOutcome};

/// Shared service context for one app instance.
///
/// Owns the HTTP connection pool and the auth client; both are cheap to
/// clone, so handing them to screens or background tasks needs no locking.
#[derive(Clone)]
pub struct AppContext {
    pub config: Config,
    pub auth: AuthClient,
    pub api: ApiClient,
}

impl AppContext {
    pub fn new(config: Config, storage: Arc<dyn SecureStorage>) -> Self {
        let http = reqwest::Client::new();
        let auth = AuthClient::new(config.clone(), http.clone(), storage);
        let api = ApiClient::new(config.clone(), http, auth.clone());
        Self { config, auth, api }
    }

    /// Context wired to the platform's secure storage backend.
    pub fn with_platform_defaults() -> Self {
        Self::new(Config::default(), platform::secrets::default_storage())
    }

    /// Build a practice session for one note, wired to the platform audio
    /// backends.
    pub fn practice_session(&self, note_id: impl Into<String>) -> PracticeFlow {
        let recorder = Recorder::with_default_dir(platform::audio::default_capture());
        let player = Player::new(platform::audio::default_playback());
        PracticeFlow::new(self.api.clone(), note_id, recorder, player)
    }
}

/// Install the default tracing subscriber (env-filtered, stdout).
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}
