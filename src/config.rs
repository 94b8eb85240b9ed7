//! Client configuration.
//!
//! The defaults point at the production webhook deployment. Both base URLs are
//! overridable so tests can target a local backend with a fresh context.

/// Base URL for token exchange, note listing and transcription.
pub const DEFAULT_API_BASE: &str = "https://n8n.srv913906.hstgr.cloud/webhook/api";

/// Base URL for the question/evaluation endpoints, which live under a separate
/// webhook route in the deployment.
pub const DEFAULT_NOTES_API_BASE: &str =
    "https://n8n.srv913906.hstgr.cloud/webhook/6ee000e1-5ed7-4242-bada-7706ddfdd2ff/api";

/// Audience claim sent with the token exchange.
pub const TOKEN_AUDIENCE: &str = "https://recal.test.com/isam";

/// Transcription model identifier sent with audio uploads.
pub const TRANSCRIPTION_MODEL: &str = "scribe_v1";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub notes_api_base: String,
    pub audience: String,
    pub transcription_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            notes_api_base: DEFAULT_NOTES_API_BASE.to_string(),
            audience: TOKEN_AUDIENCE.to_string(),
            transcription_model: TRANSCRIPTION_MODEL.to_string(),
        }
    }
}

impl Config {
    /// Config with both endpoint families served from one base URL.
    pub fn with_base(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            api_base: base.clone(),
            notes_api_base: base,
            ..Self::default()
        }
    }
}
