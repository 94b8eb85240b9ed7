//! Platform abstraction layer.
//!
//! - `secrets`: secure credential storage (Keychain / Secret Service / file fallback)
//! - `audio`: native audio capture and playback (CPAL on desktop, host-bridged on mobile)

pub mod audio;
pub mod secrets;

pub use audio::{AudioBackendError, AudioCapture, AudioPlayback, SoundId, TARGET_SAMPLE_RATE};
pub use secrets::{SecureStorage, StorageError};
