//! Cross-platform audio capture and playback abstraction.
//!
//! Platform implementations:
//! - Desktop (macOS/Windows/Linux): CPAL for native capture and playback
//! - Mobile (iOS/Android): stubs; the host shell owns the audio session and
//!   bridges captured samples in natively
//!
//! The engines in `recording` and `playback` own all state-machine rules;
//! these traits only move PCM in and out of the hardware.

use std::path::Path;

use thiserror::Error;
use uuid::Uuid;

/// Error type for audio backend operations
#[derive(Debug, Error)]
pub enum AudioBackendError {
    /// No audio device available
    #[error("no audio device available")]
    NoDevice,
    /// Device configuration error
    #[error("audio configuration error: {0}")]
    Configuration(String),
    /// Stream error during capture or playback
    #[error("audio stream error: {0}")]
    Stream(String),
    /// Microphone permission denied
    #[error("microphone permission denied")]
    PermissionDenied,
    /// Platform not supported for native audio
    #[error("native audio not supported on this platform")]
    NotSupported,
    /// Could not decode an audio artifact
    #[error("failed to decode audio: {0}")]
    Decode(String),
}

/// What the platform declared about capture at setup time; cached by the
/// recording engine so misuse fails fast without touching hardware.
#[derive(Debug, Clone, Copy)]
pub struct Capability {
    pub supported: bool,
    pub permission_granted: bool,
}

/// Trait for platform-specific audio capture implementations.
///
/// A backend accumulates 16 kHz mono i16 PCM between `start` and `stop`.
pub trait AudioCapture: Send + Sync {
    /// Declared capture capability, probed once at setup
    fn capability(&self) -> Capability;

    /// Begin accumulating samples
    fn start(&self) -> Result<(), AudioBackendError>;

    /// Stop capturing and hand back everything accumulated since `start`
    fn stop(&self) -> Result<Vec<i16>, AudioBackendError>;

    /// Check if currently capturing
    fn is_recording(&self) -> bool;
}

/// Opaque handle to a loaded sound resource.
pub type SoundId = Uuid;

/// Trait for platform-specific audio playback implementations.
///
/// At most one sound is loaded at a time; the `playback` engine enforces that
/// and calls `release` for the previous sound before loading the next.
pub trait AudioPlayback: Send + Sync {
    /// Decode an artifact and hold it ready to play
    fn load(&self, uri: &Path) -> Result<SoundId, AudioBackendError>;

    /// Start playing a loaded sound; `on_finished` fires once when playback
    /// runs to completion (never after `release`)
    fn play(
        &self,
        id: SoundId,
        on_finished: Box<dyn FnOnce() + Send>,
    ) -> Result<(), AudioBackendError>;

    /// Tear down a loaded sound; releasing an unknown id is a no-op
    fn release(&self, id: SoundId);
}

// Desktop implementation using CPAL
#[cfg(not(any(target_os = "ios", target_os = "android")))]
mod desktop;

#[cfg(not(any(target_os = "ios", target_os = "android")))]
pub use desktop::{DesktopAudioCapture, DesktopAudioPlayback};

// Mobile stubs - capture is bridged in by the host shell
#[cfg(any(target_os = "ios", target_os = "android"))]
mod mobile;

#[cfg(any(target_os = "ios", target_os = "android"))]
pub use mobile::{MobileAudioCapture, MobileAudioPlayback};

/// Target sample rate for captured answers (what the transcription backend expects)
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Get the platform-appropriate capture backend.
pub fn default_capture() -> std::sync::Arc<dyn AudioCapture> {
    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    {
        std::sync::Arc::new(DesktopAudioCapture::new())
    }
    #[cfg(any(target_os = "ios", target_os = "android"))]
    {
        std::sync::Arc::new(MobileAudioCapture::new())
    }
}

/// Get the platform-appropriate playback backend.
pub fn default_playback() -> std::sync::Arc<dyn AudioPlayback> {
    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    {
        std::sync::Arc::new(DesktopAudioPlayback::new())
    }
    #[cfg(any(target_os = "ios", target_os = "android"))]
    {
        std::sync::Arc::new(MobileAudioPlayback::new())
    }
}
