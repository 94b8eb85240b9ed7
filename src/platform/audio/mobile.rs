//! Mobile audio stubs.
//!
//! On iOS/Android the host shell owns the audio session: it captures
//! microphone audio natively and plays artifacts through the platform media
//! APIs. These stubs declare native capture/playback as unsupported so the
//! engines fail fast instead of touching hardware that is not theirs.

use std::path::Path;

use super::{AudioBackendError, AudioCapture, AudioPlayback, Capability, SoundId};

/// Mobile audio capture stub
pub struct MobileAudioCapture;

impl MobileAudioCapture {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MobileAudioCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioCapture for MobileAudioCapture {
    fn capability(&self) -> Capability {
        Capability {
            supported: false,
            permission_granted: false,
        }
    }

    fn start(&self) -> Result<(), AudioBackendError> {
        Err(AudioBackendError::NotSupported)
    }

    fn stop(&self) -> Result<Vec<i16>, AudioBackendError> {
        Err(AudioBackendError::NotSupported)
    }

    fn is_recording(&self) -> bool {
        false
    }
}

/// Mobile audio playback stub
pub struct MobileAudioPlayback;

impl MobileAudioPlayback {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MobileAudioPlayback {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPlayback for MobileAudioPlayback {
    fn load(&self, _uri: &Path) -> Result<SoundId, AudioBackendError> {
        Err(AudioBackendError::NotSupported)
    }

    fn play(
        &self,
        _id: SoundId,
        _on_finished: Box<dyn FnOnce() + Send>,
    ) -> Result<(), AudioBackendError> {
        Err(AudioBackendError::NotSupported)
    }

    fn release(&self, _id: SoundId) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mobile_capture_not_supported() {
        let capture = MobileAudioCapture::new();
        assert!(!capture.capability().supported);
        assert!(matches!(capture.start(), Err(AudioBackendError::NotSupported)));
        assert!(matches!(capture.stop(), Err(AudioBackendError::NotSupported)));
        assert!(!capture.is_recording());
    }
}
