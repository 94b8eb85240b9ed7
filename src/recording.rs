//! Recording engine: `Idle -> Recording -> Idle` with a WAV artifact on stop.
//!
//! At most one capture is active at a time; a second `start` is rejected, not
//! silently restarted. Capability (platform support, microphone permission) is
//! probed once at construction and cached, so misuse fails fast without
//! touching hardware.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::AudioError;
use crate::models::AudioFormat;
use crate::platform::audio::{AudioCapture, Capability, TARGET_SAMPLE_RATE};

#[derive(Debug, PartialEq)]
enum RecorderState {
    Idle,
    Recording,
}

pub struct Recorder {
    backend: Arc<dyn AudioCapture>,
    capability: Capability,
    output_dir: PathBuf,
    state: RecorderState,
    artifact: Option<PathBuf>,
}

impl Recorder {
    pub fn new(backend: Arc<dyn AudioCapture>, output_dir: impl Into<PathBuf>) -> Self {
        let capability = backend.capability();
        Self {
            backend,
            capability,
            output_dir: output_dir.into(),
            state: RecorderState::Idle,
            artifact: None,
        }
    }

    /// Recorder writing artifacts under the platform cache directory.
    pub fn with_default_dir(backend: Arc<dyn AudioCapture>) -> Self {
        let dir = dirs::cache_dir()
            .map(|d| d.join("recal-client").join("recordings"))
            .unwrap_or_else(std::env::temp_dir);
        Self::new(backend, dir)
    }

    /// Begin capturing a voice answer.
    pub fn start(&mut self) -> Result<(), AudioError> {
        if !self.capability.supported {
            return Err(AudioError::Unsupported);
        }
        if !self.capability.permission_granted {
            return Err(AudioError::Permission);
        }
        if self.state == RecorderState::Recording {
            return Err(AudioError::RecordingInProgress);
        }

        self.backend.start()?;
        self.state = RecorderState::Recording;
        tracing::debug!("recording started");
        Ok(())
    }

    /// Stop capturing and finalize the samples into a WAV artifact. Returns
    /// the artifact path (the recording URI).
    pub fn stop(&mut self) -> Result<PathBuf, AudioError> {
        if self.state != RecorderState::Recording {
            return Err(AudioError::NoActiveRecording);
        }

        let samples = self.backend.stop()?;
        self.state = RecorderState::Idle;

        if samples.is_empty() {
            return Err(AudioError::Empty);
        }

        let path = self.write_wav(&samples)?;
        tracing::info!(
            "recording finalized: {:?} ({:.1}s)",
            path,
            samples.len() as f32 / TARGET_SAMPLE_RATE as f32
        );
        self.artifact = Some(path.clone());
        Ok(path)
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    /// URI of the last finalized artifact, if any.
    pub fn recording_uri(&self) -> Option<&Path> {
        self.artifact.as_deref()
    }

    /// Declared format of produced artifacts.
    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat::default()
    }

    /// Discard the current artifact.
    pub fn delete(&mut self) {
        if let Some(path) = self.artifact.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::debug!("could not remove {:?}: {}", path, e);
            }
        }
    }

    /// Stop and discard any active capture. Called on session end or
    /// navigation away; leaking a live microphone stream is a correctness bug.
    pub fn teardown(&mut self) {
        if self.state == RecorderState::Recording {
            if let Err(e) = self.backend.stop() {
                tracing::warn!("failed to stop capture during teardown: {}", e);
            }
            self.state = RecorderState::Idle;
            tracing::debug!("active recording discarded during teardown");
        }
    }

    fn write_wav(&self, samples: &[i16]) -> Result<PathBuf, AudioError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| AudioError::Encode(e.to_string()))?;
        let path = self
            .output_dir
            .join(format!("recording-{}.wav", uuid::Uuid::new_v4()));

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: TARGET_SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(&path, spec)
            .map_err(|e| AudioError::Encode(e.to_string()))?;
        for sample in samples {
            writer
                .write_sample(*sample)
                .map_err(|e| AudioError::Encode(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| AudioError::Encode(e.to_string()))?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::audio::AudioBackendError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct FakeCapture {
        capability: Capability,
        recording: AtomicBool,
        samples: Mutex<Vec<i16>>,
    }

    impl FakeCapture {
        fn new(samples: Vec<i16>) -> Self {
            Self {
                capability: Capability {
                    supported: true,
                    permission_granted: true,
                },
                recording: AtomicBool::new(false),
                samples: Mutex::new(samples),
            }
        }

        fn with_capability(capability: Capability) -> Self {
            Self {
                capability,
                ..Self::new(vec![])
            }
        }
    }

    impl AudioCapture for FakeCapture {
        fn capability(&self) -> Capability {
            self.capability
        }

        fn start(&self) -> Result<(), AudioBackendError> {
            self.recording.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) -> Result<Vec<i16>, AudioBackendError> {
            self.recording.store(false, Ordering::SeqCst);
            Ok(std::mem::take(&mut *self.samples.lock().unwrap()))
        }

        fn is_recording(&self) -> bool {
            self.recording.load(Ordering::SeqCst)
        }
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("recal-rec-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_start_while_recording_is_conflict() {
        let mut recorder = Recorder::new(Arc::new(FakeCapture::new(vec![1, 2, 3])), temp_dir());
        recorder.start().unwrap();
        assert!(matches!(
            recorder.start(),
            Err(AudioError::RecordingInProgress)
        ));
        // State stays Recording
        assert!(recorder.is_recording());
    }

    #[test]
    fn test_stop_while_idle_fails() {
        let mut recorder = Recorder::new(Arc::new(FakeCapture::new(vec![])), temp_dir());
        assert!(matches!(
            recorder.stop(),
            Err(AudioError::NoActiveRecording)
        ));
    }

    #[test]
    fn test_unsupported_platform_fails_fast() {
        let backend = FakeCapture::with_capability(Capability {
            supported: false,
            permission_granted: false,
        });
        let mut recorder = Recorder::new(Arc::new(backend), temp_dir());
        assert!(matches!(recorder.start(), Err(AudioError::Unsupported)));
    }

    #[test]
    fn test_missing_permission_fails_fast() {
        let backend = FakeCapture::with_capability(Capability {
            supported: true,
            permission_granted: false,
        });
        let mut recorder = Recorder::new(Arc::new(backend), temp_dir());
        assert!(matches!(recorder.start(), Err(AudioError::Permission)));
    }

    #[test]
    fn test_stop_produces_readable_wav() {
        let samples: Vec<i16> = (0..1600).map(|i| (i % 100) as i16).collect();
        let mut recorder = Recorder::new(Arc::new(FakeCapture::new(samples.clone())), temp_dir());

        recorder.start().unwrap();
        let path = recorder.stop().unwrap();
        assert!(!recorder.is_recording());
        assert_eq!(recorder.recording_uri(), Some(path.as_path()));

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, TARGET_SAMPLE_RATE);
        assert_eq!(reader.spec().channels, 1);
        let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read, samples);
    }

    #[test]
    fn test_empty_capture_yields_no_artifact() {
        let mut recorder = Recorder::new(Arc::new(FakeCapture::new(vec![])), temp_dir());
        recorder.start().unwrap();
        assert!(matches!(recorder.stop(), Err(AudioError::Empty)));
        assert!(!recorder.is_recording());
        assert!(recorder.recording_uri().is_none());
    }

    #[test]
    fn test_delete_removes_artifact() {
        let mut recorder = Recorder::new(Arc::new(FakeCapture::new(vec![5; 160])), temp_dir());
        recorder.start().unwrap();
        let path = recorder.stop().unwrap();
        assert!(path.exists());

        recorder.delete();
        assert!(recorder.recording_uri().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_teardown_discards_active_capture() {
        let backend = Arc::new(FakeCapture::new(vec![7; 160]));
        let mut recorder = Recorder::new(backend.clone(), temp_dir());
        recorder.start().unwrap();

        recorder.teardown();
        assert!(!recorder.is_recording());
        assert!(!backend.is_recording());
        assert!(recorder.recording_uri().is_none());
    }
}
