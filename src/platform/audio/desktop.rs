//! Desktop audio capture and playback using CPAL.
//!
//! Supports macOS, Windows, and Linux with native audio APIs. CPAL streams are
//! not `Send`, so each stream lives on a dedicated thread and is torn down by
//! flipping an atomic flag.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::{AudioBackendError, AudioCapture, AudioPlayback, Capability, SoundId, TARGET_SAMPLE_RATE};

/// Simple linear resampling from source rate to target rate
fn resample(samples: &[i16], source_rate: u32, target_rate: u32) -> Vec<i16> {
    if source_rate == target_rate {
        return samples.to_vec();
    }

    let ratio = source_rate as f64 / target_rate as f64;
    let output_len = (samples.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_idx = (i as f64 * ratio) as usize;
        if src_idx < samples.len() {
            output.push(samples[src_idx]);
        }
    }

    output
}

/// Desktop audio capture implementation using CPAL
pub struct DesktopAudioCapture {
    is_recording: Arc<AtomicBool>,
    buffer: Arc<Mutex<Vec<i16>>>,
}

impl DesktopAudioCapture {
    pub fn new() -> Self {
        Self {
            is_recording: Arc::new(AtomicBool::new(false)),
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Default for DesktopAudioCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioCapture for DesktopAudioCapture {
    fn capability(&self) -> Capability {
        // CPAL surfaces an OS-level microphone denial as a missing input
        // device, so device presence doubles as the permission probe.
        Capability {
            supported: true,
            permission_granted: cpal::default_host().default_input_device().is_some(),
        }
    }

    fn start(&self) -> Result<(), AudioBackendError> {
        if self.is_recording.load(Ordering::SeqCst) {
            return Err(AudioBackendError::Stream("already capturing".to_string()));
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AudioBackendError::NoDevice)?;

        let mut supported_configs = device
            .supported_input_configs()
            .map_err(|e| AudioBackendError::Configuration(e.to_string()))?;

        // Find a config that supports our target sample rate, or fall back to default
        let config: cpal::StreamConfig = match supported_configs
            .find(|c| {
                c.min_sample_rate().0 <= TARGET_SAMPLE_RATE
                    && c.max_sample_rate().0 >= TARGET_SAMPLE_RATE
            })
            .map(|c| c.with_sample_rate(cpal::SampleRate(TARGET_SAMPLE_RATE)))
        {
            Some(c) => c.into(),
            None => {
                let default = device
                    .default_input_config()
                    .map_err(|e| AudioBackendError::Configuration(e.to_string()))?;
                tracing::warn!(
                    "16kHz not supported, using device default: {}Hz",
                    default.sample_rate().0
                );
                default.into()
            }
        };

        let actual_sample_rate = config.sample_rate.0;
        let needs_resampling = actual_sample_rate != TARGET_SAMPLE_RATE;
        let channels = config.channels as usize;

        {
            let mut buffer = self.buffer.lock().unwrap();
            buffer.clear();
        }

        self.is_recording.store(true, Ordering::SeqCst);
        let is_recording = self.is_recording.clone();
        let is_recording_inner = self.is_recording.clone();
        let buffer = self.buffer.clone();

        // Spawn audio capture thread
        std::thread::spawn(move || {
            let stream = device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !is_recording_inner.load(Ordering::SeqCst) {
                        return;
                    }

                    // Convert stereo to mono if needed
                    let mono_samples: Vec<f32> = if channels > 1 {
                        data.chunks(channels).map(|chunk| chunk[0]).collect()
                    } else {
                        data.to_vec()
                    };

                    // Convert f32 to i16 PCM
                    let samples: Vec<i16> = mono_samples
                        .iter()
                        .map(|&s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16)
                        .collect();

                    let resampled = if needs_resampling {
                        resample(&samples, actual_sample_rate, TARGET_SAMPLE_RATE)
                    } else {
                        samples
                    };

                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend(resampled);
                    }
                },
                |err| {
                    tracing::error!("Audio stream error: {}", err);
                },
                None,
            );

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("Failed to build input stream: {}", e);
                    is_recording.store(false, Ordering::SeqCst);
                    return;
                }
            };

            if let Err(e) = stream.play() {
                tracing::error!("Failed to start audio stream: {}", e);
                is_recording.store(false, Ordering::SeqCst);
                return;
            }

            // Keep stream alive while recording
            while is_recording.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(100));
            }

            // Stream is dropped here, stopping the capture
        });

        Ok(())
    }

    fn stop(&self) -> Result<Vec<i16>, AudioBackendError> {
        if !self.is_recording.load(Ordering::SeqCst) {
            return Err(AudioBackendError::Stream("not capturing".to_string()));
        }

        self.is_recording.store(false, Ordering::SeqCst);

        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| AudioBackendError::Stream("capture buffer poisoned".to_string()))?;
        Ok(std::mem::take(&mut *buffer))
    }

    fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }
}

struct LoadedClip {
    samples: Arc<Vec<i16>>,
    sample_rate: u32,
    stop: Arc<AtomicBool>,
}

/// Desktop audio playback implementation using CPAL
pub struct DesktopAudioPlayback {
    clips: Mutex<HashMap<SoundId, LoadedClip>>,
}

impl DesktopAudioPlayback {
    pub fn new() -> Self {
        Self {
            clips: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for DesktopAudioPlayback {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPlayback for DesktopAudioPlayback {
    fn load(&self, uri: &Path) -> Result<SoundId, AudioBackendError> {
        let mut reader =
            hound::WavReader::open(uri).map_err(|e| AudioBackendError::Decode(e.to_string()))?;
        let sample_rate = reader.spec().sample_rate;
        let samples: Vec<i16> = reader
            .samples::<i16>()
            .collect::<Result<_, _>>()
            .map_err(|e| AudioBackendError::Decode(e.to_string()))?;

        let id = SoundId::new_v4();
        self.clips.lock().unwrap().insert(
            id,
            LoadedClip {
                samples: Arc::new(samples),
                sample_rate,
                stop: Arc::new(AtomicBool::new(false)),
            },
        );
        Ok(id)
    }

    fn play(
        &self,
        id: SoundId,
        on_finished: Box<dyn FnOnce() + Send>,
    ) -> Result<(), AudioBackendError> {
        let (samples, clip_rate, stop) = {
            let clips = self.clips.lock().unwrap();
            let clip = clips.get(&id).ok_or_else(|| {
                AudioBackendError::Stream("sound not loaded".to_string())
            })?;
            (clip.samples.clone(), clip.sample_rate, clip.stop.clone())
        };

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioBackendError::NoDevice)?;
        let config: cpal::StreamConfig = device
            .default_output_config()
            .map_err(|e| AudioBackendError::Configuration(e.to_string()))?
            .into();

        let out_rate = config.sample_rate.0;
        let out_channels = config.channels as usize;
        let playable = Arc::new(resample(&samples, clip_rate, out_rate));
        let total = playable.len();
        let position = Arc::new(AtomicUsize::new(0));

        let position_inner = position.clone();
        let stop_thread = stop.clone();

        // Dedicated playback thread; the stream drops when it exits
        std::thread::spawn(move || {
            let stream = device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(out_channels) {
                        let pos = position_inner.fetch_add(1, Ordering::SeqCst);
                        let value = playable
                            .get(pos)
                            .map(|&s| s as f32 / 32768.0)
                            .unwrap_or(0.0);
                        for out in frame.iter_mut() {
                            *out = value;
                        }
                    }
                },
                |err| {
                    tracing::error!("Playback stream error: {}", err);
                },
                None,
            );

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("Failed to build output stream: {}", e);
                    return;
                }
            };

            if let Err(e) = stream.play() {
                tracing::error!("Failed to start playback: {}", e);
                return;
            }

            while position.load(Ordering::SeqCst) < total && !stop_thread.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(50));
            }

            if !stop_thread.load(Ordering::SeqCst) {
                on_finished();
            }
        });

        Ok(())
    }

    fn release(&self, id: SoundId) {
        if let Some(clip) = self.clips.lock().unwrap().remove(&id) {
            clip.stop.store(true, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_same_rate() {
        let samples: Vec<i16> = vec![100, 200, 300, 400, 500];
        let result = resample(&samples, 16000, 16000);
        assert_eq!(result, samples);
    }

    #[test]
    fn test_resample_downsample() {
        let samples: Vec<i16> = vec![100, 200, 300, 400, 500, 600, 700, 800];
        let result = resample(&samples, 48000, 16000);
        // 48kHz -> 16kHz = 3:1 ratio
        assert!(result.len() < samples.len());
    }

    #[test]
    fn test_resample_upsample() {
        let samples: Vec<i16> = vec![100, 200, 300];
        let result = resample(&samples, 16000, 48000);
        assert!(result.len() > samples.len());
    }

    #[test]
    fn test_release_unknown_sound_is_noop() {
        let playback = DesktopAudioPlayback::new();
        playback.release(SoundId::new_v4());
    }
}
