//! Playback engine for recorded answers.
//!
//! At most one sound is loaded at a time; starting a new playback tears down
//! the previous one first. Every loaded sound is guarded by a watchdog that
//! force-releases it after a fixed timeout, so a stalled backend cannot hold
//! the platform playback resource forever. Normal completion and the watchdog
//! share one release flag, making the release idempotent no matter which path
//! wins.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AudioError;
use crate::platform::audio::{AudioPlayback, SoundId};

/// How long a loaded sound may live before it is force-released.
pub const PLAYBACK_RELEASE_TIMEOUT: Duration = Duration::from_secs(60);

struct LoadedSound {
    id: SoundId,
    released: Arc<AtomicBool>,
    watchdog: tokio::task::JoinHandle<()>,
}

pub struct Player {
    backend: Arc<dyn AudioPlayback>,
    current: Arc<Mutex<Option<LoadedSound>>>,
    release_timeout: Duration,
}

impl Player {
    pub fn new(backend: Arc<dyn AudioPlayback>) -> Self {
        Self::with_release_timeout(backend, PLAYBACK_RELEASE_TIMEOUT)
    }

    pub fn with_release_timeout(backend: Arc<dyn AudioPlayback>, release_timeout: Duration) -> Self {
        Self {
            backend,
            current: Arc::new(Mutex::new(None)),
            release_timeout,
        }
    }

    /// Load and start playing the artifact at `uri`, releasing any previously
    /// loaded sound first. Must be called within a tokio runtime.
    pub fn play(&self, uri: &Path) -> Result<(), AudioError> {
        self.release_current();

        let id = self
            .backend
            .load(uri)
            .map_err(|e| AudioError::Playback(e.to_string()))?;
        let released = Arc::new(AtomicBool::new(false));

        let watchdog = {
            let backend = self.backend.clone();
            let current = self.current.clone();
            let timeout = self.release_timeout;
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                tracing::warn!("playback watchdog fired, force-releasing sound {}", id);
                release_slot(&backend, &current, id);
            })
        };

        let on_finished: Box<dyn FnOnce() + Send> = {
            let backend = self.backend.clone();
            let current = self.current.clone();
            Box::new(move || {
                tracing::debug!("playback finished for sound {}", id);
                release_slot(&backend, &current, id);
            })
        };

        if let Err(e) = self.backend.play(id, on_finished) {
            watchdog.abort();
            self.backend.release(id);
            return Err(AudioError::Playback(e.to_string()));
        }

        *lock(&self.current) = Some(LoadedSound {
            id,
            released,
            watchdog,
        });
        tracing::debug!("playing recording {:?} as sound {}", uri, id);
        Ok(())
    }

    /// Release the currently loaded sound, if any. Safe to call at any time,
    /// including when the watchdog or the completion callback already won.
    pub fn release_current(&self) {
        let sound = lock(&self.current).take();
        if let Some(sound) = sound {
            sound.watchdog.abort();
            if !sound.released.swap(true, Ordering::SeqCst) {
                self.backend.release(sound.id);
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        lock(&self.current).is_some()
    }

    /// Tear down all playback state. Called on session end.
    pub fn teardown(&self) {
        self.release_current();
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.release_current();
    }
}

// Release the sound only if it is still the one in the slot; a stale id
// (already replaced by a newer playback) is a no-op. The flag swap keeps the
// backend release single-shot across the three callers.
fn release_slot(backend: &Arc<dyn AudioPlayback>, slot: &Mutex<Option<LoadedSound>>, id: SoundId) {
    let sound = {
        let mut guard = lock(slot);
        match guard.as_ref() {
            Some(sound) if sound.id == id => guard.take(),
            _ => None,
        }
    };
    if let Some(sound) = sound {
        sound.watchdog.abort();
        if !sound.released.swap(true, Ordering::SeqCst) {
            backend.release(id);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::audio::AudioBackendError;
    use std::path::PathBuf;

    type Callback = Box<dyn FnOnce() + Send>;

    #[derive(Default)]
    struct FakePlayback {
        loads: Mutex<Vec<SoundId>>,
        releases: Mutex<Vec<SoundId>>,
        callbacks: Mutex<Vec<Callback>>,
        fail_load: bool,
    }

    impl FakePlayback {
        fn releases(&self) -> Vec<SoundId> {
            self.releases.lock().unwrap().clone()
        }

        fn fire_finished(&self) {
            let callbacks: Vec<Callback> = self.callbacks.lock().unwrap().drain(..).collect();
            for callback in callbacks {
                callback();
            }
        }
    }

    impl AudioPlayback for FakePlayback {
        fn load(&self, _uri: &Path) -> Result<SoundId, AudioBackendError> {
            if self.fail_load {
                return Err(AudioBackendError::Decode("bad artifact".into()));
            }
            let id = SoundId::new_v4();
            self.loads.lock().unwrap().push(id);
            Ok(id)
        }

        fn play(&self, _id: SoundId, on_finished: Callback) -> Result<(), AudioBackendError> {
            self.callbacks.lock().unwrap().push(on_finished);
            Ok(())
        }

        fn release(&self, id: SoundId) {
            self.releases.lock().unwrap().push(id);
        }
    }

    fn wav() -> PathBuf {
        PathBuf::from("recording-test.wav")
    }

    #[tokio::test]
    async fn test_play_releases_previous_sound() {
        let backend = Arc::new(FakePlayback::default());
        let player = Player::new(backend.clone());

        player.play(&wav()).unwrap();
        let first = backend.loads.lock().unwrap()[0];
        player.play(&wav()).unwrap();

        assert_eq!(backend.releases(), vec![first]);
        assert!(player.is_loaded());
    }

    #[tokio::test]
    async fn test_finished_callback_releases_once() {
        let backend = Arc::new(FakePlayback::default());
        let player = Player::new(backend.clone());

        player.play(&wav()).unwrap();
        let id = backend.loads.lock().unwrap()[0];

        backend.fire_finished();
        assert_eq!(backend.releases(), vec![id]);
        assert!(!player.is_loaded());

        // Both manual paths are no-ops afterwards
        player.release_current();
        player.teardown();
        assert_eq!(backend.releases(), vec![id]);
    }

    #[tokio::test]
    async fn test_watchdog_force_releases() {
        let backend = Arc::new(FakePlayback::default());
        let player = Player::with_release_timeout(backend.clone(), Duration::from_millis(20));

        player.play(&wav()).unwrap();
        let id = backend.loads.lock().unwrap()[0];

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(backend.releases(), vec![id]);
        assert!(!player.is_loaded());

        // Late completion callback must not double-release
        backend.fire_finished();
        assert_eq!(backend.releases(), vec![id]);
    }

    #[tokio::test]
    async fn test_release_current_is_idempotent() {
        let backend = Arc::new(FakePlayback::default());
        let player = Player::new(backend.clone());

        player.play(&wav()).unwrap();
        let id = backend.loads.lock().unwrap()[0];

        player.release_current();
        player.release_current();
        assert_eq!(backend.releases(), vec![id]);
    }

    #[tokio::test]
    async fn test_failed_load_propagates() {
        let backend = Arc::new(FakePlayback {
            fail_load: true,
            ..FakePlayback::default()
        });
        let player = Player::new(backend.clone());

        assert!(matches!(player.play(&wav()), Err(AudioError::Playback(_))));
        assert!(!player.is_loaded());
    }
}
