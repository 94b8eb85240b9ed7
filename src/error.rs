//! Error taxonomy for the client core.
//!
//! Three layers, matching the component boundaries:
//! - [`ApiError`]: authentication and backend HTTP failures
//! - [`AudioError`]: recording/playback state misuse and hardware failures
//! - [`SessionError`]: practice flow failures, wrapping the two above

use thiserror::Error;

use crate::platform::audio::AudioBackendError;

/// Errors from the authenticated API client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No valid token could be obtained (no credentials stored, or refresh failed).
    #[error("not authenticated: unable to get a valid token")]
    NoToken,

    /// Backend answered with a non-2xx status (a retried 401 only surfaces here
    /// after the single retry is exhausted).
    #[error("request failed with HTTP status {0}")]
    Http(u16),

    /// Transport-level failure (connect, TLS, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// Response body did not match the wire contract.
    #[error("malformed response body: {0}")]
    Parse(String),

    /// Local I/O failure while preparing a request (e.g. reading the audio artifact).
    #[error("failed to read audio artifact: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// True for the one status the retry policy handles.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Http(401))
    }
}

/// Errors from the recording and playback engines.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Microphone permission was not granted.
    #[error("microphone permission not granted")]
    Permission,

    /// The platform cannot capture audio natively (declared once at setup).
    #[error("audio capture is not supported on this platform")]
    Unsupported,

    /// `start` was called while a recording is active.
    #[error("a recording is already in progress")]
    RecordingInProgress,

    /// `stop` was called while idle.
    #[error("no active recording to stop")]
    NoActiveRecording,

    /// The capture finished without producing any samples.
    #[error("no audio captured")]
    Empty,

    /// Failed to encode the captured samples into a WAV artifact.
    #[error("failed to write recording: {0}")]
    Encode(String),

    /// Failed to load or start a playback resource.
    #[error("playback failed: {0}")]
    Playback(String),

    /// Platform audio backend failure.
    #[error(transparent)]
    Backend(#[from] AudioBackendError),
}

/// Errors from the practice session state machine.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The trimmed answer text is empty; the session state is unchanged.
    #[error("answer is empty")]
    EmptyAnswer,

    /// Another mutating operation is still in flight on this session.
    #[error("another operation is in flight")]
    Busy,

    /// The backend returned no questions for the note.
    #[error("no questions available for this note")]
    NoQuestions,

    /// The requested operation is invalid in the current phase.
    #[error("session is not active")]
    NotActive,

    /// Fetching the question list failed; the session stays in `Loading`.
    #[error("failed to load questions: {0}")]
    QuestionFetch(#[source] ApiError),

    /// Answer evaluation failed; the session terminates without a score.
    #[error("answer evaluation failed: {0}")]
    Evaluation(#[source] ApiError),

    /// Transcription of the recorded answer failed; the recording is retained
    /// and the answer can still be typed.
    #[error("transcription failed: {0}")]
    Transcription(#[source] ApiError),

    #[error(transparent)]
    Audio(#[from] AudioError),
}
