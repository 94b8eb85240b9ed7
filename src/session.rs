//! Practice session state machine.
//!
//! `Loading -> Active -> Submitting -> Complete`, with `Failed` as the
//! terminal phase for an unrecoverable fetch or evaluation error. A session
//! handles one note's question set and owns the recording and playback
//! engines for its lifetime, so tearing the session down releases every
//! platform resource it touched.
//!
//! One mutating operation runs at a time; overlapping calls get
//! [`SessionError::Busy`] instead of interleaving, which keeps the phase
//! transitions linear no matter how the UI drives the session.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::api::ApiClient;
use crate::error::{AudioError, SessionError};
use crate::models::{PracticeResults, Question, ReviewItem, UserAnswer};
use crate::playback::Player;
use crate::recording::Recorder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Questions not yet loaded.
    Loading,
    /// Answering questions; `current_question` is valid.
    Active,
    /// Final answer set sent for evaluation.
    Submitting,
    /// Evaluation done; `results` is available.
    Complete,
    /// Question fetch or evaluation failed terminally.
    Failed,
}

/// What `begin` does when the question fetch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFallback {
    /// Propagate the error and leave the session in `Loading`.
    Fail,
    /// Continue with a built-in placeholder set so practice still works offline.
    PlaceholderQuestions,
}

/// Result of submitting one answer.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// More questions remain; the session advanced to `next_index`.
    Advanced { next_index: usize },
    /// That was the last question; the session is complete.
    Finished(PracticeResults),
}

struct FlowState {
    phase: Phase,
    questions: Vec<Question>,
    answers: Vec<UserAnswer>,
    index: usize,
    results: Option<PracticeResults>,
}

pub struct PracticeFlow {
    api: ApiClient,
    note_id: String,
    fallback: FetchFallback,
    state: Mutex<FlowState>,
    recorder: Mutex<Recorder>,
    player: Player,
    busy: AtomicBool,
}

// Resets the in-flight flag when the operation ends, including on early
// returns and panics.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl PracticeFlow {
    pub fn new(
        api: ApiClient,
        note_id: impl Into<String>,
        recorder: Recorder,
        player: Player,
    ) -> Self {
        Self {
            api,
            note_id: note_id.into(),
            fallback: FetchFallback::Fail,
            state: Mutex::new(FlowState {
                phase: Phase::Loading,
                questions: Vec::new(),
                answers: Vec::new(),
                index: 0,
                results: None,
            }),
            recorder: Mutex::new(recorder),
            player,
            busy: AtomicBool::new(false),
        }
    }

    pub fn with_fetch_fallback(mut self, fallback: FetchFallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Fetch the note's questions and activate the session.
    pub async fn begin(&self) -> Result<(), SessionError> {
        let _busy = self.acquire()?;
        if lock(&self.state).phase != Phase::Loading {
            return Err(SessionError::NotActive);
        }

        let questions = match self.api.fetch_questions(&self.note_id).await {
            Ok(questions) => questions,
            Err(e) if self.fallback == FetchFallback::PlaceholderQuestions => {
                tracing::warn!("question fetch failed ({}), using placeholder set", e);
                placeholder_questions()
            }
            Err(e) => return Err(SessionError::QuestionFetch(e)),
        };

        let mut state = lock(&self.state);
        if questions.is_empty() {
            state.phase = Phase::Failed;
            return Err(SessionError::NoQuestions);
        }

        tracing::info!(
            "practice session started for note {} with {} questions",
            self.note_id,
            questions.len()
        );
        state.questions = questions;
        state.index = 0;
        state.phase = Phase::Active;
        Ok(())
    }

    pub fn phase(&self) -> Phase {
        lock(&self.state).phase
    }

    pub fn current_question(&self) -> Option<Question> {
        let state = lock(&self.state);
        if state.phase != Phase::Active {
            return None;
        }
        state.questions.get(state.index).cloned()
    }

    /// `(current index, total)` while questions are loaded.
    pub fn progress(&self) -> (usize, usize) {
        let state = lock(&self.state);
        (state.index, state.questions.len())
    }

    pub fn results(&self) -> Option<PracticeResults> {
        lock(&self.state).results.clone()
    }

    /// Record the answer for the current question and advance; on the last
    /// question, submit the full set for evaluation.
    ///
    /// Any active recording or playback is stopped and discarded first so
    /// per-question transients never leak across the advance.
    pub async fn submit_answer(&self, answer: &str) -> Result<SubmitOutcome, SessionError> {
        let _busy = self.acquire()?;

        let answer = answer.trim();
        if answer.is_empty() {
            return Err(SessionError::EmptyAnswer);
        }

        let (question_id, is_last) = {
            let state = lock(&self.state);
            if state.phase != Phase::Active {
                return Err(SessionError::NotActive);
            }
            let question = state
                .questions
                .get(state.index)
                .ok_or(SessionError::NotActive)?;
            (question.id.clone(), state.index + 1 == state.questions.len())
        };

        self.discard_transients();

        let answers = {
            let mut state = lock(&self.state);
            state.answers.push(UserAnswer {
                question_id,
                user_answer: answer.to_string(),
            });
            if !is_last {
                state.index += 1;
                return Ok(SubmitOutcome::Advanced {
                    next_index: state.index,
                });
            }
            state.phase = Phase::Submitting;
            state.answers.clone()
        };

        let (questions, note_id) = {
            let state = lock(&self.state);
            (state.questions.clone(), self.note_id.clone())
        };

        match self
            .api
            .evaluate_answers(&note_id, &questions, &answers)
            .await
        {
            Ok(evaluation) => {
                let results = resolve_results(&questions, evaluation.score, &evaluation.incorrect_answers);
                tracing::info!(
                    "session complete: {}/{} for note {}",
                    results.score,
                    results.total_questions,
                    note_id
                );
                let mut state = lock(&self.state);
                state.results = Some(results.clone());
                state.phase = Phase::Complete;
                Ok(SubmitOutcome::Finished(results))
            }
            Err(e) => {
                lock(&self.state).phase = Phase::Failed;
                Err(SessionError::Evaluation(e))
            }
        }
    }

    /// Start capturing a voice answer for the current question.
    pub fn start_recording(&self) -> Result<(), SessionError> {
        if lock(&self.state).phase != Phase::Active {
            return Err(SessionError::NotActive);
        }
        lock(&self.recorder).start()?;
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        lock(&self.recorder).is_recording()
    }

    /// Stop the recording and transcribe it into answer text. On a
    /// transcription failure the artifact is retained, so the answer can
    /// still be typed or the upload retried.
    pub async fn stop_recording_and_transcribe(&self) -> Result<String, SessionError> {
        let _busy = self.acquire()?;

        let (uri, format) = {
            let mut recorder = lock(&self.recorder);
            let uri = recorder.stop().map_err(SessionError::Audio)?;
            (uri, recorder.audio_format())
        };

        self.api
            .transcribe_audio(&uri, &format)
            .await
            .map_err(SessionError::Transcription)
    }

    /// URI of the current recording artifact, if one exists.
    pub fn recording_uri(&self) -> Option<PathBuf> {
        lock(&self.recorder).recording_uri().map(PathBuf::from)
    }

    /// Play back the current recording artifact.
    pub fn play_recording(&self) -> Result<(), SessionError> {
        let uri = self
            .recording_uri()
            .ok_or(SessionError::Audio(AudioError::NoActiveRecording))?;
        self.player.play(&uri)?;
        Ok(())
    }

    /// Discard the current recording artifact and release its playback.
    pub fn delete_recording(&self) {
        self.player.release_current();
        lock(&self.recorder).delete();
    }

    /// Release every platform resource the session holds. Called when the
    /// user leaves the session, in any phase.
    pub fn teardown(&self) {
        self.player.teardown();
        let mut recorder = lock(&self.recorder);
        recorder.teardown();
        recorder.delete();
        tracing::debug!("practice session torn down for note {}", self.note_id);
    }

    fn acquire(&self) -> Result<BusyGuard<'_>, SessionError> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(SessionError::Busy);
        }
        Ok(BusyGuard(&self.busy))
    }

    // Advancing a question invalidates its recording and playback.
    fn discard_transients(&self) {
        self.player.release_current();
        let mut recorder = lock(&self.recorder);
        recorder.teardown();
        recorder.delete();
    }
}

/// Resolve the backend's incorrect-answer list against the local question
/// list. An entry whose question id is not locally known is dropped with a
/// warning rather than shown as a half-empty review row.
fn resolve_results(
    questions: &[Question],
    score: i64,
    incorrect: &[UserAnswer],
) -> PracticeResults {
    let incorrect_answers = incorrect
        .iter()
        .filter_map(|ia| {
            match questions.iter().find(|q| q.id == ia.question_id) {
                Some(question) => Some(ReviewItem {
                    question: question.clone(),
                    user_answer: ia.user_answer.clone(),
                }),
                None => {
                    tracing::warn!(
                        "evaluation referenced unknown question id {:?}, dropping",
                        ia.question_id
                    );
                    None
                }
            }
        })
        .collect();

    PracticeResults {
        score,
        total_questions: questions.len(),
        incorrect_answers,
    }
}

fn placeholder_questions() -> Vec<Question> {
    vec![
        Question {
            id: "1".to_string(),
            question: "What is a transformer?".to_string(),
            answer: "A neural network architecture...".to_string(),
        },
        Question {
            id: "2".to_string(),
            question: "How does attention work?".to_string(),
            answer: "Attention mechanisms allow...".to_string(),
        },
    ]
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

    fn question(id: &str) -> Question {
        Question {
            id: id.to_string(),
            question: format!("Q{}", id),
            answer: format!("A{}", id),
        }
    }

    fn answer(question_id: &str, text: &str) -> UserAnswer {
        UserAnswer {
            question_id: question_id.to_string(),
            user_answer: text.to_string(),
        }
    }

    #[test]
    fn test_resolve_results_joins_questions() {
        let questions = vec![question("1"), question("2")];
        let incorrect = vec![answer("2", "wrong")];

        let results = resolve_results(&questions, 1, &incorrect);
        assert_eq!(results.score, 1);
        assert_eq!(results.total_questions, 2);
        assert_eq!(results.incorrect_answers.len(), 1);
        assert_eq!(results.incorrect_answers[0].question, questions[1]);
        assert_eq!(results.incorrect_answers[0].user_answer, "wrong");
    }

    #[test]
    fn test_resolve_results_drops_unknown_question_ids() {
        let questions = vec![question("1")];
        let incorrect = vec![answer("1", "wrong"), answer("99", "orphan")];

        let results = resolve_results(&questions, 0, &incorrect);
        assert_eq!(results.incorrect_answers.len(), 1);
        assert_eq!(results.incorrect_answers[0].question.id, "1");
    }

    #[test]
    fn test_resolve_results_perfect_score() {
        let questions = vec![question("1"), question("2")];
        let results = resolve_results(&questions, 2, &[]);
        assert_eq!(results.score, 2);
        assert!(results.incorrect_answers.is_empty());
    }

    #[test]
    fn test_placeholder_set_is_nonempty_with_unique_ids() {
        let questions = placeholder_questions();
        assert_eq!(questions.len(), 2);
        assert_ne!(questions[0].id, questions[1].id);
    }
}
