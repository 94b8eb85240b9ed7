//! Authenticated API client for the webhook backend.
//!
//! Every operation runs through [`ApiClient::run`], which bounds the
//! unauthorized-retry to exactly one extra attempt: a 401 clears the cached
//! token and retries with a freshly obtained one; a second 401 (or a failed
//! refresh) surfaces to the caller. This prevents refresh loops on
//! persistently invalid credentials.

use std::future::Future;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::AuthClient;
use crate::config::Config;
use crate::error::ApiError;
use crate::models::{
    AnswerSubmission, AudioFormat, EvaluationResult, Note, Question, TranscriptSegment, UserAnswer,
};

#[derive(Clone)]
pub struct ApiClient {
    config: Config,
    http: reqwest::Client,
    auth: AuthClient,
}

/// Join captured answers against the fetched question list into the triples
/// the evaluation endpoint expects. The reference answer travels to the
/// backend for grading and is never compared locally. An answer whose
/// question id has no match sends empty strings.
fn build_submissions(questions: &[Question], answers: &[UserAnswer]) -> Vec<AnswerSubmission> {
    answers
        .iter()
        .map(|ua| {
            let question = questions.iter().find(|q| q.id == ua.question_id);
            AnswerSubmission {
                question: question.map(|q| q.question.clone()).unwrap_or_default(),
                answer: question.map(|q| q.answer.clone()).unwrap_or_default(),
                student_answer: ua.user_answer.clone(),
            }
        })
        .collect()
}

impl ApiClient {
    pub fn new(config: Config, http: reqwest::Client, auth: AuthClient) -> Self {
        Self { config, http, auth }
    }

    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }

    /// Fetch the study notes list.
    pub async fn fetch_notes(&self) -> Result<Vec<Note>, ApiError> {
        let url = format!("{}/active-recall/notes", self.config.api_base);
        self.run(move |token| self.get_json(url.clone(), token)).await
    }

    /// Fetch the question set for one note.
    pub async fn fetch_questions(&self, note_id: &str) -> Result<Vec<Question>, ApiError> {
        let url = format!("{}/active-recall/notes/{}", self.config.notes_api_base, note_id);
        self.run(move |token| self.get_json(url.clone(), token)).await
    }

    /// Submit the full answer set of a session for backend grading.
    pub async fn evaluate_answers(
        &self,
        note_id: &str,
        questions: &[Question],
        answers: &[UserAnswer],
    ) -> Result<EvaluationResult, ApiError> {
        let body = build_submissions(questions, answers);
        let url = format!("{}/active-recall/notes/{}", self.config.notes_api_base, note_id);
        tracing::debug!("evaluating {} answers for note {}", body.len(), note_id);
        self.run(move |token| self.post_json(url.clone(), body.clone(), token))
            .await
    }

    /// Upload a recorded answer for transcription. An empty response array
    /// yields an empty string, not an error.
    pub async fn transcribe_audio(
        &self,
        audio: &Path,
        audio_format: &AudioFormat,
    ) -> Result<String, ApiError> {
        let bytes = tokio::fs::read(audio).await?;
        let url = format!("{}/active-recall/transcribe", self.config.api_base);
        let audio_format = audio_format.clone();

        let segments: Vec<TranscriptSegment> = self
            .run(move |token| {
                self.post_transcription(url.clone(), bytes.clone(), audio_format.clone(), token)
            })
            .await?;

        Ok(segments.first().map(|s| s.text.clone()).unwrap_or_default())
    }

    /// Single-retry-on-unauthorized wrapper around one backend operation.
    async fn run<T, F, Fut>(&self, op: F) -> Result<T, ApiError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let token = self.auth.valid_token().await.ok_or(ApiError::NoToken)?;

        match op(token).await {
            Err(e) if e.is_unauthorized() => {
                tracing::info!("request unauthorized, clearing token and retrying once");
                self.auth.clear_token().await;
                match self.auth.valid_token().await {
                    Some(token) => op(token).await,
                    None => Err(e),
                }
            }
            result => result,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        token: String,
    ) -> Result<T, ApiError> {
        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Self::decode(response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: String,
        body: B,
        token: String,
    ) -> Result<T, ApiError> {
        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Self::decode(response).await
    }

    async fn post_transcription(
        &self,
        url: String,
        bytes: Vec<u8>,
        audio_format: AudioFormat,
        token: String,
    ) -> Result<Vec<TranscriptSegment>, ApiError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(audio_format.file_name())
            .mime_str(&audio_format.mime_type)
            .map_err(|e| ApiError::Parse(format!("invalid mime type: {}", e)))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model_id", self.config.transcription_model.clone());

        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Http(status.as_u16()));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, question: &str, answer: &str) -> Question {
        Question {
            id: id.to_string(),
            question: question.to_string(),
            answer: answer.to_string(),
        }
    }

    fn user_answer(question_id: &str, user_answer: &str) -> UserAnswer {
        UserAnswer {
            question_id: question_id.to_string(),
            user_answer: user_answer.to_string(),
        }
    }

    #[test]
    fn test_submission_join() {
        let questions = vec![
            question("1", "What is a transformer?", "An architecture"),
            question("2", "How does attention work?", "Weighted context"),
        ];
        let answers = vec![user_answer("2", "by weighting")];

        let submissions = build_submissions(&questions, &answers);
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].question, "How does attention work?");
        assert_eq!(submissions[0].answer, "Weighted context");
        assert_eq!(submissions[0].student_answer, "by weighting");
    }

    #[test]
    fn test_submission_join_unmatched_question_sends_empty_strings() {
        let questions = vec![question("1", "Q1", "A1")];
        let answers = vec![user_answer("99", "orphan")];

        let submissions = build_submissions(&questions, &answers);
        assert_eq!(submissions[0].question, "");
        assert_eq!(submissions[0].answer, "");
        assert_eq!(submissions[0].student_answer, "orphan");
    }

    #[test]
    fn test_submissions_preserve_answer_order() {
        let questions = vec![question("1", "Q1", "A1"), question("2", "Q2", "A2")];
        let answers = vec![user_answer("1", "first"), user_answer("2", "second")];

        let submissions = build_submissions(&questions, &answers);
        assert_eq!(submissions[0].student_answer, "first");
        assert_eq!(submissions[1].student_answer, "second");
    }
}
