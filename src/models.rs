//! Wire and display types for the webhook backend contract.

use serde::{Deserialize, Serialize};

/// A backend-owned study note with its spaced-repetition statistics.
///
/// Immutable from the client's perspective; the `property_*` stats are used
/// only for display. Unknown backend fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    /// Number of completed reviews.
    #[serde(rename = "property_repasos", default)]
    pub review_count: Option<i64>,
    /// Number of questions attached to the note.
    #[serde(rename = "property_preguntas", default)]
    pub question_count: Option<i64>,
    /// Efficiency ratio in [0, 1], or null if never reviewed.
    #[serde(rename = "property_efectividad", default)]
    pub efficiency: Option<f64>,
    #[serde(rename = "property_days_since_last_review", default)]
    pub days_since_last_review: Option<i64>,
    #[serde(rename = "property_topic", default)]
    pub topic: String,
    #[serde(rename = "property_status", default)]
    pub status: String,
}

/// One practice question. The `answer` is the reference answer, shown only in
/// the post-submission review, never before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub question: String,
    pub answer: String,
}

/// A captured per-question answer, keyed by question id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAnswer {
    pub question_id: String,
    pub user_answer: String,
}

/// Evaluation request item: the question/reference-answer pair joined with the
/// user's answer. `studenAnswer` is misspelled on the wire; the backend
/// contract is fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub question: String,
    pub answer: String,
    #[serde(rename = "studenAnswer")]
    pub student_answer: String,
}

/// Backend grading result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub score: i64,
    #[serde(default)]
    pub incorrect_answers: Vec<UserAnswer>,
}

/// Token exchange response. `expiresIn` arrives as a string of seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub expires_in: String,
}

/// Token exchange request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    pub client_name: String,
    pub client_secret: String,
    pub audience: String,
}

/// One element of the transcription response array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    #[serde(default)]
    pub usage: serde_json::Value,
}

/// Declared format of a recorded audio artifact, sent with the upload.
#[derive(Debug, Clone)]
pub struct AudioFormat {
    pub file_extension: String,
    pub mime_type: String,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            file_extension: "wav".to_string(),
            mime_type: "audio/wav".to_string(),
        }
    }
}

impl AudioFormat {
    pub fn file_name(&self) -> String {
        format!("recording.{}", self.file_extension)
    }
}

/// An incorrect answer resolved against the locally held question list,
/// carrying the full question for review display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewItem {
    pub question: Question,
    pub user_answer: String,
}

/// Final payload of a completed practice session.
#[derive(Debug, Clone, Serialize)]
pub struct PracticeResults {
    pub score: i64,
    pub total_questions: usize,
    pub incorrect_answers: Vec<ReviewItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_maps_property_fields() {
        let json = serde_json::json!({
            "id": "n1",
            "name": "Transformers",
            "url": "https://notes.example/n1",
            "property_repasos": 4,
            "property_preguntas": 7,
            "property_efectividad": 0.85,
            "property_days_since_last_review": 12,
            "property_topic": "ML",
            "property_status": "active",
            "property_author": "ignored"
        });
        let note: Note = serde_json::from_value(json).unwrap();
        assert_eq!(note.review_count, Some(4));
        assert_eq!(note.question_count, Some(7));
        assert_eq!(note.efficiency, Some(0.85));
        assert_eq!(note.days_since_last_review, Some(12));
    }

    #[test]
    fn test_note_null_stats() {
        let json = serde_json::json!({ "id": "n2", "name": "Fresh note" });
        let note: Note = serde_json::from_value(json).unwrap();
        assert_eq!(note.review_count, None);
        assert_eq!(note.efficiency, None);
    }

    #[test]
    fn test_submission_wire_field_is_misspelled() {
        let sub = AnswerSubmission {
            question: "Q".to_string(),
            answer: "A".to_string(),
            student_answer: "mine".to_string(),
        };
        let json = serde_json::to_value(&sub).unwrap();
        assert_eq!(json["studenAnswer"], "mine");
        assert!(json.get("studentAnswer").is_none());
    }

    #[test]
    fn test_evaluation_result_camel_case() {
        let json = serde_json::json!({
            "score": 2,
            "incorrectAnswers": [{ "questionId": "1", "userAnswer": "x" }]
        });
        let result: EvaluationResult = serde_json::from_value(json).unwrap();
        assert_eq!(result.score, 2);
        assert_eq!(result.incorrect_answers[0].question_id, "1");
    }

    #[test]
    fn test_evaluation_result_missing_incorrect_list() {
        let result: EvaluationResult =
            serde_json::from_value(serde_json::json!({ "score": 3 })).unwrap();
        assert!(result.incorrect_answers.is_empty());
    }
}
