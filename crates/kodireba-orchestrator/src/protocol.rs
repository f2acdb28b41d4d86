//! Request and response bodies of the lesson API.

use kodireba_sandbox::Language;
use serde::{Deserialize, Serialize};

/// Body of `POST /lessons/:lessonId/submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// The editor buffer, verbatim.
    pub code: String,
}

/// Body of `POST /lessons/ask-ai`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HintRequest {
    /// The lesson being worked on.
    pub lesson_id: String,
    /// The editor buffer.
    pub current_code: String,
    /// Challenge markdown of the lesson.
    #[serde(default)]
    pub challenge_text: String,
    /// Theory markdown of the lesson.
    #[serde(default)]
    pub lesson_content: String,
    /// Language of the code.
    #[serde(default)]
    pub language: Language,
}

/// Response of `POST /lessons/ask-ai`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintResponse {
    /// The hint text.
    pub hint: String,
}

/// Body of `POST /explain-ai`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainRequest {
    /// The editor buffer.
    pub current_code: String,
    /// The console error to explain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Challenge markdown of the lesson.
    #[serde(default)]
    pub challenge_text: String,
    /// Language of the code.
    #[serde(default)]
    pub language: Language,
}

/// Response of `POST /explain-ai`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainResponse {
    /// The explanation text.
    pub explanation: String,
}

/// Error body returned by the lesson API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: String,
    /// Number of lessons in the served catalog.
    pub lessons: usize,
}
