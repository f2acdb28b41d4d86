//! Lesson API clients.
//!
//! [`LessonService`] is the seam between the lesson page and the server. The
//! page talks to a remote server through [`HttpLessonClient`]; tests and the
//! offline CLI use [`CatalogService`], which answers from an in-memory
//! catalog with the same semantics as the lesson server.
//!
//! Clients hold no state between calls and cache nothing: identical calls
//! produce identical requests.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::assistant::{explain_error, suggest_hint};
use crate::config::Config;
use crate::error::{KodiError, Result};
use crate::grading::{grade, Verdict};
use crate::lesson::{LessonCatalog, LessonPage};
use crate::protocol::{
    ErrorResponse, ExplainRequest, ExplainResponse, HintRequest, HintResponse, SubmitRequest,
};

/// Operations the lesson page needs from the server.
pub trait LessonService {
    /// Fetches a lesson with its course and neighbours.
    fn fetch_lesson(
        &self,
        course_slug: &str,
        lesson_slug: &str,
    ) -> impl Future<Output = Result<LessonPage>> + Send;

    /// Submits `code` for grading.
    fn submit(&self, lesson_id: &str, code: &str) -> impl Future<Output = Result<Verdict>> + Send;

    /// Asks for a hint.
    fn ask_hint(&self, request: &HintRequest) -> impl Future<Output = Result<String>> + Send;

    /// Asks for an explanation of a console error.
    fn explain(&self, request: &ExplainRequest) -> impl Future<Output = Result<String>> + Send;
}

// ============================================================================
// HTTP Client
// ============================================================================

/// Client for a remote lesson API.
#[derive(Debug, Clone)]
pub struct HttpLessonClient {
    http: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl HttpLessonClient {
    /// Creates a client for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `Network` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KodiError::network(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_secs: timeout.as_secs(),
        })
    }

    /// Creates a client from the `apiBaseUrl` and `requestTimeoutSecs`
    /// settings.
    ///
    /// # Errors
    ///
    /// Returns `Network` if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api_base_url, config.request_timeout())
    }

    /// Returns the base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins percent-encoded path segments onto the base URL.
    fn url(&self, segments: &[&str]) -> Result<reqwest::Url> {
        let invalid = |detail: String| {
            KodiError::config_validation(
                format!("Invalid apiBaseUrl '{}': {detail}", self.base_url),
                "Set apiBaseUrl to an absolute http(s) URL",
            )
        };
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("not a base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.url(segments)?;
        debug!(%url, "GET");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;
        self.read(response).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T> {
        let url = self.url(segments)?;
        debug!(%url, "POST");
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;
        self.read(response).await
    }

    async fn read<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            warn!(status = status.as_u16(), %message, "Lesson API error");
            return Err(KodiError::api(status.as_u16(), message));
        }
        response.json().await.map_err(|e| self.transport_error(&e))
    }

    fn transport_error(&self, error: &reqwest::Error) -> KodiError {
        if error.is_timeout() {
            KodiError::RequestTimeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            KodiError::network(error.to_string())
        }
    }
}

impl LessonService for HttpLessonClient {
    async fn fetch_lesson(&self, course_slug: &str, lesson_slug: &str) -> Result<LessonPage> {
        self.get(&["lessons", course_slug, lesson_slug])
            .await
            .map_err(|e| match e {
                KodiError::Api { status: 404, .. } => {
                    KodiError::lesson_not_found(course_slug, lesson_slug)
                }
                other => other,
            })
    }

    async fn submit(&self, lesson_id: &str, code: &str) -> Result<Verdict> {
        let body = SubmitRequest {
            code: code.to_string(),
        };
        self.post(&["lessons", lesson_id, "submit"], &body).await
    }

    async fn ask_hint(&self, request: &HintRequest) -> Result<String> {
        let response: HintResponse = self.post(&["lessons", "ask-ai"], request).await?;
        Ok(response.hint)
    }

    async fn explain(&self, request: &ExplainRequest) -> Result<String> {
        let response: ExplainResponse = self.post(&["explain-ai"], request).await?;
        Ok(response.explanation)
    }
}

// ============================================================================
// In-Process Service
// ============================================================================

/// Answers lesson calls from an in-memory catalog.
#[derive(Debug, Clone)]
pub struct CatalogService {
    catalog: Arc<LessonCatalog>,
}

impl CatalogService {
    /// Creates a service over `catalog`.
    #[must_use]
    pub const fn new(catalog: Arc<LessonCatalog>) -> Self {
        Self { catalog }
    }

    /// Returns the catalog.
    #[must_use]
    pub fn catalog(&self) -> &LessonCatalog {
        &self.catalog
    }
}

impl LessonService for CatalogService {
    async fn fetch_lesson(&self, course_slug: &str, lesson_slug: &str) -> Result<LessonPage> {
        self.catalog.page(course_slug, lesson_slug)
    }

    async fn submit(&self, lesson_id: &str, code: &str) -> Result<Verdict> {
        let lesson = self.catalog.lesson_by_id(lesson_id)?;
        Ok(grade(lesson, code))
    }

    async fn ask_hint(&self, request: &HintRequest) -> Result<String> {
        let lesson = self.catalog.lesson_by_id(&request.lesson_id)?;
        Ok(suggest_hint(lesson, &request.current_code))
    }

    async fn explain(&self, request: &ExplainRequest) -> Result<String> {
        Ok(explain_error(request))
    }
}
