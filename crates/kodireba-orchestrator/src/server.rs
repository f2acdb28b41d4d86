//! Local lesson server.
//!
//! Serves a JSON lesson catalog and implements the lesson API the page
//! consumes. Grading, hints and explanations are deterministic.
//!
//! # Endpoints
//!
//! - `GET /health` - Liveness and lesson count
//! - `GET /lessons/:courseSlug/:lessonSlug` - Lesson with course and navigation
//! - `POST /lessons/:lessonId/submit` - Grade a submission
//! - `POST /lessons/ask-ai` - Hint for the current code
//! - `POST /explain-ai` - Explanation of a console error
//!
//! # Example
//!
//! ```no_run
//! use kodireba_orchestrator::{create_router, LessonCatalog, ServerState};
//!
//! # async fn example() -> kodireba_orchestrator::Result<()> {
//! let catalog = LessonCatalog::load("lessons.json")?;
//! let router = create_router(ServerState::new(catalog));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::client::{CatalogService, LessonService};
use crate::error::{KodiError, Result};
use crate::grading::Verdict;
use crate::lesson::{LessonCatalog, LessonPage};
use crate::protocol::{
    ErrorResponse, ExplainRequest, ExplainResponse, HealthResponse, HintRequest, HintResponse,
    SubmitRequest,
};

// ============================================================================
// Application State
// ============================================================================

/// Shared state of the lesson server.
#[derive(Debug, Clone)]
pub struct ServerState {
    service: CatalogService,
}

impl ServerState {
    /// Creates server state over `catalog`.
    #[must_use]
    pub fn new(catalog: LessonCatalog) -> Self {
        Self {
            service: CatalogService::new(Arc::new(catalog)),
        }
    }

    /// Returns the served catalog.
    #[must_use]
    pub fn catalog(&self) -> &LessonCatalog {
        self.service.catalog()
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
struct ApiError(KodiError);

impl From<KodiError> for ApiError {
    fn from(error: KodiError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            KodiError::LessonNotFound { .. } | KodiError::LessonIdNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            other => {
                warn!(error = %other, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = self.0.to_string();
        let error = message
            .split("\n\n")
            .next()
            .unwrap_or_default()
            .to_string();
        (status, Json(ErrorResponse { error })).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the lesson API router.
///
/// The router carries CORS middleware allowing any origin and a trace layer
/// for request logging.
pub fn create_router(state: ServerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Both three-segment routes must share the name of their first parameter.
    Router::new()
        .route("/health", get(handle_health))
        .route("/lessons/ask-ai", post(handle_ask_hint))
        .route("/lessons/:key/submit", post(handle_submit))
        .route("/lessons/:key/:lesson_slug", get(handle_get_lesson))
        .route("/explain-ai", post(handle_explain))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Serves the lesson API on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an IO error if the server fails.
pub async fn serve(
    listener: TcpListener,
    state: ServerState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(
        %addr,
        lessons = state.catalog().lesson_count(),
        "Lesson server listening"
    );
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Lesson server stopped");
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn handle_health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        lessons: state.catalog().lesson_count(),
    })
}

async fn handle_get_lesson(
    State(state): State<Arc<ServerState>>,
    Path((course_slug, lesson_slug)): Path<(String, String)>,
) -> std::result::Result<Json<LessonPage>, ApiError> {
    let page = state.service.fetch_lesson(&course_slug, &lesson_slug).await?;
    Ok(Json(page))
}

async fn handle_submit(
    State(state): State<Arc<ServerState>>,
    Path(lesson_id): Path<String>,
    Json(request): Json<SubmitRequest>,
) -> std::result::Result<Json<Verdict>, ApiError> {
    let verdict = state.service.submit(&lesson_id, &request.code).await?;
    info!(
        lesson_id = %lesson_id,
        passed = verdict.passed,
        score = verdict.score,
        "Submission graded"
    );
    Ok(Json(verdict))
}

async fn handle_ask_hint(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<HintRequest>,
) -> std::result::Result<Json<HintResponse>, ApiError> {
    let hint = state.service.ask_hint(&request).await?;
    Ok(Json(HintResponse { hint }))
}

async fn handle_explain(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ExplainRequest>,
) -> std::result::Result<Json<ExplainResponse>, ApiError> {
    let explanation = state.service.explain(&request).await?;
    Ok(Json(ExplainResponse { explanation }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    use super::*;
    use crate::lesson::tests::CATALOG;

    fn test_router() -> Router {
        create_router(ServerState::new(LessonCatalog::from_json(CATALOG).unwrap()))
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = test_router().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, value)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    // ------------------------------------------------------------------------
    // Lesson endpoint tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok", "lessons": 3 }));
    }

    #[tokio::test]
    async fn test_get_lesson_strips_solution() {
        let (status, body) = send(get_request("/lessons/html-basics/headings")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["lesson"]["id"], "l2");
        assert_eq!(body["lesson"]["starterCode"], "<h1></h1>");
        assert!(body["lesson"].get("solutionCode").is_none());
        assert_eq!(body["course"]["slug"], "html-basics");
        assert_eq!(body["navigation"]["prev"]["slug"], "intro");
        assert_eq!(body["navigation"]["next"]["slug"], "links");
    }

    #[tokio::test]
    async fn test_get_unknown_lesson_returns_404() {
        let (status, body) = send(get_request("/lessons/html-basics/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("nope"));
    }

    // ------------------------------------------------------------------------
    // Submission endpoint tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_submit_grades_deterministically() {
        let request = json!({ "code": "<h2>x</h2>" });
        let (status, first) = send(post_json("/lessons/l2/submit", &request)).await;
        let (_, second) = send(post_json("/lessons/l2/submit", &request)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(first, second);
        assert_eq!(first["passed"], false);
        assert_eq!(first["score"], 0);
        assert_eq!(first["xpEarned"], 0);
        assert_eq!(first["testResults"][0]["hint"], "use h1");
    }

    #[tokio::test]
    async fn test_submit_passing_code() {
        let (status, body) = send(post_json(
            "/lessons/l2/submit",
            &json!({ "code": "<h1>გამარჯობა</h1>" }),
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["passed"], true);
        assert_eq!(body["score"], 100);
        assert!(body.get("newLevel").is_none());
    }

    #[tokio::test]
    async fn test_submit_unknown_lesson_returns_404() {
        let (status, _) = send(post_json("/lessons/zzz/submit", &json!({ "code": "" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_submit_invalid_json_returns_400() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/lessons/l2/submit")
            .header("content-type", "application/json")
            .body(Body::from("{ not json"))
            .unwrap();
        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // ------------------------------------------------------------------------
    // Assistant endpoint tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_ask_hint() {
        let (status, body) = send(post_json(
            "/lessons/ask-ai",
            &json!({
                "lessonId": "l2",
                "currentCode": "<p></p>",
                "challengeText": "",
                "lessonContent": "",
                "language": "html"
            }),
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hint"], "use h1");
    }

    #[tokio::test]
    async fn test_explain() {
        let (status, body) = send(post_json(
            "/explain-ai",
            &json!({ "currentCode": "y()", "error": "y is not defined", "language": "javascript" }),
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["explanation"]
            .as_str()
            .unwrap()
            .contains("y is not defined"));
    }
}
