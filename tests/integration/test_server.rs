//! Integration tests for the lesson server over real HTTP.
//!
//! Each test binds the server to a free local port and talks to it with
//! `reqwest`, either directly or through `HttpLessonClient`.

mod common;

use common::{http_client, spawn_test_server};
use kodireba_orchestrator::{
    ExplainRequest, HealthResponse, HintRequest, KodiError, LessonService, Verdict,
};
use kodireba_sandbox::Language;
use serde_json::{json, Value};

#[tokio::test]
async fn test_health_reports_lesson_count() {
    let server = spawn_test_server().await;
    let base_url = &server.base_url;

    let health: HealthResponse = reqwest::get(format!("{base_url}/health"))
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid body");

    assert_eq!(health.status, "ok");
    assert_eq!(health.lessons, 3);
}

#[tokio::test]
async fn test_fetch_lesson_never_exposes_solution() {
    let server = spawn_test_server().await;
    let base_url = &server.base_url;

    let raw: Value = reqwest::get(format!("{base_url}/lessons/html-basics/text-formatting"))
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid body");
    assert!(raw["lesson"].get("solutionCode").is_none());
    assert!(!raw.to_string().contains("href=\\\"#\\\""));

    let page = http_client(base_url)
        .fetch_lesson("html-basics", "text-formatting")
        .await
        .expect("Fetch failed");
    assert_eq!(page.lesson.id, "html-text");
    assert_eq!(page.course.title, "HTML საფუძვლები");
    assert_eq!(page.navigation.prev.as_ref().map(|l| l.slug.as_str()), Some("what-is-html"));
    assert_eq!(page.navigation.next.as_ref().map(|l| l.slug.as_str()), Some("console"));
    assert!(page.lesson.solution_code.is_none());
    assert_eq!(page.lesson.tests.len(), 5);
}

#[tokio::test]
async fn test_unknown_lesson_maps_to_not_found() {
    let server = spawn_test_server().await;
    let base_url = &server.base_url;

    let err = http_client(base_url)
        .fetch_lesson("html-basics", "missing")
        .await
        .unwrap_err();
    assert!(matches!(err, KodiError::LessonNotFound { .. }));

    let err = http_client(base_url)
        .submit("missing", "<p>")
        .await
        .unwrap_err();
    assert!(matches!(err, KodiError::Api { status: 404, .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_identical_submissions_get_identical_verdicts() {
    let server = spawn_test_server().await;
    let base_url = &server.base_url;
    let client = http_client(base_url);
    let code = "<h1>სათაური</h1>\n<p>ტექსტი</p>";

    let first = client.submit("html-text", code).await.expect("Submit failed");
    let second = client.submit("html-text", code).await.expect("Submit failed");

    assert_eq!(first, second);
    assert!(!first.passed);
    assert_eq!(first.score, 40);
    assert_eq!(first.xp_earned, 0);
    assert_eq!(first.passed_count(), 2);
}

#[tokio::test]
async fn test_passing_submission_wire_format() {
    let server = spawn_test_server().await;
    let base_url = &server.base_url;

    let response = reqwest::Client::new()
        .post(format!("{base_url}/lessons/html-text/submit"))
        .json(&json!({
            "code": "<h1>ა</h1><p><strong>ბ</strong> <em>გ</em> <a href=\"#\">დ</a></p>"
        }))
        .send()
        .await
        .expect("Request failed");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Invalid body");
    assert_eq!(body["passed"], true);
    assert_eq!(body["score"], 100);
    assert_eq!(body["xpEarned"], 20);
    assert_eq!(body["testResults"].as_array().map(Vec::len), Some(5));

    let verdict: Verdict = serde_json::from_value(body).expect("Invalid verdict");
    assert!(verdict.test_results.iter().all(|t| t.hint.is_none()));
}

#[tokio::test]
async fn test_hint_and_explain_endpoints() {
    let server = spawn_test_server().await;
    let base_url = &server.base_url;
    let client = http_client(base_url);

    let hint = client
        .ask_hint(&HintRequest {
            lesson_id: "html-text".to_string(),
            current_code: "<h1>x</h1>".to_string(),
            challenge_text: String::new(),
            lesson_content: String::new(),
            language: Language::Html,
        })
        .await
        .expect("Hint failed");
    assert_eq!(hint, "ტექსტი ჩასვი <p> ტეგში");

    let explanation = client
        .explain(&ExplainRequest {
            current_code: "consol.log(1)".to_string(),
            error: Some("consol is not defined".to_string()),
            challenge_text: String::new(),
            language: Language::JavaScript,
        })
        .await
        .expect("Explain failed");
    assert!(explanation.contains("consol is not defined"));
}

#[tokio::test]
async fn test_unreachable_server_is_transient() {
    let server = spawn_test_server().await;
    let client = http_client(&server.base_url);
    client
        .fetch_lesson("html-basics", "console")
        .await
        .expect("Fetch failed");
    server.stop().await;

    let err = client
        .fetch_lesson("html-basics", "console")
        .await
        .unwrap_err();
    assert!(err.is_transient(), "unexpected error: {err}");
}
