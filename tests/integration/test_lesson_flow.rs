//! End-to-end lesson page scenarios.
//!
//! A `LessonController` drives a real lesson server over HTTP, the way the
//! lesson page does: open a lesson, edit, run, submit, ask for help and
//! navigate.

mod common;

use std::time::Duration;

use common::{http_client, spawn_test_server, CountingClient, TestServer};
use kodireba_orchestrator::{
    Config, ConsoleLevel, KodiError, LessonController, LocalStorage, MobileTab, OutputTab,
    UserProgress, VerdictView, LAST_LESSON_URL_KEY,
};
use kodireba_sandbox::SANDBOX_ATTRIBUTE;

/// Config with a short debounce so the scenarios run quickly.
fn fast_config() -> Config {
    let mut config = Config::default();
    config.editor.debounce_ms = 50;
    config
}

async fn controller() -> (LessonController<CountingClient>, TestServer) {
    let server = spawn_test_server().await;
    let client = CountingClient::new(http_client(&server.base_url));
    let controller = LessonController::new(fast_config(), client, LocalStorage::in_memory());
    (controller, server)
}

#[tokio::test]
async fn test_theory_only_lesson_enables_next_without_submission() {
    let (mut controller, _server) = controller().await;

    let session = controller
        .open("html-basics", "what-is-html")
        .await
        .expect("Open failed");
    assert!(!session.has_editor());
    assert!(session.can_go_next());
    assert_eq!(session.verdict(), &VerdictView::NotSubmitted);

    let theory = session.theory_html().expect("Theory should render");
    assert!(theory.contains("<strong>სტრუქტურას</strong>"));
    assert!(theory.contains("&lt;h1&gt;"));
    assert!(!theory.contains("<h1>"));

    let next = controller.next().await.expect("Next failed").expect("Next disabled");
    assert_eq!(next.page().lesson.slug, "text-formatting");
    assert_eq!(controller.service().submit_count(), 0);
}

#[tokio::test]
async fn test_first_failure_requests_exactly_one_hint() {
    let (mut controller, _server) = controller().await;
    controller
        .open("html-basics", "text-formatting")
        .await
        .expect("Open failed");

    controller
        .edit("<h1>სათაური</h1>\n<p>ტექსტი</p>")
        .expect("Edit failed");
    let report = controller.submit().await.expect("Submit failed");

    assert!(!report.verdict.passed);
    assert_eq!(report.verdict.score, 40);
    assert_eq!(report.outcome.failure_count, 1);
    assert_eq!(
        report.auto_hint.as_deref(),
        Some("გამოიყენე <strong> მუქი ტექსტისთვის")
    );
    assert_eq!(controller.service().hint_count(), 1);
    assert_eq!(controller.layout().output_tab, OutputTab::Tests);
    assert_eq!(controller.layout().mobile_tab, MobileTab::Output);

    let session = controller.session().expect("Session missing");
    assert!(!session.can_go_next());
    assert_eq!(session.failure_count(), 1);
    assert_eq!(session.hint(), Some("გამოიყენე <strong> მუქი ტექსტისთვის"));

    // Later failures never trigger another automatic hint.
    let again = controller.submit().await.expect("Submit failed");
    assert_eq!(again.outcome.failure_count, 2);
    assert!(again.auto_hint.is_none());
    assert_eq!(again.verdict, report.verdict);
    assert_eq!(controller.service().hint_count(), 1);
    assert_eq!(controller.service().submit_count(), 2);
}

#[tokio::test]
async fn test_pass_unlocks_next_and_applies_xp() {
    let (mut controller, _server) = controller().await;
    controller
        .open("html-basics", "text-formatting")
        .await
        .expect("Open failed");
    assert!(controller.next().await.expect("Next failed").is_none());

    controller
        .edit("<h1>ა</h1><p><strong>ბ</strong> <em>გ</em> <a href=\"#\">დ</a></p>")
        .expect("Edit failed");
    let report = controller.submit().await.expect("Submit failed");

    assert!(report.outcome.passed);
    assert!(report.auto_hint.is_none());
    assert_eq!(controller.progress(), UserProgress { xp: 20, level: 1 });
    assert_eq!(controller.service().hint_count(), 0);

    let next = controller.next().await.expect("Next failed").expect("Next disabled");
    assert_eq!(next.page().lesson.slug, "console");
    assert_eq!(next.failure_count(), 0);
    assert_eq!(next.code(), "// დაწერე კოდი აქ\n");
    assert_eq!(
        controller.storage().get(LAST_LESSON_URL_KEY),
        Some("/courses/html-basics/lessons/console")
    );
}

#[tokio::test]
async fn test_edit_burst_rebuilds_once_with_last_code() {
    let (mut controller, _server) = controller().await;
    controller
        .open("html-basics", "text-formatting")
        .await
        .expect("Open failed");
    let initial_key = controller.preview().render_key();

    for code in ["<h1>", "<h1>გამ", "<h1>გამარჯობა</h1>"] {
        controller.edit(code).expect("Edit failed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let key = controller
        .next_auto_run()
        .await
        .expect("Rebuild should fire");
    assert_eq!(key, initial_key + 1);
    assert!(controller.next_auto_run().await.is_none());

    let markup = controller.preview().frame_markup().expect("No frame");
    assert!(markup.contains(&format!("sandbox=\"{SANDBOX_ATTRIBUTE}\"")));
    let document = &controller.preview().current().expect("No render").document;
    assert!(document.contains("<h1>გამარჯობა</h1>"));
}

#[tokio::test]
async fn test_console_error_enables_explain() {
    let (mut controller, _server) = controller().await;
    controller
        .open("html-basics", "console")
        .await
        .expect("Open failed");

    controller
        .edit("console.log(\"გამარჯობა\");\nconsol.log(1);")
        .expect("Edit failed");
    let key = controller.run().expect("Run failed");
    assert_eq!(controller.layout().output_tab, OutputTab::Preview);
    assert!(!controller.can_explain());
    assert!(matches!(
        controller.explain().await,
        Err(KodiError::NothingToExplain)
    ));

    let document = &controller.preview().current().expect("No render").document;
    assert!(document.contains("try {"));
    assert!(document.contains("consol.log(1);"));

    // What the frame posts while the code runs.
    let port = controller.console_port();
    port.post(key, r#"{"type":"console","level":"log","msg":"გამარჯობა"}"#);
    port.post(
        key,
        r#"{"type":"console","level":"error","msg":"ReferenceError: consol is not defined","line":2}"#,
    );
    port.post(key, r#"{"type":"resize","height":120}"#);

    let log = controller.drain_console();
    assert_eq!(log.len(), 2);
    let errors: Vec<_> = log
        .entries()
        .iter()
        .filter(|e| e.level == ConsoleLevel::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].line, Some(2));
    assert!(controller.can_explain());

    let explanation = controller.explain().await.expect("Explain failed");
    assert!(explanation.contains("consol is not defined"));
    assert_eq!(controller.service().explain_count(), 1);

    // A new run starts with a clean console.
    controller.run().expect("Run failed");
    assert!(controller.drain_console().is_empty());
    assert!(!controller.can_explain());
}

#[tokio::test]
async fn test_navigation_drops_pending_work() {
    let (mut controller, _server) = controller().await;
    controller
        .open("html-basics", "console")
        .await
        .expect("Open failed");
    let key = controller.run().expect("Run failed");
    let old_port = controller.console_port();
    controller.edit("console.log(1);").expect("Edit failed");

    controller.prev().await.expect("Prev failed").expect("No previous");
    assert!(!controller.has_pending_rebuild());
    assert!(!old_port.post(key, r#"{"type":"console","level":"error","msg":"late"}"#));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(controller.next_auto_run().await.is_none());
    assert!(controller.drain_console().is_empty());
    assert_eq!(
        controller.session().expect("Session missing").page().lesson.slug,
        "text-formatting"
    );
}

#[tokio::test]
async fn test_resume_from_persisted_url() {
    let server = spawn_test_server().await;
    let base_url = &server.base_url;
    let dir = std::env::temp_dir().join(format!("kodireba-resume-{}", std::process::id()));
    let storage_path = dir.join("storage.json");

    {
        let storage = LocalStorage::open(&storage_path).await.expect("Open storage");
        let mut controller =
            LessonController::new(fast_config(), http_client(base_url), storage);
        controller
            .open("html-basics", "console")
            .await
            .expect("Open failed");
    }

    let storage = LocalStorage::open(&storage_path).await.expect("Open storage");
    let mut controller = LessonController::new(fast_config(), http_client(base_url), storage);
    let session = controller
        .resume()
        .await
        .expect("Resume failed")
        .expect("Nothing to resume");
    assert_eq!(session.page().lesson.id, "js-console");

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_submit_while_server_down_keeps_state() {
    let (mut controller, server) = controller().await;
    controller
        .open("html-basics", "text-formatting")
        .await
        .expect("Open failed");
    controller.edit("<h1>x</h1>").expect("Edit failed");

    server.stop().await;

    let err = controller.submit().await.unwrap_err();
    assert!(err.is_transient());
    assert!(!err.toast_message().is_empty());

    let session = controller.session().expect("Session missing");
    assert_eq!(session.verdict(), &VerdictView::NotSubmitted);
    assert_eq!(session.failure_count(), 0);
    assert_eq!(session.code(), "<h1>x</h1>");
}
