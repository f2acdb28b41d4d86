//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use kodireba_orchestrator::{
    serve, ExplainRequest, HintRequest, HttpLessonClient, LessonCatalog, LessonPage,
    LessonService, Result, ServerState, Verdict,
};

/// Path to the lesson catalog fixture.
pub fn catalog_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/catalog.json")
}

/// Loads the lesson catalog fixture.
pub fn load_catalog() -> LessonCatalog {
    LessonCatalog::load(catalog_path()).expect("Failed to load catalog fixture")
}

/// A lesson server bound to a free local port.
///
/// The server shuts down when this value is dropped.
#[derive(Debug)]
pub struct TestServer {
    pub base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Shuts the server down gracefully and waits until it has stopped.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await.expect("Server task panicked");
        }
    }
}

/// Spawns the lesson server on a free port.
pub async fn spawn_test_server() -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");
    let (shutdown, signal) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        serve(listener, ServerState::new(load_catalog()), async {
            let _ = signal.await;
        })
        .await
        .expect("Server failed");
    });

    TestServer {
        base_url: format!("http://{addr}"),
        shutdown: Some(shutdown),
        handle: Some(handle),
    }
}

/// Creates an HTTP lesson client for `base_url`.
pub fn http_client(base_url: &str) -> HttpLessonClient {
    HttpLessonClient::new(base_url, Duration::from_secs(5)).expect("Failed to build client")
}

/// Forwards to an HTTP client and counts calls.
#[derive(Debug, Clone)]
pub struct CountingClient {
    inner: HttpLessonClient,
    pub submits: Arc<AtomicUsize>,
    pub hints: Arc<AtomicUsize>,
    pub explains: Arc<AtomicUsize>,
}

impl CountingClient {
    pub fn new(inner: HttpLessonClient) -> Self {
        Self {
            inner,
            submits: Arc::new(AtomicUsize::new(0)),
            hints: Arc::new(AtomicUsize::new(0)),
            explains: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn hint_count(&self) -> usize {
        self.hints.load(Ordering::SeqCst)
    }

    pub fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn explain_count(&self) -> usize {
        self.explains.load(Ordering::SeqCst)
    }
}

impl LessonService for CountingClient {
    async fn fetch_lesson(&self, course_slug: &str, lesson_slug: &str) -> Result<LessonPage> {
        self.inner.fetch_lesson(course_slug, lesson_slug).await
    }

    async fn submit(&self, lesson_id: &str, code: &str) -> Result<Verdict> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        self.inner.submit(lesson_id, code).await
    }

    async fn ask_hint(&self, request: &HintRequest) -> Result<String> {
        self.hints.fetch_add(1, Ordering::SeqCst);
        self.inner.ask_hint(request).await
    }

    async fn explain(&self, request: &ExplainRequest) -> Result<String> {
        self.explains.fetch_add(1, Ordering::SeqCst);
        self.inner.explain(request).await
    }
}
