//! Kodireba Lesson Orchestrator
//!
//! Drives the lesson page: loads lessons, runs learner code in the sandboxed
//! preview, collects console output, submits code for grading and asks the
//! assistant for hints. Also hosts the local lesson server.

pub mod assistant;
pub mod client;
pub mod config;
pub mod console;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod grading;
pub mod lesson;
pub mod progress;
pub mod protocol;
pub mod server;
pub mod session;
pub mod storage;

pub use client::{CatalogService, HttpLessonClient, LessonService};
pub use config::{AssistantConfig, Config, EditorConfig, SandboxConfig, ServerConfig};
pub use console::{ConsoleBridge, ConsoleEntry, ConsoleLevel, ConsoleLog, ConsolePort};
pub use controller::{parse_lesson_url, LessonController, PendingRebuild, SubmitReport};
pub use debounce::Debouncer;
pub use error::{KodiError, Result};
pub use grading::{grade, TestResult, Verdict, VerdictView};
pub use lesson::{
    lesson_url, normalize_hints, ContentType, Course, CourseInfo, HintPayload, Lesson,
    LessonCatalog, LessonPage, LessonRef, Navigation, TestCheck, TestSpec, MAX_CATALOG_SIZE,
};
pub use progress::UserProgress;
pub use protocol::{
    ErrorResponse, ExplainRequest, ExplainResponse, HealthResponse, HintRequest, HintResponse,
    SubmitRequest,
};
pub use server::{create_router, serve, ServerState};
pub use session::{Layout, LessonSession, MobileTab, OutputTab, SubmissionOutcome};
pub use storage::{LocalStorage, LAST_LESSON_URL_KEY};
