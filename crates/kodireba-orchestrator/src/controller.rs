//! The lesson page controller.
//!
//! [`LessonController`] is the single owner of page state. It processes
//! learner events one at a time: load, edit, run, submit, ask for a hint,
//! ask for an explanation, navigate.
//!
//! # Flow
//!
//! ```text
//! open ──> reset session ──> render preview ──> persist lastLessonUrl
//! edit ──> debounce (600 ms) ──> next_auto_run ──> render preview
//! run  ──> render preview, focus preview
//! submit ──> grade ──> focus tests ──> pass: apply XP
//!                                  └─> first failure: one hint request
//! prev/next ──> cancel timer, detach console ──> open
//! ```
//!
//! Every debounced rebuild carries the generation of the lesson it was
//! scheduled for and is discarded if another lesson has been loaded since.

use kodireba_sandbox::{is_runnable, PreviewHost};
use tracing::{debug, info, warn};

use crate::client::LessonService;
use crate::config::Config;
use crate::console::{ConsoleBridge, ConsoleLog, ConsolePort};
use crate::debounce::Debouncer;
use crate::error::{KodiError, Result};
use crate::grading::Verdict;
use crate::lesson::{lesson_url, LessonPage};
use crate::progress::UserProgress;
use crate::protocol::{ExplainRequest, HintRequest};
use crate::session::{Layout, LessonSession, OutputTab, SubmissionOutcome};
use crate::storage::{LocalStorage, LAST_LESSON_URL_KEY};

/// A preview rebuild waiting for the debounce timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRebuild {
    /// Generation of the lesson the edit was made on.
    pub generation: u64,
    /// Editor buffer at the time of the edit.
    pub code: String,
}

/// Result of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReport {
    /// The server's verdict.
    pub verdict: Verdict,
    /// Counter and pass state after the verdict.
    pub outcome: SubmissionOutcome,
    /// The hint fetched automatically after the first failure.
    pub auto_hint: Option<String>,
}

/// Drives one lesson page.
#[derive(Debug)]
pub struct LessonController<S> {
    config: Config,
    service: S,
    storage: LocalStorage,
    progress: UserProgress,
    layout: Layout,
    preview: PreviewHost,
    console: ConsoleBridge,
    debouncer: Debouncer<PendingRebuild>,
    session: Option<LessonSession>,
    generation: u64,
}

impl<S: LessonService> LessonController<S> {
    /// Creates a controller with no lesson loaded.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(config: Config, service: S, storage: LocalStorage) -> Self {
        let preview = PreviewHost::new(config.sandbox.options());
        let debouncer = Debouncer::new(config.editor.debounce());
        Self {
            config,
            service,
            storage,
            progress: UserProgress::default(),
            layout: Layout::default(),
            preview,
            console: ConsoleBridge::new(),
            debouncer,
            session: None,
            generation: 0,
        }
    }

    /// Sets the starting progress shown in the header.
    #[must_use]
    pub fn with_progress(mut self, progress: UserProgress) -> Self {
        self.progress = progress;
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the lesson service.
    #[must_use]
    pub const fn service(&self) -> &S {
        &self.service
    }

    /// Returns the current lesson session.
    #[must_use]
    pub const fn session(&self) -> Option<&LessonSession> {
        self.session.as_ref()
    }

    /// Returns the learner's progress.
    #[must_use]
    pub const fn progress(&self) -> UserProgress {
        self.progress
    }

    /// Returns the pane layout.
    #[must_use]
    pub const fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Switches between the wide and the tabbed layout.
    pub fn set_wide(&mut self, wide: bool) {
        self.layout.wide = wide;
    }

    /// Returns the preview host.
    #[must_use]
    pub const fn preview(&self) -> &PreviewHost {
        &self.preview
    }

    /// Returns local storage.
    #[must_use]
    pub const fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    /// Returns a port the current preview frame posts console messages to.
    #[must_use]
    pub fn console_port(&self) -> ConsolePort {
        self.console.port()
    }

    /// Moves pending console messages into the log and returns it.
    pub fn drain_console(&mut self) -> &ConsoleLog {
        self.console.drain();
        self.console.log()
    }

    /// Returns the console log.
    #[must_use]
    pub const fn console_log(&self) -> &ConsoleLog {
        self.console.log()
    }

    /// Clears the console pane.
    pub fn clear_console(&mut self) {
        self.console.clear();
    }

    /// Returns `true` if "AI ახსნა" is enabled.
    #[must_use]
    pub fn can_explain(&self) -> bool {
        self.session.is_some() && self.console.log().has_errors()
    }

    /// Returns `true` while a debounced rebuild is waiting.
    #[must_use]
    pub fn has_pending_rebuild(&self) -> bool {
        self.debouncer.is_pending()
    }

    fn session_mut(&mut self) -> Result<&mut LessonSession> {
        self.session.as_mut().ok_or(KodiError::NoLessonLoaded)
    }

    fn current(&self) -> Result<&LessonSession> {
        self.session.as_ref().ok_or(KodiError::NoLessonLoaded)
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Loads a lesson and resets the page.
    ///
    /// # Errors
    ///
    /// Returns the service error if the lesson cannot be fetched; the
    /// previous lesson stays loaded in that case.
    pub async fn open(&mut self, course_slug: &str, lesson_slug: &str) -> Result<&LessonSession> {
        let page = self.service.fetch_lesson(course_slug, lesson_slug).await?;
        self.load(page).await
    }

    /// Reopens the lesson stored under `lastLessonUrl`.
    ///
    /// Returns `None` if nothing is stored or the stored URL is not a lesson
    /// URL.
    ///
    /// # Errors
    ///
    /// Returns the service error if the lesson cannot be fetched.
    pub async fn resume(&mut self) -> Result<Option<&LessonSession>> {
        let Some((course, lesson)) = self
            .storage
            .get(LAST_LESSON_URL_KEY)
            .and_then(parse_lesson_url)
        else {
            return Ok(None);
        };
        self.open(&course, &lesson).await.map(Some)
    }

    async fn load(&mut self, page: LessonPage) -> Result<&LessonSession> {
        self.teardown();
        self.generation += 1;
        self.console = ConsoleBridge::new();

        let url = page.url();
        info!(
            lesson_id = %page.lesson.id,
            url = %url,
            generation = self.generation,
            "Lesson loaded"
        );

        let session = LessonSession::new(page, self.generation);
        self.layout.output_tab = OutputTab::Preview;
        if session.has_editor() {
            let language = session.page().lesson.language;
            let key = self.preview.render(session.code(), language).key;
            self.console.begin_run(key);
        }
        self.session = Some(session);

        if let Err(e) = self.storage.set(LAST_LESSON_URL_KEY, url).await {
            warn!(error = %e, "Failed to persist last lesson URL");
        }

        self.current()
    }

    fn teardown(&mut self) {
        if self.debouncer.cancel() {
            debug!("Cancelled pending rebuild");
        }
        self.console.detach();
        self.preview.unload();
    }

    /// Leaves the page: cancels the timer and detaches the console.
    pub fn close(&mut self) {
        self.teardown();
        self.session = None;
    }

    /// Loads the next lesson.
    ///
    /// Returns `None` if "Next" is disabled.
    ///
    /// # Errors
    ///
    /// Returns the service error if the lesson cannot be fetched.
    pub async fn next(&mut self) -> Result<Option<&LessonSession>> {
        let session = self.current()?;
        if !session.can_go_next() {
            return Ok(None);
        }
        let course = session.page().course.slug.clone();
        let Some(next) = session.page().navigation.next.clone() else {
            return Ok(None);
        };
        self.open(&course, &next.slug).await.map(Some)
    }

    /// Loads the previous lesson.
    ///
    /// Returns `None` on the first lesson of a course.
    ///
    /// # Errors
    ///
    /// Returns the service error if the lesson cannot be fetched.
    pub async fn prev(&mut self) -> Result<Option<&LessonSession>> {
        let session = self.current()?;
        let course = session.page().course.slug.clone();
        let Some(prev) = session.page().navigation.prev.clone() else {
            return Ok(None);
        };
        self.open(&course, &prev.slug).await.map(Some)
    }

    // ========================================================================
    // Editing and Running
    // ========================================================================

    /// Replaces the editor buffer.
    ///
    /// With auto-run on, schedules a debounced preview rebuild.
    ///
    /// # Errors
    ///
    /// Returns `NoLessonLoaded` if no lesson is loaded.
    pub fn edit(&mut self, code: impl Into<String>) -> Result<()> {
        let code = code.into();
        let auto_run = self.config.editor.auto_run;
        let generation = self.generation;
        self.session_mut()?.set_code(code.clone());
        if auto_run {
            self.debouncer.schedule(PendingRebuild { generation, code });
        }
        Ok(())
    }

    /// Waits for the debounce timer and rebuilds the preview.
    ///
    /// Returns the new render key, or `None` if no rebuild is pending or the
    /// fired rebuild was stale or had nothing to run.
    pub async fn next_auto_run(&mut self) -> Option<u64> {
        let pending = self.debouncer.fired().await?;
        self.apply_rebuild(pending)
    }

    fn apply_rebuild(&mut self, pending: PendingRebuild) -> Option<u64> {
        if pending.generation != self.generation {
            debug!(
                stale = pending.generation,
                current = self.generation,
                "Discarding rebuild for a previous lesson"
            );
            return None;
        }
        let language = self.session.as_ref()?.page().lesson.language;
        if !is_runnable(&pending.code, language) {
            debug!("Nothing to run, auto-run skipped");
            return None;
        }
        Some(self.rebuild(&pending.code))
    }

    /// Rebuilds the preview immediately and brings it to the front.
    ///
    /// Returns the new render key.
    ///
    /// # Errors
    ///
    /// Returns `NoLessonLoaded` if no lesson is loaded.
    pub fn run(&mut self) -> Result<u64> {
        if self.debouncer.cancel() {
            debug!("Explicit run replaces pending rebuild");
        }
        let code = self.current()?.code().to_string();
        let key = self.rebuild(&code);
        self.layout.focus_output(OutputTab::Preview);
        Ok(key)
    }

    fn rebuild(&mut self, code: &str) -> u64 {
        let language = self
            .session
            .as_ref()
            .map(|s| s.page().lesson.language)
            .unwrap_or_default();
        let key = self.preview.render(code, language).key;
        self.console.begin_run(key);
        key
    }

    // ========================================================================
    // Grading and Assistance
    // ========================================================================

    /// Submits the editor buffer for grading.
    ///
    /// On a pass the XP delta is applied. On the first failure, and only
    /// then, a hint is requested if `assistant.autoHintOnFirstFailure` is on.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionInFlight` while another submission is graded, or
    /// the service error. A failed call leaves the tests pane as it was.
    pub async fn submit(&mut self) -> Result<SubmitReport> {
        let session = self.session_mut()?;
        let previous = session.begin_grading()?;
        let lesson_id = session.page().lesson.id.clone();
        let code = session.code().to_string();
        self.layout.focus_output(OutputTab::Tests);

        let verdict = match self.service.submit(&lesson_id, &code).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, lesson_id = %lesson_id, "Submission failed");
                if let Some(session) = self.session.as_mut() {
                    session.abort_grading(previous);
                }
                return Err(e);
            }
        };

        info!(
            lesson_id = %lesson_id,
            passed = verdict.passed,
            score = verdict.score,
            "Verdict received"
        );

        let outcome = self.session_mut()?.record_verdict(verdict.clone());
        if outcome.passed {
            self.progress.apply(&verdict);
        }

        let auto_hint = if outcome.is_first_failure()
            && self.config.assistant.auto_hint_on_first_failure
        {
            match self.request_hint().await {
                Ok(hint) => Some(hint),
                Err(e) => {
                    warn!(error = %e, "Automatic hint failed");
                    None
                }
            }
        } else {
            None
        };

        Ok(SubmitReport {
            verdict,
            outcome,
            auto_hint,
        })
    }

    /// Asks the assistant for a hint on the current code.
    ///
    /// # Errors
    ///
    /// Returns `NoLessonLoaded` or the service error.
    pub async fn request_hint(&mut self) -> Result<String> {
        let session = self.current()?;
        let lesson = &session.page().lesson;
        let request = HintRequest {
            lesson_id: lesson.id.clone(),
            current_code: session.code().to_string(),
            challenge_text: lesson.challenge_text.clone().unwrap_or_default(),
            lesson_content: lesson.content.clone(),
            language: lesson.language,
        };

        let hint = self.service.ask_hint(&request).await?;
        debug!(lesson_id = %request.lesson_id, "Hint received");
        self.session_mut()?.show_hint(hint.clone());
        Ok(hint)
    }

    /// Asks the assistant to explain the latest console error.
    ///
    /// # Errors
    ///
    /// Returns `NothingToExplain` if the console has no error line, or the
    /// service error.
    pub async fn explain(&mut self) -> Result<String> {
        self.console.drain();
        let error = self
            .console
            .log()
            .last_error()
            .map(|e| e.message.clone())
            .ok_or(KodiError::NothingToExplain)?;

        let session = self.current()?;
        let lesson = &session.page().lesson;
        let request = ExplainRequest {
            current_code: session.code().to_string(),
            error: Some(error),
            challenge_text: lesson.challenge_text.clone().unwrap_or_default(),
            language: lesson.language,
        };

        let explanation = self.service.explain(&request).await?;
        self.session_mut()?.show_explanation(explanation.clone());
        Ok(explanation)
    }
}

impl<S> Drop for LessonController<S> {
    fn drop(&mut self) {
        self.debouncer.cancel();
        self.console.detach();
    }
}

/// Splits `/courses/{course}/lessons/{lesson}` into its slugs.
#[must_use]
pub fn parse_lesson_url(url: &str) -> Option<(String, String)> {
    let rest = url.strip_prefix("/courses/")?;
    let (course, lesson) = rest.split_once("/lessons/")?;
    if course.is_empty() || lesson.is_empty() || course.contains('/') || lesson.contains('/') {
        return None;
    }
    if lesson_url(course, lesson) != url {
        return None;
    }
    Some((course.to_string(), lesson.to_string()))
}
