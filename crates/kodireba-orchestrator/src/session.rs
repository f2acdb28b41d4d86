//! Per-lesson page state.
//!
//! A [`LessonSession`] exists for exactly one loaded lesson. Navigating to
//! another lesson replaces it, which is how every piece of per-lesson state
//! (editor buffer, verdict, failure counter, assistant texts) resets.

use serde::{Deserialize, Serialize};

use crate::error::{KodiError, Result};
use crate::grading::{Verdict, VerdictView};
use crate::lesson::LessonPage;

// ============================================================================
// Layout
// ============================================================================

/// Top-level tab on narrow screens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MobileTab {
    /// Theory and challenge text.
    #[default]
    Theory,
    /// Code editor.
    Editor,
    /// Preview, console and tests.
    Output,
}

/// Sub-tab of the output pane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputTab {
    /// The sandboxed preview frame.
    #[default]
    Preview,
    /// Console lines from the frame.
    Console,
    /// Test results of the latest verdict.
    Tests,
}

/// Which panes are on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    /// Side-by-side panes instead of mobile tabs.
    pub wide: bool,
    /// Active mobile tab.
    pub mobile_tab: MobileTab,
    /// Active output sub-tab.
    pub output_tab: OutputTab,
}

impl Layout {
    /// Brings the output pane to the front on `tab`.
    pub fn focus_output(&mut self, tab: OutputTab) {
        self.output_tab = tab;
        if !self.wide {
            self.mobile_tab = MobileTab::Output;
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// What a verdict changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionOutcome {
    /// Whether the submission passed.
    pub passed: bool,
    /// Failed submissions on this lesson so far.
    pub failure_count: u32,
}

impl SubmissionOutcome {
    /// Returns `true` for the first failed submission on the lesson.
    #[must_use]
    pub const fn is_first_failure(&self) -> bool {
        !self.passed && self.failure_count == 1
    }
}

/// State of the page for one lesson.
#[derive(Debug, Clone)]
pub struct LessonSession {
    page: LessonPage,
    generation: u64,
    code: String,
    verdict: VerdictView,
    failure_count: u32,
    hint: Option<String>,
    explanation: Option<String>,
    theory_html: Option<String>,
    challenge_html: Option<String>,
}

impl LessonSession {
    /// Starts a session with the starter code in the editor.
    #[must_use]
    pub fn new(page: LessonPage, generation: u64) -> Self {
        let theory_html = kodireba_markdown::render_markdown(&page.lesson.content);
        let challenge_html =
            kodireba_markdown::render_optional(page.lesson.challenge_text.as_deref());
        Self {
            code: page.lesson.starter_code_or_empty().to_string(),
            page,
            generation,
            verdict: VerdictView::NotSubmitted,
            failure_count: 0,
            hint: None,
            explanation: None,
            theory_html,
            challenge_html,
        }
    }

    /// Returns the loaded lesson page.
    #[must_use]
    pub const fn page(&self) -> &LessonPage {
        &self.page
    }

    /// Returns the load generation this session belongs to.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the editor buffer.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Replaces the editor buffer.
    pub fn set_code(&mut self, code: impl Into<String>) {
        self.code = code.into();
    }

    /// Returns what the tests pane shows.
    #[must_use]
    pub const fn verdict(&self) -> &VerdictView {
        &self.verdict
    }

    /// Returns the number of failed submissions.
    #[must_use]
    pub const fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Returns the visible hint.
    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// Shows `hint` in the assistant panel.
    pub fn show_hint(&mut self, hint: impl Into<String>) {
        self.hint = Some(hint.into());
    }

    /// Returns the visible explanation.
    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// Shows `explanation` in the assistant panel.
    pub fn show_explanation(&mut self, explanation: impl Into<String>) {
        self.explanation = Some(explanation.into());
    }

    /// Returns the rendered theory markup.
    #[must_use]
    pub fn theory_html(&self) -> Option<&str> {
        self.theory_html.as_deref()
    }

    /// Returns the rendered challenge markup.
    #[must_use]
    pub fn challenge_html(&self) -> Option<&str> {
        self.challenge_html.as_deref()
    }

    /// Returns `true` if the editor pane is shown.
    #[must_use]
    pub fn has_editor(&self) -> bool {
        !self.page.lesson.is_theory_only()
    }

    /// Returns `true` if "Next" is enabled.
    ///
    /// Theory-only lessons never block; otherwise the latest verdict must
    /// have passed.
    #[must_use]
    pub fn can_go_next(&self) -> bool {
        self.page.navigation.next.is_some()
            && (self.page.lesson.is_theory_only() || self.verdict.is_passed())
    }

    /// Returns `true` if "Previous" is enabled.
    #[must_use]
    pub const fn can_go_prev(&self) -> bool {
        self.page.navigation.prev.is_some()
    }

    /// Marks a submission as being graded.
    ///
    /// Returns the view to restore if grading fails.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionInFlight` if a submission is already being graded.
    pub fn begin_grading(&mut self) -> Result<VerdictView> {
        if self.verdict == VerdictView::Grading {
            return Err(KodiError::SubmissionInFlight);
        }
        Ok(std::mem::replace(&mut self.verdict, VerdictView::Grading))
    }

    /// Restores the tests pane after a failed grading call.
    pub fn abort_grading(&mut self, previous: VerdictView) {
        self.verdict = previous;
    }

    /// Records the verdict of a submission.
    pub fn record_verdict(&mut self, verdict: Verdict) -> SubmissionOutcome {
        let passed = verdict.passed;
        if !passed {
            self.failure_count = self.failure_count.saturating_add(1);
        }
        self.verdict = VerdictView::Graded(verdict);
        SubmissionOutcome {
            passed,
            failure_count: self.failure_count,
        }
    }
}
