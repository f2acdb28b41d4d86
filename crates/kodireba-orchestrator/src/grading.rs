//! Grading verdicts.
//!
//! The lesson server grades a submission with [`grade`]; the lesson page only
//! ever receives the resulting [`Verdict`] and holds no grading logic.

use serde::{Deserialize, Serialize};

use crate::lesson::Lesson;

/// The outcome of one named test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Test name.
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Hint for a failed test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// The server's verdict on a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    /// Whether every test passed.
    pub passed: bool,
    /// Percentage of passed tests, 0 to 100.
    pub score: u8,
    /// XP granted by this submission.
    #[serde(default)]
    pub xp_earned: u32,
    /// The learner's level after this submission, when it changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_level: Option<u32>,
    /// Per-test results in lesson order.
    #[serde(default)]
    pub test_results: Vec<TestResult>,
}

impl Verdict {
    /// Returns the number of passed tests.
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.test_results.iter().filter(|t| t.passed).count()
    }

    /// Returns the hint of the first failed test that has one.
    #[must_use]
    pub fn first_failing_hint(&self) -> Option<&str> {
        self.test_results
            .iter()
            .filter(|t| !t.passed)
            .find_map(|t| t.hint.as_deref())
    }
}

/// What the tests pane shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VerdictView {
    /// Nothing submitted yet for this lesson; the pane prompts to submit.
    #[default]
    NotSubmitted,
    /// A submission is being graded.
    Grading,
    /// The latest verdict.
    Graded(Verdict),
}

impl VerdictView {
    /// Returns the verdict, if one has arrived.
    #[must_use]
    pub const fn verdict(&self) -> Option<&Verdict> {
        match self {
            Self::Graded(verdict) => Some(verdict),
            _ => None,
        }
    }

    /// Returns `true` if the latest verdict passed.
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Graded(Verdict { passed: true, .. }))
    }
}

/// Grades `code` against the lesson's tests.
///
/// The score is `round(100 * passed / total)`. A lesson without tests passes
/// with a score of 100. XP is granted only on a pass. Grading is a pure
/// function of the lesson and the code.
#[must_use]
pub fn grade(lesson: &Lesson, code: &str) -> Verdict {
    let test_results: Vec<TestResult> = lesson
        .tests
        .iter()
        .map(|test| {
            let passed = test.check.as_ref().map_or(true, |check| check.evaluate(code));
            TestResult {
                name: test.name.clone(),
                passed,
                hint: if passed { None } else { test.hint.clone() },
            }
        })
        .collect();

    let total = test_results.len();
    let passed_count = test_results.iter().filter(|t| t.passed).count();
    let score = percentage(passed_count, total);
    let passed = passed_count == total;

    Verdict {
        passed,
        score,
        xp_earned: if passed { lesson.xp_reward } else { 0 },
        new_level: None,
        test_results,
    }
}

/// Rounds `100 * part / total` half up; an empty total counts as complete.
fn percentage(part: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let rounded = (part.min(total) * 200 + total) / (total * 2);
    u8::try_from(rounded).unwrap_or(100)
}
