//! Lesson model and catalog loading.
//!
//! This module provides the lesson, course and navigation types shared by the
//! lesson server and the lesson page, the declarative test specifications
//! submissions are graded against, and hint normalization.

use std::path::Path;

use kodireba_sandbox::Language;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{KodiError, Result};

/// Maximum allowed lesson catalog file size in bytes (1MB).
pub const MAX_CATALOG_SIZE: u64 = 1024 * 1024;

/// Keys checked, in order, when a hint is stored as an object.
const HINT_KEYS: [&str; 4] = ["text", "hint", "content", "message"];

static SLUG_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").ok());

/// Builds the page URL of a lesson.
#[must_use]
pub fn lesson_url(course_slug: &str, lesson_slug: &str) -> String {
    format!("/courses/{course_slug}/lessons/{lesson_slug}")
}

/// What kind of page a lesson is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Reading material; may still carry an optional exercise.
    #[default]
    Theory,
    /// A coding exercise.
    Practice,
    /// A quiz.
    Quiz,
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Theory => write!(f, "theory"),
            Self::Practice => write!(f, "practice"),
            Self::Quiz => write!(f, "quiz"),
        }
    }
}

/// A named test a submission is graded against.
///
/// Only the name is sent to clients; the check and hint stay on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSpec {
    /// Name shown in the test results list.
    pub name: String,

    /// The rule the submitted code must satisfy.
    #[serde(default, skip_serializing)]
    pub check: Option<TestCheck>,

    /// Hint returned when this test fails.
    #[serde(default, skip_serializing)]
    pub hint: Option<String>,
}

/// A declarative check evaluated against submitted code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TestCheck {
    /// The code contains `value` verbatim.
    Contains {
        /// Text that must appear.
        value: String,
    },
    /// The code does not contain `value`.
    NotContains {
        /// Text that must not appear.
        value: String,
    },
    /// The code matches the regular expression `value`.
    Regex {
        /// Pattern that must match somewhere in the code.
        value: String,
    },
}

impl TestCheck {
    /// Evaluates the check against `code`.
    ///
    /// An invalid pattern never matches; catalogs are validated on load so
    /// this only happens for hand-built lessons.
    #[must_use]
    pub fn evaluate(&self, code: &str) -> bool {
        match self {
            Self::Contains { value } => code.contains(value.as_str()),
            Self::NotContains { value } => !code.contains(value.as_str()),
            Self::Regex { value } => Regex::new(value).is_ok_and(|re| re.is_match(code)),
        }
    }
}

/// A hint as stored, before normalization.
///
/// Stored hints come in several shapes: plain strings, strings holding
/// encoded JSON, or objects with one of the keys `text`, `hint`, `content`
/// or `message`. Use [`normalize_hints`] to turn them into display text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HintPayload {
    /// A plain or JSON-encoded string.
    Text(String),
    /// An object carrying the hint under a known key.
    Keyed(HintFields),
    /// Anything else.
    Other(Value),
}

/// Known keys of an object-shaped hint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintFields {
    /// Hint text under `text`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Hint text under `hint`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Hint text under `content`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Hint text under `message`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Converts stored hints into display strings.
///
/// JSON-encoded strings are decoded (arrays are flattened); a string that
/// fails to decode is used as-is. Objects yield the first non-empty value
/// among `text`, `hint`, `content` and `message`. Empty hints are dropped.
/// Never fails.
#[must_use]
pub fn normalize_hints(payloads: &[HintPayload]) -> Vec<String> {
    fn push_text(text: &str, out: &mut Vec<String>) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            out.push(trimmed.to_string());
        }
    }

    fn push_value(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::String(text) => push_text(text, out),
            Value::Array(items) => items.iter().for_each(|item| push_value(item, out)),
            Value::Object(map) => {
                if let Some(text) = HINT_KEYS
                    .iter()
                    .filter_map(|key| map.get(*key).and_then(Value::as_str))
                    .find(|text| !text.trim().is_empty())
                {
                    push_text(text, out);
                }
            }
            Value::Null => {}
            other => push_text(&other.to_string(), out),
        }
    }

    let mut hints = Vec::new();
    for payload in payloads {
        match payload {
            HintPayload::Text(text) => {
                let trimmed = text.trim_start();
                let looks_encoded = trimmed.starts_with(['"', '[', '{']);
                match serde_json::from_str::<Value>(trimmed) {
                    Ok(value) if looks_encoded => push_value(&value, &mut hints),
                    _ => push_text(text, &mut hints),
                }
            }
            HintPayload::Keyed(fields) => {
                if let Some(text) = [&fields.text, &fields.hint, &fields.content, &fields.message]
                    .into_iter()
                    .flatten()
                    .find(|text| !text.trim().is_empty())
                {
                    push_text(text, &mut hints);
                }
            }
            HintPayload::Other(value) => push_value(value, &mut hints),
        }
    }
    hints
}

/// Accepts a hint list, a single JSON-encoded string, or `null`.
fn deserialize_hints<'de, D>(deserializer: D) -> std::result::Result<Vec<HintPayload>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .into_iter()
            .map(|item| {
                serde_json::from_value(item.clone()).unwrap_or(HintPayload::Other(item))
            })
            .collect(),
        Value::String(text) => vec![HintPayload::Text(text)],
        other => vec![HintPayload::Other(other)],
    })
}

/// A single lesson.
///
/// The solution code is only ever read from the catalog; it is never
/// serialized, so it cannot reach a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    /// Unique lesson id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// URL slug, unique within its course.
    pub slug: String,
    /// Theory markdown.
    #[serde(default)]
    pub content: String,
    /// What kind of page the lesson is.
    #[serde(default)]
    pub content_type: ContentType,
    /// Code the editor starts with.
    #[serde(default)]
    pub starter_code: Option<String>,
    /// Reference solution.
    #[serde(default, skip_serializing)]
    pub solution_code: Option<String>,
    /// Challenge markdown shown above the editor.
    #[serde(default)]
    pub challenge_text: Option<String>,
    /// Ordered tests the submission is graded against.
    #[serde(default)]
    pub tests: Vec<TestSpec>,
    /// Stored hints.
    #[serde(default, deserialize_with = "deserialize_hints")]
    pub hints: Vec<HintPayload>,
    /// Language of the starter code.
    #[serde(default)]
    pub language: Language,
    /// XP granted when the lesson is passed.
    #[serde(default)]
    pub xp_reward: u32,
    /// Position within the course.
    #[serde(default)]
    pub order: u32,
}

impl Lesson {
    /// Returns `true` if the lesson has nothing to solve.
    ///
    /// A lesson is theory-only when its content type is `theory` and it has
    /// neither challenge text nor starter code. Whitespace-only counts as
    /// absent.
    #[must_use]
    pub fn is_theory_only(&self) -> bool {
        self.content_type == ContentType::Theory
            && is_blank(self.challenge_text.as_deref())
            && is_blank(self.starter_code.as_deref())
    }

    /// Returns the starter code, or an empty buffer.
    #[must_use]
    pub fn starter_code_or_empty(&self) -> &str {
        self.starter_code.as_deref().unwrap_or_default()
    }

    /// Returns the stored hints as display strings.
    #[must_use]
    pub fn normalized_hints(&self) -> Vec<String> {
        normalize_hints(&self.hints)
    }
}

fn is_blank(text: Option<&str>) -> bool {
    text.map_or(true, |t| t.trim().is_empty())
}

/// Course metadata sent alongside a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseInfo {
    /// Unique course id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// URL slug.
    pub slug: String,
    /// Short description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A reference to a neighbouring lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonRef {
    /// Lesson slug.
    pub slug: String,
    /// Lesson title.
    pub title: String,
}

/// Previous and next lessons within the course.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Navigation {
    /// The lesson before this one.
    #[serde(default)]
    pub prev: Option<LessonRef>,
    /// The lesson after this one.
    #[serde(default)]
    pub next: Option<LessonRef>,
}

/// Everything the lesson page needs to show one lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPage {
    /// The lesson.
    pub lesson: Lesson,
    /// The course it belongs to.
    pub course: CourseInfo,
    /// Neighbouring lessons.
    #[serde(default)]
    pub navigation: Navigation,
}

impl LessonPage {
    /// Returns the page URL of this lesson.
    #[must_use]
    pub fn url(&self) -> String {
        lesson_url(&self.course.slug, &self.lesson.slug)
    }
}

/// A course and its lessons, as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    /// Unique course id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// URL slug.
    pub slug: String,
    /// Short description.
    #[serde(default)]
    pub description: Option<String>,
    /// Lessons, ordered by [`Lesson::order`] once loaded.
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

impl Course {
    /// Returns the course metadata without its lessons.
    #[must_use]
    pub fn info(&self) -> CourseInfo {
        CourseInfo {
            id: self.id.clone(),
            title: self.title.clone(),
            slug: self.slug.clone(),
            description: self.description.clone(),
        }
    }
}

/// The lesson catalog served by the local lesson server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonCatalog {
    /// All courses.
    #[serde(default)]
    pub courses: Vec<Course>,
}

impl LessonCatalog {
    /// Loads a catalog from a JSON file.
    ///
    /// Validates that the file exists, is at most 1MB, is UTF-8 and holds a
    /// consistent catalog. Lessons are sorted by their `order` field.
    ///
    /// # Errors
    ///
    /// Returns `KodiError::CatalogNotFound`, `CatalogTooLarge`,
    /// `CatalogEncodingError` or `CatalogInvalid` accordingly.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let metadata = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KodiError::catalog_not_found(path)
            } else {
                KodiError::Io(e)
            }
        })?;

        let file_size = metadata.len();
        if file_size > MAX_CATALOG_SIZE {
            return Err(KodiError::catalog_too_large(path, file_size / 1024));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::InvalidData {
                KodiError::catalog_encoding(path)
            } else {
                KodiError::Io(e)
            }
        })?;

        let catalog = Self::from_json(&content)
            .map_err(|message| KodiError::catalog_invalid(path, message))?;

        tracing::info!(
            path = %path.display(),
            courses = catalog.courses.len(),
            lessons = catalog.lesson_count(),
            "Loaded lesson catalog"
        );
        Ok(catalog)
    }

    /// Parses and validates a catalog from JSON text.
    ///
    /// Returns a description of the first problem found.
    pub fn from_json(json: &str) -> std::result::Result<Self, String> {
        let mut catalog: Self = serde_json::from_str(json).map_err(|e| e.to_string())?;
        catalog.validate()?;
        for course in &mut catalog.courses {
            course.lessons.sort_by_key(|lesson| lesson.order);
        }
        Ok(catalog)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let mut lesson_ids = std::collections::HashSet::new();
        let mut course_slugs = std::collections::HashSet::new();

        for course in &self.courses {
            if !is_valid_slug(&course.slug) {
                return Err(format!("course slug '{}' is not a valid slug", course.slug));
            }
            if !course_slugs.insert(course.slug.as_str()) {
                return Err(format!("duplicate course slug '{}'", course.slug));
            }

            let mut lesson_slugs = std::collections::HashSet::new();
            for lesson in &course.lessons {
                if !is_valid_slug(&lesson.slug) {
                    return Err(format!(
                        "lesson slug '{}' in course '{}' is not a valid slug",
                        lesson.slug, course.slug
                    ));
                }
                if !lesson_slugs.insert(lesson.slug.as_str()) {
                    return Err(format!(
                        "duplicate lesson slug '{}' in course '{}'",
                        lesson.slug, course.slug
                    ));
                }
                if !lesson_ids.insert(lesson.id.as_str()) {
                    return Err(format!("duplicate lesson id '{}'", lesson.id));
                }
                for test in &lesson.tests {
                    if let Some(TestCheck::Regex { value }) = &test.check {
                        if let Err(e) = Regex::new(value) {
                            return Err(format!(
                                "test '{}' of lesson '{}' has an invalid pattern: {e}",
                                test.name, lesson.id
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns the total number of lessons.
    #[must_use]
    pub fn lesson_count(&self) -> usize {
        self.courses.iter().map(|c| c.lessons.len()).sum()
    }

    /// Finds a lesson by course and lesson slug, with its navigation.
    ///
    /// # Errors
    ///
    /// Returns `KodiError::LessonNotFound` if no lesson matches.
    pub fn page(&self, course_slug: &str, lesson_slug: &str) -> Result<LessonPage> {
        let not_found = || KodiError::lesson_not_found(course_slug, lesson_slug);

        let course = self
            .courses
            .iter()
            .find(|c| c.slug == course_slug)
            .ok_or_else(not_found)?;
        let index = course
            .lessons
            .iter()
            .position(|l| l.slug == lesson_slug)
            .ok_or_else(not_found)?;

        let to_ref = |lesson: &Lesson| LessonRef {
            slug: lesson.slug.clone(),
            title: lesson.title.clone(),
        };
        let navigation = Navigation {
            prev: index
                .checked_sub(1)
                .and_then(|i| course.lessons.get(i))
                .map(to_ref),
            next: course.lessons.get(index + 1).map(to_ref),
        };

        Ok(LessonPage {
            lesson: course.lessons[index].clone(),
            course: course.info(),
            navigation,
        })
    }

    /// Finds a lesson by id.
    ///
    /// # Errors
    ///
    /// Returns `KodiError::LessonIdNotFound` if no lesson has the id.
    pub fn lesson_by_id(&self, lesson_id: &str) -> Result<&Lesson> {
        self.courses
            .iter()
            .flat_map(|c| &c.lessons)
            .find(|l| l.id == lesson_id)
            .ok_or_else(|| KodiError::lesson_id_not_found(lesson_id))
    }
}

fn is_valid_slug(slug: &str) -> bool {
    SLUG_RE.as_ref().map_or(!slug.is_empty(), |re| re.is_match(slug))
}
