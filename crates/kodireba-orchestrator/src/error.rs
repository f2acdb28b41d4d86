//! Error types for the Kodireba lesson orchestrator.
//!
//! This module defines the error hierarchy for configuration loading, the
//! lesson catalog, network calls to the lesson API, submission handling and
//! local storage. Every error carries an actionable suggestion for the
//! developer log and a short Georgian notification for the learner.

use std::path::PathBuf;

/// A specialized `Result` type for Kodireba orchestrator operations.
pub type Result<T> = std::result::Result<T, KodiError>;

/// Errors that can occur while running a lesson page.
///
/// Learner code failures are never represented here: they surface as console
/// lines or failing test results, not as host errors.
#[derive(Debug, thiserror::Error)]
pub enum KodiError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your kodireba.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Lesson Catalog Errors
    // ========================================================================
    /// Lesson catalog file was not found.
    #[error("Lesson catalog not found: '{path}'\n\nSuggestion: Check the 'server.catalog' field in kodireba.json or pass --catalog")]
    CatalogNotFound {
        /// Path where the catalog was expected.
        path: PathBuf,
    },

    /// Lesson catalog exceeds the 1MB size limit.
    #[error("Lesson catalog exceeds size limit (1024KB): '{path}' is {size_kb}KB\n\nSuggestion: Split the catalog into several files")]
    CatalogTooLarge {
        /// Path to the oversized catalog.
        path: PathBuf,
        /// Actual size in kilobytes.
        size_kb: u64,
    },

    /// Lesson catalog contains non-UTF-8 content.
    #[error("Lesson catalog has invalid encoding: '{path}'\n\nSuggestion: Convert the file to UTF-8 encoding")]
    CatalogEncodingError {
        /// Path to the catalog with encoding issues.
        path: PathBuf,
    },

    /// Lesson catalog is not valid JSON or breaks a catalog rule.
    #[error("Invalid lesson catalog '{path}': {message}\n\nSuggestion: Fix the catalog entry named in the message")]
    CatalogInvalid {
        /// Path to the catalog file.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    // ========================================================================
    // Lesson Lookup Errors
    // ========================================================================
    /// No lesson matches the requested course and lesson slugs.
    #[error("Lesson not found: '{course_slug}/{lesson_slug}'\n\nSuggestion: Check the lesson URL or the catalog contents")]
    LessonNotFound {
        /// Course slug from the request.
        course_slug: String,
        /// Lesson slug from the request.
        lesson_slug: String,
    },

    /// No lesson has the requested id.
    #[error("Lesson not found: id '{lesson_id}'\n\nSuggestion: Reload the lesson page; the lesson may have been removed")]
    LessonIdNotFound {
        /// The unknown lesson id.
        lesson_id: String,
    },

    // ========================================================================
    // Network Errors
    // ========================================================================
    /// The lesson API could not be reached.
    #[error("Network error: {message}\n\nSuggestion: Check that the lesson server is running at the configured apiBaseUrl")]
    Network {
        /// Description of the failure.
        message: String,
    },

    /// The lesson API did not answer in time.
    #[error("Request timed out after {timeout_secs}s\n\nSuggestion: Retry, or raise requestTimeoutSecs in kodireba.json")]
    RequestTimeout {
        /// The timeout that elapsed.
        timeout_secs: u64,
    },

    /// The lesson API answered with an error status.
    #[error("Lesson API returned {status}: {message}\n\nSuggestion: Check the server log for details")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body, if any.
        message: String,
    },

    // ========================================================================
    // Lesson Page Errors
    // ========================================================================
    /// A submission is already being graded.
    #[error("A submission is already in flight\n\nSuggestion: Wait for the current verdict before submitting again")]
    SubmissionInFlight,

    /// No lesson is loaded on the page.
    #[error("No lesson is loaded\n\nSuggestion: Open a lesson before running, submitting or asking for help")]
    NoLessonLoaded,

    /// Explanation requested without an error line in the console.
    #[error("Nothing to explain: the console has no error lines\n\nSuggestion: Run the code first; explanations are offered for errors only")]
    NothingToExplain,

    // ========================================================================
    // Storage Errors
    // ========================================================================
    /// Local storage file contains malformed JSON.
    #[error("Corrupted storage file '{path}': {message}\n\nSuggestion: Remove the storage file to start fresh")]
    StorageCorrupted {
        /// Path to the corrupted storage file.
        path: PathBuf,
        /// Description of the corruption.
        message: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KodiError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `CatalogNotFound` error.
    #[must_use]
    pub fn catalog_not_found(path: impl Into<PathBuf>) -> Self {
        Self::CatalogNotFound { path: path.into() }
    }

    /// Creates a new `CatalogTooLarge` error.
    #[must_use]
    pub fn catalog_too_large(path: impl Into<PathBuf>, size_kb: u64) -> Self {
        Self::CatalogTooLarge {
            path: path.into(),
            size_kb,
        }
    }

    /// Creates a new `CatalogEncodingError`.
    #[must_use]
    pub fn catalog_encoding(path: impl Into<PathBuf>) -> Self {
        Self::CatalogEncodingError { path: path.into() }
    }

    /// Creates a new `CatalogInvalid` error.
    #[must_use]
    pub fn catalog_invalid(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CatalogInvalid {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `LessonNotFound` error.
    #[must_use]
    pub fn lesson_not_found(course_slug: impl Into<String>, lesson_slug: impl Into<String>) -> Self {
        Self::LessonNotFound {
            course_slug: course_slug.into(),
            lesson_slug: lesson_slug.into(),
        }
    }

    /// Creates a new `LessonIdNotFound` error.
    #[must_use]
    pub fn lesson_id_not_found(lesson_id: impl Into<String>) -> Self {
        Self::LessonIdNotFound {
            lesson_id: lesson_id.into(),
        }
    }

    /// Creates a new `Network` error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a new `Api` error.
    #[must_use]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Creates a new `StorageCorrupted` error.
    #[must_use]
    pub fn storage_corrupted(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StorageCorrupted {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this error is transient and the action may be retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::RequestTimeout { .. } | Self::SubmissionInFlight => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this error prevents the tool from starting at all.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. }
                | Self::ConfigValidationError { .. }
                | Self::CatalogNotFound { .. }
                | Self::CatalogTooLarge { .. }
                | Self::CatalogEncodingError { .. }
                | Self::CatalogInvalid { .. }
        )
    }

    /// Returns the short Georgian notification shown to the learner.
    #[must_use]
    pub const fn toast_message(&self) -> &'static str {
        match self {
            Self::Network { .. } => "სერვერთან დაკავშირება ვერ მოხერხდა",
            Self::RequestTimeout { .. } => "სერვერი დიდხანს არ პასუხობს, სცადე თავიდან",
            Self::Api { status, .. } if *status >= 500 => "სერვერის შეცდომა, სცადე მოგვიანებით",
            Self::LessonNotFound { .. } | Self::LessonIdNotFound { .. } => {
                "გაკვეთილი ვერ მოიძებნა"
            }
            Self::SubmissionInFlight => "კოდი უკვე მოწმდება",
            Self::NoLessonLoaded => "გაკვეთილი ჯერ არ ჩატვირთულა",
            Self::NothingToExplain => "ასახსნელი შეცდომა კონსოლში არ არის",
            _ => "დაფიქსირდა შეცდომა",
        }
    }
}
