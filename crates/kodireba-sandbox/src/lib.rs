//! Kodireba Sandbox
//!
//! Builds the self-contained HTML documents that the lesson preview frame
//! loads, and models the frame host itself.
//!
//! Every document carries a console-interception shim that forwards
//! `console.log`, `console.warn`, `console.error` and uncaught errors to the
//! parent window as `{type: "console", level, msg}` messages. The learner's
//! code is embedded according to the lesson [`Language`]:
//!
//! - `javascript`: wrapped in `try`/`catch` so thrown errors become console
//!   error lines, optionally with a loop guard injected into every loop body
//! - `css`: placed in a `<style>` block over a small demo page
//! - `html`: the shim is spliced into the learner's document, or a minimal
//!   shell is wrapped around a fragment
//!
//! Building a document never fails and never returns an empty string.

mod document;
mod loop_guard;
mod preview;

use serde::{Deserialize, Serialize};

pub use document::{build_sandbox_document, build_sandbox_document_with, CONSOLE_SHIM};
pub use loop_guard::{guard_loops, LOOP_GUARD_FN};
pub use preview::{is_runnable, strip_comments, PreviewHost, PreviewRender, SANDBOX_ATTRIBUTE};

/// Default number of loop iterations a single run may perform.
pub const DEFAULT_LOOP_ITERATION_LIMIT: u64 = 100_000;

/// The language a lesson's code is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    /// An HTML document or fragment.
    #[default]
    Html,
    /// A stylesheet previewed over a demo page.
    Css,
    /// A script run inside an empty page.
    JavaScript,
}

impl Language {
    /// Parses a language tag, ignoring case.
    ///
    /// `js` is accepted as an alias for `javascript`. Unknown or empty tags
    /// fall back to [`Language::Html`].
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "javascript" | "js" => Self::JavaScript,
            "css" => Self::Css,
            _ => Self::Html,
        }
    }

    /// Returns the canonical tag for this language.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Css => "css",
            Self::JavaScript => "javascript",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Language {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_tag(s))
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        Ok(s.map_or(Self::Html, |tag| Self::from_tag(&tag)))
    }
}

impl Serialize for Language {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Options that shape the generated sandbox document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxOptions {
    /// Inject an iteration budget into JavaScript loops.
    pub loop_guard: bool,
    /// Iterations allowed per run before the guard throws.
    pub loop_iteration_limit: u64,
}

impl Default for SandboxOptions {
    fn default() -> Self {
        Self {
            loop_guard: true,
            loop_iteration_limit: DEFAULT_LOOP_ITERATION_LIMIT,
        }
    }
}

impl SandboxOptions {
    /// Options with the loop guard switched off.
    #[must_use]
    pub fn without_loop_guard() -> Self {
        Self {
            loop_guard: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn language_parses_case_insensitively() {
        assert_eq!(Language::from_tag("JavaScript"), Language::JavaScript);
        assert_eq!(Language::from_tag("JS"), Language::JavaScript);
        assert_eq!(Language::from_tag(" css "), Language::Css);
        assert_eq!(Language::from_tag("HTML"), Language::Html);
    }

    #[test]
    fn language_unknown_falls_back_to_html() {
        assert_eq!(Language::from_tag("python"), Language::Html);
        assert_eq!(Language::from_tag(""), Language::Html);
        assert_eq!("typescript".parse::<Language>().unwrap(), Language::Html);
    }

    #[test]
    fn language_display() {
        assert_eq!(Language::Html.to_string(), "html");
        assert_eq!(Language::Css.to_string(), "css");
        assert_eq!(Language::JavaScript.to_string(), "javascript");
    }

    #[test]
    fn language_serde_roundtrip_is_lenient() {
        let lang: Language = serde_json::from_str(r#""Js""#).unwrap();
        assert_eq!(lang, Language::JavaScript);
        let lang: Language = serde_json::from_str("null").unwrap();
        assert_eq!(lang, Language::Html);
        assert_eq!(
            serde_json::to_string(&Language::JavaScript).unwrap(),
            r#""javascript""#
        );
    }

    #[test]
    fn sandbox_options_default_enables_guard() {
        let options = SandboxOptions::default();
        assert!(options.loop_guard);
        assert_eq!(options.loop_iteration_limit, 100_000);
        assert!(!SandboxOptions::without_loop_guard().loop_guard);
    }
}
