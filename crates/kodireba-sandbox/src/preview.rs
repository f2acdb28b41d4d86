//! The preview frame host.

use tracing::debug;

use crate::document::build_sandbox_document_with;
use crate::{Language, SandboxOptions};

/// The exact `sandbox` attribute applied to the preview frame.
pub const SANDBOX_ATTRIBUTE: &str = "allow-scripts allow-same-origin allow-forms";

/// Minimum number of significant characters for code to be worth running.
const MIN_SIGNIFICANT_CHARS: usize = 2;

/// One rendered preview generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRender {
    /// Render key of this generation. Higher keys are newer.
    pub key: u64,
    /// Language the document was built for.
    pub language: Language,
    /// The full sandbox document loaded into the frame.
    pub document: String,
}

impl PreviewRender {
    /// Returns the `<iframe>` element that loads this document.
    ///
    /// The document is passed through an escaped `srcdoc` attribute, and the
    /// render key is exposed so a host can tell generations apart.
    #[must_use]
    pub fn frame_markup(&self) -> String {
        format!(
            r#"<iframe class="preview-frame" title="preview" data-render-key="{}" sandbox="{SANDBOX_ATTRIBUTE}" srcdoc="{}"></iframe>"#,
            self.key,
            escape_attribute(&self.document)
        )
    }
}

/// Hosts the lesson preview frame.
///
/// Every [`render`](Self::render) bumps the render key, which forces a full
/// reload of the frame with a clean execution context.
#[derive(Debug, Default)]
pub struct PreviewHost {
    options: SandboxOptions,
    render_key: u64,
    current: Option<PreviewRender>,
}

impl PreviewHost {
    /// Creates a host that builds documents with the given options.
    #[must_use]
    pub fn new(options: SandboxOptions) -> Self {
        Self {
            options,
            render_key: 0,
            current: None,
        }
    }

    /// Returns the key of the most recent render, `0` before the first.
    #[must_use]
    pub const fn render_key(&self) -> u64 {
        self.render_key
    }

    /// Returns the options documents are built with.
    #[must_use]
    pub const fn options(&self) -> &SandboxOptions {
        &self.options
    }

    /// Builds a fresh document for `code` under a new render key.
    pub fn render(&mut self, code: &str, language: Language) -> &PreviewRender {
        self.render_key += 1;
        let document = build_sandbox_document_with(code, language, &self.options);
        debug!(
            key = self.render_key,
            language = %language,
            bytes = document.len(),
            "Rendered preview document"
        );
        self.current.insert(PreviewRender {
            key: self.render_key,
            language,
            document,
        })
    }

    /// Returns the current render, if any.
    #[must_use]
    pub const fn current(&self) -> Option<&PreviewRender> {
        self.current.as_ref()
    }

    /// Returns the frame markup for the current render, if any.
    #[must_use]
    pub fn frame_markup(&self) -> Option<String> {
        self.current.as_ref().map(PreviewRender::frame_markup)
    }

    /// Unloads the frame. The render key keeps counting from where it was.
    pub fn unload(&mut self) {
        self.current = None;
    }
}

/// Returns whether `code` has anything to run.
///
/// Code with fewer than two significant characters once comments and
/// whitespace are removed is treated as empty.
#[must_use]
pub fn is_runnable(code: &str, language: Language) -> bool {
    strip_comments(code, language)
        .chars()
        .filter(|c| !c.is_whitespace())
        .take(MIN_SIGNIFICANT_CHARS)
        .count()
        >= MIN_SIGNIFICANT_CHARS
}

/// Removes the comment forms of `language`: `<!-- -->` for HTML, `/* */`
/// for CSS, and `//` plus `/* */` for JavaScript.
///
/// Unterminated comments run to the end of the input.
#[must_use]
pub fn strip_comments(code: &str, language: Language) -> String {
    let markers: &[(&str, &str)] = match language {
        Language::Html => &[("<!--", "-->")],
        Language::Css => &[("/*", "*/")],
        Language::JavaScript => &[("/*", "*/"), ("//", "\n")],
    };

    let mut out = String::with_capacity(code.len());
    let mut rest = code;
    'scan: while !rest.is_empty() {
        for (open, close) in markers {
            if let Some(after_open) = rest.strip_prefix(open) {
                rest = after_open
                    .find(close)
                    .map_or("", |end| &after_open[end + close.len()..]);
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        if let Some(ch) = chars.next() {
            out.push(ch);
        }
        rest = chars.as_str();
    }
    out
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
