//! Kodireba Markdown Rendering
//!
//! Converts the pseudo-Markdown used in lesson theory and challenge text into
//! a safe, styled HTML fragment. Lesson authors routinely write about tags
//! (`<h1>`, `<script>`) in prose, so every raw angle bracket outside a code
//! fence is escaped before the constrained set of formatting rules is applied.
//!
//! # Pipeline
//!
//! 1. Fenced code blocks are lifted out and replaced with opaque placeholders.
//! 2. The remaining text is HTML-escaped.
//! 3. Inline and line rules run in a fixed order (emphasis, inline code,
//!    images, links, headings, blockquotes, checkboxes, numbered steps,
//!    bullet items), then bullet runs are wrapped in a single list.
//! 4. Lines are reassembled into block elements and paragraphs.
//! 5. Placeholders are swapped back for the rendered code blocks.
//!
//! The renderer is single-pass: it is meant for stored lesson source, not for
//! its own output.
//!
//! # Example
//!
//! ```rust
//! use kodireba_markdown::render_markdown;
//!
//! let html = render_markdown("# სათაური\n\nUse the `<h1>` tag.").unwrap_or_default();
//! assert!(html.contains("<h1 class=\"md-h1\">სათაური</h1>"));
//! assert!(html.contains("&lt;h1&gt;"));
//!
//! // Empty input renders nothing at all.
//! assert!(render_markdown("   ").is_none());
//! ```

mod renderer;

pub use renderer::MarkdownRenderer;

/// Renders lesson markdown into an HTML fragment.
///
/// Returns `None` for empty or whitespace-only input so callers can tell
/// "nothing to show" apart from a rendered, empty-looking fragment.
#[must_use]
pub fn render_markdown(source: &str) -> Option<String> {
    MarkdownRenderer::new(source).render()
}

/// Renders optional lesson markdown, treating `None` like empty input.
#[must_use]
pub fn render_optional(source: Option<&str>) -> Option<String> {
    source.and_then(render_markdown)
}

/// Escapes text for literal display inside HTML element content or a
/// double-quoted attribute value.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
