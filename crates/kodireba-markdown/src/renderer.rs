//! The line-oriented markdown renderer behind [`crate::render_markdown`].

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::escape_html;

/// Delimiter wrapped around code block placeholder indices.
///
/// The character is stripped from the source before rendering, so a learner
/// cannot forge a placeholder.
const PLACEHOLDER_MARK: char = '\u{FFFC}';

/// Line prefixes that start a block element and therefore end a paragraph.
const BLOCK_PREFIXES: &[&str] = &[
    "<h1", "<h2", "<h3", "<ul", "</ul", "<li", "<div", "<blockquote", "<pre",
];

/// URL schemes that are replaced with `#` in links and images.
const BLOCKED_SCHEMES: &[&str] = &["javascript", "vbscript", "data"];

static FENCE_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)```([\w+-]*)[ \t]*\n(.*?)```").ok());

static IMAGE_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)\s]+)\)").ok());

/// Tags produced by the inline rules; the source itself is escaped.
static TAG_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"<[^>]*>").ok());

static LINK_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").ok());

/// Emphasis and inline code, applied before images and links.
static INLINE_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    compile_rules(&[
        (r"\*\*\*(.+?)\*\*\*", "<strong><em>${1}</em></strong>"),
        (r"\*\*(.+?)\*\*", "<strong>${1}</strong>"),
        (r"\*([^\s*][^*\n]*?)\*", "<em>${1}</em>"),
        (r"`([^`\n]+)`", r#"<code class="md-inline-code">${1}</code>"#),
    ])
});

/// Whole-line rules, applied after images and links.
static LINE_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    compile_rules(&[
        (r"(?m)^### (.+)$", r#"<h3 class="md-h3">${1}</h3>"#),
        (r"(?m)^## (.+)$", r#"<h2 class="md-h2">${1}</h2>"#),
        (r"(?m)^# (.+)$", r#"<h1 class="md-h1">${1}</h1>"#),
        (
            r"(?m)^&gt; ?(.+)$",
            r#"<blockquote class="md-quote">${1}</blockquote>"#,
        ),
        (
            r"(?m)^[-*] \[ \] (.+)$",
            r#"<div class="md-check"><input type="checkbox" disabled> <span>${1}</span></div>"#,
        ),
        (
            r"(?m)^[-*] \[[xX]\] (.+)$",
            r#"<div class="md-check"><input type="checkbox" checked disabled> <span>${1}</span></div>"#,
        ),
        (
            r"(?m)^(\d+)\. (.+)$",
            r#"<div class="md-step"><span class="md-step-num">${1}</span><span>${2}</span></div>"#,
        ),
        (r"(?m)^[-*] (.+)$", "<li>${1}</li>"),
    ])
});

fn compile_rules(rules: &[(&str, &'static str)]) -> Vec<(Regex, &'static str)> {
    rules
        .iter()
        .filter_map(|(pattern, replacement)| {
            Regex::new(pattern).ok().map(|re| (re, *replacement))
        })
        .collect()
}

/// Renders one piece of lesson markdown.
///
/// A renderer is cheap to construct and holds only a borrow of the source.
pub struct MarkdownRenderer<'a> {
    source: &'a str,
}

impl<'a> MarkdownRenderer<'a> {
    /// Creates a renderer over the given markdown source.
    #[must_use]
    pub const fn new(source: &'a str) -> Self {
        Self { source }
    }

    /// Renders the source into an HTML fragment.
    ///
    /// Returns `None` when the source is empty or whitespace-only.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        let source: String = self
            .source
            .replace("\r\n", "\n")
            .chars()
            .filter(|c| *c != PLACEHOLDER_MARK)
            .collect();
        if source.trim().is_empty() {
            return None;
        }

        let (text, code_blocks) = extract_code_blocks(&source);
        let text = apply_inline(&escape_html(&text));
        let text = wrap_list_runs(&text);
        let mut html = assemble_blocks(&text);

        for (index, block) in code_blocks.iter().enumerate() {
            html = html.replace(&placeholder(index), block);
        }

        Some(html)
    }
}

fn placeholder(index: usize) -> String {
    format!("{PLACEHOLDER_MARK}{index}{PLACEHOLDER_MARK}")
}

/// Lifts fenced code blocks out of the source.
///
/// Each block is rendered immediately and replaced by a placeholder on a
/// line of its own. Unclosed fences do not match and stay in the text.
fn extract_code_blocks(source: &str) -> (String, Vec<String>) {
    let Some(re) = FENCE_RE.as_ref() else {
        return (source.to_string(), Vec::new());
    };

    let mut blocks = Vec::new();
    let text = re.replace_all(source, |caps: &Captures| {
        let lang = caps.get(1).map_or("", |m| m.as_str());
        let code = caps.get(2).map_or("", |m| m.as_str()).trim_end_matches('\n');
        let code_tag = if lang.is_empty() {
            "<code>".to_string()
        } else {
            format!(r#"<code class="language-{}">"#, escape_html(lang))
        };
        blocks.push(format!(
            r#"<pre class="md-code">{code_tag}{}</code></pre>"#,
            escape_html(code)
        ));
        format!("\n{}\n", placeholder(blocks.len() - 1))
    });

    (text.into_owned(), blocks)
}

/// Applies inline and whole-line substitutions in their fixed order.
fn apply_inline(escaped: &str) -> String {
    let mut text = escaped.to_string();

    for (re, replacement) in INLINE_RULES.iter() {
        text = re.replace_all(&text, *replacement).into_owned();
    }

    if let Some(re) = IMAGE_RE.as_ref() {
        text = re
            .replace_all(&text, |caps: &Captures| {
                format!(
                    r#"<img src="{}" alt="{}" class="md-image" loading="lazy">"#,
                    sanitize_url(&caps[2], true),
                    plain_text(&caps[1])
                )
            })
            .into_owned();
    }

    if let Some(re) = LINK_RE.as_ref() {
        text = re
            .replace_all(&text, |caps: &Captures| {
                format!(
                    r#"<a href="{}" target="_blank" rel="noopener noreferrer" class="md-link">{}</a>"#,
                    sanitize_url(&caps[2], false),
                    &caps[1]
                )
            })
            .into_owned();
    }

    for (re, replacement) in LINE_RULES.iter() {
        text = re.replace_all(&text, *replacement).into_owned();
    }

    text
}

/// Drops inline markup so the text fits in an attribute value.
fn plain_text(html: &str) -> String {
    TAG_RE
        .as_ref()
        .map_or_else(|| html.to_string(), |re| re.replace_all(html, "").into_owned())
}

/// Neutralises script-capable URLs. The input is already HTML-escaped.
///
/// `data:image/...` is kept for images only.
fn sanitize_url(url: &str, is_image: bool) -> String {
    let Some((scheme, rest)) = url.split_once(':') else {
        return url.to_string();
    };
    if scheme.contains(['/', '?', '#']) {
        return url.to_string();
    }

    let scheme: String = scheme
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    if !BLOCKED_SCHEMES.contains(&scheme.as_str()) {
        return url.to_string();
    }
    if is_image && scheme == "data" && rest.to_ascii_lowercase().starts_with("image/") {
        return url.to_string();
    }
    "#".to_string()
}

/// Wraps each run of consecutive `<li>` lines in a single list.
fn wrap_list_runs(text: &str) -> String {
    let mut lines = Vec::new();
    let mut in_list = false;

    for line in text.lines() {
        let is_item = line.starts_with("<li>");
        if is_item && !in_list {
            lines.push(r#"<ul class="md-list">"#);
            in_list = true;
        } else if !is_item && in_list {
            lines.push("</ul>");
            in_list = false;
        }
        lines.push(line);
    }
    if in_list {
        lines.push("</ul>");
    }

    lines.join("\n")
}

/// Groups lines into block elements and paragraphs.
fn assemble_blocks(text: &str) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();

    let flush = |paragraph: &mut Vec<&str>, blocks: &mut Vec<String>| {
        if !paragraph.is_empty() {
            blocks.push(format!(r#"<p class="md-p">{}</p>"#, paragraph.join(" ")));
            paragraph.clear();
        }
    };

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            flush(&mut paragraph, &mut blocks);
        } else if is_block_line(trimmed) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(trimmed.to_string());
        } else {
            paragraph.push(trimmed);
        }
    }
    flush(&mut paragraph, &mut blocks);

    blocks.join("\n")
}

fn is_block_line(line: &str) -> bool {
    line.starts_with(PLACEHOLDER_MARK) || BLOCK_PREFIXES.iter().any(|p| line.starts_with(p))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn render(source: &str) -> String {
        MarkdownRenderer::new(source).render().unwrap()
    }

    #[test]
    fn test_empty_and_whitespace_render_nothing() {
        assert!(MarkdownRenderer::new("").render().is_none());
        assert!(MarkdownRenderer::new("  \n\t\n ").render().is_none());
        assert!(MarkdownRenderer::new("\u{FFFC}").render().is_none());
    }

    #[test]
    fn test_heading_and_paragraph() {
        let html = render("# Title\n\nSome **bold** text\nmore");
        insta::assert_snapshot!(html, @r#"
        <h1 class="md-h1">Title</h1>
        <p class="md-p">Some <strong>bold</strong> text more</p>
        "#);
    }

    #[test]
    fn test_heading_levels() {
        let html = render("# One\n## Two\n### Three");
        assert!(html.contains(r#"<h1 class="md-h1">One</h1>"#));
        assert!(html.contains(r#"<h2 class="md-h2">Two</h2>"#));
        assert!(html.contains(r#"<h3 class="md-h3">Three</h3>"#));
    }

    #[test]
    fn test_raw_tags_in_prose_are_escaped() {
        let html = render("Use the <script> tag and <h1>heading</h1> carefully");
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("&lt;h1&gt;heading&lt;/h1&gt;"));
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<h1>"));
    }

    #[test]
    fn test_code_fence_is_escaped_and_tagged() {
        let html = render("Intro\n\n```html\n<h1>Hi</h1>\n```\n\nAfter");
        insta::assert_snapshot!(html, @r#"
        <p class="md-p">Intro</p>
        <pre class="md-code"><code class="language-html">&lt;h1&gt;Hi&lt;/h1&gt;</code></pre>
        <p class="md-p">After</p>
        "#);
    }

    #[test]
    fn test_code_fence_content_is_not_formatted() {
        let html = render("```\nlet x = a * b * c;\n# not a heading\n```");
        assert!(html.contains("let x = a * b * c;\n# not a heading"));
        assert!(!html.contains("<em>"));
        assert!(!html.contains("<h1"));
    }

    #[test]
    fn test_unclosed_fence_stays_text() {
        let html = render("```js\nalert('<b>')");
        assert!(!html.contains("<pre"));
        assert!(html.contains("```js"));
        assert!(html.contains("&lt;b&gt;"));
    }

    #[test]
    fn test_emphasis_variants() {
        let html = render("***both*** **bold** *italic*");
        assert!(html.contains("<strong><em>both</em></strong>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<em>italic</em>"));
    }

    #[test]
    fn test_inline_code_span() {
        let html = render("Call `console.log(<x>)` now");
        assert!(html.contains(r#"<code class="md-inline-code">console.log(&lt;x&gt;)</code>"#));
    }

    #[test]
    fn test_list_items_wrapped_in_single_list() {
        let html = render("Items:\n\n- one\n- two\n* three\n\nDone");
        insta::assert_snapshot!(html, @r#"
        <p class="md-p">Items:</p>
        <ul class="md-list">
        <li>one</li>
        <li>two</li>
        <li>three</li>
        </ul>
        <p class="md-p">Done</p>
        "#);
    }

    #[test]
    fn test_separate_list_runs_get_separate_lists() {
        let html = render("- a\n\n- b");
        assert_eq!(html.matches("<ul").count(), 2);
    }

    #[test]
    fn test_checkbox_items() {
        let html = render("- [ ] todo\n- [x] done");
        assert!(html.contains(
            r#"<div class="md-check"><input type="checkbox" disabled> <span>todo</span></div>"#
        ));
        assert!(html.contains(
            r#"<div class="md-check"><input type="checkbox" checked disabled> <span>done</span></div>"#
        ));
        assert!(!html.contains("<li>"));
    }

    #[test]
    fn test_numbered_steps() {
        let html = render("1. გახსენი ფაილი\n2. დაწერე კოდი");
        assert!(html.contains(
            r#"<div class="md-step"><span class="md-step-num">1</span><span>გახსენი ფაილი</span></div>"#
        ));
        assert!(html.contains(r#"<span class="md-step-num">2</span>"#));
    }

    #[test]
    fn test_blockquote() {
        let html = render("> remember this");
        assert_eq!(html, r#"<blockquote class="md-quote">remember this</blockquote>"#);
    }

    #[test]
    fn test_links_and_images() {
        let html = render("See [MDN](https://developer.mozilla.org) ![logo](/img/logo.png)");
        assert!(html.contains(
            r#"<a href="https://developer.mozilla.org" target="_blank" rel="noopener noreferrer" class="md-link">MDN</a>"#
        ));
        assert!(html.contains(r#"<img src="/img/logo.png" alt="logo" class="md-image" loading="lazy">"#));
    }

    #[test]
    fn test_image_alt_drops_inline_markup() {
        let html = render("![`x` and **bold**](a.png)");
        assert!(
            html.contains(r#"<img src="a.png" alt="x and bold" class="md-image" loading="lazy">"#),
            "{html}"
        );
        assert!(!html.contains("alt=\"<"));
    }

    #[test]
    fn test_script_urls_are_neutralised() {
        let html = render("[click](javascript:alert(1)) [v](VBScript:x) [d](data:text/html,x)");
        assert_eq!(html.matches(r##"href="#""##).count(), 3);
        assert!(!html.to_ascii_lowercase().contains("javascript:"));
    }

    #[test]
    fn test_data_images_allowed_only_for_images() {
        let html = render("![dot](data:image/png;base64,AAAA)");
        assert!(html.contains(r#"src="data:image/png;base64,AAAA""#));
    }

    #[test]
    fn test_attribute_breakout_is_escaped() {
        let html = render(r#"[x](https://a.io/"onmouseover="alert(1))"#);
        assert!(!html.contains(r#"" onmouseover"#));
        assert!(html.contains("&quot;"));
    }

    #[test]
    fn test_crlf_is_normalised() {
        let html = render("# A\r\n\r\nb");
        assert_eq!(html, "<h1 class=\"md-h1\">A</h1>\n<p class=\"md-p\">b</p>");
    }

    #[test]
    fn test_forged_placeholder_is_stripped() {
        let html = render("a \u{FFFC}0\u{FFFC} b\n\n```\ncode\n```");
        assert!(html.contains(r#"<p class="md-p">a 0 b</p>"#));
        assert_eq!(html.matches("<pre").count(), 1);
    }

    #[test]
    fn test_sanitize_url_keeps_relative_paths() {
        assert_eq!(sanitize_url("/a:b", false), "/a:b");
        assert_eq!(sanitize_url("page?x=javascript:1", false), "page?x=javascript:1");
        assert_eq!(sanitize_url("mailto:a@b.ge", false), "mailto:a@b.ge");
    }
}
