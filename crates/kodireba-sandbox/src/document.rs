//! Sandbox document assembly.

use tracing::debug;

use crate::loop_guard::{guard_loops, loop_guard_prelude};
use crate::{Language, SandboxOptions};

/// Console interception shim injected into every sandbox document.
///
/// Overrides `console.log`, `console.warn` and `console.error`, and installs a
/// global `onerror` handler. Each call is posted to the parent window as
/// `{type: "console", level, msg}`; uncaught errors also carry `line`.
pub const CONSOLE_SHIM: &str = r#"(function () {
  var format = function (value) {
    if (value !== null && typeof value === "object") {
      try { return JSON.stringify(value); } catch (err) { return String(value); }
    }
    return String(value);
  };
  var send = function (payload) {
    try { parent.postMessage(payload, "*"); } catch (err) {}
  };
  ["log", "warn", "error"].forEach(function (level) {
    var original = console[level];
    console[level] = function () {
      var msg = Array.prototype.map.call(arguments, format).join(" ");
      send({ type: "console", level: level, msg: msg });
      if (original) { original.apply(console, arguments); }
    };
  });
  window.onerror = function (message, source, line) {
    send({ type: "console", level: "error", msg: String(message), line: line });
    return false;
  };
})();"#;

const DOCUMENT_HEAD: &str = "<!DOCTYPE html>\n<html lang=\"ka\">\n<head>\n<meta charset=\"utf-8\">\n";

const CSS_DEMO_BODY: &str = r#"<h1 class="title">სათაური</h1>
<p>ეს გვერდი შენი სტილების სანახავად არის.</p>
<button class="btn">ღილაკი</button>
<div class="box">ყუთი</div>
"#;

/// Builds the preview document for `code` using the default options.
///
/// Never fails and always returns a non-empty document.
#[must_use]
pub fn build_sandbox_document(code: &str, language: Language) -> String {
    build_sandbox_document_with(code, language, &SandboxOptions::default())
}

/// Builds the preview document for `code` with explicit options.
#[must_use]
pub fn build_sandbox_document_with(
    code: &str,
    language: Language,
    options: &SandboxOptions,
) -> String {
    match language {
        Language::JavaScript => javascript_document(code, options),
        Language::Css => css_document(code),
        Language::Html => html_document(code),
    }
}

fn shim_tag() -> String {
    format!("<script>\n{CONSOLE_SHIM}\n</script>\n")
}

fn javascript_document(code: &str, options: &SandboxOptions) -> String {
    let mut body = split_closing_tag(code, "</script");
    let mut prelude = String::new();

    if options.loop_guard {
        let guarded = guard_loops(&body);
        if guarded != body {
            debug!(limit = options.loop_iteration_limit, "Injected loop guard");
        }
        body = guarded;
        prelude = loop_guard_prelude(options.loop_iteration_limit);
    }

    format!(
        "{DOCUMENT_HEAD}{shim}</head>\n<body>\n<script>\n{prelude}try {{\n{body}\n}} catch (e) {{\n  console.error(e && e.name ? e.name + \": \" + e.message : String(e));\n}}\n</script>\n</body>\n</html>\n",
        shim = shim_tag(),
    )
}

fn css_document(code: &str) -> String {
    format!(
        "{DOCUMENT_HEAD}{shim}<style>\n{css}\n</style>\n</head>\n<body>\n{CSS_DEMO_BODY}</body>\n</html>\n",
        shim = shim_tag(),
        css = split_closing_tag(code, "</style"),
    )
}

fn html_document(code: &str) -> String {
    let lower = code.to_ascii_lowercase();

    if let Some(index) = lower.find("</head>") {
        return format!("{}{}{}", &code[..index], shim_tag(), &code[index..]);
    }

    if let Some(start) = lower.find("<body") {
        if let Some(offset) = lower[start..].find('>') {
            let split = start + offset + 1;
            return format!("{}\n{}{}", &code[..split], shim_tag(), &code[split..]);
        }
    }

    format!(
        "{DOCUMENT_HEAD}{shim}</head>\n<body>\n{code}\n</body>\n</html>\n",
        shim = shim_tag(),
    )
}

/// Splits every case-insensitive occurrence of `tag` (such as `</script`)
/// with a backslash so it cannot close the enclosing element.
fn split_closing_tag(code: &str, tag: &str) -> String {
    let lower = code.to_ascii_lowercase();
    let mut out = String::with_capacity(code.len());
    let mut last = 0;

    for (index, _) in lower.match_indices(tag) {
        out.push_str(&code[last..=index]);
        out.push('\\');
        last = index + 1;
    }
    out.push_str(&code[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_guard() -> SandboxOptions {
        SandboxOptions::without_loop_guard()
    }

    #[test]
    fn every_language_gets_the_shim() {
        for language in [Language::Html, Language::Css, Language::JavaScript] {
            let doc = build_sandbox_document("", language);
            assert!(!doc.is_empty());
            assert!(doc.contains(CONSOLE_SHIM), "{language} document lacks shim");
        }
    }

    #[test]
    fn shim_posts_console_messages_to_parent() {
        assert!(CONSOLE_SHIM.contains(r#"type: "console""#));
        assert!(CONSOLE_SHIM.contains(r#"parent.postMessage(payload, "*")"#));
        assert!(CONSOLE_SHIM.contains("JSON.stringify"));
        assert!(CONSOLE_SHIM.contains("window.onerror"));
        assert!(CONSOLE_SHIM.contains("line: line"));
    }

    #[test]
    fn javascript_is_wrapped_in_try_catch() {
        let doc = build_sandbox_document_with("console.log(1);", Language::JavaScript, &no_guard());
        assert!(doc.contains("try {\nconsole.log(1);\n} catch (e) {\n  console.error("));
    }

    #[test]
    fn javascript_closing_script_tag_is_split() {
        let doc = build_sandbox_document_with(
            r#"document.write("</script><b>x</b>");"#,
            Language::JavaScript,
            &no_guard(),
        );
        assert!(doc.contains(r#"document.write("<\/script><b>x</b>");"#));
        assert_eq!(doc.matches("</script>").count(), 2);
    }

    #[test]
    fn javascript_loop_guard_is_injected_by_default() {
        let doc = build_sandbox_document("while (true) { x++; }", Language::JavaScript);
        assert!(doc.contains("__kodiLoopGuard();"));
        assert!(doc.contains("RangeError"));
        assert!(doc.contains("100000"));
    }

    #[test]
    fn javascript_loop_guard_can_be_disabled() {
        let doc = build_sandbox_document_with("while (true) {}", Language::JavaScript, &no_guard());
        assert!(!doc.contains("__kodiLoopGuard"));
    }

    #[test]
    fn css_goes_in_style_over_demo_body() {
        let doc = build_sandbox_document(".btn { color: red; }", Language::Css);
        assert!(doc.contains("<style>\n.btn { color: red; }\n</style>"));
        assert!(doc.contains("<h1 class=\"title\">"));
        assert!(doc.contains("<button class=\"btn\">"));
        assert!(doc.contains("<div class=\"box\">"));
    }

    #[test]
    fn html_shim_spliced_before_head_close() {
        let code = "<html><head><title>T</title></head><body><p>x</p></body></html>";
        let doc = build_sandbox_document(code, Language::Html);
        let shim_at = doc.find(CONSOLE_SHIM).unwrap_or(usize::MAX);
        let head_close = doc.find("</head>").unwrap_or(0);
        assert!(shim_at < head_close);
        assert!(doc.starts_with("<html><head><title>T</title>"));
        assert!(doc.ends_with("<p>x</p></body></html>"));
    }

    #[test]
    fn html_head_match_ignores_case() {
        let doc = build_sandbox_document("<HEAD></HEAD><p>x</p>", Language::Html);
        assert!(doc.starts_with("<HEAD><script>"));
    }

    #[test]
    fn html_shim_spliced_after_body_open() {
        let code = r#"<body class="main"><h1>Hi</h1></body>"#;
        let doc = build_sandbox_document(code, Language::Html);
        assert!(doc.starts_with("<body class=\"main\">\n<script>"));
        assert!(doc.ends_with("<h1>Hi</h1></body>"));
    }

    #[test]
    fn html_fragment_is_wrapped_in_shell() {
        let doc = build_sandbox_document("<h1>გამარჯობა</h1>", Language::Html);
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<body>\n<h1>გამარჯობა</h1>\n</body>"));
    }

    #[test]
    fn html_fragment_document_shape() {
        let doc = build_sandbox_document("<p>x</p>", Language::Html).replace(CONSOLE_SHIM, "SHIM");
        insta::assert_snapshot!(doc, @r#"
        <!DOCTYPE html>
        <html lang="ka">
        <head>
        <meta charset="utf-8">
        <script>
        SHIM
        </script>
        </head>
        <body>
        <p>x</p>
        </body>
        </html>
        "#);
    }

    #[test]
    fn empty_and_hostile_inputs_still_build() {
        for code in ["", "   ", "</script>", "<body", "\u{0}", "`${"] {
            for language in [Language::Html, Language::Css, Language::JavaScript] {
                assert!(!build_sandbox_document(code, language).is_empty());
            }
        }
    }

    #[test]
    fn split_closing_tag_handles_case_and_repeats() {
        assert_eq!(
            split_closing_tag("a</SCRIPT>b</script>", "</script"),
            r"a<\/SCRIPT>b<\/script>"
        );
        assert_eq!(split_closing_tag("plain", "</script"), "plain");
    }
}
