//! Loop guard injection for learner JavaScript.
//!
//! A small scanner walks the source while tracking strings, template
//! literals and comments, and inserts a call to [`LOOP_GUARD_FN`] at the
//! start of every `for`, `while` and `do` body. Unbraced bodies are wrapped
//! in braces, together with any `else` branches of an `if` body. The
//! trailing `while (...)` of a `do` loop is left alone.
//!
//! Regular expression literals are not recognised; a quote or comment
//! marker inside one can make the scanner skip the rest of the line.

/// Name of the guard function called on every loop iteration.
pub const LOOP_GUARD_FN: &str = "__kodiLoopGuard";

/// Script prelude defining the guard with the given iteration budget.
///
/// Exceeding the budget throws a `RangeError`, which the document's
/// `try`/`catch` or `onerror` handler reports as a console error line.
pub(crate) fn loop_guard_prelude(limit: u64) -> String {
    format!(
        "var __kodiLoopBudget = {limit};\nfunction {LOOP_GUARD_FN}() {{\n  if (--__kodiLoopBudget < 0) {{\n    throw new RangeError(\"ციკლმა გადააჭარბა იტერაციების ლიმიტს ({limit})\");\n  }}\n}}\n"
    )
}

/// Returns `code` with a guard call injected into every loop body.
#[must_use]
pub fn guard_loops(code: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    let mut insertions: Vec<(usize, String)> = Vec::new();
    let mut trailing_whiles: Vec<usize> = Vec::new();
    let guard_call = format!("{LOOP_GUARD_FN}();");

    let mut i = 0;
    while i < chars.len() {
        if let Some(end) = skip_literal_or_comment(&chars, i) {
            i = end;
            continue;
        }

        let Some(keyword) = keyword_at(&chars, i) else {
            i += 1;
            continue;
        };
        let after_keyword = i + keyword.len();

        match keyword {
            "for" | "while" => {
                if keyword == "while" && trailing_whiles.contains(&i) {
                    i = after_keyword;
                    continue;
                }
                let open = skip_trivia(&chars, after_keyword);
                if chars.get(open) != Some(&'(') {
                    i = after_keyword;
                    continue;
                }
                let Some(close) = matching_close(&chars, open) else {
                    break;
                };
                let body = skip_trivia(&chars, close + 1);
                guard_body(&chars, body, &guard_call, &mut insertions);
                i = close + 1;
            }
            _ => {
                let body = skip_trivia(&chars, after_keyword);
                // `do` used as a property name or method: `{ do: 1 }`, `{ do() {} }`.
                if matches!(chars.get(body), Some(':' | '(' | ',' | '}' | ')' | '=' | '?')) {
                    i = after_keyword;
                    continue;
                }
                if let Some(body_end) = guard_body(&chars, body, &guard_call, &mut insertions) {
                    let next = skip_trivia(&chars, body_end);
                    if keyword_at(&chars, next) == Some("while") {
                        trailing_whiles.push(next);
                    }
                }
                i = after_keyword;
            }
        }
    }

    if insertions.is_empty() {
        return code.to_string();
    }

    insertions.sort_by_key(|(at, _)| *at);
    let mut out = String::with_capacity(code.len() + insertions.len() * guard_call.len());
    let mut pending = insertions.iter().peekable();
    for (index, ch) in chars.iter().enumerate() {
        while let Some((_, text)) = pending.next_if(|(at, _)| *at == index) {
            out.push_str(text);
        }
        out.push(*ch);
    }
    for (_, text) in pending {
        out.push_str(text);
    }
    out
}

/// Records the insertions for a loop body starting at `body`.
///
/// Returns the index just past the body when its end could be found.
fn guard_body(
    chars: &[char],
    body: usize,
    guard_call: &str,
    insertions: &mut Vec<(usize, String)>,
) -> Option<usize> {
    if body >= chars.len() {
        return None;
    }
    if chars[body] == '{' {
        insertions.push((body + 1, guard_call.to_string()));
        return matching_close(chars, body).map(|close| close + 1);
    }

    let end = statement_span_end(chars, body);
    insertions.push((body, format!("{{{guard_call} ")));
    insertions.push((end, "}".to_string()));
    Some(end)
}

/// If a string, template literal or comment starts at `i`, returns the
/// index just past it.
fn skip_literal_or_comment(chars: &[char], i: usize) -> Option<usize> {
    match chars[i] {
        quote @ ('"' | '\'' | '`') => {
            let mut j = i + 1;
            while j < chars.len() {
                match chars[j] {
                    '\\' => j += 2,
                    c if c == quote => return Some(j + 1),
                    '\n' if quote != '`' => return Some(j),
                    _ => j += 1,
                }
            }
            Some(chars.len())
        }
        '/' if chars.get(i + 1) == Some(&'/') => {
            let mut j = i + 2;
            while j < chars.len() && chars[j] != '\n' {
                j += 1;
            }
            Some(j)
        }
        '/' if chars.get(i + 1) == Some(&'*') => {
            let mut j = i + 2;
            while j + 1 < chars.len() && !(chars[j] == '*' && chars[j + 1] == '/') {
                j += 1;
            }
            Some((j + 2).min(chars.len()))
        }
        _ => None,
    }
}

const fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Returns the loop keyword starting at `i`, if any, on identifier
/// boundaries. Property accesses such as `obj.for` are ignored.
fn keyword_at(chars: &[char], i: usize) -> Option<&'static str> {
    word_at(chars, i, &["for", "while", "do"])
}

/// Returns whichever of `words` starts at `i` on identifier boundaries.
fn word_at(chars: &[char], i: usize, words: &[&'static str]) -> Option<&'static str> {
    if i >= chars.len() || (i > 0 && (is_ident_char(chars[i - 1]) || chars[i - 1] == '.')) {
        return None;
    }
    words.iter().copied().find(|keyword| {
        let end = i + keyword.len();
        end <= chars.len()
            && keyword.chars().zip(&chars[i..end]).all(|(a, b)| a == *b)
            && chars.get(end).map_or(true, |c| !is_ident_char(*c))
    })
}

/// Skips whitespace and comments.
fn skip_trivia(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() {
        if chars[i].is_whitespace() {
            i += 1;
        } else if chars[i] == '/' && matches!(chars.get(i + 1), Some('/' | '*')) {
            i = skip_literal_or_comment(chars, i).unwrap_or(i + 1);
        } else {
            break;
        }
    }
    i
}

/// Finds the bracket closing the one opened at `open`.
fn matching_close(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        if let Some(end) = skip_literal_or_comment(chars, i) {
            i = end;
            continue;
        }
        match chars[i] {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Finds the end of the statement starting at `start`, following nested
/// `if`/`else` chains and unbraced loop bodies.
fn statement_span_end(chars: &[char], start: usize) -> usize {
    if chars.get(start) == Some(&'{') {
        return matching_close(chars, start).map_or(chars.len(), |close| close + 1);
    }
    let Some(word) = word_at(chars, start, &["if", "for", "while"]) else {
        return statement_end(chars, start);
    };
    let open = skip_trivia(chars, start + word.len());
    if chars.get(open) != Some(&'(') {
        return statement_end(chars, start);
    }
    let Some(close) = matching_close(chars, open) else {
        return chars.len();
    };
    let body_end = statement_span_end(chars, skip_trivia(chars, close + 1));
    if word == "if" {
        let next = skip_trivia(chars, body_end);
        if word_at(chars, next, &["else"]).is_some() {
            return statement_span_end(chars, skip_trivia(chars, next + "else".len()));
        }
    }
    body_end
}

/// Whether a line break at `i` continues the current expression rather than
/// ending the statement.
fn continues_across_newline(chars: &[char], start: usize, i: usize) -> bool {
    let tail: Vec<char> = chars[start..i]
        .iter()
        .rev()
        .filter(|c| !c.is_whitespace())
        .take(2)
        .copied()
        .collect();
    let last = tail.first().copied();
    let second = tail.get(1).copied();
    let postfix = matches!((last, second), (Some('+'), Some('+')) | (Some('-'), Some('-')));
    if !postfix
        && matches!(
            last,
            Some('+' | '-' | '*' | '/' | '%' | '=' | '&' | '|' | '<' | '>' | '?' | ':' | ',' | '.' | '!')
        )
    {
        return true;
    }
    let after = skip_trivia(chars, i);
    matches!(
        chars.get(after),
        Some('.' | '+' | '*' | '/' | '%' | '=' | '&' | '|' | '?' | ':' | ',' | ')' | ']')
    )
}

/// Finds the end of a simple unbraced statement: just past the first `;` at
/// bracket depth zero, or the line break that ends it.
fn statement_end(chars: &[char], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < chars.len() {
        if let Some(end) = skip_literal_or_comment(chars, i) {
            if chars[i] == '/' {
                return i;
            }
            i = end;
            continue;
        }
        match chars[i] {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' if depth == 0 => return i,
            ')' | ']' | '}' => depth -= 1,
            ';' if depth == 0 => return i + 1,
            '\n' if depth == 0 && !continues_across_newline(chars, start, i) => return i,
            _ => {}
        }
        i += 1;
    }
    chars.len()
}
