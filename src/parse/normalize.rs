//! Content normalisation: strip decorative LaTeX while keeping math verbatim.
//!
//! Word has no LaTeX math renderer, and a lossy conversion of `$\frac{a}{b}$`
//! to plain text is worse than the original: whoever finishes the document
//! re-types the formula with Word's equation editor, and for that they need
//! the exact source. So math spans are hidden behind placeholder tokens
//! before any rule runs, and restored byte-identical afterwards.
//!
//! ## Rules
//!
//! 1. Drop `%` comments (before math detection, as TeX does)
//! 2. Stash math: `$…$`, `$$…$$`, `\(…\)`, `\[…\]`
//! 3. Remove list / centering / alignment environment markers, keep content
//! 4. Replace spacing commands and `\\` line breaks with a space
//! 5. Unwrap `\textbf{…}`, `\textit{…}`, `\emph{…}`, `\text{…}`, …
//! 6. `\item` becomes a `•` bullet (or its `[label]`)
//! 7. Collapse whitespace, trim
//!
//! Rules 3–7 repeat until nothing changes, which is what makes
//! [`normalize`] idempotent: its output is already a fixed point.

use super::placeholder::Placeholders;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Upper bound on rule passes. Each pass either shrinks the text or leaves
/// it unchanged, so real input converges in two or three passes.
const MAX_PASSES: usize = 32;

/// Normalise a run of exercise prose. Pure and idempotent.
pub fn normalize(text: &str) -> String {
    let text = strip_comments(text);
    let mut math = Placeholders::for_text(&text);
    let mut current = stash_math(&text, &mut math);

    for _ in 0..MAX_PASSES {
        let next = apply_rules(&current);
        if next == current {
            break;
        }
        current = next;
    }

    math.restore(&current)
}

fn apply_rules(input: &str) -> String {
    let s = remove_environments(input);
    let s = remove_spacing(&s);
    let s = unwrap_commands(&s);
    let s = bullet_items(&s);
    collapse_whitespace(&s)
}

// ── Rule 1: Comments ─────────────────────────────────────────────────────────

static RE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)(^|[^\\])%.*$").unwrap());

pub(crate) fn strip_comments(input: &str) -> String {
    RE_COMMENT.replace_all(input, "${1}").into_owned()
}

// ── Rule 2: Math ─────────────────────────────────────────────────────────────

/// Replace every math span with a placeholder token.
///
/// Unterminated openers are left as plain text.
fn stash_math(text: &str, math: &mut Placeholders) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        let span_end = match bytes[i] {
            b'\\' => match bytes.get(i + 1) {
                Some(b'(') => find_unescaped(text, i + 2, r"\)"),
                Some(b'[') => find_unescaped(text, i + 2, r"\]"),
                _ => {
                    i += 2;
                    continue;
                }
            },
            b'$' if bytes.get(i + 1) == Some(&b'$') => find_unescaped(text, i + 2, "$$"),
            b'$' => find_unescaped(text, i + 1, "$"),
            _ => {
                i += 1;
                continue;
            }
        };

        match span_end {
            Some(end) => {
                out.push_str(&text[copied..i]);
                out.push_str(&math.stash(&text[i..end]));
                copied = end;
                i = end;
            }
            // Unterminated: skip the opener and keep scanning.
            None => i += if bytes[i] == b'\\' || bytes.get(i + 1) == Some(&b'$') { 2 } else { 1 },
        }
    }

    out.push_str(&text[copied..]);
    out
}

/// Offset just past the first `close` at or after `from` that is not part of
/// an escape sequence.
///
/// Backslash-led closers (`\)`, `\]`) are matched at a backslash; any other
/// backslash skips the following byte.
fn find_unescaped(text: &str, from: usize, close: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let closer = close.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if bytes[i..].starts_with(closer) {
            return Some(i + closer.len());
        }
        if bytes[i] == b'\\' {
            i += 2;
        } else {
            i += 1;
        }
    }
    None
}

// ── Rule 3: Structural environments ─────────────────────────────────────────

static RE_ENV_BEGIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\\begin\{(?:itemize|enumerate|description|center|flushleft|flushright)\}(?:\s*\[[^\]]*\])?",
    )
    .unwrap()
});

static RE_MINIPAGE_BEGIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\begin\{minipage\}(?:\s*\[[^\]]*\])*\s*\{[^{}]*\}").unwrap()
});

static RE_ENV_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\\end\{(?:itemize|enumerate|description|center|flushleft|flushright|minipage)\}",
    )
    .unwrap()
});

fn remove_environments(input: &str) -> String {
    let s = RE_ENV_BEGIN.replace_all(input, " ");
    let s = RE_MINIPAGE_BEGIN.replace_all(&s, " ");
    RE_ENV_END.replace_all(&s, " ").into_owned()
}

// ── Rule 4: Spacing ──────────────────────────────────────────────────────────

static RE_SPACE_ARG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\[vh]space\*?\s*\{[^{}]*\}").unwrap());

static RE_SPACE_CMD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\\(?:medskip|bigskip|smallskip|noindent|newline|linebreak|par|hfill|centering|newpage)\b",
    )
    .unwrap()
});

static RE_LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\\\(?:\s*\[[^\]]*\])?").unwrap());

static RE_TILDE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(^|[^\\])~").unwrap());

fn remove_spacing(input: &str) -> String {
    let s = RE_SPACE_ARG.replace_all(input, " ");
    let s = RE_SPACE_CMD.replace_all(&s, " ");
    let s = RE_LINE_BREAK.replace_all(&s, " ");
    RE_TILDE.replace_all(&s, "${1} ").into_owned()
}

// ── Rule 5: Wrapping commands ────────────────────────────────────────────────

static RE_WRAPPER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\\(?:textbf|textit|textrm|textsf|texttt|textnormal|textup|emph|underline|text|mbox)\s*\{([^{}]*)\}",
    )
    .unwrap()
});

/// Innermost wrappers first; nested ones unwrap on the next pass.
fn unwrap_commands(input: &str) -> String {
    RE_WRAPPER.replace_all(input, "${1}").into_owned()
}

// ── Rule 6: List items ───────────────────────────────────────────────────────

static RE_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\item\b(?:\s*\[([^\]]*)\])?").unwrap());

fn bullet_items(input: &str) -> String {
    RE_ITEM
        .replace_all(input, |caps: &Captures<'_>| match caps.get(1) {
            Some(label) => format!(" {}", label.as_str()),
            None => " •".to_string(),
        })
        .into_owned()
}

// ── Rule 7: Whitespace ───────────────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn collapse_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input, " ").trim().to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────
