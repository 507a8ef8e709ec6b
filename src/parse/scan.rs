//! Brace and environment scanner.
//!
//! LaTeX arguments nest (`{\True $\frac{1}{2}$}`), so regexes cannot find
//! where an argument ends. Everything in [`crate::parse`] that needs a
//! command argument or an environment body goes through the small explicit
//! scanner here: a byte walk with a depth counter that skips escaped
//! characters (`\{`, `\}`, `\\`).
//!
//! All offsets are byte offsets. The scanner only ever stops on ASCII bytes,
//! so every returned offset is a valid `char` boundary.

use std::ops::Range;

/// A balanced `{…}` group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Offset of the opening `{`.
    pub start: usize,
    /// Interior, braces excluded.
    pub inner: Range<usize>,
    /// Offset just past the closing `}`.
    pub end: usize,
}

/// A `\begin{name}…\end{name}` environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    /// Offset of `\begin`.
    pub start: usize,
    /// Everything between `\begin{name}` and `\end{name}`.
    pub body: Range<usize>,
    /// Offset just past `\end{name}`.
    pub end: usize,
}

impl Environment {
    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Offset of the next `\name` at or after `from`.
///
/// `\choice` does not match `\choiceTF`: the command name must not be
/// followed by another ASCII letter.
pub fn find_command(text: &str, name: &str, from: usize) -> Option<usize> {
    let needle = format!("\\{name}");
    let mut pos = from;
    while pos <= text.len() {
        let found = pos + text.get(pos..)?.find(&needle)?;
        let after = found + needle.len();
        let continues = text
            .as_bytes()
            .get(after)
            .is_some_and(|b| b.is_ascii_alphabetic());
        if !continues {
            return Some(found);
        }
        pos = after;
    }
    None
}

/// Offset just past any whitespace starting at `pos`.
pub fn skip_whitespace(text: &str, pos: usize) -> usize {
    let bytes = text.as_bytes();
    let mut i = pos;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Offset just past an optional `[…]` argument at `pos` (whitespace allowed).
pub fn skip_optional_argument(text: &str, pos: usize) -> usize {
    let i = skip_whitespace(text, pos);
    if text.as_bytes().get(i) != Some(&b'[') {
        return pos;
    }
    match text[i..].find(']') {
        Some(close) => i + close + 1,
        None => pos,
    }
}

/// The balanced group whose `{` sits exactly at `open`.
///
/// Returns `None` if `open` is not a `{` or the group never closes.
pub fn balanced_group(text: &str, open: usize) -> Option<Group> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(Group {
                        start: open,
                        inner: open + 1..i,
                        end: i + 1,
                    });
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// The group starting at the first non-whitespace byte at or after `pos`.
pub fn argument_at(text: &str, pos: usize) -> Option<Group> {
    balanced_group(text, skip_whitespace(text, pos))
}

/// The first `\name{…}` in `text`: command offset and its argument.
///
/// Only the first occurrence of the command is considered; a leading
/// `[…]` option is skipped. If it carries no braced argument the result is
/// `None`.
pub fn command_argument(text: &str, name: &str) -> Option<(usize, Group)> {
    let at = find_command(text, name, 0)?;
    let group = argument_at(text, skip_optional_argument(text, at + name.len() + 1))?;
    Some((at, group))
}

/// The first `name` environment starting at or after `from`.
///
/// Environments of the same name do not nest: the body ends at the first
/// `\end{name}` after the opening. An unterminated environment yields `None`.
pub fn find_environment(text: &str, name: &str, from: usize) -> Option<Environment> {
    let begin = format!("\\begin{{{name}}}");
    let end = format!("\\end{{{name}}}");
    let start = from + text.get(from..)?.find(&begin)?;
    let body_start = start + begin.len();
    let body_end = body_start + text[body_start..].find(&end)?;
    Some(Environment {
        start,
        body: body_start..body_end,
        end: body_end + end.len(),
    })
}

/// Every `name` environment in source order.
pub fn environments<'a>(text: &'a str, name: &'a str) -> impl Iterator<Item = Environment> + 'a {
    let mut from = 0;
    std::iter::from_fn(move || {
        let env = find_environment(text, name, from)?;
        from = env.end;
        Some(env)
    })
}

/// Interiors of the top-level balanced groups in `span`, in order.
///
/// Text between groups is ignored, stray `}` are skipped, and an
/// unterminated trailing group ends the scan. Depth is unbounded.
pub fn top_level_groups(span: &str) -> Vec<&str> {
    let bytes = span.as_bytes();
    let mut groups = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'{' => match balanced_group(span, i) {
                Some(group) => {
                    groups.push(&span[group.inner.clone()]);
                    i = group.end;
                }
                None => break,
            },
            _ => i += 1,
        }
    }
    groups
}

/// `text` with the given byte ranges cut out.
///
/// Ranges may arrive in any order and may overlap.
pub fn remove_ranges(text: &str, mut ranges: Vec<Range<usize>>) -> String {
    ranges.sort_by_key(|r| r.start);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for r in ranges {
        if r.start > cursor {
            out.push_str(&text[cursor..r.start]);
        }
        cursor = cursor.max(r.end);
    }
    if cursor < text.len() {
        out.push_str(&text[cursor..]);
    }
    out
}
