//! `tabular` → [`TableGrid`] conversion.
//!
//! The column count comes from the column specification, not from the rows:
//! exam tables often have ragged rows (a trailing `&` forgotten, a
//! `\multicolumn` header), and the column specification is the only statement of intent.
//! Rows are then padded or truncated so that the grid is always rectangular.

use super::normalize::normalize;
use super::scan::{argument_at, balanced_group, skip_optional_argument};
use crate::model::TableGrid;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Convert one `tabular` environment.
///
/// * `column_spec`: interior of the `{…}` argument after `\begin{tabular}`
/// * `body`: everything up to `\end{tabular}`
pub fn transcode(column_spec: &str, body: &str) -> TableGrid {
    let rows: Vec<Vec<String>> = split_rows(body)
        .into_iter()
        .filter_map(|row| {
            let row = RE_RULE.replace_all(row, " ");
            let row = row.trim();
            if row.is_empty() {
                None
            } else {
                Some(split_cells(row).into_iter().flat_map(expand_cell).collect())
            }
        })
        .collect();

    let mut column_count = column_count(column_spec);
    if column_count == 0 {
        column_count = rows.iter().map(Vec::len).max().unwrap_or(0);
        debug!(
            "Column spec {:?} declares no columns; using widest row ({})",
            column_spec, column_count
        );
    }

    let rows = rows
        .into_iter()
        .map(|mut cells| {
            cells.resize(column_count, String::new());
            cells
        })
        .collect();

    TableGrid { column_count, rows }
}

/// Number of columns declared by a `tabular` column specification.
///
/// Counts `l`, `c`, `r`, `X` and the width-taking `p{…}`, `m{…}`, `b{…}` at
/// brace depth 0, expands `*{n}{…}`, and ignores `|`, `@{…}`, `!{…}`,
/// `>{…}` and `<{…}`.
pub fn column_count(spec: &str) -> usize {
    let bytes = spec.as_bytes();
    let mut count = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'l' | b'c' | b'r' | b'X' => {
                count += 1;
                i += 1;
            }
            b'p' | b'm' | b'b' => {
                count += 1;
                i = skip_group(spec, i + 1);
            }
            b'@' | b'!' | b'>' | b'<' => i = skip_group(spec, i + 1),
            b'*' => {
                let Some(times) = argument_at(spec, i + 1) else {
                    i += 1;
                    continue;
                };
                let Some(repeated) = argument_at(spec, times.end) else {
                    i = times.end;
                    continue;
                };
                let n: usize = spec[times.inner].trim().parse().unwrap_or(0);
                count += n * column_count(&spec[repeated.inner.clone()]);
                i = repeated.end;
            }
            b'{' => i = skip_group(spec, i),
            _ => i += 1,
        }
    }
    count
}

fn skip_group(text: &str, pos: usize) -> usize {
    match argument_at(text, pos) {
        Some(g) => g.end,
        None => pos,
    }
}

// ── Rows and cells ───────────────────────────────────────────────────────────

static RE_RULE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\(?:hline|toprule|midrule|bottomrule)\b|\\(?:cline|hhline|cmidrule)\s*(?:\([^)]*\))?\s*\{[^{}]*\}")
        .unwrap()
});

/// Split on `\\` / `\tabularnewline` at brace depth 0.
fn split_rows(body: &str) -> Vec<&str> {
    const NEWLINE_CMD: &[u8] = b"\\tabularnewline";
    let bytes = body.as_bytes();
    let mut rows = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b'\\' if depth == 0 && bytes.get(i + 1) == Some(&b'\\') => {
                rows.push(&body[start..i]);
                i = skip_optional_argument(body, i + 2);
                start = i;
                continue;
            }
            b'\\' if depth == 0 && bytes[i..].starts_with(NEWLINE_CMD) => {
                rows.push(&body[start..i]);
                i += NEWLINE_CMD.len();
                start = i;
                continue;
            }
            b'\\' => {
                i += 2;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    if start < body.len() {
        rows.push(&body[start..]);
    }
    rows
}

/// Split on unescaped `&` at brace depth 0.
fn split_cells(row: &str) -> Vec<&str> {
    let bytes = row.as_bytes();
    let mut cells = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b'&' if depth == 0 => {
                cells.push(&row[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    cells.push(&row[start..]);
    cells
}

/// Normalise one cell; `\multicolumn{n}{…}{text}` yields `text` plus `n-1`
/// empty cells, `\multirow{n}{…}{text}` yields `text`.
fn expand_cell(cell: &str) -> Vec<String> {
    let trimmed = cell.trim();
    for (command, spans_columns) in [("\\multicolumn", true), ("\\multirow", false)] {
        if let Some(rest) = trimmed.strip_prefix(command) {
            if let Some((span, text)) = three_arguments(rest) {
                let mut cells = vec![normalize(text)];
                if spans_columns {
                    let n: usize = span.trim().parse().unwrap_or(1);
                    cells.extend(std::iter::repeat_n(String::new(), n.saturating_sub(1)));
                }
                return cells;
            }
        }
    }
    vec![normalize(trimmed)]
}

/// First and third of three consecutive braced arguments.
fn three_arguments(text: &str) -> Option<(&str, &str)> {
    let first = argument_at(text, 0)?;
    let second = argument_at(text, first.end)?;
    let third_open = super::scan::skip_whitespace(text, second.end);
    let third = balanced_group(text, third_open)?;
    Some((&text[first.inner], &text[third.inner]))
}
