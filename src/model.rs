//! Parsed exercise data model.
//!
//! Everything here is produced by [`crate::parse`] and consumed by
//! [`crate::assemble`]. Values are immutable once built: the parser creates
//! one [`ParsedExercise`] per raw block and nothing downstream edits it.

use serde::{Deserialize, Serialize};

/// One `\begin{ex}…\end{ex}` block, borrowed from the input text.
///
/// Trimmed of surrounding whitespace. `offset` is the byte offset of the
/// trimmed text inside the original input, useful for log messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawExercise<'a> {
    pub text: &'a str,
    pub offset: usize,
}

impl<'a> RawExercise<'a> {
    pub fn as_str(&self) -> &'a str {
        self.text
    }
}

/// A candidate answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Normalised choice text (math kept verbatim).
    pub text: String,
    pub is_correct: bool,
}

/// Positional choice label: `A`, `B`, `C`, … for index 0, 1, 2, …
///
/// Labels past `Z` continue into the following ASCII characters; exam
/// sheets never get that far.
pub fn choice_label(index: usize) -> char {
    char::from(b'A'.saturating_add(index.min(u8::MAX as usize) as u8))
}

/// A `tabular` environment converted to a rectangular grid.
///
/// Every row has exactly `column_count` cells. Row 0 is treated as the
/// header when rendered; the markup carries no header signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableGrid {
    pub column_count: usize,
    pub rows: Vec<Vec<String>>,
}

impl TableGrid {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One unit of a question or solution body, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ContentFragment {
    Text(String),
    Table(TableGrid),
}

impl ContentFragment {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentFragment::Text(t) => Some(t),
            ContentFragment::Table(_) => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableGrid> {
        match self {
            ContentFragment::Text(_) => None,
            ContentFragment::Table(t) => Some(t),
        }
    }
}

/// Verbatim TikZ source, delimiters included.
///
/// Never normalised: it is handed to the external compiler as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiagramSource(pub String);

impl DiagramSource {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The structured form of one exercise.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedExercise {
    pub question: Vec<ContentFragment>,
    pub choices: Vec<Choice>,
    /// Index into `choices` of the `\True`-marked choice, if any.
    pub correct_index: Option<usize>,
    pub diagram: Option<DiagramSource>,
    pub solution: Option<Vec<ContentFragment>>,
}

impl ParsedExercise {
    /// Label of the correct choice (`'B'` for index 1).
    pub fn correct_label(&self) -> Option<char> {
        self.correct_index.map(choice_label)
    }

    /// Tables across question and solution bodies.
    pub fn table_count(&self) -> usize {
        let solution = self.solution.as_deref().unwrap_or_default();
        self.question
            .iter()
            .chain(solution)
            .filter(|f| matches!(f, ContentFragment::Table(_)))
            .count()
    }
}
