//! Document builder sink.
//!
//! The assembler never talks to a file format directly. It drives a
//! [`DocumentBuilder`], a small append-only capability set (headings,
//! paragraphs of styled runs, tables, images, separators) that two
//! implementations provide:
//!
//! * [`docx::DocxBuilder`]: a Word document via `docx-rs`
//! * [`outline::OutlineBuilder`]: an in-memory block list that renders to
//!   Markdown, used by the CLI `--outline` mode and by tests that need to
//!   look at what was emitted

pub mod docx;
pub mod outline;

use crate::config::ExerciseSeparator;
use crate::error::Tex2DocxError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use docx::DocxBuilder;
pub use outline::{Outline, OutlineBlock, OutlineBuilder};

/// Character formatting for one run of text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStyle {
    pub bold: bool,
    pub underline: bool,
}

impl RunStyle {
    pub const PLAIN: RunStyle = RunStyle {
        bold: false,
        underline: false,
    };
    pub const BOLD: RunStyle = RunStyle {
        bold: true,
        underline: false,
    };
    pub const BOLD_UNDERLINE: RunStyle = RunStyle {
        bold: true,
        underline: true,
    };
}

/// One table cell as set through [`TableCells::set`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub text: String,
    pub bold: bool,
}

/// A fixed-size table being filled in.
///
/// Returned by [`DocumentBuilder::add_table`]; the builder emits it when the
/// next block is added or the document is finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCells {
    rows: usize,
    cols: usize,
    cells: Vec<Vec<Cell>>,
}

impl TableCells {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![vec![Cell::default(); cols]; rows],
        }
    }

    /// Set a cell. Out-of-range coordinates are ignored.
    pub fn set(&mut self, row: usize, col: usize, text: &str, bold: bool) -> &mut Self {
        if let Some(cell) = self.cells.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = Cell {
                text: text.to_string(),
                bold,
            };
        }
        self
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(row)?.get(col)
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.iter().map(Vec::as_slice)
    }
}

/// Append-only document sink driven by [`crate::assemble`].
pub trait DocumentBuilder {
    /// What [`finish`](DocumentBuilder::finish) produces.
    type Output;

    /// A heading. Level 0 is the centered document title, level 1 an
    /// exercise heading.
    fn add_heading(&mut self, text: &str, level: usize);

    /// Start a new, empty paragraph.
    fn add_paragraph(&mut self);

    /// Append a run to the current paragraph, starting one if needed.
    fn add_run(&mut self, text: &str, style: RunStyle);

    /// Start a `rows` × `cols` table and return it for filling in.
    fn add_table(&mut self, rows: usize, cols: usize) -> &mut TableCells;

    /// A centered image `width_inches` wide; height follows the aspect ratio.
    fn add_image(&mut self, path: &Path, width_inches: f32) -> Result<(), Tex2DocxError>;

    /// Space between two exercises.
    fn add_separator(&mut self, separator: &ExerciseSeparator);

    /// Close the document.
    fn finish(self) -> Result<Self::Output, Tex2DocxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_cells_start_empty_and_ignore_out_of_range() {
        let mut t = TableCells::new(2, 2);
        t.set(0, 1, "x", true).set(5, 5, "ignored", false);
        assert_eq!(t.get(0, 1), Some(&Cell { text: "x".into(), bold: true }));
        assert_eq!(t.get(1, 0), Some(&Cell::default()));
        assert_eq!(t.get(2, 0), None);
        assert_eq!(t.iter_rows().count(), 2);
    }
}
