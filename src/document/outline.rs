//! In-memory document outline, rendered as Markdown.
//!
//! Keeps every block the assembler emitted, in order, so callers can inspect
//! the document structure (tests do) or print it (`--outline`). Tables render
//! as GFM tables, bold and underline as `**…**` and `<u>…</u>`.

use super::{DocumentBuilder, RunStyle, TableCells};
use crate::config::ExerciseSeparator;
use crate::error::Tex2DocxError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One styled run inside a paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledRun {
    pub text: String,
    pub style: RunStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutlineBlock {
    Heading { level: usize, text: String },
    Paragraph { runs: Vec<StyledRun> },
    Table { cells: TableCells },
    Image { path: PathBuf, width_inches: f32 },
    Separator { separator: ExerciseSeparator },
}

impl OutlineBlock {
    /// Concatenated run text of a paragraph.
    pub fn paragraph_text(&self) -> Option<String> {
        match self {
            OutlineBlock::Paragraph { runs } => Some(runs.iter().map(|r| r.text.as_str()).collect()),
            _ => None,
        }
    }
}

/// The finished outline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    pub blocks: Vec<OutlineBlock>,
}

impl Outline {
    pub fn headings(&self) -> impl Iterator<Item = (usize, &str)> {
        self.blocks.iter().filter_map(|b| match b {
            OutlineBlock::Heading { level, text } => Some((*level, text.as_str())),
            _ => None,
        })
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableCells> {
        self.blocks.iter().filter_map(|b| match b {
            OutlineBlock::Table { cells } => Some(cells),
            _ => None,
        })
    }

    /// Every run of every paragraph, in order.
    pub fn runs(&self) -> impl Iterator<Item = &StyledRun> {
        self.blocks.iter().flat_map(|b| match b {
            OutlineBlock::Paragraph { runs } => runs.as_slice(),
            _ => &[],
        })
    }

    pub fn to_markdown(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        for block in &self.blocks {
            match block {
                OutlineBlock::Heading { level, text } => {
                    parts.push(format!("{} {}", "#".repeat(level + 1), text));
                }
                OutlineBlock::Paragraph { runs } => {
                    let line: String = runs.iter().map(markdown_run).collect();
                    if !line.trim().is_empty() {
                        parts.push(line);
                    }
                }
                OutlineBlock::Table { cells } => parts.push(markdown_table(cells)),
                OutlineBlock::Image { path, .. } => {
                    parts.push(format!("![diagram]({})", path.display()));
                }
                OutlineBlock::Separator { separator } => match separator {
                    ExerciseSeparator::BlankLines(_) => {}
                    ExerciseSeparator::PageBreak => parts.push("---".to_string()),
                    ExerciseSeparator::Custom(text) => parts.push(text.clone()),
                },
            }
        }
        let mut md = parts.join("\n\n");
        md.push('\n');
        md
    }
}

fn markdown_run(run: &StyledRun) -> String {
    let text = run.text.as_str();
    // Emphasis markers must hug the text, so surrounding spaces stay outside.
    let core = text.trim();
    if core.is_empty() || run.style == RunStyle::PLAIN {
        return text.to_string();
    }
    let lead = &text[..text.len() - text.trim_start().len()];
    let trail = &text[text.trim_end().len()..];
    let mut marked = core.to_string();
    if run.style.underline {
        marked = format!("<u>{marked}</u>");
    }
    if run.style.bold {
        marked = format!("**{marked}**");
    }
    format!("{lead}{marked}{trail}")
}

fn markdown_table(cells: &TableCells) -> String {
    let mut lines = Vec::with_capacity(cells.rows() + 1);
    for (i, row) in cells.iter_rows().enumerate() {
        let rendered: Vec<String> = row
            .iter()
            .map(|c| {
                let text = c.text.replace('|', "\\|");
                if c.bold && !text.is_empty() {
                    format!("**{text}**")
                } else {
                    text
                }
            })
            .collect();
        lines.push(format!("| {} |", rendered.join(" | ")));
        if i == 0 {
            lines.push(format!("|{}", " --- |".repeat(cells.cols())));
        }
    }
    lines.join("\n")
}

/// Collects blocks into an [`Outline`].
#[derive(Debug, Default)]
pub struct OutlineBuilder {
    outline: Outline,
    pending_table: Option<TableCells>,
}

impl OutlineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn flush_table(&mut self) {
        if let Some(cells) = self.pending_table.take() {
            self.outline.blocks.push(OutlineBlock::Table { cells });
        }
    }

    fn push(&mut self, block: OutlineBlock) {
        self.flush_table();
        self.outline.blocks.push(block);
    }
}

impl DocumentBuilder for OutlineBuilder {
    type Output = Outline;

    fn add_heading(&mut self, text: &str, level: usize) {
        self.push(OutlineBlock::Heading {
            level,
            text: text.to_string(),
        });
    }

    fn add_paragraph(&mut self) {
        self.push(OutlineBlock::Paragraph { runs: Vec::new() });
    }

    fn add_run(&mut self, text: &str, style: RunStyle) {
        self.flush_table();
        let run = StyledRun {
            text: text.to_string(),
            style,
        };
        match self.outline.blocks.last_mut() {
            Some(OutlineBlock::Paragraph { runs }) => runs.push(run),
            _ => self.outline.blocks.push(OutlineBlock::Paragraph { runs: vec![run] }),
        }
    }

    fn add_table(&mut self, rows: usize, cols: usize) -> &mut TableCells {
        self.flush_table();
        self.pending_table.insert(TableCells::new(rows, cols))
    }

    fn add_image(&mut self, path: &Path, width_inches: f32) -> Result<(), Tex2DocxError> {
        if !path.is_file() {
            return Err(Tex2DocxError::DocumentBuildFailed {
                detail: format!("image not found: {}", path.display()),
            });
        }
        self.push(OutlineBlock::Image {
            path: path.to_path_buf(),
            width_inches,
        });
        Ok(())
    }

    fn add_separator(&mut self, separator: &ExerciseSeparator) {
        self.push(OutlineBlock::Separator {
            separator: separator.clone(),
        });
    }

    fn finish(mut self) -> Result<Outline, Tex2DocxError> {
        self.flush_table();
        Ok(self.outline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_rendering() {
        let mut b = OutlineBuilder::new();
        b.add_heading("Exercises", 0);
        b.add_heading("Exercise 1", 1);
        b.add_paragraph();
        b.add_run("Cho ", RunStyle::PLAIN);
        b.add_run("a|b", RunStyle::PLAIN);
        b.add_table(2, 2)
            .set(0, 0, "x", true)
            .set(0, 1, "y|z", true)
            .set(1, 0, "1", false)
            .set(1, 1, "", false);
        b.add_paragraph();
        b.add_run("B. ", RunStyle::BOLD_UNDERLINE);
        b.add_run("$2$", RunStyle::BOLD_UNDERLINE);
        b.add_separator(&ExerciseSeparator::PageBreak);
        let md = b.finish().unwrap().to_markdown();

        let expected = "# Exercises\n\n## Exercise 1\n\nCho a|b\n\n\
                        | **x** | **y\\|z** |\n| --- | --- |\n| 1 |  |\n\n\
                        **<u>B.</u>** **<u>$2$</u>**\n\n---\n";
        assert_eq!(md, expected);
    }

    #[test]
    fn run_without_paragraph_starts_one() {
        let mut b = OutlineBuilder::new();
        b.add_run("x", RunStyle::BOLD);
        b.add_table(1, 1);
        b.add_run("after table", RunStyle::PLAIN);
        let outline = b.finish().unwrap();
        assert_eq!(outline.blocks.len(), 3);
        assert_eq!(outline.blocks[2].paragraph_text().as_deref(), Some("after table"));
        assert_eq!(outline.tables().count(), 1);
    }

    #[test]
    fn missing_image_is_rejected() {
        let mut b = OutlineBuilder::new();
        assert!(b.add_image(Path::new("/nonexistent.png"), 3.0).is_err());
    }
}
