//! `.docx` output through `docx-rs`.
//!
//! docx-rs builders are consumed by value, so blocks are collected here and
//! the [`Docx`] is put together in [`DocumentBuilder::finish`].

use super::{DocumentBuilder, RunStyle, TableCells};
use crate::config::ExerciseSeparator;
use crate::error::Tex2DocxError;
use docx_rs::{
    AlignmentType, BreakType, Docx, Paragraph, Pic, Run, Style, StyleType, Table, TableCell,
    TableRow,
};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// EMUs (English Metric Units) per inch, the unit of drawing sizes in OOXML.
const EMU_PER_INCH: f32 = 914_400.0;

const TITLE_STYLE: &str = "Title";
const HEADING_STYLES: [&str; 2] = ["Heading1", "Heading2"];

enum Block {
    Paragraph(Paragraph),
    Table(TableCells),
}

/// Builds a Word document in memory; [`finish`](DocumentBuilder::finish)
/// returns the packed `.docx` bytes.
#[derive(Default)]
pub struct DocxBuilder {
    blocks: Vec<Block>,
    current: Option<Paragraph>,
    pending_table: Option<TableCells>,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the open paragraph and the pending table, in that order.
    fn flush(&mut self) {
        if let Some(p) = self.current.take() {
            self.blocks.push(Block::Paragraph(p));
        }
        if let Some(t) = self.pending_table.take() {
            self.blocks.push(Block::Table(t));
        }
    }

    fn push_paragraph(&mut self, p: Paragraph) {
        self.flush();
        self.blocks.push(Block::Paragraph(p));
    }
}

impl DocumentBuilder for DocxBuilder {
    type Output = Vec<u8>;

    fn add_heading(&mut self, text: &str, level: usize) {
        let mut p = Paragraph::new().add_run(Run::new().add_text(text));
        if level == 0 {
            p = p.style(TITLE_STYLE).align(AlignmentType::Center);
        } else {
            p = p.style(HEADING_STYLES[(level - 1).min(HEADING_STYLES.len() - 1)]);
        }
        self.push_paragraph(p);
    }

    fn add_paragraph(&mut self) {
        self.flush();
        self.current = Some(Paragraph::new());
    }

    fn add_run(&mut self, text: &str, style: RunStyle) {
        if self.pending_table.is_some() {
            self.flush();
        }
        let p = self.current.take().unwrap_or_else(Paragraph::new);
        self.current = Some(p.add_run(styled_run(text, style)));
    }

    fn add_table(&mut self, rows: usize, cols: usize) -> &mut TableCells {
        self.flush();
        self.pending_table.insert(TableCells::new(rows, cols))
    }

    fn add_image(&mut self, path: &Path, width_inches: f32) -> Result<(), Tex2DocxError> {
        // Blocking read on the async assembly path. Inputs are single-diagram
        // PNGs from the workspace, one at a time.
        let bytes = std::fs::read(path).map_err(|e| Tex2DocxError::DocumentBuildFailed {
            detail: format!("cannot read image {}: {e}", path.display()),
        })?;
        // Decode up front: an unreadable bitmap must not reach the writer.
        let img = image::load_from_memory(&bytes).map_err(|e| {
            Tex2DocxError::DocumentBuildFailed {
                detail: format!("cannot decode image {}: {e}", path.display()),
            }
        })?;
        let (w, h) = (img.width().max(1), img.height().max(1));
        let width_emu = width_inches * EMU_PER_INCH;
        let height_emu = width_emu * h as f32 / w as f32;
        debug!(
            "Embedding {}x{} px image at {:.2} in wide",
            w, h, width_inches
        );

        let pic = Pic::new(&bytes).size(width_emu.round() as u32, height_emu.round() as u32);
        self.push_paragraph(
            Paragraph::new()
                .add_run(Run::new().add_image(pic))
                .align(AlignmentType::Center),
        );
        Ok(())
    }

    fn add_separator(&mut self, separator: &ExerciseSeparator) {
        match separator {
            ExerciseSeparator::BlankLines(n) => {
                for _ in 0..*n {
                    self.push_paragraph(Paragraph::new());
                }
            }
            ExerciseSeparator::PageBreak => {
                self.push_paragraph(Paragraph::new().add_run(Run::new().add_break(BreakType::Page)));
            }
            ExerciseSeparator::Custom(text) => {
                self.push_paragraph(
                    Paragraph::new()
                        .add_run(Run::new().add_text(text))
                        .align(AlignmentType::Center),
                );
            }
        }
    }

    fn finish(mut self) -> Result<Vec<u8>, Tex2DocxError> {
        self.flush();

        let mut docx = Docx::new()
            .add_style(
                Style::new(TITLE_STYLE, StyleType::Paragraph)
                    .name("Title")
                    .size(40)
                    .bold(),
            )
            .add_style(
                Style::new(HEADING_STYLES[0], StyleType::Paragraph)
                    .name("Heading 1")
                    .size(28)
                    .bold(),
            )
            .add_style(
                Style::new(HEADING_STYLES[1], StyleType::Paragraph)
                    .name("Heading 2")
                    .size(24)
                    .bold(),
            );

        for block in self.blocks {
            docx = match block {
                Block::Paragraph(p) => docx.add_paragraph(p),
                Block::Table(t) => docx.add_table(table(&t)),
            };
        }

        let mut buf = Cursor::new(Vec::new());
        docx.build()
            .pack(&mut buf)
            .map_err(|e| Tex2DocxError::DocumentBuildFailed {
                detail: e.to_string(),
            })?;
        Ok(buf.into_inner())
    }
}

fn styled_run(text: &str, style: RunStyle) -> Run {
    let mut run = Run::new().add_text(text);
    if style.bold {
        run = run.bold();
    }
    if style.underline {
        run = run.underline("single");
    }
    run
}

/// docx-rs tables come with single-line borders on every edge, which is
/// the bordered grid wanted here.
fn table(cells: &TableCells) -> Table {
    let rows = cells
        .iter_rows()
        .map(|row| {
            TableRow::new(
                row.iter()
                    .map(|cell| {
                        let style = if cell.bold { RunStyle::BOLD } else { RunStyle::PLAIN };
                        TableCell::new()
                            .add_paragraph(Paragraph::new().add_run(styled_run(&cell.text, style)))
                    })
                    .collect(),
            )
        })
        .collect();
    Table::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DocxBuilder {
        let mut b = DocxBuilder::new();
        b.add_heading("Bài tập", 0);
        b.add_heading("Câu 1", 1);
        b.add_paragraph();
        b.add_run("Cho bảng:", RunStyle::PLAIN);
        b.add_table(2, 2)
            .set(0, 0, "x", true)
            .set(0, 1, "y", true)
            .set(1, 0, "1", false)
            .set(1, 1, "2", false);
        b.add_paragraph();
        b.add_run("B. ", RunStyle::BOLD_UNDERLINE);
        b.add_separator(&ExerciseSeparator::PageBreak);
        b
    }

    #[test]
    fn finish_produces_zip_bytes() {
        let bytes = sample().finish().unwrap();
        assert!(bytes.starts_with(b"PK"), "docx is a zip archive");
    }

    #[test]
    fn pending_table_is_flushed_before_next_paragraph() {
        let mut b = sample();
        b.flush();
        let kinds: Vec<&str> = b
            .blocks
            .iter()
            .map(|blk| match blk {
                Block::Paragraph(_) => "p",
                Block::Table(_) => "t",
            })
            .collect();
        assert_eq!(kinds, vec!["p", "p", "p", "t", "p", "p"]);
    }

    #[test]
    fn unreadable_image_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();
        let mut b = DocxBuilder::new();
        let err = b.add_image(&path, 3.0).unwrap_err();
        assert!(matches!(err, Tex2DocxError::DocumentBuildFailed { .. }));
        assert!(b.blocks.is_empty());
    }

    #[test]
    fn real_image_is_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dot.png");
        image::RgbImage::from_pixel(4, 2, image::Rgb([0, 0, 0]))
            .save(&path)
            .unwrap();
        let mut b = DocxBuilder::new();
        b.add_image(&path, 3.0).unwrap();
        assert_eq!(b.blocks.len(), 1);
        assert!(b.finish().unwrap().starts_with(b"PK"));
    }
}
