//! # tex2docx
//!
//! Convert LaTeX exam sheets written with the `ex_test` package into Word
//! (`.docx`) documents.
//!
//! ## Why this crate?
//!
//! Exam banks are kept in LaTeX (`\begin{ex}`, `\choice`, `\loigiai`, TikZ
//! figures) but are often shared as Word files. Running a full TeX-to-Word
//! converter over them loses the exercise structure. This crate reads the
//! exercise markup directly, keeps math verbatim, turns `tabular` into real
//! Word tables, marks the correct choice, and renders each TikZ figure
//! through the local TeX toolchain into an embedded image.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .tex
//!  │
//!  ├─ 1. Input     file or stdin, BOM stripped, CRLF → LF
//!  ├─ 2. Segment   \begin{ex} … \end{ex} blocks, in order
//!  ├─ 3. Parse     question / choices / \True / tikzpicture / \loigiai
//!  ├─ 4. Diagrams  standalone wrap → pdflatex → pdftoppm (fallback: convert)
//!  ├─ 5. Assemble  headings, paragraphs, tables, images, separators
//!  └─ 6. Output    .docx bytes + per-exercise diagnostics
//! ```
//!
//! A diagram that fails to compile never fails the run: the exercise is
//! emitted without its image and the failure is reported in
//! [`ConversionOutput::diagnostics`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tex2docx::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let markup = std::fs::read_to_string("de_thi.tex")?;
//!     let config = ConversionConfig::default();
//!     let output = convert(&markup, &config).await?;
//!     std::fs::write("de_thi.docx", &output.document)?;
//!     for (n, err) in output.diagram_failures() {
//!         eprintln!("exercise {n}: {err}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `tex2docx` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! tex2docx = { version = "0.3", default-features = false }
//! ```
//!
//! ## External tools
//!
//! | Tool | Role | Needed when |
//! |------|------|-------------|
//! | `pdflatex` | compile each `tikzpicture` | the sheet has diagrams |
//! | `pdftoppm` | PDF → PNG | the sheet has diagrams |
//! | `convert` (ImageMagick) | fallback rasterizer | `pdftoppm` fails |
//!
//! Set `render_diagrams(false)` to convert without any of them.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assemble;
pub mod config;
pub mod convert;
pub mod diagram;
pub mod document;
pub mod error;
pub mod input;
pub mod model;
pub mod output;
pub mod parse;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, ExerciseSeparator, ToolchainConfig};
pub use convert::{convert, convert_sync, convert_to_file, convert_with, inspect};
pub use document::{DocumentBuilder, DocxBuilder, Outline, OutlineBuilder, RunStyle};
pub use error::{DiagramError, Tex2DocxError};
pub use model::{Choice, ContentFragment, DiagramSource, ParsedExercise, TableGrid};
pub use output::{ConversionOutput, ConversionStats, DiagramStatus, ExerciseDiagnostics, InspectReport};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
