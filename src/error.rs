//! Error types for the tex2docx library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Tex2DocxError`]: **Fatal**: the conversion cannot proceed at all
//!   (input unreadable, no exercises in the markup, the working directory
//!   cannot be created). Returned as `Err(Tex2DocxError)` from the top-level
//!   `convert*` functions.
//!
//! * [`DiagramError`]: **Non-fatal**: a single TikZ diagram failed to
//!   compile or rasterise, but the exercise it belongs to is still emitted
//!   without its image. Stored inside
//!   [`crate::output::ExerciseDiagnostics`] so callers can report every
//!   failed diagram after the run.
//!
//! Parsing omissions (no `\immini`, no solution, no `\True` marker) are not
//! errors at all: they are absent optional fields in
//! [`crate::model::ParsedExercise`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the tex2docx library.
///
/// Diagram failures use [`DiagramError`] and are reported per exercise
/// rather than propagated here.
#[derive(Debug, Error)]
pub enum Tex2DocxError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The markup contains no non-empty `\begin{ex}…\end{ex}` block.
    #[error("No exercises found.\nWrap each question in \\begin{{ex}} … \\end{{ex}}.")]
    NoExercisesFound,

    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but could not be read as UTF-8 text.
    #[error("Failed to read '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Run resources ─────────────────────────────────────────────────────
    /// The scoped working directory for diagram artifacts could not be created.
    #[error("Failed to create working directory: {source}")]
    WorkspaceFailed {
        #[source]
        source: std::io::Error,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The document builder could not produce its output.
    #[error("Failed to build document: {detail}")]
    DocumentBuildFailed { detail: String },

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single diagram.
///
/// The conversion continues; the exercise is rendered without its image.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DiagramError {
    /// The compiler or rasterizer could not be found on `PATH`.
    #[error("diagram tool '{tool}' not found on PATH")]
    ToolNotFound { tool: String },

    /// The compiler rejected the diagram source.
    ///
    /// `diagnostics` holds the captured compiler output (never empty).
    #[error("diagram failed to compile:\n{diagnostics}")]
    CompileFailed { diagnostics: String },

    /// A toolchain step exceeded the configured timeout and was killed.
    #[error("'{tool}' timed out after {secs}s")]
    TimedOut { tool: String, secs: u64 },

    /// Neither the rasterizer nor the fallback produced a bitmap.
    #[error("diagram rasterisation failed: {detail}")]
    RasterizeFailed { detail: String },

    /// Writing into the run's working directory failed.
    #[error("diagram workspace I/O failed: {detail}")]
    Io { detail: String },
}

impl DiagramError {
    /// Short machine-friendly kind, used in diagnostics tables.
    pub fn kind(&self) -> &'static str {
        match self {
            DiagramError::ToolNotFound { .. } => "tool-not-found",
            DiagramError::CompileFailed { .. } => "compile-failed",
            DiagramError::TimedOut { .. } => "timed-out",
            DiagramError::RasterizeFailed { .. } => "rasterize-failed",
            DiagramError::Io { .. } => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_exercises_display_mentions_delimiters() {
        let msg = Tex2DocxError::NoExercisesFound.to_string();
        assert!(msg.contains("\\begin{ex}"), "got: {msg}");
    }

    #[test]
    fn compile_failed_display_carries_diagnostics() {
        let e = DiagramError::CompileFailed {
            diagnostics: "! Undefined control sequence.".into(),
        };
        assert!(e.to_string().contains("Undefined control sequence"));
        assert_eq!(e.kind(), "compile-failed");
    }

    #[test]
    fn timed_out_display() {
        let e = DiagramError::TimedOut {
            tool: "pdflatex".into(),
            secs: 30,
        };
        assert!(e.to_string().contains("pdflatex"));
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn diagram_error_round_trips_through_json() {
        let e = DiagramError::ToolNotFound {
            tool: "pdftoppm".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: DiagramError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
