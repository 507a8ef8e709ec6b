//! Conversion results: the built document plus per-exercise diagnostics.

use crate::error::DiagramError;
use crate::model::ParsedExercise;
use serde::{Deserialize, Serialize};

/// What happened to an exercise's diagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum DiagramStatus {
    /// The exercise has no `tikzpicture`.
    Absent,
    /// A diagram was found but not rendered (inspection, or rendering disabled).
    Present,
    /// Rendered and embedded in the document.
    Rendered,
    /// Rendering failed; the exercise was emitted without its image.
    Failed(DiagramError),
}

impl DiagramStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, DiagramStatus::Failed(_))
    }

    pub fn error(&self) -> Option<&DiagramError> {
        match self {
            DiagramStatus::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Short label for tables and progress lines.
    pub fn label(&self) -> &'static str {
        match self {
            DiagramStatus::Absent => "-",
            DiagramStatus::Present => "present",
            DiagramStatus::Rendered => "rendered",
            DiagramStatus::Failed(_) => "failed",
        }
    }
}

/// Per-exercise summary reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseDiagnostics {
    /// 1-indexed exercise number.
    pub number: usize,
    pub choice_count: usize,
    /// `'A'`, `'B'`, … or `None` when no choice carries `\True`.
    pub correct_label: Option<char>,
    pub diagram: DiagramStatus,
    /// Tables across question and solution.
    pub table_count: usize,
    pub has_solution: bool,
}

impl ExerciseDiagnostics {
    /// Diagnostics for a parsed exercise before any diagram work.
    pub fn from_parsed(number: usize, exercise: &ParsedExercise) -> Self {
        Self {
            number,
            choice_count: exercise.choices.len(),
            correct_label: exercise.correct_label(),
            diagram: if exercise.diagram.is_some() {
                DiagramStatus::Present
            } else {
                DiagramStatus::Absent
            },
            table_count: exercise.table_count(),
            has_solution: exercise.solution.is_some(),
        }
    }
}

/// Aggregate statistics for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub exercises: usize,
    pub choices: usize,
    pub tables: usize,
    pub diagrams_rendered: usize,
    pub diagrams_failed: usize,
    /// Wall-clock time for the whole run.
    pub duration_ms: u64,
    /// Time spent inside the diagram toolchain.
    pub diagram_duration_ms: u64,
}

impl ConversionStats {
    /// Counts derived from the diagnostics; durations are left at zero.
    pub fn from_diagnostics(diagnostics: &[ExerciseDiagnostics]) -> Self {
        Self {
            exercises: diagnostics.len(),
            choices: diagnostics.iter().map(|d| d.choice_count).sum(),
            tables: diagnostics.iter().map(|d| d.table_count).sum(),
            diagrams_rendered: diagnostics
                .iter()
                .filter(|d| d.diagram == DiagramStatus::Rendered)
                .count(),
            diagrams_failed: diagnostics.iter().filter(|d| d.diagram.is_failed()).count(),
            ..Self::default()
        }
    }
}

/// Output of a conversion.
///
/// `D` is whatever the document builder produced: `.docx` bytes for the
/// default builder, an [`crate::document::outline::Outline`] for the
/// outline builder.
#[derive(Debug, Clone)]
pub struct ConversionOutput<D = Vec<u8>> {
    pub document: D,
    pub diagnostics: Vec<ExerciseDiagnostics>,
    pub stats: ConversionStats,
}

impl<D> ConversionOutput<D> {
    /// Diagram failures, in exercise order.
    pub fn diagram_failures(&self) -> impl Iterator<Item = (usize, &DiagramError)> {
        self.diagnostics
            .iter()
            .filter_map(|d| d.diagram.error().map(|e| (d.number, e)))
    }
}

/// Result of [`crate::convert::inspect`]: diagnostics without a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectReport {
    pub exercises: Vec<ExerciseDiagnostics>,
    pub stats: ConversionStats,
}
