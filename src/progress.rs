//! Progress-callback trait for per-exercise conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the assembler walks the exercises. Diagram rendering is the slow
//! part of a run (a `pdflatex` start-up costs about a second), so these
//! events are what a terminal progress bar hangs off.
//!
//! # Example
//!
//! ```rust
//! use tex2docx::{ConversionConfig, ConversionProgressCallback, DiagramError};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FailureCounter {
//!     failed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for FailureCounter {
//!     fn on_diagram_error(&self, exercise: usize, error: &DiagramError) {
//!         self.failed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("exercise {exercise}: {error}");
//!     }
//! }
//!
//! let counter = Arc::new(FailureCounter { failed: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::DiagramError;
use crate::output::ExerciseDiagnostics;
use std::sync::Arc;

/// Called by the document assembler as it processes each exercise.
///
/// Exercises are processed strictly in order on one task, so events for one
/// run never interleave. Implementations are still `Send + Sync` because the
/// config that carries them is shared across threads. All methods have
/// default no-op implementations.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, after parsing, before the first exercise is assembled.
    fn on_conversion_start(&self, total_exercises: usize) {
        let _ = total_exercises;
    }

    /// Called before an exercise is assembled (1-indexed).
    fn on_exercise_start(&self, number: usize, total_exercises: usize) {
        let _ = (number, total_exercises);
    }

    /// Called after an exercise has been written to the builder.
    fn on_exercise_complete(
        &self,
        number: usize,
        total_exercises: usize,
        diagnostics: &ExerciseDiagnostics,
    ) {
        let _ = (number, total_exercises, diagnostics);
    }

    /// Called when an exercise's diagram failed to render. The exercise is
    /// still emitted, without its image.
    fn on_diagram_error(&self, number: usize, error: &DiagramError) {
        let _ = (number, error);
    }

    /// Called once after every exercise has been emitted.
    fn on_conversion_complete(&self, total_exercises: usize, diagrams_failed: usize) {
        let _ = (total_exercises, diagrams_failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
