//! Conversion entry points.
//!
//! ```text
//! markup ─► parse_document ─► assemble ─► DocumentBuilder::finish ─► bytes
//!                                 │
//!                                 └─► DiagramRenderer (tikz → png), per exercise
//! ```
//!
//! [`convert`] is the primary API. [`convert_with`] drives any
//! [`DocumentBuilder`], [`convert_to_file`] adds file I/O with an atomic
//! write, and [`inspect`] parses without building a document.

use crate::assemble::assemble;
use crate::config::ConversionConfig;
use crate::diagram::{DiagramRenderer, Workspace};
use crate::document::{DocumentBuilder, DocxBuilder};
use crate::error::Tex2DocxError;
use crate::input;
use crate::output::{ConversionOutput, ConversionStats, ExerciseDiagnostics, InspectReport};
use crate::parse::parse_document;
use crate::progress::NoopProgressCallback;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert exam markup to a `.docx` document.
///
/// # Returns
/// `Ok(ConversionOutput)` on success, even if some diagrams failed to
/// render (check `output.stats.diagrams_failed` or
/// [`ConversionOutput::diagram_failures`]).
///
/// # Errors
/// Returns `Err(Tex2DocxError)` only for fatal errors:
/// - no `ex` environment in the input
/// - the diagram workspace cannot be created
/// - the document cannot be packed
pub async fn convert(
    markup: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Tex2DocxError> {
    convert_with(markup, config, DocxBuilder::new()).await
}

/// Convert exam markup through a caller-supplied [`DocumentBuilder`].
///
/// Use [`crate::document::OutlineBuilder`] to get a Markdown outline instead
/// of a Word file.
pub async fn convert_with<B: DocumentBuilder>(
    markup: impl AsRef<str>,
    config: &ConversionConfig,
    mut builder: B,
) -> Result<ConversionOutput<B::Output>, Tex2DocxError> {
    let total_start = Instant::now();
    let markup = markup.as_ref();
    info!("Starting conversion: {} bytes of markup", markup.len());

    // ── Step 1: Parse ────────────────────────────────────────────────────
    let exercises = parse_document(markup)?;
    let total = exercises.len();
    info!("Found {} exercises", total);

    let noop = NoopProgressCallback;
    let progress = config.progress_callback.as_deref().unwrap_or(&noop);
    progress.on_conversion_start(total);

    // ── Step 2: Acquire the diagram workspace ────────────────────────────
    // Only when something will be rendered. Dropped (and deleted) on every
    // exit path from here on.
    let needs_renderer = config.render_diagrams && exercises.iter().any(|e| e.diagram.is_some());
    let renderer = if needs_renderer {
        let workspace = Workspace::create()?;
        debug!("Diagram workspace at {}", workspace.path().display());
        Some(DiagramRenderer::new(workspace, config.toolchain.clone()))
    } else {
        None
    };

    // ── Step 3: Assemble ─────────────────────────────────────────────────
    let assembled = assemble(&mut builder, &exercises, renderer.as_ref(), config, progress).await;

    // ── Step 4: Finish the document ──────────────────────────────────────
    let document = builder.finish()?;
    drop(renderer);

    // ── Step 5: Stats ────────────────────────────────────────────────────
    let mut stats = ConversionStats::from_diagnostics(&assembled.diagnostics);
    stats.duration_ms = total_start.elapsed().as_millis() as u64;
    stats.diagram_duration_ms = assembled.diagram_time.as_millis() as u64;

    if stats.diagrams_failed > 0 {
        warn!(
            "{} of {} diagrams failed to render",
            stats.diagrams_failed,
            stats.diagrams_failed + stats.diagrams_rendered
        );
    }
    info!(
        "Conversion complete: {} exercises, {} diagrams rendered, {}ms total",
        stats.exercises, stats.diagrams_rendered, stats.duration_ms
    );
    progress.on_conversion_complete(total, stats.diagrams_failed);

    Ok(ConversionOutput {
        document,
        diagnostics: assembled.diagnostics,
        stats,
    })
}

/// Convert a `.tex` file and write the `.docx` next to wherever
/// `output_path` points.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput<()>, Tex2DocxError> {
    let markup = input::read_file(input_path.as_ref()).await?;
    let output = convert(&markup, config).await?;
    write_atomic(output_path.as_ref(), &output.document).await?;
    Ok(ConversionOutput {
        document: (),
        diagnostics: output.diagnostics,
        stats: output.stats,
    })
}

/// Write `bytes` to `path` through a sibling temp file.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Tex2DocxError> {
    let write_err = |e| Tex2DocxError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("docx.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    markup: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Tex2DocxError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Tex2DocxError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(markup, config))
}

/// Parse the markup and report what a conversion would contain.
///
/// No document is built and no external tool runs; diagrams show up as
/// [`crate::output::DiagramStatus::Present`].
pub fn inspect(markup: impl AsRef<str>) -> Result<InspectReport, Tex2DocxError> {
    let exercises = parse_document(markup.as_ref())?;
    let diagnostics: Vec<ExerciseDiagnostics> = exercises
        .iter()
        .enumerate()
        .map(|(i, e)| ExerciseDiagnostics::from_parsed(i + 1, e))
        .collect();
    let stats = ConversionStats::from_diagnostics(&diagnostics);
    Ok(InspectReport {
        exercises: diagnostics,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::OutlineBuilder;
    use crate::output::DiagramStatus;

    const SHEET: &str = r"
\begin{ex}
  \immini{Tính $1+1$.}
  \choice{$1$}{\True $2$}{$3$}{$4$}
  \loigiai{Hiển nhiên.}
\end{ex}
\begin{ex}
  Vẽ hình.
  \begin{tikzpicture}\draw (0,0) -- (1,1);\end{tikzpicture}
\end{ex}
";

    #[test]
    fn inspect_reports_without_rendering() {
        let report = inspect(SHEET).unwrap();
        assert_eq!(report.stats.exercises, 2);
        assert_eq!(report.stats.choices, 4);
        assert_eq!(report.exercises[0].correct_label, Some('B'));
        assert!(report.exercises[0].has_solution);
        assert_eq!(report.exercises[1].diagram, DiagramStatus::Present);
    }

    #[test]
    fn inspect_without_exercises_fails() {
        assert!(matches!(
            inspect("no exercises here"),
            Err(Tex2DocxError::NoExercisesFound)
        ));
    }

    #[tokio::test]
    async fn diagrams_disabled_skips_toolchain() {
        let config = ConversionConfig::builder()
            .render_diagrams(false)
            .compiler("definitely-not-a-real-latex")
            .build()
            .unwrap();
        let out = convert_with(SHEET, &config, OutlineBuilder::new()).await.unwrap();
        assert_eq!(out.diagnostics[1].diagram, DiagramStatus::Present);
        assert_eq!(out.stats.diagrams_failed, 0);
        assert_eq!(out.document.headings().count(), 3);
    }

    #[test]
    fn convert_sync_builds_docx() {
        let config = ConversionConfig::builder().render_diagrams(false).build().unwrap();
        let out = convert_sync(SHEET, &config).unwrap();
        assert!(out.document.starts_with(b"PK"));
        assert_eq!(out.stats.exercises, 2);
    }

    #[tokio::test]
    async fn write_atomic_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.docx");
        write_atomic(&path, b"PK\x03\x04").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"PK\x03\x04");
        assert!(!path.with_extension("docx.tmp").exists());
    }
}
