//! Document assembly: walk parsed exercises in order and drive a
//! [`DocumentBuilder`].
//!
//! Layout per exercise:
//!
//! ```text
//! Exercise n                  heading, level 1
//! question fragments          paragraphs and tables, source order
//! [diagram image]             skipped when rendering failed
//! A. …  B. …  C. …            one paragraph per choice, correct one bold+underlined
//! Solution                    bold marker paragraph
//! solution fragments
//! ── separator ──             between exercises, never after the last
//! ```

use crate::config::ConversionConfig;
use crate::diagram::DiagramRenderer;
use crate::document::{DocumentBuilder, RunStyle};
use crate::error::DiagramError;
use crate::model::{choice_label, ContentFragment, ParsedExercise, TableGrid};
use crate::output::{DiagramStatus, ExerciseDiagnostics};
use crate::progress::ConversionProgressCallback;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Diagnostics for every exercise plus the time spent in the toolchain.
#[derive(Debug, Clone, Default)]
pub struct Assembled {
    pub diagnostics: Vec<ExerciseDiagnostics>,
    pub diagram_time: Duration,
}

/// Emit `exercises` into `builder`.
///
/// With `renderer` set, every diagram goes through the toolchain; a failure
/// is reported to `progress`, recorded in the diagnostics and the exercise is
/// emitted without its image. Without a renderer diagrams are reported as
/// [`DiagramStatus::Present`].
pub async fn assemble<B: DocumentBuilder>(
    builder: &mut B,
    exercises: &[ParsedExercise],
    renderer: Option<&DiagramRenderer>,
    config: &ConversionConfig,
    progress: &dyn ConversionProgressCallback,
) -> Assembled {
    let total = exercises.len();
    let mut assembled = Assembled {
        diagnostics: Vec::with_capacity(total),
        diagram_time: Duration::ZERO,
    };

    if let Some(title) = config.title.as_deref() {
        builder.add_heading(title, 0);
    }

    for (idx, exercise) in exercises.iter().enumerate() {
        let number = idx + 1;
        progress.on_exercise_start(number, total);
        debug!(
            "Assembling exercise {}/{}: {} choices, {} tables, diagram: {}",
            number,
            total,
            exercise.choices.len(),
            exercise.table_count(),
            exercise.diagram.is_some()
        );

        let mut diag = ExerciseDiagnostics::from_parsed(number, exercise);

        builder.add_heading(&format!("{} {}", config.exercise_label, number), 1);
        emit_fragments(builder, &exercise.question);

        if let (Some(source), Some(renderer)) = (&exercise.diagram, renderer) {
            let start = Instant::now();
            let rendered = renderer.render(source, &format!("exercise-{number}")).await;
            assembled.diagram_time += start.elapsed();

            diag.diagram = match rendered.outcome {
                Ok(png) => match builder.add_image(&png, config.image_width_inches) {
                    Ok(()) => DiagramStatus::Rendered,
                    Err(e) => DiagramStatus::Failed(DiagramError::RasterizeFailed {
                        detail: e.to_string(),
                    }),
                },
                Err(e) => DiagramStatus::Failed(e),
            };
            if let Some(err) = diag.diagram.error() {
                warn!("Exercise {}: diagram skipped: {}", number, err);
                progress.on_diagram_error(number, err);
            }
        }

        for (i, choice) in exercise.choices.iter().enumerate() {
            let style = if choice.is_correct {
                RunStyle::BOLD_UNDERLINE
            } else {
                RunStyle::PLAIN
            };
            builder.add_paragraph();
            builder.add_run(&format!("{}. ", choice_label(i)), style);
            builder.add_run(&choice.text, style);
        }

        if let Some(solution) = &exercise.solution {
            builder.add_paragraph();
            builder.add_run(&config.solution_label, RunStyle::BOLD);
            emit_fragments(builder, solution);
        }

        if number < total {
            builder.add_separator(&config.separator);
        }

        progress.on_exercise_complete(number, total, &diag);
        assembled.diagnostics.push(diag);
    }

    assembled
}

fn emit_fragments<B: DocumentBuilder>(builder: &mut B, fragments: &[ContentFragment]) {
    for fragment in fragments {
        match fragment {
            ContentFragment::Text(text) => {
                builder.add_paragraph();
                builder.add_run(text, RunStyle::PLAIN);
            }
            ContentFragment::Table(grid) => emit_table(builder, grid),
        }
    }
}

fn emit_table<B: DocumentBuilder>(builder: &mut B, grid: &TableGrid) {
    if grid.is_empty() || grid.column_count == 0 {
        return;
    }
    let cells = builder.add_table(grid.row_count(), grid.column_count);
    for (r, row) in grid.rows.iter().enumerate() {
        for (c, text) in row.iter().enumerate() {
            cells.set(r, c, text, r == 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExerciseSeparator;
    use crate::document::{OutlineBlock, OutlineBuilder};
    use crate::model::{Choice, DiagramSource};
    use crate::progress::NoopProgressCallback;
    use std::sync::Mutex;

    fn exercise() -> ParsedExercise {
        ParsedExercise {
            question: vec![
                ContentFragment::Text("Cho bảng".into()),
                ContentFragment::Table(TableGrid {
                    column_count: 2,
                    rows: vec![
                        vec!["x".into(), "y".into()],
                        vec!["1".into(), "2".into()],
                    ],
                }),
            ],
            choices: vec![
                Choice {
                    text: "$1$".into(),
                    is_correct: false,
                },
                Choice {
                    text: "$2$".into(),
                    is_correct: true,
                },
            ],
            correct_index: Some(1),
            diagram: None,
            solution: Some(vec![ContentFragment::Text("Vì vậy".into())]),
        }
    }

    async fn outline_of(exercises: &[ParsedExercise], config: &ConversionConfig) -> Vec<OutlineBlock> {
        let mut b = OutlineBuilder::new();
        assemble(&mut b, exercises, None, config, &NoopProgressCallback).await;
        b.finish().unwrap().blocks
    }

    #[tokio::test]
    async fn lays_out_one_exercise() {
        let config = ConversionConfig::builder().build().unwrap();
        let blocks = outline_of(&[exercise()], &config).await;

        assert_eq!(
            blocks[0],
            OutlineBlock::Heading {
                level: 0,
                text: "Exercises".into()
            }
        );
        assert_eq!(
            blocks[1],
            OutlineBlock::Heading {
                level: 1,
                text: "Exercise 1".into()
            }
        );
        assert_eq!(blocks[2].paragraph_text().as_deref(), Some("Cho bảng"));
        match &blocks[3] {
            OutlineBlock::Table { cells } => {
                assert_eq!((cells.rows(), cells.cols()), (2, 2));
                assert!(cells.get(0, 0).unwrap().bold);
                assert!(!cells.get(1, 1).unwrap().bold);
            }
            other => panic!("expected table, got {other:?}"),
        }
        assert_eq!(blocks[4].paragraph_text().as_deref(), Some("A. $1$"));
        match &blocks[5] {
            OutlineBlock::Paragraph { runs } => {
                assert!(runs.iter().all(|r| r.style == RunStyle::BOLD_UNDERLINE));
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
        assert_eq!(blocks[6].paragraph_text().as_deref(), Some("Solution"));
        assert_eq!(blocks[7].paragraph_text().as_deref(), Some("Vì vậy"));
        assert_eq!(blocks.len(), 8, "no separator after the last exercise");
    }

    #[tokio::test]
    async fn separators_only_between_exercises() {
        let config = ConversionConfig::builder()
            .no_title()
            .separator(ExerciseSeparator::PageBreak)
            .build()
            .unwrap();
        let blocks = outline_of(&[exercise(), exercise(), exercise()], &config).await;
        let seps = blocks
            .iter()
            .filter(|b| matches!(b, OutlineBlock::Separator { .. }))
            .count();
        assert_eq!(seps, 2);
        assert!(!matches!(blocks.last(), Some(OutlineBlock::Separator { .. })));
    }

    #[tokio::test]
    async fn diagram_without_renderer_is_present() {
        let mut ex = exercise();
        ex.diagram = Some(DiagramSource(
            "\\begin{tikzpicture}\\draw (0,0)--(1,1);\\end{tikzpicture}".into(),
        ));
        let config = ConversionConfig::builder().build().unwrap();
        let mut b = OutlineBuilder::new();
        let out = assemble(&mut b, &[ex], None, &config, &NoopProgressCallback).await;
        assert_eq!(out.diagnostics[0].diagram, DiagramStatus::Present);
        assert_eq!(out.diagnostics[0].correct_label, Some('B'));
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ConversionProgressCallback for Recorder {
        fn on_exercise_start(&self, n: usize, total: usize) {
            self.events.lock().unwrap().push(format!("start {n}/{total}"));
        }
        fn on_exercise_complete(&self, n: usize, _total: usize, d: &ExerciseDiagnostics) {
            self.events
                .lock()
                .unwrap()
                .push(format!("done {n} {}", d.choice_count));
        }
    }

    #[tokio::test]
    async fn progress_events_in_order() {
        let config = ConversionConfig::builder().build().unwrap();
        let recorder = Recorder::default();
        let mut b = OutlineBuilder::new();
        assemble(&mut b, &[exercise(), exercise()], None, &config, &recorder).await;
        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec!["start 1/2", "done 1 2", "start 2/2", "done 2 2"]
        );
    }
}
