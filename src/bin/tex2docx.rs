//! CLI binary for tex2docx.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tex2docx::convert::write_atomic;
use tex2docx::input::{read_source, InputSource};
use tex2docx::{
    convert, convert_with, inspect, ConversionConfig, ConversionProgressCallback,
    ConversionStats, DiagramError, ExerciseDiagnostics, ExerciseSeparator, OutlineBuilder,
    ProgressCallback,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the exercises, one log line per
/// exercise, diagram failures printed in red as they happen.
struct CliProgressCallback {
    bar: ProgressBar,
    diagram_errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Parsing exercises…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            diagram_errors: AtomicUsize::new(0),
        })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} exercises  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Converting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total} exercises…"))
        ));
    }

    fn on_exercise_start(&self, number: usize, _total: usize) {
        self.bar.set_message(format!("exercise {number}"));
    }

    fn on_exercise_complete(&self, number: usize, total: usize, d: &ExerciseDiagnostics) {
        let mark = if d.diagram.is_failed() {
            red("✗")
        } else {
            green("✓")
        };
        self.bar.println(format!(
            "  {} Exercise {:>3}/{:<3}  {}",
            mark,
            number,
            total,
            dim(&summary_line(d)),
        ));
        self.bar.inc(1);
    }

    fn on_diagram_error(&self, number: usize, error: &DiagramError) {
        self.diagram_errors.fetch_add(1, Ordering::SeqCst);
        // Compiler diagnostics can run to many lines; the full text is
        // printed after the run.
        let msg = error.to_string();
        let first = msg.lines().next().unwrap_or_default().trim_end_matches(':');
        self.bar.println(format!(
            "    {} {} {}",
            red(&format!("exercise {number}:")),
            red(first),
            dim(&format!("[{}]", error.kind())),
        ));
    }

    fn on_conversion_complete(&self, total: usize, diagrams_failed: usize) {
        self.bar.finish_and_clear();
        if diagrams_failed == 0 {
            eprintln!(
                "{} {} exercises converted",
                green("✔"),
                bold(&total.to_string())
            );
        } else {
            eprintln!(
                "{} {} exercises converted  ({} diagrams failed)",
                cyan("⚠"),
                bold(&total.to_string()),
                red(&diagrams_failed.to_string()),
            );
        }
    }
}

fn summary_line(d: &ExerciseDiagnostics) -> String {
    format!(
        "{} choices  correct: {}  tables: {}  diagram: {}  solution: {}",
        d.choice_count,
        d.correct_label.map(String::from).unwrap_or_else(|| "-".into()),
        d.table_count,
        d.diagram.label(),
        if d.has_solution { "yes" } else { "no" },
    )
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert next to the input (de_thi.docx)
  tex2docx de_thi.tex

  # Explicit output, Vietnamese labels, page break between exercises
  tex2docx de_thi.tex -o out/de_thi.docx --title "Bài tập" \
      --exercise-label "Câu" --solution-label "Lời giải:" --separator page

  # From stdin
  cat de_thi.tex | tex2docx - -o de_thi.docx

  # Skip TikZ rendering (no TeX installation needed)
  tex2docx --no-diagrams de_thi.tex

  # Preview the structure without building a document
  tex2docx --inspect-only de_thi.tex
  tex2docx --inspect-only --json de_thi.tex

  # Markdown outline on stdout
  tex2docx --outline de_thi.tex

DIAGRAM TOOLCHAIN:
  pdflatex   compiles each tikzpicture inside a standalone wrapper
  pdftoppm   rasterizes the PDF to PNG (poppler-utils)
  convert    fallback rasterizer (ImageMagick), used when pdftoppm fails

  A diagram that fails is reported and skipped; the document is still written.

ENVIRONMENT VARIABLES:
  Every flag has a TEX2DOCX_* counterpart, e.g. TEX2DOCX_DPI=200.
  RUST_LOG overrides the log filter.
"#;

/// Convert LaTeX exam sheets (ex_test markup) to Word documents.
#[derive(Parser, Debug)]
#[command(
    name = "tex2docx",
    version,
    about = "Convert LaTeX exam sheets (ex_test markup) to Word documents",
    long_about = "Convert LaTeX multiple-choice exercise sheets written with the ex_test \
package into .docx files. Math is kept verbatim, tabular becomes Word tables, the correct \
choice is bold and underlined, and TikZ figures are rendered through pdflatex.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input .tex file, or `-` for stdin.
    input: String,

    /// Output .docx path. Default: the input path with a .docx extension.
    #[arg(short, long, env = "TEX2DOCX_OUTPUT")]
    output: Option<PathBuf>,

    /// Document title heading.
    #[arg(long, env = "TEX2DOCX_TITLE", default_value = "Exercises")]
    title: String,

    /// Omit the document title heading.
    #[arg(long, env = "TEX2DOCX_NO_TITLE")]
    no_title: bool,

    /// Exercise heading prefix ("Exercise 1", "Câu 1", …).
    #[arg(long, env = "TEX2DOCX_EXERCISE_LABEL", default_value = "Exercise")]
    exercise_label: String,

    /// Bold marker before each solution.
    #[arg(long, env = "TEX2DOCX_SOLUTION_LABEL", default_value = "Solution")]
    solution_label: String,

    /// Between exercises: a number of blank lines, `page`, or `text:…`.
    #[arg(long, env = "TEX2DOCX_SEPARATOR", default_value = "2")]
    separator: String,

    /// Do not run the TeX toolchain; diagrams are left out.
    #[arg(long, env = "TEX2DOCX_NO_DIAGRAMS")]
    no_diagrams: bool,

    /// LaTeX compiler.
    #[arg(long, env = "TEX2DOCX_COMPILER", default_value = "pdflatex")]
    compiler: String,

    /// PDF-to-PNG rasterizer.
    #[arg(long, env = "TEX2DOCX_RASTERIZER", default_value = "pdftoppm")]
    rasterizer: String,

    /// Fallback rasterizer, tried once when the primary fails. `none` disables it.
    #[arg(long, env = "TEX2DOCX_FALLBACK_RASTERIZER", default_value = "convert")]
    fallback_rasterizer: String,

    /// Diagram rasterization DPI (72–1200).
    #[arg(long, env = "TEX2DOCX_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=1200))]
    dpi: u32,

    /// Per-tool timeout in seconds.
    #[arg(long, env = "TEX2DOCX_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Width of embedded diagrams, in inches.
    #[arg(long, env = "TEX2DOCX_WIDTH", default_value_t = 3.0)]
    width: f32,

    /// Print a Markdown outline to stdout instead of writing a .docx.
    #[arg(long, env = "TEX2DOCX_OUTLINE")]
    outline: bool,

    /// Print per-exercise diagnostics only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Print diagnostics as JSON on stdout.
    #[arg(long, env = "TEX2DOCX_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "TEX2DOCX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TEX2DOCX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TEX2DOCX_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose always wins.
    let show_progress =
        !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only && !cli.outline;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let source = InputSource::from_arg(&cli.input);
    let markup = read_source(&source)
        .await
        .with_context(|| format!("Failed to read {}", source.display_path().display()))?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let report = inspect(&markup).context("Failed to inspect input")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialize report")?
            );
        } else {
            println!("File:       {}", source.display_path().display());
            println!("Exercises:  {}", report.stats.exercises);
            println!("Choices:    {}", report.stats.choices);
            println!("Tables:     {}", report.stats.tables);
            for d in &report.exercises {
                println!("  #{:<3} {}", d.number, summary_line(d));
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Outline mode ─────────────────────────────────────────────────────
    if cli.outline {
        let output = convert_with(&markup, &config, OutlineBuilder::new())
            .await
            .context("Conversion failed")?;
        let md = output.document.to_markdown();
        io::stdout()
            .lock()
            .write_all(md.as_bytes())
            .context("Failed to write to stdout")?;
        report_failures(output.diagram_failures(), cli.quiet);
        return Ok(());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let output_path = resolve_output(&cli.output, &source)?;
    let output = convert(&markup, &config)
        .await
        .context("Conversion failed")?;
    write_atomic(&output_path, &output.document)
        .await
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    if cli.json {
        let json = serde_json::json!({
            "output": output_path,
            "diagnostics": output.diagnostics,
            "stats": output.stats,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).context("Failed to serialise output")?
        );
    }

    // Failures are listed even with a progress bar, which only showed the
    // first line of each.
    report_failures(output.diagram_failures(), cli.quiet);
    if !cli.quiet {
        print_summary(&output.stats, &output_path);
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let separator: ExerciseSeparator = cli.separator.parse().context("Invalid --separator")?;
    let fallback = match cli.fallback_rasterizer.trim() {
        "" | "none" => None,
        program => Some(program.to_string()),
    };

    let mut builder = ConversionConfig::builder()
        .title(cli.title.clone())
        .exercise_label(cli.exercise_label.clone())
        .solution_label(cli.solution_label.clone())
        .separator(separator)
        .render_diagrams(!cli.no_diagrams)
        .compiler(cli.compiler.clone())
        .rasterizer(cli.rasterizer.clone())
        .fallback_rasterizer(fallback)
        .dpi(cli.dpi)
        .tool_timeout_secs(cli.timeout)
        .image_width_inches(cli.width);

    if cli.no_title {
        builder = builder.no_title();
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `-o` if given, else the input path with a `.docx` extension.
fn resolve_output(output: &Option<PathBuf>, source: &InputSource) -> Result<PathBuf> {
    match (output, source) {
        (Some(path), _) => Ok(path.clone()),
        (None, InputSource::File(path)) => Ok(path.with_extension("docx")),
        (None, InputSource::Stdin) => {
            anyhow::bail!("Reading from stdin needs an explicit --output path")
        }
    }
}

fn report_failures<'a>(failures: impl Iterator<Item = (usize, &'a DiagramError)>, quiet: bool) {
    if quiet {
        return;
    }
    for (number, error) in failures {
        eprintln!("{} exercise {}: {}", red("diagram failed:"), number, error);
    }
}

fn print_summary(stats: &ConversionStats, path: &Path) {
    eprintln!(
        "{}  {} exercises  {} diagrams  {}ms  →  {}",
        if stats.diagrams_failed == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        stats.exercises,
        stats.diagrams_rendered,
        stats.duration_ms,
        bold(&path.display().to_string()),
    );
    if stats.diagrams_failed > 0 {
        eprintln!(
            "   {} diagrams failed  /  {}ms in the TeX toolchain",
            red(&stats.diagrams_failed.to_string()),
            dim(&stats.diagram_duration_ms.to_string()),
        );
    }
}
