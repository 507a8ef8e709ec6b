//! Configuration types for exercise-to-Word conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The parser itself takes no options:
//! what varies between runs is presentation (title, labels, separators) and
//! the external diagram toolchain.

use crate::error::Tex2DocxError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for a conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use tex2docx::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .title("Bài tập")
///     .exercise_label("Câu")
///     .solution_label("Lời giải:")
///     .dpi(200)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Centered heading at the top of the document. `None` omits it.
    /// Default: `"Exercises"`.
    pub title: Option<String>,

    /// Exercise heading prefix; the heading reads `"{label} {n}"`.
    /// Default: `"Exercise"`.
    pub exercise_label: String,

    /// Bold marker paragraph before the solution. Default: `"Solution"`.
    pub solution_label: String,

    /// What goes between two exercises. Default: two blank paragraphs.
    pub separator: ExerciseSeparator,

    /// Run the diagram toolchain. Default: true.
    ///
    /// When false, diagrams are reported as present but never compiled, and
    /// no working directory is created.
    pub render_diagrams: bool,

    /// External tools used to turn TikZ into a bitmap.
    pub toolchain: ToolchainConfig,

    /// Width of embedded diagrams, in inches. Range: 0.5–8.0. Default: 3.0.
    pub image_width_inches: f32,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            title: Some("Exercises".to_string()),
            exercise_label: "Exercise".to_string(),
            solution_label: "Solution".to_string(),
            separator: ExerciseSeparator::default(),
            render_diagrams: true,
            toolchain: ToolchainConfig::default(),
            image_width_inches: 3.0,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("title", &self.title)
            .field("exercise_label", &self.exercise_label)
            .field("solution_label", &self.solution_label)
            .field("separator", &self.separator)
            .field("render_diagrams", &self.render_diagrams)
            .field("toolchain", &self.toolchain)
            .field("image_width_inches", &self.image_width_inches)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn no_title(mut self) -> Self {
        self.config.title = None;
        self
    }

    pub fn exercise_label(mut self, label: impl Into<String>) -> Self {
        self.config.exercise_label = label.into();
        self
    }

    pub fn solution_label(mut self, label: impl Into<String>) -> Self {
        self.config.solution_label = label.into();
        self
    }

    pub fn separator(mut self, sep: ExerciseSeparator) -> Self {
        self.config.separator = sep;
        self
    }

    pub fn render_diagrams(mut self, v: bool) -> Self {
        self.config.render_diagrams = v;
        self
    }

    pub fn toolchain(mut self, toolchain: ToolchainConfig) -> Self {
        self.config.toolchain = toolchain;
        self
    }

    pub fn compiler(mut self, program: impl Into<String>) -> Self {
        self.config.toolchain.compiler = program.into();
        self
    }

    pub fn rasterizer(mut self, program: impl Into<String>) -> Self {
        self.config.toolchain.rasterizer = program.into();
        self
    }

    /// `None` disables the fallback.
    pub fn fallback_rasterizer(mut self, program: Option<String>) -> Self {
        self.config.toolchain.fallback_rasterizer = program;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.toolchain.dpi = dpi;
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.toolchain.tool_timeout_secs = secs;
        self
    }

    /// Extra preamble line for the standalone wrapper (e.g. `\usepackage{tkz-euclide}`).
    pub fn preamble_line(mut self, line: impl Into<String>) -> Self {
        self.config.toolchain.preamble.push(line.into());
        self
    }

    pub fn image_width_inches(mut self, inches: f32) -> Self {
        self.config.image_width_inches = inches;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Tex2DocxError> {
        let c = &self.config;
        let t = &c.toolchain;
        if t.dpi < 72 || t.dpi > 1200 {
            return Err(Tex2DocxError::InvalidConfig(format!(
                "DPI must be 72–1200, got {}",
                t.dpi
            )));
        }
        if t.tool_timeout_secs == 0 {
            return Err(Tex2DocxError::InvalidConfig(
                "Tool timeout must be ≥ 1 second".into(),
            ));
        }
        if t.compiler.trim().is_empty() || t.rasterizer.trim().is_empty() {
            return Err(Tex2DocxError::InvalidConfig(
                "Compiler and rasterizer must be non-empty".into(),
            ));
        }
        if !(0.5..=8.0).contains(&c.image_width_inches) {
            return Err(Tex2DocxError::InvalidConfig(format!(
                "Image width must be 0.5–8.0 inches, got {}",
                c.image_width_inches
            )));
        }
        if c.exercise_label.trim().is_empty() {
            return Err(Tex2DocxError::InvalidConfig(
                "Exercise label must be non-empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Toolchain ────────────────────────────────────────────────────────────

/// The external programs behind diagram rendering.
///
/// Programs are looked up by name on `PATH` (or used as given when they
/// contain a path separator) at the moment a diagram is rendered, so a
/// missing tool only affects the exercises that actually have diagrams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolchainConfig {
    /// LaTeX compiler. Default: `pdflatex`.
    pub compiler: String,
    /// PDF → PNG rasterizer, poppler's CLI. Default: `pdftoppm`.
    pub rasterizer: String,
    /// Tried once when the rasterizer produced nothing. Default: ImageMagick's `convert`.
    pub fallback_rasterizer: Option<String>,
    /// Rasterisation density. Range: 72–1200. Default: 300.
    pub dpi: u32,
    /// Per-process timeout in seconds. Default: 30.
    pub tool_timeout_secs: u64,
    /// Extra lines placed in the standalone wrapper's preamble, after the
    /// built-in `tikz` / `amsmath` / `amssymb` packages.
    pub preamble: Vec<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            compiler: "pdflatex".to_string(),
            rasterizer: "pdftoppm".to_string(),
            fallback_rasterizer: Some("convert".to_string()),
            dpi: 300,
            tool_timeout_secs: 30,
            preamble: vec![
                r"\usetikzlibrary{arrows.meta,calc,angles,quotes,intersections,patterns}"
                    .to_string(),
            ],
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How consecutive exercises are separated in the document.
///
/// Never emitted after the last exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExerciseSeparator {
    /// `n` empty paragraphs. Default: 2.
    BlankLines(usize),
    /// A hard page break.
    PageBreak,
    /// A paragraph holding the given text (e.g. `"* * *"`).
    Custom(String),
}

impl Default for ExerciseSeparator {
    fn default() -> Self {
        ExerciseSeparator::BlankLines(2)
    }
}

impl std::str::FromStr for ExerciseSeparator {
    type Err = Tex2DocxError;

    /// `"page"`, a number of blank lines (`"2"`), or `"text:…"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("page") {
            return Ok(ExerciseSeparator::PageBreak);
        }
        if let Some(text) = s.strip_prefix("text:") {
            return Ok(ExerciseSeparator::Custom(text.to_string()));
        }
        s.parse::<usize>()
            .map(ExerciseSeparator::BlankLines)
            .map_err(|_| {
                Tex2DocxError::InvalidConfig(format!(
                    "Separator must be 'page', a number, or 'text:…', got '{s}'"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ConversionConfig::builder().build().unwrap();
        assert_eq!(config.toolchain.dpi, 300);
        assert_eq!(config.toolchain.compiler, "pdflatex");
        assert_eq!(config.separator, ExerciseSeparator::BlankLines(2));
        assert_eq!(config.title.as_deref(), Some("Exercises"));
    }

    #[test]
    fn dpi_out_of_range_is_rejected() {
        let err = ConversionConfig::builder().dpi(10).build().unwrap_err();
        assert!(matches!(err, Tex2DocxError::InvalidConfig(_)));
        assert!(ConversionConfig::builder().dpi(2400).build().is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(ConversionConfig::builder()
            .tool_timeout_secs(0)
            .build()
            .is_err());
    }

    #[test]
    fn image_width_is_bounded() {
        assert!(ConversionConfig::builder()
            .image_width_inches(12.0)
            .build()
            .is_err());
        assert!(ConversionConfig::builder()
            .image_width_inches(4.5)
            .build()
            .is_ok());
    }

    #[test]
    fn separator_parses() {
        assert_eq!("page".parse::<ExerciseSeparator>().unwrap(), ExerciseSeparator::PageBreak);
        assert_eq!("3".parse::<ExerciseSeparator>().unwrap(), ExerciseSeparator::BlankLines(3));
        assert_eq!(
            "text:* * *".parse::<ExerciseSeparator>().unwrap(),
            ExerciseSeparator::Custom("* * *".into())
        );
        assert!("sometimes".parse::<ExerciseSeparator>().is_err());
    }

    #[test]
    fn debug_hides_callback() {
        let cb: ProgressCallback = std::sync::Arc::new(crate::progress::NoopProgressCallback);
        let config = ConversionConfig::builder().progress_callback(cb).build().unwrap();
        let dbg = format!("{config:?}");
        assert!(dbg.contains("<dyn ConversionProgressCallback>"));
    }
}
