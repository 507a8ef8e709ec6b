//! TikZ → PNG through the external LaTeX toolchain.
//!
//! ```text
//! Init ──► Compiling ──► Rasterizing ──► Done
//!              │              │
//!              │              └─► Fallback ──► Done
//!              ▼                     │
//!            Failed ◄────────────────┘
//! ```
//!
//! Each diagram is wrapped in a `standalone` document, compiled with
//! `pdflatex` and rasterised with `pdftoppm`; ImageMagick's `convert` is
//! tried once if `pdftoppm` produced nothing. Every step is a child process
//! bounded by the configured timeout and spawned with `kill_on_drop`, so a
//! timeout (or dropping the conversion future) never leaves a stray
//! `pdflatex` behind.
//!
//! All files live in the run's [`Workspace`], a `TempDir` removed when the
//! run ends however it ends. Failures are per diagram: they come back as a
//! [`DiagramError`] inside [`RenderedDiagram::outcome`], never as `Err`.

use crate::config::ToolchainConfig;
use crate::error::{DiagramError, Tex2DocxError};
use crate::model::DiagramSource;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Lines of compiler stdout kept when no `!` error line is found.
const LOG_TAIL_LINES: usize = 20;

// ── Workspace ────────────────────────────────────────────────────────────

/// Scoped working directory for one conversion run.
///
/// Deleted on drop, including early `?` returns and cancellation.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn create() -> Result<Self, Tex2DocxError> {
        let dir = tempfile::Builder::new()
            .prefix("tex2docx-")
            .tempdir()
            .map_err(|e| Tex2DocxError::WorkspaceFailed { source: e })?;
        debug!("Workspace at {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

// ── Results ──────────────────────────────────────────────────────────────

/// Outcome of rendering one diagram.
#[derive(Debug)]
pub struct RenderedDiagram {
    /// Caller-chosen name, e.g. `exercise-3`.
    pub identity: String,
    /// Hash of the TikZ source; also part of the artifact directory name.
    pub source_hash: u64,
    /// PNG inside the workspace, or why there is none.
    pub outcome: Result<PathBuf, DiagramError>,
}

impl RenderedDiagram {
    pub fn image(&self) -> Option<&Path> {
        self.outcome.as_ref().ok().map(PathBuf::as_path)
    }
}

/// Stable-within-a-run hash of a diagram source.
pub fn source_hash(source: &DiagramSource) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

/// The standalone document handed to the compiler.
pub fn wrap_standalone(source: &DiagramSource, preamble: &[String]) -> String {
    let mut doc = String::from(
        "\\documentclass[border=5pt]{standalone}\n\
         \\usepackage{tikz}\n\
         \\usepackage{amsmath}\n\
         \\usepackage{amssymb}\n",
    );
    for line in preamble {
        doc.push_str(line);
        doc.push('\n');
    }
    doc.push_str("\\begin{document}\n");
    doc.push_str(source.as_str());
    doc.push_str("\n\\end{document}\n");
    doc
}

// ── State machine ────────────────────────────────────────────────────────

/// Where one diagram is in the toolchain.
#[derive(Debug)]
enum RenderState {
    Init,
    Compiling { tex: PathBuf },
    Rasterizing { pdf: PathBuf },
    /// The primary rasterizer failed; `primary` is reported if the fallback
    /// is unavailable.
    Fallback { pdf: PathBuf, primary: DiagramError },
    Done(PathBuf),
    Failed(DiagramError),
}

/// Renders diagrams into a [`Workspace`] with a fixed toolchain.
#[derive(Debug)]
pub struct DiagramRenderer {
    workspace: Workspace,
    toolchain: ToolchainConfig,
}

impl DiagramRenderer {
    pub fn new(workspace: Workspace, toolchain: ToolchainConfig) -> Self {
        Self {
            workspace,
            toolchain,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Run one diagram through the toolchain.
    pub async fn render(&self, source: &DiagramSource, identity: &str) -> RenderedDiagram {
        let source_hash = source_hash(source);
        let dir = self
            .workspace
            .path()
            .join(format!("{identity}-{source_hash:016x}"));

        let mut state = RenderState::Init;
        let outcome = loop {
            debug!("{}: {:?}", identity, state);
            state = match state {
                RenderState::Init => self.prepare(source, &dir).await,
                RenderState::Compiling { tex } => self.compile(&tex, &dir).await,
                RenderState::Rasterizing { pdf } => self.rasterize(&pdf, &dir).await,
                RenderState::Fallback { pdf, primary } => {
                    self.rasterize_fallback(&pdf, &dir, primary).await
                }
                RenderState::Done(png) => break Ok(png),
                RenderState::Failed(e) => break Err(e),
            };
        };

        match &outcome {
            Ok(png) => info!("{}: rendered {}", identity, png.display()),
            Err(e) => warn!("{}: diagram skipped ({})", identity, e.kind()),
        }

        RenderedDiagram {
            identity: identity.to_string(),
            source_hash,
            outcome,
        }
    }

    async fn prepare(&self, source: &DiagramSource, dir: &Path) -> RenderState {
        let tex = dir.join("diagram.tex");
        let written = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&tex, wrap_standalone(source, &self.toolchain.preamble)).await?;
            Ok::<_, std::io::Error>(())
        };
        match written.await {
            Ok(()) => RenderState::Compiling { tex },
            Err(e) => RenderState::Failed(DiagramError::Io {
                detail: format!("{}: {e}", tex.display()),
            }),
        }
    }

    async fn compile(&self, tex: &Path, dir: &Path) -> RenderState {
        let compiler = &self.toolchain.compiler;
        let program = match resolve_tool(compiler) {
            Ok(p) => p,
            Err(e) => return RenderState::Failed(e),
        };

        let mut cmd = Command::new(&program);
        cmd.arg("-interaction=nonstopmode")
            .arg("-halt-on-error")
            .arg("-output-directory")
            .arg(dir)
            .arg(tex);

        let run = match self.run(cmd, compiler, dir).await {
            Ok(run) => run,
            Err(e) => return RenderState::Failed(e),
        };

        let pdf = tex.with_extension("pdf");
        if run.status.success() && pdf.is_file() {
            RenderState::Rasterizing { pdf }
        } else {
            RenderState::Failed(DiagramError::CompileFailed {
                diagnostics: compile_diagnostics(&run, compiler),
            })
        }
    }

    async fn rasterize(&self, pdf: &Path, dir: &Path) -> RenderState {
        let rasterizer = &self.toolchain.rasterizer;
        let prefix = dir.join("diagram");
        let png = prefix.with_extension("png");

        let primary = match resolve_tool(rasterizer) {
            Err(e) => e,
            Ok(program) => {
                let mut cmd = Command::new(&program);
                cmd.arg("-png")
                    .arg("-r")
                    .arg(self.toolchain.dpi.to_string())
                    .arg("-singlefile")
                    .arg(pdf)
                    .arg(&prefix);
                match self.run(cmd, rasterizer, dir).await {
                    Ok(_) if png.is_file() => return RenderState::Done(png),
                    Ok(run) => DiagramError::RasterizeFailed {
                        detail: describe_failure(rasterizer, &run),
                    },
                    Err(e) => e,
                }
            }
        };

        RenderState::Fallback {
            pdf: pdf.to_path_buf(),
            primary,
        }
    }

    async fn rasterize_fallback(
        &self,
        pdf: &Path,
        dir: &Path,
        primary: DiagramError,
    ) -> RenderState {
        let Some(fallback) = self.toolchain.fallback_rasterizer.as_deref() else {
            return RenderState::Failed(primary);
        };
        let program = match resolve_tool(fallback) {
            Ok(p) => p,
            Err(_) => {
                debug!("Fallback rasterizer '{}' not available", fallback);
                return RenderState::Failed(primary);
            }
        };
        debug!("Primary rasterizer failed ({}); trying '{}'", primary, fallback);

        let png = dir.join("diagram-fallback.png");
        let mut cmd = Command::new(&program);
        cmd.arg("-density")
            .arg(self.toolchain.dpi.to_string())
            .arg(pdf)
            .arg(&png);

        match self.run(cmd, fallback, dir).await {
            Ok(_) if png.is_file() => RenderState::Done(png),
            Ok(run) => RenderState::Failed(DiagramError::RasterizeFailed {
                detail: format!("{primary}; fallback: {}", describe_failure(fallback, &run)),
            }),
            Err(e) => RenderState::Failed(e),
        }
    }

    /// Run a child process to completion inside `dir`, bounded by the
    /// toolchain timeout. The child is killed if the timeout fires.
    async fn run(
        &self,
        mut cmd: Command,
        tool: &str,
        dir: &Path,
    ) -> Result<ToolRun, DiagramError> {
        let secs = self.toolchain.tool_timeout_secs;
        cmd.current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match tokio::time::timeout(Duration::from_secs(secs), cmd.output()).await {
            Ok(Ok(output)) => {
                debug!("'{}' exited with {}", tool, output.status);
                Ok(ToolRun {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
            Ok(Err(e)) => Err(DiagramError::Io {
                detail: format!("failed to launch '{tool}': {e}"),
            }),
            Err(_) => Err(DiagramError::TimedOut {
                tool: tool.to_string(),
                secs,
            }),
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

#[derive(Debug)]
struct ToolRun {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

fn resolve_tool(name: &str) -> Result<PathBuf, DiagramError> {
    which::which(name).map_err(|_| DiagramError::ToolNotFound {
        tool: name.to_string(),
    })
}

/// The useful part of a failed compile: TeX's `!` error lines with the line
/// after each (usually `l.12 …`), else stderr, else the tail of stdout.
/// Never empty.
fn compile_diagnostics(run: &ToolRun, compiler: &str) -> String {
    let lines: Vec<&str> = run.stdout.lines().collect();
    let errors: Vec<&str> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.starts_with('!'))
        .flat_map(|(i, _)| lines[i..lines.len().min(i + 2)].iter().copied())
        .collect();
    if !errors.is_empty() {
        return errors.join("\n");
    }

    let stderr = run.stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }

    let tail = &lines[lines.len().saturating_sub(LOG_TAIL_LINES)..];
    let tail = tail.join("\n");
    if !tail.trim().is_empty() {
        return tail.trim().to_string();
    }

    if run.status.success() {
        format!("'{compiler}' produced no PDF")
    } else {
        format!("'{compiler}' exited with {}", run.status)
    }
}

fn describe_failure(tool: &str, run: &ToolRun) -> String {
    let stderr = run.stderr.trim();
    match (run.status.success(), stderr.is_empty()) {
        (true, _) => format!("'{tool}' produced no image"),
        (false, true) => format!("'{tool}' exited with {}", run.status),
        (false, false) => format!("'{tool}' exited with {}: {stderr}", run.status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> DiagramSource {
        DiagramSource("\\begin{tikzpicture}\\draw (0,0) -- (1,1);\\end{tikzpicture}".into())
    }

    fn toolchain(compiler: &str, rasterizer: &str, fallback: Option<&str>) -> ToolchainConfig {
        ToolchainConfig {
            compiler: compiler.into(),
            rasterizer: rasterizer.into(),
            fallback_rasterizer: fallback.map(String::from),
            tool_timeout_secs: 5,
            ..ToolchainConfig::default()
        }
    }

    #[test]
    fn wrapper_is_standalone_with_preamble() {
        let doc = wrap_standalone(&source(), &["\\usetikzlibrary{calc}".to_string()]);
        assert!(doc.starts_with("\\documentclass[border=5pt]{standalone}"));
        assert!(doc.contains("\\usepackage{amssymb}\n\\usetikzlibrary{calc}\n\\begin{document}"));
        assert!(doc.contains(source().as_str()));
        assert!(doc.trim_end().ends_with("\\end{document}"));
    }

    #[test]
    fn hash_depends_on_source() {
        let other = DiagramSource("\\begin{tikzpicture}\\end{tikzpicture}".into());
        assert_eq!(source_hash(&source()), source_hash(&source()));
        assert_ne!(source_hash(&source()), source_hash(&other));
    }

    #[tokio::test]
    async fn missing_compiler_is_tool_not_found() {
        let renderer = DiagramRenderer::new(
            Workspace::create().unwrap(),
            toolchain("tex2docx-no-such-compiler", "pdftoppm", None),
        );
        let rendered = renderer.render(&source(), "exercise-1").await;
        assert_eq!(
            rendered.outcome,
            Err(DiagramError::ToolNotFound {
                tool: "tex2docx-no-such-compiler".into()
            })
        );
        assert!(rendered.image().is_none());
    }

    #[tokio::test]
    async fn workspace_is_removed_on_drop() {
        let ws = Workspace::create().unwrap();
        let path = ws.path().to_path_buf();
        assert!(path.is_dir());
        drop(ws);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    mod fake_tools {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, name: &str, body: &str) -> String {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        // Writes `<last arg minus .tex>.pdf`.
        const GOOD_COMPILER: &str = r#"for a; do last="$a"; done; printf '%%PDF-1.4' > "${last%.tex}.pdf""#;
        // Writes `<last arg>.png`.
        const GOOD_PDFTOPPM: &str = r#"for a; do last="$a"; done; printf 'png' > "$last.png""#;
        // Writes `<last arg>`.
        const GOOD_CONVERT: &str = r#"for a; do last="$a"; done; printf 'png' > "$last""#;

        #[tokio::test]
        async fn happy_path_reaches_done() {
            let bin = tempfile::tempdir().unwrap();
            let renderer = DiagramRenderer::new(
                Workspace::create().unwrap(),
                toolchain(
                    &script(bin.path(), "pdflatex", GOOD_COMPILER),
                    &script(bin.path(), "pdftoppm", GOOD_PDFTOPPM),
                    None,
                ),
            );
            let rendered = renderer.render(&source(), "exercise-1").await;
            let png = rendered.image().expect("rendered");
            assert!(png.starts_with(renderer.workspace().path()));
            assert_eq!(png.file_name().unwrap(), "diagram.png");
        }

        #[tokio::test]
        async fn compile_error_carries_tex_error_lines() {
            let bin = tempfile::tempdir().unwrap();
            let compiler = script(
                bin.path(),
                "pdflatex",
                "echo 'This is pdfTeX'\necho '! Undefined control sequence.'\necho 'l.7 drwa'\nexit 1",
            );
            let renderer = DiagramRenderer::new(
                Workspace::create().unwrap(),
                toolchain(&compiler, "pdftoppm", None),
            );
            let rendered = renderer.render(&source(), "exercise-2").await;
            match rendered.outcome {
                Err(DiagramError::CompileFailed { diagnostics }) => {
                    assert_eq!(diagnostics, "! Undefined control sequence.\nl.7 drwa");
                }
                other => panic!("expected CompileFailed, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn silent_compile_failure_still_has_diagnostics() {
            let bin = tempfile::tempdir().unwrap();
            let compiler = script(bin.path(), "pdflatex", "exit 3");
            let renderer = DiagramRenderer::new(
                Workspace::create().unwrap(),
                toolchain(&compiler, "pdftoppm", None),
            );
            match renderer.render(&source(), "exercise-3").await.outcome {
                Err(DiagramError::CompileFailed { diagnostics }) => {
                    assert!(!diagnostics.is_empty());
                    assert!(diagnostics.contains("exited with"), "got: {diagnostics}");
                }
                other => panic!("expected CompileFailed, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn slow_compiler_times_out() {
            let bin = tempfile::tempdir().unwrap();
            let compiler = script(bin.path(), "pdflatex", "sleep 10");
            let mut tc = toolchain(&compiler, "pdftoppm", None);
            tc.tool_timeout_secs = 1;
            let renderer = DiagramRenderer::new(Workspace::create().unwrap(), tc);
            let rendered = renderer.render(&source(), "exercise-4").await;
            assert!(matches!(
                rendered.outcome,
                Err(DiagramError::TimedOut { secs: 1, .. })
            ));
        }

        #[tokio::test]
        async fn fallback_runs_when_primary_produces_nothing() {
            let bin = tempfile::tempdir().unwrap();
            let renderer = DiagramRenderer::new(
                Workspace::create().unwrap(),
                toolchain(
                    &script(bin.path(), "pdflatex", GOOD_COMPILER),
                    &script(bin.path(), "pdftoppm", "exit 0"),
                    Some(&script(bin.path(), "convert", GOOD_CONVERT)),
                ),
            );
            let rendered = renderer.render(&source(), "exercise-5").await;
            let png = rendered.image().expect("fallback image");
            assert_eq!(png.file_name().unwrap(), "diagram-fallback.png");
        }

        #[tokio::test]
        async fn both_rasterizers_failing_is_rasterize_failed() {
            let bin = tempfile::tempdir().unwrap();
            let renderer = DiagramRenderer::new(
                Workspace::create().unwrap(),
                toolchain(
                    &script(bin.path(), "pdflatex", GOOD_COMPILER),
                    &script(bin.path(), "pdftoppm", "echo 'Syntax Error' >&2; exit 1"),
                    Some(&script(bin.path(), "convert", "exit 1")),
                ),
            );
            match renderer.render(&source(), "exercise-6").await.outcome {
                Err(DiagramError::RasterizeFailed { detail }) => {
                    assert!(detail.contains("Syntax Error"), "got: {detail}");
                    assert!(detail.contains("fallback"), "got: {detail}");
                }
                other => panic!("expected RasterizeFailed, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn missing_rasterizer_without_fallback_is_tool_not_found() {
            let bin = tempfile::tempdir().unwrap();
            let renderer = DiagramRenderer::new(
                Workspace::create().unwrap(),
                toolchain(
                    &script(bin.path(), "pdflatex", GOOD_COMPILER),
                    "tex2docx-no-such-rasterizer",
                    None,
                ),
            );
            assert_eq!(
                renderer.render(&source(), "exercise-7").await.outcome,
                Err(DiagramError::ToolNotFound {
                    tool: "tex2docx-no-such-rasterizer".into()
                })
            );
        }
    }
}
