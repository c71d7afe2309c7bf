//! Pipeline – ties together markup generation, stylesheet compilation and
//! PDF printing into a single call.
//!
//! The stages run strictly in order and hand artifacts to each other through
//! the build directory: the CSS toolchain scans `out.html` for used classes,
//! and the browser loads `out.html`, which links `out.css`.

use std::env;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::{ForgeConfig, RenderOptions, CSS_FILE, HTML_FILE};
use crate::document::Document;
use crate::error::{ForgeError, RenderError, Result, Stage};
use crate::paths::relative_to;
use crate::print::{ChromePrinter, PdfPrinter};
use crate::style::{StyleCompiler, StyleJob, TailwindCli};
use crate::templates::generate_markup;

/// Marks a build directory as in use by a render.
pub const LOCK_FILE: &str = ".forge.lock";

/// Progress of one render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Init,
    MarkupGenerated,
    StyleCompiled,
    Printed,
    Done,
    Failed(Stage),
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderState::Init => f.write_str("init"),
            RenderState::MarkupGenerated => f.write_str("markup generated"),
            RenderState::StyleCompiled => f.write_str("style compiled"),
            RenderState::Printed => f.write_str("printed"),
            RenderState::Done => f.write_str("done"),
            RenderState::Failed(stage) => write!(f, "failed in {stage}"),
        }
    }
}

/// Files produced by a successful render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderReport {
    pub html: PathBuf,
    pub css: PathBuf,
    pub output: PathBuf,
    pub pdf_bytes: usize,
}

/// Renders documents with a fixed configuration and toolchain.
pub struct Renderer {
    config: ForgeConfig,
    style: Box<dyn StyleCompiler>,
    printer: Box<dyn PdfPrinter>,
}

impl Renderer {
    /// `tailwindcss` and headless Chromium, located as `config` says.
    pub fn new(config: ForgeConfig) -> Self {
        let style = TailwindCli::new(&config.tailwind_program)
            .with_leading_args(config.tailwind_args.iter().cloned());
        let printer = ChromePrinter::new(&config.browser_fallback);
        Self {
            config,
            style: Box::new(style),
            printer: Box::new(printer),
        }
    }

    pub fn with_style_compiler(mut self, style: impl StyleCompiler + 'static) -> Self {
        self.style = Box::new(style);
        self
    }

    pub fn with_printer(mut self, printer: impl PdfPrinter + 'static) -> Self {
        self.printer = Box::new(printer);
        self
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    /// Render `document` to a PDF.
    ///
    /// On failure the error names the stage; intermediate files stay in the
    /// build directory, and nothing is written at the output path.
    pub fn render(
        &self,
        document: &Document,
        options: &RenderOptions,
    ) -> std::result::Result<RenderReport, RenderError> {
        let mut state = RenderState::Init;
        let result = self.run(document, options, &mut state);
        match &result {
            Ok(report) => log::info!(
                "wrote '{}' ({} bytes)",
                report.output.display(),
                report.pdf_bytes
            ),
            Err(e) => {
                advance(&mut state, RenderState::Failed(e.stage));
                log::error!("render failed: {e}");
            }
        }
        result
    }

    fn run(
        &self,
        document: &Document,
        options: &RenderOptions,
        state: &mut RenderState,
    ) -> std::result::Result<RenderReport, RenderError> {
        let build_dir = options.resolved_build_dir(&self.config).to_path_buf();
        let output = options.resolved_output(&self.config);
        let html = build_dir.join(HTML_FILE);
        let css = build_dir.join(CSS_FILE);

        // ── Prepare ───────────────────────────────────────────────────────
        let stage = Stage::Prepare;
        fs::create_dir_all(&build_dir)
            .map_err(|e| fail(stage, ForgeError::io(&build_dir, e)))?;
        let _lock = BuildLock::acquire(&build_dir).map_err(|e| fail(stage, e))?;

        // ── Markup ────────────────────────────────────────────────────────
        let stage = Stage::Markup;
        let markup = generate_markup(document, &self.config, CSS_FILE).map_err(|e| fail(stage, e))?;
        fs::write(&html, markup).map_err(|e| fail(stage, ForgeError::io(&html, e)))?;
        advance(state, RenderState::MarkupGenerated);

        // ── Style ─────────────────────────────────────────────────────────
        let stage = Stage::Style;
        remove_stale(&css).map_err(|e| fail(stage, e))?;
        let job = StyleJob {
            input: options.resolved_stylesheet(&self.config),
            output: css.clone(),
            content: vec![content_glob(&build_dir).map_err(|e| fail(stage, e))?],
        };
        self.style.compile(&job).map_err(|e| fail(stage, e))?;
        advance(state, RenderState::StyleCompiled);

        // ── Print ─────────────────────────────────────────────────────────
        let stage = Stage::Print;
        let bytes = self
            .printer
            .print(&html, &self.config.page)
            .map_err(|e| fail(stage, e))?;
        advance(state, RenderState::Printed);
        persist(&output, &bytes).map_err(|e| fail(stage, e))?;
        advance(state, RenderState::Done);

        Ok(RenderReport {
            html,
            css,
            output,
            pdf_bytes: bytes.len(),
        })
    }
}

fn fail(stage: Stage, cause: ForgeError) -> RenderError {
    RenderError::new(stage, cause)
}

fn advance(state: &mut RenderState, next: RenderState) {
    log::info!("render: {state} -> {next}");
    *state = next;
}

/// Glob over the build directory's markup, relative to the working directory
/// the toolchain runs in.
fn content_glob(build_dir: &Path) -> Result<String> {
    let cwd = env::current_dir().map_err(|e| ForgeError::io(".", e))?;
    let cwd = fs::canonicalize(&cwd).map_err(|e| ForgeError::io(&cwd, e))?;
    let build_dir = fs::canonicalize(build_dir).map_err(|e| ForgeError::io(build_dir, e))?;

    let relative = relative_to(&build_dir, &cwd)?;
    let mut parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.push("*.html".to_string());
    Ok(parts.join("/"))
}

fn remove_stale(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ForgeError::io(path, e)),
    }
}

/// Write the PDF beside its destination, then move it into place.
fn persist(output: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| ForgeError::io(dir, e))?;

    let mut part = tempfile::Builder::new()
        .prefix(".forge-")
        .suffix(".pdf.part")
        .tempfile_in(dir)
        .map_err(|e| ForgeError::io(dir, e))?;
    part.write_all(bytes)
        .and_then(|()| part.as_file().sync_all())
        .map_err(|e| ForgeError::io(part.path(), e))?;
    part.persist(output)
        .map_err(|e| ForgeError::io(output, e.error))?;
    Ok(())
}

/// Exclusive claim on a build directory, released on drop.
struct BuildLock {
    path: PathBuf,
}

impl BuildLock {
    fn acquire(build_dir: &Path) -> Result<Self> {
        let path = build_dir.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                // The pid is informational, for whoever finds a stale lock.
                if let Err(e) = writeln!(file, "{}", std::process::id()) {
                    log::debug!("could not record pid in {}: {e}", path.display());
                }
                Ok(Self { path })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(ForgeError::BuildDirLocked(build_dir.to_path_buf()))
            }
            Err(e) => Err(ForgeError::io(&path, e)),
        }
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("could not release {}: {e}", self.path.display());
        }
    }
}
