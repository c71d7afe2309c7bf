//! Configuration for the render pipeline.
//!
//! Process-wide defaults (bundled templates, default output directory, tool
//! locations) live in [`ForgeConfig`]; the environment is consulted once, in
//! [`ForgeConfig::from_env`]. Per-call choices go in [`RenderOptions`].

use std::env;
use std::path::{Path, PathBuf};

/// Environment variable naming the directory the default `out.pdf` lands in.
pub const OUTPUT_DIR_ENV: &str = "FORGE_OUTPUT_DIR";

/// Top-level document template, relative to the template root.
pub const DOCUMENT_TEMPLATE: &str = "src/template.html";

/// Bundled input stylesheet, relative to the template root.
pub const BASE_STYLESHEET: &str = "src/base.css";

pub const HTML_FILE: &str = "out.html";
pub const CSS_FILE: &str = "out.css";
pub const PDF_FILE: &str = "out.pdf";

/// Physical page the browser prints onto.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSetup {
    pub width_mm: f64,
    pub height_mm: f64,
    pub scale: f64,
    pub print_background: bool,
}

impl PageSetup {
    /// ISO A4 portrait (210mm × 297mm) at scale 1.0.
    pub fn a4() -> Self {
        Self {
            width_mm: 210.0,
            height_mm: 297.0,
            scale: 1.0,
            print_background: true,
        }
    }

    pub fn width_in(&self) -> f64 {
        self.width_mm / 25.4
    }

    pub fn height_in(&self) -> f64 {
        self.height_mm / 25.4
    }
}

impl Default for PageSetup {
    fn default() -> Self {
        Self::a4()
    }
}

#[derive(Debug, Clone)]
pub struct ForgeConfig {
    /// Root of the bundled templates (`src/template.html`, `src/partials/`, `src/base.css`).
    pub template_root: PathBuf,
    /// Extra template search roots, consulted after `template_root` in order.
    /// Defaults to the working directory so caller-local templates resolve.
    pub extra_template_roots: Vec<PathBuf>,
    /// Build directory used when [`RenderOptions::build_dir`] is unset.
    pub build_dir: PathBuf,
    /// Directory of the default `out.pdf`.
    pub output_dir: PathBuf,
    /// `tailwindcss` executable.
    pub tailwind_program: PathBuf,
    /// Arguments placed before the compiler's own (`npx` style launchers).
    pub tailwind_args: Vec<String>,
    /// Browser tried when no executable can be auto-resolved.
    pub browser_fallback: PathBuf,
    pub page: PageSetup,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            template_root: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/templates")),
            build_dir: cwd.join("build"),
            extra_template_roots: vec![cwd],
            output_dir: PathBuf::from("."),
            tailwind_program: PathBuf::from("tailwindcss"),
            tailwind_args: Vec::new(),
            browser_fallback: PathBuf::from("/usr/bin/chromium"),
            page: PageSetup::a4(),
        }
    }
}

impl ForgeConfig {
    /// Defaults, with `FORGE_OUTPUT_DIR` applied when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = env::var_os(OUTPUT_DIR_ENV).filter(|v| !v.is_empty()) {
            log::debug!("default output directory from {OUTPUT_DIR_ENV}: {dir:?}");
            config.output_dir = PathBuf::from(dir);
        }
        config
    }

    pub fn with_template_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.template_root = root.into();
        self
    }

    pub fn with_extra_template_roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.extra_template_roots = roots.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_tailwind_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.tailwind_program = program.into();
        self
    }

    /// Run the CSS toolchain as `program args.. -i .. -o ..`.
    pub fn with_tailwind_command<I, S>(mut self, program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tailwind_program = program.into();
        self.tailwind_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_browser_fallback(mut self, path: impl Into<PathBuf>) -> Self {
        self.browser_fallback = path.into();
        self
    }

    /// Search roots in lookup order: bundled root first, then the extras.
    pub fn template_roots(&self) -> Vec<PathBuf> {
        std::iter::once(self.template_root.clone())
            .chain(self.extra_template_roots.iter().cloned())
            .collect()
    }

    pub fn document_template(&self) -> PathBuf {
        self.template_root.join(DOCUMENT_TEMPLATE)
    }

    pub fn base_stylesheet(&self) -> PathBuf {
        self.template_root.join(BASE_STYLESHEET)
    }

    pub fn default_output(&self) -> PathBuf {
        self.output_dir.join(PDF_FILE)
    }
}

/// Per-render choices; unset fields fall back to [`ForgeConfig`].
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub build_dir: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub css: Option<PathBuf>,
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.build_dir = Some(dir.into());
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn css(mut self, path: impl Into<PathBuf>) -> Self {
        self.css = Some(path.into());
        self
    }

    pub fn resolved_build_dir<'a>(&'a self, config: &'a ForgeConfig) -> &'a Path {
        self.build_dir.as_deref().unwrap_or(&config.build_dir)
    }

    pub fn resolved_output(&self, config: &ForgeConfig) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| config.default_output())
    }

    pub fn resolved_stylesheet(&self, config: &ForgeConfig) -> PathBuf {
        self.css
            .clone()
            .unwrap_or_else(|| config.base_stylesheet())
    }
}
