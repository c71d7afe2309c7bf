//! Error types for path handling, the render stages and manifests.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures of [`crate::paths::relative_to`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("'{path}' and '{base}' have different anchors")]
    IncompatibleAnchors { path: PathBuf, base: PathBuf },

    #[error("'..' segment in '{base}' cannot be walked")]
    InvalidBasePath { base: PathBuf },
}

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("template '{template_id}' not found in any of {searched:?}")]
    TemplateResolution {
        template_id: String,
        searched: Vec<PathBuf>,
    },

    #[error("template rendering failed: {0}")]
    TemplateRender(String),

    #[error("component payload unavailable: {0}")]
    ComponentPayload(String),

    #[error("stylesheet compilation failed ({status}): {diagnostics}")]
    StyleCompilation { status: String, diagnostics: String },

    #[error("no usable browser: auto-resolution failed ({auto}); fallback '{fallback}' failed ({fallback_cause})")]
    BrowserLaunch {
        auto: String,
        fallback: PathBuf,
        fallback_cause: String,
    },

    #[error("PDF printing failed: {0}")]
    Print(String),

    #[error("build directory '{0}' is in use by another render (remove .forge.lock if stale)")]
    BuildDirLocked(PathBuf),

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid report manifest: {0}")]
    Manifest(String),
}

impl ForgeError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ForgeError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<tera::Error> for ForgeError {
    fn from(e: tera::Error) -> Self {
        // tera nests the useful message (missing variable, bad filter) in the source chain.
        let mut message = e.to_string();
        let mut source = std::error::Error::source(&e);
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = inner.source();
        }
        ForgeError::TemplateRender(message)
    }
}

impl From<serde_json::Error> for ForgeError {
    fn from(e: serde_json::Error) -> Self {
        ForgeError::Manifest(e.to_string())
    }
}

/// Pipeline stage a render failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Build directory setup and locking, before any artifact is written.
    Prepare,
    Markup,
    Style,
    Print,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Prepare => "prepare",
            Stage::Markup => "markup generation",
            Stage::Style => "stylesheet compilation",
            Stage::Print => "PDF printing",
        };
        f.write_str(name)
    }
}

/// The failure a caller of [`crate::Renderer::render`] receives.
#[derive(Debug, Error)]
#[error("{stage} failed: {cause}")]
pub struct RenderError {
    pub stage: Stage,
    #[source]
    pub cause: ForgeError,
}

impl RenderError {
    pub fn new(stage: Stage, cause: ForgeError) -> Self {
        Self { stage, cause }
    }
}

pub type Result<T, E = ForgeError> = std::result::Result<T, E>;
