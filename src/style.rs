//! Stylesheet compilation – runs the CSS toolchain over the generated markup.
//!
//! The toolchain purges utility classes that do not appear in the content
//! files, so it has to run after the markup has been written.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{ForgeError, Result};

/// One compilation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleJob {
    /// Input stylesheet (bundled base or caller supplied).
    pub input: PathBuf,
    /// Compiled stylesheet to write.
    pub output: PathBuf,
    /// Globs of files scanned for used classes.
    pub content: Vec<String>,
}

pub trait StyleCompiler: Send + Sync {
    fn compile(&self, job: &StyleJob) -> Result<()>;
}

/// The `tailwindcss` command-line compiler.
#[derive(Debug, Clone)]
pub struct TailwindCli {
    program: PathBuf,
    leading_args: Vec<String>,
    minify: bool,
}

impl TailwindCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            minify: false,
        }
    }

    /// Arguments placed before the compiler's own, e.g. `npx tailwindcss`.
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, job: &StyleJob) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args);
        cmd.arg("-i").arg(&job.input).arg("-o").arg(&job.output);
        if !job.content.is_empty() {
            cmd.arg("--content").arg(job.content.join(","));
        }
        if self.minify {
            cmd.arg("--minify");
        }
        cmd
    }
}

impl Default for TailwindCli {
    fn default() -> Self {
        Self::new("tailwindcss")
    }
}

impl StyleCompiler for TailwindCli {
    fn compile(&self, job: &StyleJob) -> Result<()> {
        if !job.input.is_file() {
            return Err(ForgeError::StyleCompilation {
                status: "not started".into(),
                diagnostics: format!("input stylesheet '{}' does not exist", job.input.display()),
            });
        }

        let mut cmd = self.command(job);
        log::debug!("running {cmd:?}");
        let output = cmd.output().map_err(|e| ForgeError::StyleCompilation {
            status: "not started".into(),
            diagnostics: format!("could not run '{}': {e}", self.program.display()),
        })?;

        let diagnostics = Diagnostics {
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        };

        if !output.status.success() {
            return Err(ForgeError::StyleCompilation {
                status: output.status.to_string(),
                diagnostics: diagnostics.to_string(),
            });
        }

        // Exit 0 without a stylesheet still leaves the browser unstyled.
        match fs::metadata(&job.output) {
            Ok(meta) if meta.len() > 0 => {}
            _ => {
                return Err(ForgeError::StyleCompilation {
                    status: output.status.to_string(),
                    diagnostics: format!(
                        "'{}' missing or empty after compilation; {diagnostics}",
                        job.output.display()
                    ),
                })
            }
        }

        if !diagnostics.stderr.trim().is_empty() {
            log::debug!("tailwindcss: {}", diagnostics.stderr.trim());
        }
        Ok(())
    }
}

struct Diagnostics {
    stderr: String,
    stdout: String,
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stderr = self.stderr.trim();
        let stdout = self.stdout.trim();
        match (stderr.is_empty(), stdout.is_empty()) {
            (true, true) => f.write_str("no diagnostic output"),
            (false, true) => f.write_str(stderr),
            (true, false) => f.write_str(stdout),
            (false, false) => write!(f, "{stderr}\n{stdout}"),
        }
    }
}
