//! PDF printing – drives headless Chromium over the DevTools protocol.
//!
//! A fresh browser is launched for every print and released when it is
//! dropped, whichever way the print ends.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

use headless_chrome::browser::default_executable;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};

use crate::config::PageSetup;
use crate::error::{ForgeError, Result};

pub trait PdfPrinter: Send + Sync {
    /// Print the HTML file at `html` and return the PDF bytes.
    fn print(&self, html: &Path, page: &PageSetup) -> Result<Vec<u8>>;
}

/// Headless Chromium printer.
///
/// The executable is auto-resolved first (`CHROME` variable, well-known
/// names on `PATH`); if that fails, `fallback` is launched instead.
#[derive(Debug, Clone)]
pub struct ChromePrinter {
    fallback: PathBuf,
    sandbox: bool,
    args: Vec<OsString>,
}

impl ChromePrinter {
    pub fn new(fallback: impl Into<PathBuf>) -> Self {
        Self {
            fallback: fallback.into(),
            sandbox: false,
            args: vec![OsString::from("--disable-dev-shm-usage")],
        }
    }

    /// Chromium's sandbox is off by default; containers rarely allow it.
    pub fn sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn launch(&self) -> Result<Browser> {
        launch_with(default_executable, |path| self.launch_at(path), &self.fallback)
    }

    fn launch_at(&self, executable: PathBuf) -> std::result::Result<Browser, String> {
        let args: Vec<&OsStr> = self.args.iter().map(OsString::as_os_str).collect();
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(self.sandbox)
            .path(Some(executable))
            .args(args)
            .build()
            .map_err(|e| e.to_string())?;
        Browser::new(options).map_err(|e| format!("{e:#}"))
    }
}

impl Default for ChromePrinter {
    fn default() -> Self {
        Self::new("/usr/bin/chromium")
    }
}

impl PdfPrinter for ChromePrinter {
    fn print(&self, html: &Path, page: &PageSetup) -> Result<Vec<u8>> {
        let url = file_url(html)?;
        let browser = self.launch()?;

        let tab = browser
            .new_tab()
            .map_err(|e| ForgeError::Print(format!("could not open a tab: {e:#}")))?;
        tab.navigate_to(&url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| ForgeError::Print(format!("could not load {url}: {e:#}")))?;

        let options = PrintToPdfOptions {
            paper_width: Some(page.width_in()),
            paper_height: Some(page.height_in()),
            scale: Some(page.scale),
            print_background: Some(page.print_background),
            ..Default::default()
        };
        let bytes = tab
            .print_to_pdf(Some(options))
            .map_err(|e| ForgeError::Print(format!("{e:#}")))?;

        check_payload(bytes)
    }
}

/// Two-strategy launch: the auto-resolved executable first, then `fallback`.
///
/// `launch` is tried on the fallback both when resolution fails and when the
/// resolved executable does not start.
pub fn launch_with<B, R, L>(resolve: R, launch: L, fallback: &Path) -> Result<B>
where
    R: FnOnce() -> std::result::Result<PathBuf, String>,
    L: Fn(PathBuf) -> std::result::Result<B, String>,
{
    let auto = resolve().and_then(|path| {
        log::debug!("launching browser at {}", path.display());
        launch(path)
    });

    match auto {
        Ok(browser) => Ok(browser),
        Err(auto_cause) => {
            log::warn!(
                "browser auto-resolution failed ({auto_cause}); falling back to {}",
                fallback.display()
            );
            launch(fallback.to_path_buf()).map_err(|fallback_cause| ForgeError::BrowserLaunch {
                auto: auto_cause,
                fallback: fallback.to_path_buf(),
                fallback_cause,
            })
        }
    }
}

/// Reject payloads that cannot be a PDF document.
pub fn check_payload(bytes: Vec<u8>) -> Result<Vec<u8>> {
    if bytes.is_empty() {
        return Err(ForgeError::Print("browser returned an empty document".into()));
    }
    if !bytes.starts_with(b"%PDF-") {
        return Err(ForgeError::Print(format!(
            "browser returned {} bytes without a PDF header",
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// `file://` URL of an existing file.
pub fn file_url(path: &Path) -> Result<String> {
    let absolute = fs::canonicalize(path).map_err(|e| ForgeError::io(path, e))?;
    let text = absolute.to_string_lossy().replace('\\', "/");
    // Verbatim Windows paths canonicalise to `\\?\C:\...`.
    let text = text.strip_prefix("//?/").unwrap_or(&text);

    let mut url = String::from("file://");
    if !text.starts_with('/') {
        url.push('/');
    }
    for ch in text.chars() {
        match ch {
            '%' => url.push_str("%25"),
            ' ' => url.push_str("%20"),
            '#' => url.push_str("%23"),
            '?' => url.push_str("%3F"),
            c => url.push(c),
        }
    }
    Ok(url)
}
