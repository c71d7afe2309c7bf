//! # report-forge – Component reports → PDF
//!
//! Reports are built from typed components (titles, numbers, KPIs, tables,
//! images, figures, custom partials) arranged in rows, and rendered to PDF
//! in three stages:
//!
//! 1. **Markup** – components are rendered through partial templates into
//!    `out.html` ([`templates`])
//! 2. **Style** – the CSS toolchain compiles the stylesheet against the
//!    markup into `out.css` ([`style`])
//! 3. **Print** – headless Chromium prints the page to A4 PDF ([`print`])
//!
//! [`pipeline::Renderer`] runs the stages; [`manifest`] loads reports
//! described in JSON.

pub mod components;
pub mod config;
pub mod document;
pub mod error;
pub mod manifest;
pub mod paths;
pub mod pipeline;
pub mod print;
pub mod style;
pub mod table;
pub mod templates;

// Re-exports for convenience
pub use components::{Component, ComponentKind, Figure, Image, Plot, Table};
pub use config::{ForgeConfig, PageSetup, RenderOptions};
pub use document::{Document, Row};
pub use error::{ForgeError, PathError, RenderError, Stage};
pub use manifest::Manifest;
pub use paths::relative_to;
pub use pipeline::{RenderReport, Renderer};
pub use table::{Cell, Frame, TabularSource};
