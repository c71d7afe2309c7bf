//! Report manifests – a JSON description of a [`Document`].
//!
//! ```json
//! {
//!   "css": "report.css",
//!   "rows": [
//!     { "kind": "title", "text": "Quarterly report" },
//!     [
//!       { "kind": "number", "value": 150, "title": "Samples", "col_span": 2 },
//!       { "kind": "kpi", "value": 482.5, "target": 595.0, "title": "Revenue" }
//!     ],
//!     { "kind": "table", "title": "Raw", "rows": [[0, 1], [2]] },
//!     { "kind": "custom", "template": "two_numbers.html", "context": { "number_1": 3 } }
//!   ]
//! }
//! ```
//!
//! A row is either one component or an array of components. Relative paths
//! (images, `css`) are resolved against the manifest's directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::components::{Component, Table};
use crate::document::{Document, Row};
use crate::error::{ForgeError, Result};
use crate::table::{Cell, Column, Frame};

#[derive(Debug, Deserialize)]
pub struct Manifest {
    /// Stylesheet to compile instead of the bundled one.
    #[serde(default)]
    pub css: Option<PathBuf>,
    pub rows: Vec<ManifestRow>,
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ManifestRow {
    Group(Vec<ManifestComponent>),
    Single(ManifestComponent),
}

#[derive(Debug, Deserialize)]
pub struct ManifestComponent {
    #[serde(flatten)]
    pub spec: ComponentSpec,
    #[serde(default)]
    pub col_span: Option<usize>,
    /// Template override; required for `custom`.
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ComponentSpec {
    Title {
        text: String,
    },
    Section {
        text: String,
    },
    Paragraph {
        content: String,
    },
    Number {
        value: Cell,
        title: String,
    },
    Kpi {
        value: f64,
        target: f64,
        title: String,
    },
    Image {
        path: PathBuf,
    },
    Table {
        #[serde(default)]
        title: String,
        #[serde(default)]
        rows: Option<Vec<Vec<Cell>>>,
        #[serde(default)]
        frame: Option<Vec<Column>>,
        #[serde(default)]
        headers: Option<Vec<String>>,
    },
    #[serde(alias = "page_break")]
    Pagebreak,
    Custom {
        #[serde(default)]
        context: Value,
    },
}

impl Manifest {
    /// Parse a manifest whose relative paths are resolved against `base_dir`.
    pub fn parse(json: &str, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut manifest: Manifest = serde_json::from_str(json)?;
        manifest.base_dir = base_dir.into();
        Ok(manifest)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| ForgeError::io(path, e))?;
        let base_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::parse(&json, base_dir)
            .map_err(|e| ForgeError::Manifest(format!("{}: {e}", path.display())))
    }

    /// Directory relative paths are resolved against.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The `css` entry, resolved against the manifest directory.
    pub fn stylesheet(&self) -> Option<PathBuf> {
        self.css.as_deref().map(|css| self.base_dir.join(css))
    }

    pub fn into_document(self) -> Result<Document> {
        let base_dir = self.base_dir;
        let rows = self
            .rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| {
                row.into_row(&base_dir)
                    .map_err(|e| ForgeError::Manifest(format!("row {index}: {e}")))
            })
            .collect::<Result<Vec<Row>>>()?;
        Ok(Document::new(rows))
    }
}

impl ManifestRow {
    fn into_row(self, base_dir: &Path) -> std::result::Result<Row, String> {
        match self {
            ManifestRow::Single(component) => component.into_component(base_dir).map(Row::from),
            ManifestRow::Group(components) => components
                .into_iter()
                .map(|c| c.into_component(base_dir))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Row::from),
        }
    }
}

impl ManifestComponent {
    fn into_component(self, base_dir: &Path) -> std::result::Result<Component, String> {
        let mut component = match self.spec {
            ComponentSpec::Title { text } => Component::title(text),
            ComponentSpec::Section { text } => Component::section(text),
            ComponentSpec::Paragraph { content } => Component::paragraph(content),
            ComponentSpec::Number { value, title } => Component::number(value, title),
            ComponentSpec::Kpi {
                value,
                target,
                title,
            } => Component::kpi(value, target, title),
            ComponentSpec::Image { path } => Component::image(base_dir.join(path)),
            ComponentSpec::Table {
                title,
                rows,
                frame,
                headers,
            } => {
                let table = match (rows, frame) {
                    (Some(rows), None) => Table::new(rows, title),
                    (None, Some(columns)) => {
                        let frame = columns
                            .into_iter()
                            .fold(Frame::new(), |frame, c| frame.with_column(c.name, c.values));
                        Table::new(frame, title)
                    }
                    (Some(_), Some(_)) => {
                        return Err(format!("table '{title}' has both `rows` and `frame`"))
                    }
                    (None, None) => {
                        return Err(format!("table '{title}' needs `rows` or `frame`"))
                    }
                };
                match headers {
                    Some(headers) => table.with_headers(headers).into(),
                    None => table.into(),
                }
            }
            ComponentSpec::Pagebreak => Component::page_break(),
            ComponentSpec::Custom { context } => {
                let template = self
                    .template
                    .as_deref()
                    .ok_or("custom component needs a `template`")?;
                Component::custom(template, context)
            }
        };

        if let Some(template) = self.template {
            component = component.with_template(template);
        }
        if let Some(col_span) = self.col_span {
            component = component.with_col_span(col_span);
        }
        Ok(component)
    }
}
