//! Report components – the leaves of a [`crate::Document`].
//!
//! Every component names the partial template that renders it and the number
//! of grid columns it spans when it shares a row with others. Payloads that are
//! expensive to produce (image files, figure rasterisation) are only computed
//! when the markup stage asks for the component's template context.

use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde_json::{json, Map, Value};

use crate::error::{ForgeError, Result};
use crate::table::{self, Cell, TabularSource};

/// Resolution figures are rasterised at.
pub const FIGURE_DPI: u32 = 300;

const PNG_MIME: &str = "image/png";

// ---------------------------------------------------------------------------
// Image payloads
// ---------------------------------------------------------------------------

/// An in-memory drawing surface that can be exported as PNG.
///
/// Implement this for the plotting library in use; raster images implement it
/// out of the box.
pub trait Plot: Send + Sync {
    fn to_png(&self, dpi: u32) -> std::result::Result<Vec<u8>, String>;
}

impl Plot for DynamicImage {
    /// Raster surfaces already have their pixel size; `dpi` does not rescale them.
    fn to_png(&self, _dpi: u32) -> std::result::Result<Vec<u8>, String> {
        let mut buffer = Cursor::new(Vec::new());
        self.write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| e.to_string())?;
        Ok(buffer.into_inner())
    }
}

impl Plot for RgbaImage {
    fn to_png(&self, dpi: u32) -> std::result::Result<Vec<u8>, String> {
        DynamicImage::ImageRgba8(self.clone()).to_png(dpi)
    }
}

/// MIME type and base64 body of an image, ready for a `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub base64_data: String,
}

impl InlineImage {
    fn from_bytes(bytes: &[u8]) -> Self {
        let mime_type = image::guess_format(bytes)
            .map(|f| f.to_mime_type())
            .unwrap_or(PNG_MIME);
        InlineImage {
            mime_type: mime_type.to_string(),
            base64_data: BASE64_STD.encode(bytes),
        }
    }
}

/// An image read from disk at render time.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    path: PathBuf,
}

impl Image {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mime_type(&self) -> Result<String> {
        Ok(self.payload()?.mime_type)
    }

    pub fn base64_data(&self) -> Result<String> {
        Ok(self.payload()?.base64_data)
    }

    /// Read the file once and derive both halves of the payload.
    pub fn payload(&self) -> Result<InlineImage> {
        let bytes = fs::read(&self.path).map_err(|e| ForgeError::io(&self.path, e))?;
        Ok(InlineImage::from_bytes(&bytes))
    }
}

/// A plot rasterised to PNG at [`FIGURE_DPI`] when rendered.
pub struct Figure {
    plot: Box<dyn Plot>,
}

impl Figure {
    pub fn new(plot: impl Plot + 'static) -> Self {
        Self {
            plot: Box::new(plot),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        PNG_MIME
    }

    pub fn base64_data(&self) -> Result<String> {
        let png = self
            .plot
            .to_png(FIGURE_DPI)
            .map_err(|e| ForgeError::ComponentPayload(format!("figure export failed: {e}")))?;
        Ok(BASE64_STD.encode(png))
    }

    pub fn payload(&self) -> Result<InlineImage> {
        Ok(InlineImage {
            mime_type: self.mime_type().to_string(),
            base64_data: self.base64_data()?,
        })
    }
}

impl fmt::Debug for Figure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Figure").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// A titled table over any [`TabularSource`].
pub struct Table {
    source: Box<dyn TabularSource>,
    title: String,
    headers: Option<Vec<String>>,
}

impl Table {
    pub fn new(source: impl TabularSource + 'static, title: impl Into<String>) -> Self {
        Self {
            source: Box::new(source),
            title: title.into(),
            headers: None,
        }
    }

    /// Explicit header row; takes precedence over the source's column names.
    pub fn with_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = Some(headers.into_iter().map(Into::into).collect());
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn resolve(&self) -> table::ResolvedTable {
        table::resolve(self.source.as_ref(), self.headers.as_deref())
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("title", &self.title)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// Variant payloads.
#[derive(Debug)]
pub enum ComponentKind {
    Title { text: String },
    Section { text: String },
    /// `content` is trusted markup and is inserted unescaped.
    Paragraph { content: String },
    Number { value: Cell, title: String },
    Kpi { value: f64, target: f64, title: String },
    Image(Image),
    Figure(Figure),
    Table(Table),
    PageBreak,
    /// Caller-defined component; the object is exposed to its template as-is.
    Custom(Value),
}

impl ComponentKind {
    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::Title { .. } => "title",
            ComponentKind::Section { .. } => "section",
            ComponentKind::Paragraph { .. } => "paragraph",
            ComponentKind::Number { .. } => "number",
            ComponentKind::Kpi { .. } => "kpi",
            ComponentKind::Image(_) => "image",
            ComponentKind::Figure(_) => "figure",
            ComponentKind::Table(_) => "table",
            ComponentKind::PageBreak => "pagebreak",
            ComponentKind::Custom(_) => "custom",
        }
    }

    /// Partial used when the component does not override it.
    fn default_template(&self) -> &'static str {
        match self {
            ComponentKind::Title { .. } => "src/partials/title.html",
            ComponentKind::Section { .. } => "src/partials/section.html",
            ComponentKind::Paragraph { .. } => "src/partials/paragraph.html",
            ComponentKind::Number { .. } => "src/partials/number.html",
            ComponentKind::Kpi { .. } => "src/partials/kpi.html",
            ComponentKind::Image(_) | ComponentKind::Figure(_) => "src/partials/image.html",
            ComponentKind::Table(_) => "src/partials/table.html",
            ComponentKind::PageBreak => "src/partials/pagebreak.html",
            ComponentKind::Custom(_) => "custom.html",
        }
    }
}

#[derive(Debug)]
pub struct Component {
    kind: ComponentKind,
    template_id: String,
    col_span: usize,
}

impl Component {
    pub fn new(kind: ComponentKind) -> Self {
        let template_id = kind.default_template().to_string();
        Self {
            kind,
            template_id,
            col_span: 1,
        }
    }

    pub fn title(text: impl Into<String>) -> Self {
        Self::new(ComponentKind::Title { text: text.into() })
    }

    pub fn section(text: impl Into<String>) -> Self {
        Self::new(ComponentKind::Section { text: text.into() })
    }

    pub fn paragraph(content: impl Into<String>) -> Self {
        Self::new(ComponentKind::Paragraph {
            content: content.into(),
        })
    }

    pub fn number(value: impl Into<Cell>, title: impl Into<String>) -> Self {
        Self::new(ComponentKind::Number {
            value: value.into(),
            title: title.into(),
        })
    }

    pub fn kpi(value: f64, target: f64, title: impl Into<String>) -> Self {
        Self::new(ComponentKind::Kpi {
            value,
            target,
            title: title.into(),
        })
    }

    pub fn image(path: impl Into<PathBuf>) -> Self {
        Self::new(ComponentKind::Image(Image::new(path)))
    }

    pub fn figure(plot: impl Plot + 'static) -> Self {
        Self::new(ComponentKind::Figure(Figure::new(plot)))
    }

    pub fn table(source: impl TabularSource + 'static, title: impl Into<String>) -> Self {
        Self::new(ComponentKind::Table(Table::new(source, title)))
    }

    pub fn page_break() -> Self {
        Self::new(ComponentKind::PageBreak)
    }

    /// A component rendered by a caller-supplied template.
    ///
    /// `template_id` is looked up in every template search root, so a
    /// template next to the caller's working directory resolves too.
    pub fn custom(template_id: impl Into<String>, context: Value) -> Self {
        Self::new(ComponentKind::Custom(context)).with_template(template_id)
    }

    /// Columns occupied inside a row; clamped to at least 1.
    pub fn with_col_span(mut self, col_span: usize) -> Self {
        self.col_span = col_span.max(1);
        self
    }

    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = template_id.into();
        self
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    pub fn col_span(&self) -> usize {
        self.col_span
    }

    /// Template context for this component's partial.
    ///
    /// This is where lazy payloads (image files, figures, table sources) are
    /// materialised.
    pub fn context(&self) -> Result<Value> {
        let mut context = match &self.kind {
            ComponentKind::Title { text } | ComponentKind::Section { text } => {
                json!({ "text": text })
            }
            ComponentKind::Paragraph { content } => json!({ "content": content }),
            ComponentKind::Number { value, title } => json!({
                "value": value.to_string(),
                "title": title,
            }),
            ComponentKind::Kpi {
                value,
                target,
                title,
            } => kpi_context(*value, *target, title),
            ComponentKind::Image(image) => image_context(image.payload()?),
            ComponentKind::Figure(figure) => image_context(figure.payload()?),
            ComponentKind::Table(table) => json!({
                "title": table.title(),
                "table": table.resolve(),
            }),
            ComponentKind::PageBreak => json!({}),
            ComponentKind::Custom(Value::Object(fields)) => Value::Object(fields.clone()),
            ComponentKind::Custom(other) => json!({ "value": other }),
        };

        if let Value::Object(fields) = &mut context {
            insert_meta(fields, self);
        }
        Ok(context)
    }
}

impl From<Table> for Component {
    fn from(table: Table) -> Self {
        Component::new(ComponentKind::Table(table))
    }
}

fn insert_meta(fields: &mut Map<String, Value>, component: &Component) {
    fields.insert("kind".into(), component.kind.name().into());
    fields.insert("template_id".into(), component.template_id.clone().into());
    fields.insert("col_span".into(), component.col_span.into());
}

fn image_context(image: InlineImage) -> Value {
    json!({
        "mime_type": image.mime_type,
        "base64_data": image.base64_data,
    })
}

/// Non-finite figures (NaN, infinities, an overflowing delta) are omitted;
/// the partial renders them as "n/a".
fn kpi_context(value: f64, target: f64, title: &str) -> Value {
    let delta = value - target;
    let delta_pct = (target != 0.0).then(|| delta / target.abs() * 100.0);
    json!({
        "value": finite(value),
        "target": finite(target),
        "title": title,
        "delta": finite(delta),
        "delta_pct": delta_pct.and_then(finite),
        "met": value >= target,
    })
}

fn finite(x: f64) -> Option<f64> {
    x.is_finite().then_some(x)
}
