//! Document model – rows of components.
//!
//! A bare component is a full-width row; a group of components shares one
//! row as adjacent grid columns, each occupying its `col_span`.

use std::collections::BTreeSet;

use serde_json::{json, Value};

use crate::components::Component;
use crate::config::{ForgeConfig, RenderOptions};
use crate::error::{RenderError, Result};
use crate::pipeline::{RenderReport, Renderer};

#[derive(Debug)]
pub enum Row {
    /// One component, full width.
    Single(Component),
    /// Components rendered side by side.
    Group(Vec<Component>),
}

impl Row {
    pub fn components(&self) -> &[Component] {
        match self {
            Row::Single(component) => std::slice::from_ref(component),
            Row::Group(components) => components,
        }
    }

    /// Grid columns of the row: the sum of the members' spans.
    pub fn columns(&self) -> usize {
        self.components().iter().map(Component::col_span).sum()
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Row::Group(_))
    }

    fn context(&self) -> Result<Value> {
        let components = self
            .components()
            .iter()
            .map(Component::context)
            .collect::<Result<Vec<_>>>()?;
        Ok(json!({
            "group": self.is_group(),
            "columns": self.columns(),
            "components": components,
        }))
    }
}

impl From<Component> for Row {
    fn from(component: Component) -> Self {
        Row::Single(component)
    }
}

impl From<Vec<Component>> for Row {
    fn from(components: Vec<Component>) -> Self {
        Row::Group(components)
    }
}

impl<const N: usize> From<[Component; N]> for Row {
    fn from(components: [Component; N]) -> Self {
        Row::Group(components.into())
    }
}

/// An immutable, ordered sequence of rows.
#[derive(Debug, Default)]
pub struct Document {
    rows: Vec<Row>,
}

impl Document {
    /// Build a document; empty groups are dropped.
    pub fn new<I, R>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Row>,
    {
        let rows = rows
            .into_iter()
            .map(Into::into)
            .filter(|row: &Row| !row.components().is_empty())
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.rows.iter().flat_map(|row| row.components())
    }

    /// Distinct template ids, in sorted order.
    pub fn template_ids(&self) -> BTreeSet<&str> {
        self.components().map(Component::template_id).collect()
    }

    /// Template context of the whole document. Lazy component payloads are
    /// produced here.
    pub fn context(&self) -> Result<Value> {
        let rows = self
            .rows
            .iter()
            .map(Row::context)
            .collect::<Result<Vec<_>>>()?;
        Ok(json!({ "rows": rows }))
    }

    /// Render with configuration taken from the environment.
    pub fn render(&self, options: &RenderOptions) -> Result<RenderReport, RenderError> {
        Renderer::new(ForgeConfig::from_env()).render(self, options)
    }
}

/// Build a [`Document`] from components and component groups.
///
/// ```ignore
/// let doc = document![
///     Component::title("Report"),
///     [Component::number(150, "Samples"), Component::number(3, "Species")],
/// ];
/// ```
#[macro_export]
macro_rules! document {
    ($($row:expr),* $(,)?) => {
        $crate::Document::new(::std::vec![$($crate::Row::from($row)),*])
    };
}
