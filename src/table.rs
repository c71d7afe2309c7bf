//! Table data – cells, tabular sources and their render-time resolution.
//!
//! A table is fed either by a plain 2-D structure (`Vec<Vec<T>>`, nested
//! arrays) or by a [`Frame`] that carries named columns. Both go through the
//! [`TabularSource`] trait; adapters for other column stores implement it the
//! same way.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A single table (or number) value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Cell::Int(_) | Cell::Float(_))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(x) => write!(f, "{x}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

macro_rules! cell_from {
    ($variant:ident: $($ty:ty),+) => {
        $(
            impl From<$ty> for Cell {
                fn from(v: $ty) -> Self {
                    Cell::$variant(v.into())
                }
            }
        )+
    };
}

cell_from!(Int: i8, i16, i32, i64, u8, u16, u32);
cell_from!(Float: f32, f64);
cell_from!(Text: String, &str);

impl From<bool> for Cell {
    fn from(v: bool) -> Self {
        Cell::Bool(v)
    }
}

impl From<usize> for Cell {
    fn from(v: usize) -> Self {
        i64::try_from(v).map(Cell::Int).unwrap_or(Cell::Float(v as f64))
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Anything a table can be built from.
///
/// Implementations must only read from `self`; a table never copies or
/// mutates its source before rendering.
pub trait TabularSource: Send + Sync {
    /// Row-major materialisation. Rows may have different lengths.
    fn to_row_major(&self) -> Vec<Vec<Cell>>;

    /// Column names, for sources that carry them.
    fn column_names(&self) -> Option<Vec<String>> {
        None
    }
}

impl<T> TabularSource for Vec<Vec<T>>
where
    T: Clone + Into<Cell> + Send + Sync,
{
    fn to_row_major(&self) -> Vec<Vec<Cell>> {
        self.iter()
            .map(|row| row.iter().cloned().map(Into::into).collect())
            .collect()
    }
}

impl<T, const C: usize> TabularSource for Vec<[T; C]>
where
    T: Clone + Into<Cell> + Send + Sync,
{
    fn to_row_major(&self) -> Vec<Vec<Cell>> {
        self.iter()
            .map(|row| row.iter().cloned().map(Into::into).collect())
            .collect()
    }
}

impl<T, const C: usize, const R: usize> TabularSource for [[T; C]; R]
where
    T: Clone + Into<Cell> + Send + Sync,
{
    fn to_row_major(&self) -> Vec<Vec<Cell>> {
        self.iter()
            .map(|row| row.iter().cloned().map(Into::into).collect())
            .collect()
    }
}

/// Shared sources let the caller keep using the data after handing it to a table.
impl<S: TabularSource + ?Sized> TabularSource for Arc<S> {
    fn to_row_major(&self) -> Vec<Vec<Cell>> {
        (**self).to_row_major()
    }

    fn column_names(&self) -> Option<Vec<String>> {
        (**self).column_names()
    }
}

/// A named column of a [`Frame`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Cell>,
}

/// Column-oriented table with named columns (dataframe-like).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    columns: Vec<Column>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column. Columns shorter than the longest one are padded with
    /// empty cells when materialised.
    pub fn with_column<I, T>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Cell>,
    {
        self.columns.push(Column {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Build a frame from column names and row-major records.
    pub fn from_records<N, R, T>(names: N, records: R) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        R: IntoIterator,
        R::Item: IntoIterator<Item = T>,
        T: Into<Cell>,
    {
        let mut columns: Vec<Column> = names
            .into_iter()
            .map(|name| Column {
                name: name.into(),
                values: Vec::new(),
            })
            .collect();
        for (row_index, record) in records.into_iter().enumerate() {
            for (i, value) in record.into_iter().enumerate() {
                let Some(column) = columns.get_mut(i) else {
                    log::warn!("record {row_index} has more values than columns; extra values dropped");
                    break;
                };
                column.values.resize(row_index, Cell::Empty);
                column.values.push(value.into());
            }
        }
        Frame { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn height(&self) -> usize {
        self.columns.iter().map(|c| c.values.len()).max().unwrap_or(0)
    }
}

impl TabularSource for Frame {
    fn to_row_major(&self) -> Vec<Vec<Cell>> {
        (0..self.height())
            .map(|i| {
                self.columns
                    .iter()
                    .map(|c| c.values.get(i).cloned().unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    fn column_names(&self) -> Option<Vec<String>> {
        Some(self.columns.iter().map(|c| c.name.clone()).collect())
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// A rendered-ready cell: display text plus an alignment hint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellView {
    pub text: String,
    pub numeric: bool,
}

impl From<&Cell> for CellView {
    fn from(cell: &Cell) -> Self {
        CellView {
            text: cell.to_string(),
            numeric: cell.is_numeric(),
        }
    }
}

/// Headers and rectangular rows, as handed to the table partial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellView>>,
    pub width: usize,
}

/// Resolve headers and rows of a source.
///
/// Explicit headers win; otherwise the source's column names are used, and
/// sources without names get no header row. Every row is padded with empty
/// cells to the table width (the longest row or the header count).
pub fn resolve(source: &dyn TabularSource, headers: Option<&[String]>) -> ResolvedTable {
    let rows = source.to_row_major();
    let mut headers = match headers {
        Some(explicit) if !explicit.is_empty() => explicit.to_vec(),
        _ => source.column_names().unwrap_or_default(),
    };

    let width = rows
        .iter()
        .map(Vec::len)
        .max()
        .unwrap_or(0)
        .max(headers.len());
    if !headers.is_empty() {
        headers.resize(width, String::new());
    }

    let rows = rows
        .iter()
        .map(|row| {
            let mut cells: Vec<CellView> = row.iter().map(CellView::from).collect();
            cells.resize(
                width,
                CellView {
                    text: String::new(),
                    numeric: false,
                },
            );
            cells
        })
        .collect();

    ResolvedTable {
        headers,
        rows,
        width,
    }
}
