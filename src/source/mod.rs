//! Source Tables
//!
//! In-memory workbook model consumed by the projector: named sheets, each an
//! ordered sequence of rows keyed by column name. How a workbook is obtained
//! is the business of a [`WorkbookReader`]; the projector only sees this shape.

pub mod json;
pub mod xlsx;

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{ProjectError, Result};

pub use json::JsonWorkbookReader;
pub use xlsx::XlsxReader;

// =============================================================================
// Cell
// =============================================================================

/// A raw cell value as read from a sheet
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    /// Absent or empty text
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Textual form of the cell, `None` when empty
    pub fn text(&self) -> Option<Cow<'_, str>> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) if s.is_empty() => None,
            Cell::Text(s) => Some(Cow::Borrowed(s.as_str())),
            Cell::Number(n) => Some(Cow::Owned(format_number(*n))),
            Cell::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
        }
    }

    /// JSON form used for row snapshots in diagnostics
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Empty => Value::Null,
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Bool(b) => Value::Bool(*b),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s)
        }
    }
}

/// Spreadsheet numbers print without a trailing `.0` when integral
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// =============================================================================
// Header / Row
// =============================================================================

/// Column layout shared by every row of one sheet
#[derive(Debug)]
pub struct Header {
    sheet: String,
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl Header {
    /// Build a header; when a column name repeats, the first occurrence wins
    pub fn new(sheet: impl Into<String>, columns: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Self {
            sheet: sheet.into(),
            columns,
            index,
        }
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    /// Whether any column is `path` itself or lies under it (`path.x`, `path[i]`)
    pub fn has_path(&self, path: &str) -> bool {
        self.columns.iter().any(|c| {
            c.strip_prefix(path)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('.') || rest.starts_with('['))
        })
    }
}

/// One table row
#[derive(Debug, Clone)]
pub struct Row {
    header: Arc<Header>,
    cells: Vec<Cell>,
}

impl Row {
    /// Create a row; missing trailing cells are treated as empty
    pub fn new(header: Arc<Header>, mut cells: Vec<Cell>) -> Self {
        cells.resize(header.columns().len(), Cell::Empty);
        Self { header, cells }
    }

    pub fn header(&self) -> &Arc<Header> {
        &self.header
    }

    /// Cell under `column`, `None` when the sheet has no such column
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.header.position(column).and_then(|i| self.cells.get(i))
    }

    /// Text under `column`, `None` when absent or empty
    pub fn text(&self, column: &str) -> Option<Cow<'_, str>> {
        self.get(column).and_then(Cell::text)
    }

    /// Every cell empty
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(Cell::is_empty)
    }

    /// JSON rendering of the row for error reports
    pub fn snapshot(&self) -> String {
        let map: serde_json::Map<String, Value> = self
            .header
            .columns()
            .iter()
            .zip(&self.cells)
            .map(|(name, cell)| (name.clone(), cell.to_json()))
            .collect();
        Value::Object(map).to_string()
    }
}

// =============================================================================
// Sheet / Workbook
// =============================================================================

/// A named table of rows
#[derive(Debug, Clone)]
pub struct Sheet {
    header: Arc<Header>,
    rows: Vec<Row>,
}

impl Sheet {
    pub fn new(header: Arc<Header>, rows: Vec<Row>) -> Self {
        Self { header, rows }
    }

    /// Build a sheet from column names and raw cell rows
    pub fn from_cells(name: &str, columns: &[&str], rows: Vec<Vec<Cell>>) -> Self {
        let header = Arc::new(Header::new(
            name,
            columns.iter().map(|c| c.to_string()).collect(),
        ));
        let rows = rows
            .into_iter()
            .map(|cells| Row::new(Arc::clone(&header), cells))
            .collect();
        Self { header, rows }
    }

    pub fn name(&self) -> &str {
        self.header.sheet()
    }

    pub fn header(&self) -> &Arc<Header> {
        &self.header
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
}

/// An ordered set of named sheets
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name() == name)
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }
}

// =============================================================================
// Readers
// =============================================================================

/// Anything able to turn a file into a [`Workbook`]
pub trait WorkbookReader {
    fn read(&self, path: &Path) -> Result<Workbook>;
}

/// Pick a reader by file extension and read the workbook
pub fn open_workbook(path: &Path) -> Result<Workbook> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => XlsxReader::default().read(path),
        "json" => JsonWorkbookReader.read(path),
        other => Err(ProjectError::Workbook {
            path: path.to_path_buf(),
            reason: format!("unsupported workbook extension '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_text_drops_integral_fraction() {
        assert_eq!(Cell::Number(10.0).text().as_deref(), Some("10"));
        assert_eq!(Cell::Number(2.5).text().as_deref(), Some("2.5"));
        assert_eq!(Cell::Text(String::new()).text(), None);
    }

    #[test]
    fn test_header_path_lookup() {
        let header = Header::new(
            "Quest",
            vec!["Reward.Item".into(), "Tags[0]".into(), "Effect".into(), "Nextx".into()],
        );
        assert!(header.has_path("Reward"));
        assert!(header.has_path("Tags"));
        assert!(header.has_path("Effect"));
        assert!(!header.has_path("Next"));
        assert!(!header.has_path("Reward.Count"));
    }

    #[test]
    fn test_row_lookup_and_snapshot() {
        let sheet = Sheet::from_cells(
            "Quest",
            &["QuestId", "Name"],
            vec![vec![Cell::Number(1.0)]],
        );
        let row = &sheet.rows()[0];
        assert_eq!(row.text("QuestId").as_deref(), Some("1"));
        assert!(row.get("Name").map(Cell::is_empty).unwrap_or(false));
        assert!(row.get("Missing").is_none());
        assert_eq!(row.snapshot(), r#"{"QuestId":1.0,"Name":null}"#);
    }

    #[test]
    fn test_duplicate_header_first_wins() {
        let header = Header::new("S", vec!["A".into(), "A".into()]);
        assert_eq!(header.position("A"), Some(0));
    }
}
