//! Spreadsheet reader backed by calamine
//!
//! Sheet layout: row 1 holds column names, row 2 holds human descriptions and
//! is skipped, data starts on row 3 and ends at the first entirely empty row.

use std::path::Path;
use std::sync::Arc;

use calamine::{open_workbook_auto, Data, Reader};
use tracing::debug;

use super::{Cell, Header, Row, Sheet, Workbook, WorkbookReader};
use crate::error::{ProjectError, Result};

/// Rows above the data: names, then descriptions
const HEADER_ROWS: usize = 2;

/// Reads xlsx/xlsm/xlsb/xls/ods workbooks
#[derive(Debug, Clone)]
pub struct XlsxReader {
    /// Number of header rows preceding the data
    pub header_rows: usize,
}

impl Default for XlsxReader {
    fn default() -> Self {
        Self {
            header_rows: HEADER_ROWS,
        }
    }
}

impl WorkbookReader for XlsxReader {
    fn read(&self, path: &Path) -> Result<Workbook> {
        let workbook_err = |reason: String| ProjectError::Workbook {
            path: path.to_path_buf(),
            reason,
        };

        let mut workbook = open_workbook_auto(path).map_err(|e| workbook_err(e.to_string()))?;

        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook
                .worksheet_range(&name)
                .map_err(|e| workbook_err(format!("sheet '{}': {}", name, e)))?;

            let rows: Vec<&[Data]> = range.rows().collect();
            if rows.is_empty() {
                debug!(sheet = %name, "empty sheet skipped");
                continue;
            }
            if rows.len() < self.header_rows {
                return Err(workbook_err(format!(
                    "sheet '{}' has no header rows",
                    name
                )));
            }

            let columns: Vec<String> = rows[0].iter().map(header_name).collect();
            let header = Arc::new(Header::new(name.as_str(), columns));

            let mut data = Vec::new();
            for raw in rows.iter().skip(self.header_rows) {
                let row = Row::new(Arc::clone(&header), raw.iter().map(to_cell).collect());
                if row.is_blank() {
                    break;
                }
                data.push(row);
            }

            debug!(sheet = %name, rows = data.len(), "read sheet");
            sheets.push(Sheet::new(header, data));
        }

        Ok(Workbook::new(sheets))
    }
}

fn header_name(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn to_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::from(s.as_str()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::from(s.as_str()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_conversion() {
        assert_eq!(to_cell(&Data::Empty), Cell::Empty);
        assert_eq!(to_cell(&Data::String(String::new())), Cell::Empty);
        assert_eq!(to_cell(&Data::Int(3)), Cell::Number(3.0));
        assert_eq!(to_cell(&Data::Bool(true)), Cell::Bool(true));
    }

    #[test]
    fn test_header_names_are_trimmed() {
        assert_eq!(header_name(&Data::String(" QuestId ".into())), "QuestId");
    }

    #[test]
    fn test_missing_file_is_workbook_error() {
        let err = XlsxReader::default()
            .read(Path::new("does-not-exist.xlsx"))
            .unwrap_err();
        assert!(matches!(err, ProjectError::Workbook { .. }));
    }
}
