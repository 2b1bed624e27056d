//! JSON workbook reader
//!
//! Reads pre-exported sheets of the form
//! `{ "SheetName": [ { "Column": value, ... }, ... ] }`.
//! Column order is the order of first appearance across the rows.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use super::{Cell, Header, Row, Sheet, Workbook, WorkbookReader};
use crate::error::{ProjectError, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWorkbookReader;

impl JsonWorkbookReader {
    /// Build a workbook from an already parsed document
    pub fn from_value(path: &Path, document: &Value) -> Result<Workbook> {
        let invalid = |reason: String| ProjectError::Workbook {
            path: path.to_path_buf(),
            reason,
        };

        let sheets_obj = document
            .as_object()
            .ok_or_else(|| invalid("expected an object of sheets".to_string()))?;

        let mut sheets = Vec::with_capacity(sheets_obj.len());
        for (name, rows) in sheets_obj {
            let rows = rows
                .as_array()
                .ok_or_else(|| invalid(format!("sheet '{}' is not an array of rows", name)))?;

            let mut columns: Vec<String> = Vec::new();
            for row in rows {
                let row = row
                    .as_object()
                    .ok_or_else(|| invalid(format!("sheet '{}' has a non-object row", name)))?;
                for key in row.keys() {
                    if !columns.iter().any(|c| c == key) {
                        columns.push(key.clone());
                    }
                }
            }

            let header = Arc::new(Header::new(name.as_str(), columns));
            let data = rows
                .iter()
                .filter_map(Value::as_object)
                .map(|row| {
                    let cells = header
                        .columns()
                        .iter()
                        .map(|c| row.get(c).map(to_cell).unwrap_or_default())
                        .collect();
                    Row::new(Arc::clone(&header), cells)
                })
                .collect();

            sheets.push(Sheet::new(header, data));
        }

        Ok(Workbook::new(sheets))
    }
}

impl WorkbookReader for JsonWorkbookReader {
    fn read(&self, path: &Path) -> Result<Workbook> {
        let content = fs::read_to_string(path).map_err(|e| ProjectError::Workbook {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let document: Value = serde_json::from_str(&content).map_err(|e| ProjectError::Workbook {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_value(path, &document)
    }
}

fn to_cell(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::Empty,
        Value::Bool(b) => Cell::Bool(*b),
        Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or_default(),
        Value::String(s) => Cell::from(s.as_str()),
        other => Cell::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_columns_in_first_appearance_order() {
        let doc = json!({
            "Quest": [
                { "QuestId": 1, "StepId": "A" },
                { "StepId": "B", "StepDesc": "talk" }
            ]
        });
        let wb = JsonWorkbookReader::from_value(Path::new("quest.json"), &doc).unwrap();
        let sheet = wb.sheet("Quest").unwrap();
        assert_eq!(sheet.header().columns(), ["QuestId", "StepId", "StepDesc"]);
        assert_eq!(sheet.rows().len(), 2);
        assert!(sheet.rows()[1].get("QuestId").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_non_array_sheet() {
        let doc = json!({ "Quest": 3 });
        assert!(JsonWorkbookReader::from_value(Path::new("x.json"), &doc).is_err());
    }
}
