//! Enum value collection
//!
//! Walks source rows or converted elements of every array that declares
//! `enums` and records the values seen per generated enum.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::schema::{ContentSchema, GroupConfig, LayoutMode, NodeKind, Property, SchemaNode};
use crate::source::Workbook;

/// Values seen per generated enum, in first-seen order.
///
/// Values are not de-duplicated here; the artifact writer does that.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumCollector {
    enums: Vec<(String, Vec<String>)>,
    index: HashMap<String, usize>,
}

impl EnumCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, name: String) -> &mut Vec<String> {
        let i = match self.index.get(&name) {
            Some(i) => *i,
            None => {
                let i = self.enums.len();
                self.index.insert(name.clone(), i);
                self.enums.push((name, Vec::new()));
                i
            }
        };
        &mut self.enums[i].1
    }

    fn push(&mut self, name: &str, value: Option<&str>) {
        match value {
            Some(v) if !v.is_empty() && v != "None" => self.entry(name.to_string()).push(v.to_string()),
            _ => {}
        }
    }

    /// Collected values of one enum
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.index.get(name).map(|i| self.enums[*i].1.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.enums.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    /// Append everything `other` collected
    pub fn merge(&mut self, other: EnumCollector) {
        for (name, values) in other.enums {
            self.entry(name).extend(values);
        }
    }

    /// Collect from the rows of a source workbook.
    ///
    /// Rows are taken the way the projector groups them: a SingleRow or
    /// MultiRow element exposes every one of its rows, a packed element none.
    /// A row with no value in the column contributes its `"{column}s.{column}"`
    /// cell, the column a nested `"{column}s"` list projects from.
    /// Sheets missing from this workbook are skipped.
    pub fn collect_workbook(&mut self, schema: &ContentSchema, workbook: &Workbook) {
        for (property, group, element) in enum_properties(schema) {
            for column in &group.enum_columns {
                self.entry(GroupConfig::enum_name(&property.name, column));
            }

            if schema.registry.resolve(element).layout == LayoutMode::SingleColumn {
                continue;
            }

            for sheet_name in &group.sheets {
                let Some(sheet) = workbook.sheet(sheet_name) else {
                    debug!(sheet = %sheet_name, "sheet absent, no enum values taken");
                    continue;
                };
                for row in sheet.rows() {
                    for column in &group.enum_columns {
                        let name = GroupConfig::enum_name(&property.name, column);
                        let text = row
                            .text(column)
                            .filter(|t| t.as_ref() != "None")
                            .or_else(|| row.text(&nested_column(column)));
                        self.push(&name, text.as_deref());
                    }
                }
            }
        }
    }

    /// Collect from a converted data file.
    ///
    /// An element with no value in the column contributes the values of its
    /// `"{column}s"` list instead.
    pub fn collect_json(&mut self, schema: &ContentSchema, data: &Value) {
        for (property, group, _) in enum_properties(schema) {
            let elements = data
                .get(&property.name)
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            for column in &group.enum_columns {
                let name = GroupConfig::enum_name(&property.name, column);
                self.entry(name.clone());

                for element in elements {
                    match text_of(element, column) {
                        Some(value) => self.push(&name, Some(value.as_str())),
                        None => {
                            let nested = element
                                .get(format!("{}s", column))
                                .and_then(Value::as_array)
                                .map(Vec::as_slice)
                                .unwrap_or_default();
                            for item in nested {
                                self.push(&name, text_of(item, column).as_deref());
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Array properties that declare enum columns, with their element schema
fn enum_properties(schema: &ContentSchema) -> impl Iterator<Item = (&Property, &GroupConfig, &SchemaNode)> {
    schema.sheet_properties().filter_map(move |(property, group)| {
        if group.enum_columns.is_empty() {
            return None;
        }
        match &schema.registry.resolve(&property.node).node.kind {
            NodeKind::Array { element } => Some((property, group, element.as_ref())),
            _ => None,
        }
    })
}

/// Column of `column` inside its nested `"{column}s"` list
fn nested_column(column: &str) -> String {
    format!("{0}s.{0}", column)
}

/// Non-empty, non-`None` text of `object[column]`
fn text_of(object: &Value, column: &str) -> Option<String> {
    let text = match object.get(column)? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty() && text != "None").then_some(text)
}
