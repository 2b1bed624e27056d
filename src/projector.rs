//! Projector
//!
//! Walks a schema node against a [`RowCursor`] and builds the JSON value it
//! describes. Each call reports how many rows it consumed; the caller
//! advances its own cursor by that amount.
//!
//! Column paths: a top-level property reads the column named after it, a
//! nested property reads `parent.child`, and a SingleRow array element reads
//! `path[i]`.
//!
//! | Layout | Object | Array |
//! |---|---|---|
//! | SingleRow | every property from one row | `path[0..width]` from one row |
//! | MultiRow | run keyed on the first property | elements until the rows run out |
//! | SingleColumn | `Variant a b c` in one cell | `a, b, c` in one cell |

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::cursor::RowCursor;
use crate::error::{ProjectError, Result};
use crate::registry::ReferenceRegistry;
use crate::schema::{ContentSchema, EnumDef, LayoutMode, NodeKind, Property, ScalarKind, SchemaNode};
use crate::source::{Cell, Header, Row, Workbook};

/// A projected value and the rows it took
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub value: Value,
    pub rows_consumed: usize,
}

impl Projection {
    fn single(value: Value) -> Self {
        Self {
            value,
            rows_consumed: 1,
        }
    }
}

/// Projector state for one source file
pub struct Projector<'s> {
    registry: &'s ReferenceRegistry,
    /// `(sheet, column path)` -> SingleRow array width
    array_widths: HashMap<(String, String), usize>,
    /// Headers of synthetic tables built from packed cells
    packed_headers: HashMap<String, Arc<Header>>,
}

impl<'s> Projector<'s> {
    pub fn new(registry: &'s ReferenceRegistry) -> Self {
        Self {
            registry,
            array_widths: HashMap::new(),
            packed_headers: HashMap::new(),
        }
    }

    /// Project `node` against the rows of `cursor`.
    ///
    /// Returns `None` when the cursor is empty.
    pub fn project(
        &mut self,
        node: &SchemaNode,
        cursor: RowCursor<'_>,
        column: &str,
    ) -> Result<Option<Projection>> {
        let Some(row) = cursor.peek_first() else {
            return Ok(None);
        };

        let registry = self.registry;
        let resolved = registry.resolve(node);

        // Nothing under this path: stop here, a recursive definition would never end
        if !column.is_empty() && !row.header().has_path(column) {
            match &resolved.node.kind {
                NodeKind::Object { .. } => return Ok(Some(Projection::single(Value::Object(Map::new())))),
                NodeKind::Array { .. } => return Ok(Some(Projection::single(Value::Array(Vec::new())))),
                _ => {}
            }
        }

        let projection = match &resolved.node.kind {
            NodeKind::Scalar { kind, .. } => Projection::single(coerce(*kind, row, column)?),
            NodeKind::Enum(id) => Projection::single(project_enum(registry.enum_def(*id), row, column)),
            NodeKind::Object { properties } => match resolved.layout {
                LayoutMode::SingleRow => {
                    let value = self.project_properties(properties, cursor.first_only(), column)?;
                    Projection::single(value)
                }
                LayoutMode::MultiRow => {
                    let (run, _) = match properties.first() {
                        Some(key) => cursor.take_run(&child_path(column, &key.name)),
                        None => (cursor.first_only(), cursor),
                    };
                    Projection {
                        value: self.project_properties(properties, run, column)?,
                        rows_consumed: run.count(),
                    }
                }
                LayoutMode::SingleColumn => {
                    Projection::single(self.project_packed_object(properties, row, column)?)
                }
            },
            NodeKind::Array { element } => match resolved.layout {
                LayoutMode::SingleRow => {
                    let width = self.array_width(row.header(), column);
                    let single = cursor.first_only();
                    let mut values = Vec::with_capacity(width);
                    for i in 0..width {
                        if let Some(p) = self.project(element, single, &format!("{}[{}]", column, i))? {
                            values.push(p.value);
                        }
                    }
                    Projection::single(Value::Array(values))
                }
                LayoutMode::MultiRow => Projection {
                    value: Value::Array(self.project_rows(element, cursor, column)?),
                    rows_consumed: cursor.count(),
                },
                LayoutMode::SingleColumn => {
                    Projection::single(Value::Array(self.project_packed_array(element, row, column)?))
                }
            },
            NodeKind::Reference(id) => {
                let definition = registry.definition(*id);
                return Err(ProjectError::UnresolvedReference {
                    reference: definition.name.clone(),
                    document: definition.document.display().to_string(),
                });
            }
        };

        Ok(Some(projection))
    }

    /// Project `element` repeatedly until the cursor is exhausted
    pub fn project_rows(
        &mut self,
        element: &SchemaNode,
        cursor: RowCursor<'_>,
        column: &str,
    ) -> Result<Vec<Value>> {
        let mut values = Vec::new();
        let mut cursor = cursor;
        while let Some(projection) = self.project(element, cursor, column)? {
            values.push(projection.value);
            // Every projection of a non-empty cursor takes at least one row
            cursor = cursor.drop_first(projection.rows_consumed.max(1));
        }
        Ok(values)
    }

    fn project_properties(
        &mut self,
        properties: &[Property],
        cursor: RowCursor<'_>,
        column: &str,
    ) -> Result<Value> {
        let mut object = Map::with_capacity(properties.len());
        for property in properties {
            let path = child_path(column, &property.name);
            if let Some(projection) = self.project(&property.node, cursor, &path)? {
                object.insert(property.name.clone(), projection.value);
            }
        }
        Ok(Value::Object(object))
    }

    // =========================================================================
    // Packed cells
    // =========================================================================

    /// Decode `Variant v1 v2 ..` from the cell at `column`.
    ///
    /// The variant's fields take the remaining tokens positionally. A token
    /// count that does not fit the variant leaves it out of the result.
    fn project_packed_object(
        &mut self,
        variants: &[Property],
        row: &Row,
        column: &str,
    ) -> Result<Value> {
        let mut object = Map::new();
        let Some(text) = row.text(column) else {
            return Ok(Value::Object(object));
        };

        let tokens: Vec<&str> = text.split_whitespace().collect();
        let Some((tag, values)) = tokens.split_first() else {
            return Ok(Value::Object(object));
        };

        let Some(variant) = variants.iter().find(|v| v.name == *tag) else {
            debug!(column, variant = %tag, "no such variant, packed cell skipped");
            return Ok(Value::Object(object));
        };

        let registry = self.registry;
        let resolved = registry.resolve(&variant.node);
        let fields = match &resolved.node.kind {
            NodeKind::Object { properties } => properties.as_slice(),
            _ => std::slice::from_ref(variant),
        };

        if values.len() != fields.len() {
            debug!(
                column,
                variant = %tag,
                expected = fields.len(),
                found = values.len(),
                "token count mismatch, packed cell skipped"
            );
            return Ok(Value::Object(object));
        }

        let columns: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
        let header = self.packed_header(&format!("{}:{}", column, tag), columns);
        let packed = [Row::new(header, values.iter().map(|v| Cell::from(*v)).collect())];
        let cursor = RowCursor::new(&packed);

        let value = if matches!(resolved.node.kind, NodeKind::Object { .. }) {
            let mut inner = Map::with_capacity(fields.len());
            for field in fields {
                if let Some(p) = self.project(&field.node, cursor, &field.name)? {
                    inner.insert(field.name.clone(), p.value);
                }
            }
            Value::Object(inner)
        } else {
            self.project(&variant.node, cursor, &variant.name)?
                .map(|p| p.value)
                .unwrap_or(Value::Null)
        };

        object.insert(tag.to_string(), value);
        Ok(Value::Object(object))
    }

    /// Decode `a, b, c` from the cell at `column`; each token is one element
    fn project_packed_array(
        &mut self,
        element: &SchemaNode,
        row: &Row,
        column: &str,
    ) -> Result<Vec<Value>> {
        let Some(text) = row.text(column) else {
            return Ok(Vec::new());
        };

        let header = self.packed_header(column, vec![column.to_string()]);
        let table: Vec<Row> = text
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| Row::new(Arc::clone(&header), vec![Cell::from(t)]))
            .collect();

        let registry = self.registry;
        let resolved = registry.resolve(element);

        let mut values = Vec::with_capacity(table.len());
        for row in &table {
            let value = match &resolved.node.kind {
                NodeKind::Object { properties } => self.project_packed_object(properties, row, column)?,
                _ => match self.project(element, RowCursor::new(std::slice::from_ref(row)), column)? {
                    Some(p) => p.value,
                    None => continue,
                },
            };
            values.push(value);
        }
        Ok(values)
    }

    fn packed_header(&mut self, key: &str, columns: Vec<String>) -> Arc<Header> {
        let header = self
            .packed_headers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Header::new(key, columns)));
        Arc::clone(header)
    }

    // =========================================================================
    // SingleRow arrays
    // =========================================================================

    /// `1 + max(i)` over the header columns named `column[i]..`, 0 if none
    fn array_width(&mut self, header: &Header, column: &str) -> usize {
        let key = (header.sheet().to_string(), column.to_string());
        if let Some(width) = self.array_widths.get(&key) {
            return *width;
        }

        let width = match Regex::new(&format!(r"^{}\[(\d+)\]", regex::escape(column))) {
            Ok(pattern) => header
                .columns()
                .iter()
                .filter_map(|c| pattern.captures(c))
                .filter_map(|caps| caps[1].parse::<usize>().ok())
                .max()
                .map_or(0, |max| max + 1),
            Err(_) => 0,
        };

        self.array_widths.insert(key, width);
        width
    }
}

/// Project every sheet-bound root property of `schema` from `workbook`
pub fn project_workbook(schema: &ContentSchema, workbook: &Workbook, source: &Path) -> Result<Value> {
    let mut projector = Projector::new(&schema.registry);
    let mut output = Map::new();

    for (property, group) in schema.sheet_properties() {
        let mut sheets = Vec::with_capacity(group.sheets.len());
        for name in &group.sheets {
            let sheet = workbook.sheet(name).ok_or_else(|| ProjectError::MissingSheet {
                sheet: name.clone(),
                file: source.display().to_string(),
            })?;
            sheets.push(sheet);
        }

        let resolved = schema.registry.resolve(&property.node);
        let value = match &resolved.node.kind {
            NodeKind::Array { element } => {
                let mut values = Vec::new();
                for sheet in &sheets {
                    values.extend(projector.project_rows(element, RowCursor::new(sheet.rows()), "")?);
                }
                Value::Array(values)
            }
            NodeKind::Object { properties } => {
                let mut object = Map::new();
                for sheet in &sheets {
                    let cursor = RowCursor::new(sheet.rows()).first_only();
                    if let Value::Object(part) = projector.project_properties(properties, cursor, "")? {
                        object.extend(part);
                    }
                }
                Value::Object(object)
            }
            _ => {
                debug!(property = %property.name, "sheet binding on a scalar property ignored");
                continue;
            }
        };

        debug!(property = %property.name, sheets = sheets.len(), "projected property");
        output.insert(property.name.clone(), value);
    }

    Ok(Value::Object(output))
}

fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

// =============================================================================
// Cell coercion
// =============================================================================

fn coerce(kind: ScalarKind, row: &Row, column: &str) -> Result<Value> {
    let cell = row.get(column).unwrap_or(&Cell::Empty);

    let coerced = match (kind, cell) {
        (ScalarKind::String, _) => Some(Value::String(
            cell.text().map(|t| t.into_owned()).unwrap_or_default(),
        )),
        (ScalarKind::Bool, c) if c.is_empty() => Some(Value::Bool(false)),
        (ScalarKind::Int, c) if c.is_empty() => Some(Value::from(0)),
        (ScalarKind::Float, c) if c.is_empty() => Some(Value::from(0.0)),

        (ScalarKind::Bool, Cell::Bool(b)) => Some(Value::Bool(*b)),
        (ScalarKind::Bool, Cell::Number(n)) => Some(Value::Bool(*n != 0.0)),
        (ScalarKind::Bool, Cell::Text(s)) => parse_bool(s.trim()).map(Value::Bool),

        (ScalarKind::Int, Cell::Number(n)) => integral(*n).map(Value::from),
        (ScalarKind::Int, Cell::Bool(b)) => Some(Value::from(i64::from(*b))),
        (ScalarKind::Int, Cell::Text(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
                .map(Value::from)
        }

        (ScalarKind::Float, Cell::Number(n)) => serde_json::Number::from_f64(*n).map(Value::Number),
        (ScalarKind::Float, Cell::Bool(b)) => Some(Value::from(if *b { 1.0 } else { 0.0 })),
        (ScalarKind::Float, Cell::Text(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),

        (_, Cell::Empty) => None,
    };

    coerced.ok_or_else(|| {
        let value = cell.text().map(|t| t.into_owned()).unwrap_or_default();
        let snapshot = row.snapshot();
        error!(column, value = %value, expected = kind.name(), row = %snapshot, "cell coercion failed");
        ProjectError::Coercion {
            column: column.to_string(),
            value,
            expected: kind.name(),
            row: snapshot,
        }
    })
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") || s == "1" {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") || s == "0" {
        Some(false)
    } else {
        None
    }
}

fn integral(n: f64) -> Option<i64> {
    (n.fract() == 0.0 && n.abs() < 9.2e18).then_some(n as i64)
}

/// Map the cell text through the enum; unknown names pass through unchanged
fn project_enum(def: &EnumDef, row: &Row, column: &str) -> Value {
    match row.text(column) {
        None => Value::String("None".to_string()),
        Some(text) if text == "None" => Value::String("None".to_string()),
        Some(text) => def
            .lookup(&text)
            .map(|v| v.to_json())
            .unwrap_or_else(|| Value::String(text.into_owned())),
    }
}
