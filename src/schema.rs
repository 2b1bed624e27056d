//! Schema model
//!
//! A content schema is a tree of [`SchemaNode`]s. Every node carries the
//! layout it occupies in a sheet; nodes bound to a concrete sheet also carry
//! a [`GroupConfig`]. Named definitions live in the
//! [`ReferenceRegistry`](crate::registry::ReferenceRegistry) and are pointed
//! at by [`NodeKind::Reference`], so shared and recursive definitions exist
//! exactly once.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::ReferenceRegistry;

/// Index of a named definition in the registry arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefId(pub(crate) usize);

/// Index of an enumeration in the registry arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId(pub(crate) usize);

// =============================================================================
// Layout
// =============================================================================

/// How many physical rows a node's data occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LayoutMode {
    /// All fields on one row
    #[default]
    SingleRow,
    /// A run of rows; continuation rows leave the key column blank
    MultiRow,
    /// One cell whose text packs the whole value
    SingleColumn,
}

impl LayoutMode {
    /// Case-insensitive parse of an `x-valueRange` value
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "singlerow" => Some(LayoutMode::SingleRow),
            "multirow" => Some(LayoutMode::MultiRow),
            "singlecolumn" => Some(LayoutMode::SingleColumn),
            _ => None,
        }
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayoutMode::SingleRow => "SingleRow",
            LayoutMode::MultiRow => "MultiRow",
            LayoutMode::SingleColumn => "SingleColumn",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Group config
// =============================================================================

/// A lookup key declared on a sheet-bound array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    pub name: String,
    pub fields: Vec<String>,
    pub unique: bool,
}

/// Binding of a node to concrete sheets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupConfig {
    /// Source sheets, read in order
    pub sheets: Vec<String>,
    /// Columns whose distinct values become generated enums
    pub enum_columns: Vec<String>,
    pub unique_keys: Vec<UniqueKey>,
}

impl GroupConfig {
    /// Name of the generated enum for `column` of `property`
    pub fn enum_name(property: &str, column: &str) -> String {
        format!("{}_{}Enum", property, column)
    }
}

// =============================================================================
// Enumerations
// =============================================================================

/// Value an enum name maps to
#[derive(Debug, Clone, PartialEq)]
pub enum EnumValue {
    Int(i64),
    Text(String),
}

impl EnumValue {
    pub fn to_json(&self) -> Value {
        match self {
            EnumValue::Int(i) => Value::from(*i),
            EnumValue::Text(s) => Value::String(s.clone()),
        }
    }
}

/// An enumeration: ordered name -> value pairs
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    /// Definition name, `None` for inline enums
    pub name: Option<String>,
    /// Underlying JSON type of the values
    pub kind: ScalarKind,
    pub values: Vec<(String, EnumValue)>,
}

impl EnumDef {
    pub fn lookup(&self, name: &str) -> Option<&EnumValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// Scalar types a cell can be coerced to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
    String,
}

impl ScalarKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::Bool => "boolean",
            ScalarKind::Int => "integer",
            ScalarKind::Float => "number",
            ScalarKind::String => "string",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Scalar {
        kind: ScalarKind,
        format: Option<String>,
    },
    Enum(EnumId),
    Object {
        properties: Vec<Property>,
    },
    Array {
        element: Box<SchemaNode>,
    },
    Reference(DefId),
}

/// A named object member
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub node: SchemaNode,
}

impl Property {
    pub fn new(name: impl Into<String>, node: SchemaNode) -> Self {
        Self {
            name: name.into(),
            node,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: NodeKind,
    /// Declared layout; `None` means SingleRow, or for references the target's layout
    pub layout: Option<LayoutMode>,
    pub group: Option<GroupConfig>,
    /// Object whose properties are mutually exclusive variants
    pub one_of: bool,
    pub description: Option<String>,
}

impl SchemaNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            layout: None,
            group: None,
            one_of: false,
            description: None,
        }
    }

    pub fn scalar(kind: ScalarKind) -> Self {
        Self::new(NodeKind::Scalar { kind, format: None })
    }

    pub fn object(properties: Vec<Property>) -> Self {
        Self::new(NodeKind::Object { properties })
    }

    pub fn array(element: SchemaNode) -> Self {
        Self::new(NodeKind::Array {
            element: Box::new(element),
        })
    }

    /// Empty object standing in for a definition still being read
    pub(crate) fn placeholder() -> Self {
        Self::object(Vec::new())
    }

    pub fn with_layout(mut self, layout: LayoutMode) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn with_group(mut self, group: GroupConfig) -> Self {
        self.group = Some(group);
        self
    }

    pub fn layout(&self) -> LayoutMode {
        self.layout.unwrap_or_default()
    }

    pub fn properties(&self) -> &[Property] {
        match &self.kind {
            NodeKind::Object { properties } => properties,
            _ => &[],
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, NodeKind::Array { .. })
    }
}

// =============================================================================
// Content schema
// =============================================================================

/// A fully read schema document plus the definitions it references
#[derive(Debug)]
pub struct ContentSchema {
    pub title: String,
    pub path: PathBuf,
    pub root: SchemaNode,
    pub registry: ReferenceRegistry,
}

impl ContentSchema {
    /// Top-level properties of the document
    pub fn properties(&self) -> &[Property] {
        self.root.properties()
    }

    /// Top-level properties bound to sheets
    pub fn sheet_properties(&self) -> impl Iterator<Item = (&Property, &GroupConfig)> {
        self.properties()
            .iter()
            .filter_map(|p| p.node.group.as_ref().map(|g| (p, g)))
    }
}
