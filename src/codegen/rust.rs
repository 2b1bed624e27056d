//! Rust Code Emitter
//!
//! Turns one [`ContentSchema`] into a Rust module: a type per definition, a
//! type per inline object or enum, the content struct that a converted data
//! file deserializes into, and a lookup table over its unique keys.
//!
//! Key constraints:
//! - The emitter reads the schema model only, never raw schema JSON
//! - A type name already emitted (by this module or an earlier one) is not emitted again

use std::collections::HashSet;
use std::fmt::Write as _;

use tracing::warn;

use super::cycles::CycleAnalysis;
use crate::enums::ENUM_ARTIFACT_SUFFIX;
use crate::registry::Definition;
use crate::schema::{
    ContentSchema, DefId, EnumDef, EnumValue, NodeKind, Property, ScalarKind, SchemaNode, UniqueKey,
};

const STRUCT_DERIVES: &str = "#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]\n";
const ENUM_DERIVES: &str = "#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]\n";

/// Emits one content module
pub(crate) struct ModuleEmitter<'a> {
    schema: &'a ContentSchema,
    cycles: CycleAnalysis,
    /// Type names emitted so far in this run
    emitted: &'a mut HashSet<String>,
    items: Vec<String>,
}

impl<'a> ModuleEmitter<'a> {
    pub(crate) fn new(schema: &'a ContentSchema, emitted: &'a mut HashSet<String>) -> Self {
        Self {
            schema,
            cycles: CycleAnalysis::compute(&schema.registry),
            emitted,
            items: Vec::new(),
        }
    }

    /// Emit the module; returns the code and the number of types in it
    pub(crate) fn emit(mut self) -> (String, usize) {
        let schema = self.schema;
        for (id, def) in schema.registry.definitions() {
            self.emit_definition(id, def);
        }

        let mut root_name = type_name(&schema.title);
        if self.emitted.contains(&root_name) {
            root_name.push_str("Content");
        }

        let properties: Vec<&'a Property> = schema.sheet_properties().map(|(p, _)| p).collect();
        if self.emitted.insert(root_name.clone()) {
            self.emit_struct(&root_name, properties.iter().copied(), None, Some("Content of one converted data file"));
            self.emit_table(&root_name);
        }

        let type_count = self.items.len();
        let mut code = String::new();
        let _ = writeln!(code, "//! Generated from {} - DO NOT EDIT", schema.path.display());
        code.push_str("//!\n");
        code.push_str("//! Regenerate with `sheet-projector gencode`.\n\n");
        code.push_str("#![allow(unused_imports)]\n\n");
        code.push_str("use std::collections::HashMap;\n\n");
        code.push_str("use serde::{Deserialize, Serialize};\n\n");
        code.push_str("use super::*;\n");
        for item in &self.items {
            code.push('\n');
            code.push_str(item);
        }

        (code, type_count)
    }

    // =========================================================================
    // Definitions
    // =========================================================================

    fn emit_definition(&mut self, id: DefId, def: &'a Definition) {
        if is_collected_enum(def) {
            return;
        }

        let name = type_name(&def.name);
        if !self.emitted.insert(name.clone()) {
            return;
        }

        let doc = def.node.description.as_deref();
        match &def.node.kind {
            NodeKind::Object { properties } if def.node.one_of => {
                self.emit_variant_enum(&name, properties, Some(id), doc)
            }
            NodeKind::Object { properties } => self.emit_struct(&name, properties.iter(), Some(id), doc),
            NodeKind::Enum(enum_id) => {
                let schema = self.schema;
                let enum_def = schema.registry.enum_def(*enum_id);
                self.emit_enum(&name, enum_def, doc)
            }
            _ => {
                let target = self.field_type(&def.node, &name, "", Some(id));
                let mut out = String::new();
                emit_doc(&mut out, doc, &name);
                let _ = writeln!(out, "pub type {} = {};", name, target);
                self.items.push(out);
            }
        }
    }

    /// Rust type for `node`, emitting any inline type it needs.
    ///
    /// Inline types are named `{owner}{Field}`. `owner_def` is the definition
    /// whose direct field this is, `None` below an array.
    fn field_type(
        &mut self,
        node: &'a SchemaNode,
        owner: &str,
        field: &str,
        owner_def: Option<DefId>,
    ) -> String {
        let schema = self.schema;
        let registry = &schema.registry;
        match &node.kind {
            NodeKind::Scalar { kind, format } => scalar_type(*kind, format.as_deref()).to_string(),
            NodeKind::Enum(id) => {
                let def = registry.enum_def(*id);
                if def.values.is_empty() {
                    return "String".to_string();
                }
                let name = format!("{}{}", owner, type_name(field));
                if self.emitted.insert(name.clone()) {
                    self.emit_enum(&name, def, node.description.as_deref());
                }
                name
            }
            NodeKind::Object { properties } => {
                let name = format!("{}{}", owner, type_name(field));
                if self.emitted.insert(name.clone()) {
                    let doc = node.description.as_deref();
                    if node.one_of {
                        self.emit_variant_enum(&name, properties, owner_def, doc);
                    } else {
                        self.emit_struct(&name, properties.iter(), owner_def, doc);
                    }
                }
                name
            }
            NodeKind::Array { element } => {
                format!("Vec<{}>", self.field_type(element, owner, field, None))
            }
            NodeKind::Reference(id) => {
                let def = registry.definition(*id);
                if is_collected_enum(def) {
                    return "String".to_string();
                }
                let name = type_name(&def.name);
                match owner_def {
                    Some(from) if self.cycles.needs_boxing(from, *id) => format!("Box<{}>", name),
                    _ => name,
                }
            }
        }
    }

    // =========================================================================
    // Struct Emission
    // =========================================================================

    fn emit_struct(
        &mut self,
        name: &str,
        properties: impl Iterator<Item = &'a Property>,
        owner_def: Option<DefId>,
        doc: Option<&str>,
    ) {
        let mut fields = String::new();
        for property in properties {
            let rust_type = self.field_type(&property.node, name, &property.name, owner_def);
            let ident = field_name(&property.name);
            if let Some(desc) = &property.node.description {
                let _ = writeln!(fields, "    /// {}", desc);
            }
            if ident.trim_start_matches("r#") != property.name {
                let _ = writeln!(fields, "    #[serde(rename = \"{}\")]", property.name);
            }
            let _ = writeln!(fields, "    pub {}: {},", ident, rust_type);
        }

        let mut out = String::new();
        emit_doc(&mut out, doc, name);
        out.push_str(STRUCT_DERIVES);
        let _ = writeln!(out, "pub struct {} {{", name);
        out.push_str(&fields);
        out.push_str("}\n");
        self.items.push(out);
    }

    // =========================================================================
    // Variant Enum Emission
    // =========================================================================

    /// Exclusive properties become an externally tagged enum
    fn emit_variant_enum(
        &mut self,
        name: &str,
        variants: &'a [Property],
        owner_def: Option<DefId>,
        doc: Option<&str>,
    ) {
        let mut body = String::new();
        for variant in variants {
            let rust_type = self.field_type(&variant.node, name, &variant.name, owner_def);
            let variant_name = variant_name(&variant.name);
            if variant_name != variant.name {
                let _ = writeln!(body, "    #[serde(rename = \"{}\")]", variant.name);
            }
            let _ = writeln!(body, "    {}({}),", variant_name, rust_type);
        }

        let mut out = String::new();
        emit_doc(&mut out, doc, name);
        out.push_str(STRUCT_DERIVES);
        let _ = writeln!(out, "pub enum {} {{", name);
        out.push_str(&body);
        out.push_str("}\n");
        self.items.push(out);
    }

    // =========================================================================
    // Enum Emission
    // =========================================================================

    fn emit_enum(&mut self, name: &str, def: &EnumDef, doc: Option<&str>) {
        let mut out = String::new();
        emit_doc(&mut out, doc, name);
        out.push_str(ENUM_DERIVES);

        let mut used = HashSet::new();
        let variants: Vec<(String, &EnumValue)> = def
            .values
            .iter()
            .map(|(n, v)| {
                let mut ident = variant_name(n);
                while !used.insert(ident.clone()) {
                    ident.push('_');
                }
                (ident, v)
            })
            .collect();

        if def.kind == ScalarKind::Int {
            emit_int_enum(&mut out, name, &variants);
        } else {
            let _ = writeln!(out, "pub enum {} {{", name);
            // Empty cells project to "None"
            if !def.values.iter().any(|(_, v)| *v == EnumValue::Text("None".to_string())) {
                out.push_str("    None,\n");
            }
            for (ident, value) in &variants {
                let text = match value {
                    EnumValue::Text(s) => s.clone(),
                    EnumValue::Int(i) => i.to_string(),
                };
                if *ident != text {
                    let _ = writeln!(out, "    #[serde(rename = \"{}\")]", text);
                }
                let _ = writeln!(out, "    {},", ident);
            }
            out.push_str("}\n");
        }

        self.items.push(out);
    }

    // =========================================================================
    // Table Emission
    // =========================================================================

    /// Lookup table with one map per unique key
    fn emit_table(&mut self, root_name: &str) {
        let schema = self.schema;
        let mut maps = Vec::new();

        for (property, group) in schema.sheet_properties() {
            let NodeKind::Array { element } = &schema.registry.resolve(&property.node).node.kind else {
                continue;
            };
            let element_name = match &element.kind {
                NodeKind::Reference(id) => type_name(&schema.registry.definition(*id).name),
                _ => format!("{}{}", root_name, type_name(&property.name)),
            };
            let fields = schema.registry.resolve(element).node.properties();

            for key in group.unique_keys.iter().filter(|k| k.unique) {
                match key_type(schema, &element_name, fields, key) {
                    Some(key_type) => maps.push(KeyMap {
                        map: format!("{}_by_{}", to_snake_case(&property.name), to_snake_case(&key.name)),
                        property: field_name(&property.name),
                        element: element_name.clone(),
                        key_type,
                        fields: key.fields.iter().map(|f| field_name(f)).collect(),
                    }),
                    None => warn!(
                        property = %property.name,
                        key = %key.name,
                        "key fields missing or not hashable, no lookup generated"
                    ),
                }
            }
        }

        if maps.is_empty() {
            return;
        }

        let table = format!("{}Table", root_name);
        let mut out = String::new();
        let _ = writeln!(out, "/// Unique key lookups over [`{}`]", root_name);
        out.push_str("#[derive(Debug, Clone)]\n");
        let _ = writeln!(out, "pub struct {} {{", table);
        let _ = writeln!(out, "    pub data: {},", root_name);
        for m in &maps {
            let _ = writeln!(out, "    {}: HashMap<{}, usize>,", m.map, m.key_type);
        }
        out.push_str("}\n\n");

        let _ = writeln!(out, "impl {} {{", table);
        let _ = writeln!(out, "    pub fn new(data: {}) -> Self {{", root_name);
        for m in &maps {
            let _ = writeln!(out, "        let {} = data", m.map);
            let _ = writeln!(out, "            .{}", m.property);
            out.push_str("            .iter()\n");
            out.push_str("            .enumerate()\n");
            let _ = writeln!(out, "            .map(|(i, item)| ({}, i))", m.key_expr());
            out.push_str("            .collect();\n");
        }
        let names: Vec<&str> = maps.iter().map(|m| m.map.as_str()).collect();
        let _ = writeln!(out, "        Self {{ data, {} }}", names.join(", "));
        out.push_str("    }\n");
        for m in &maps {
            out.push('\n');
            let _ = writeln!(
                out,
                "    pub fn {}(&self, key: &{}) -> Option<&{}> {{",
                m.map, m.key_type, m.element
            );
            let _ = writeln!(
                out,
                "        self.{}.get(key).and_then(|i| self.data.{}.get(*i))",
                m.map, m.property
            );
            out.push_str("    }\n");
        }
        out.push_str("}\n");
        self.items.push(out);
    }
}

struct KeyMap {
    map: String,
    property: String,
    element: String,
    key_type: String,
    fields: Vec<String>,
}

impl KeyMap {
    fn key_expr(&self) -> String {
        match self.fields.as_slice() {
            [single] => format!("item.{}.clone()", single),
            many => format!(
                "({})",
                many.iter()
                    .map(|f| format!("item.{}.clone()", f))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

/// Hashable Rust type of a key, `None` when a field is missing or is a float
fn key_type(schema: &ContentSchema, element: &str, fields: &[Property], key: &UniqueKey) -> Option<String> {
    let mut types = Vec::with_capacity(key.fields.len());
    for name in &key.fields {
        let field = fields.iter().find(|f| &f.name == name)?;
        let ty = match &field.node.kind {
            NodeKind::Scalar { kind: ScalarKind::Float, .. } => return None,
            NodeKind::Scalar { kind, format } => scalar_type(*kind, format.as_deref()).to_string(),
            NodeKind::Enum(id) if schema.registry.enum_def(*id).values.is_empty() => "String".to_string(),
            NodeKind::Enum(_) => format!("{}{}", element, type_name(name)),
            NodeKind::Reference(id) => {
                let def = schema.registry.definition(*id);
                match &def.node.kind {
                    _ if is_collected_enum(def) => "String".to_string(),
                    NodeKind::Enum(_) => type_name(&def.name),
                    _ => return None,
                }
            }
            _ => return None,
        };
        types.push(ty);
    }

    match types.as_slice() {
        [] => None,
        [single] => Some(single.clone()),
        many => Some(format!("({})", many.join(", "))),
    }
}

fn emit_int_enum(out: &mut String, name: &str, variants: &[(String, &EnumValue)]) {
    out.push_str("#[serde(try_from = \"i64\", into = \"i64\")]\n");
    let _ = writeln!(out, "pub enum {} {{", name);
    for (ident, value) in variants {
        if let EnumValue::Int(i) = value {
            let _ = writeln!(out, "    {} = {},", ident, i);
        }
    }
    out.push_str("}\n\n");

    let _ = writeln!(out, "impl From<{}> for i64 {{", name);
    let _ = writeln!(out, "    fn from(value: {}) -> Self {{", name);
    out.push_str("        value as i64\n");
    out.push_str("    }\n}\n\n");

    let _ = writeln!(out, "impl TryFrom<i64> for {} {{", name);
    out.push_str("    type Error = String;\n\n");
    out.push_str("    fn try_from(value: i64) -> Result<Self, Self::Error> {\n");
    out.push_str("        match value {\n");
    for (ident, value) in variants {
        if let EnumValue::Int(i) = value {
            let _ = writeln!(out, "            {} => Ok(Self::{}),", i, ident);
        }
    }
    let _ = writeln!(
        out,
        "            other => Err(format!(\"unknown {} value {{}}\", other)),",
        name
    );
    out.push_str("        }\n    }\n}\n");
}

fn emit_doc(out: &mut String, doc: Option<&str>, name: &str) {
    match doc {
        Some(doc) => {
            for line in doc.lines() {
                let _ = writeln!(out, "/// {}", line);
            }
        }
        None => {
            let _ = writeln!(out, "/// {}", name);
        }
    }
}

/// Enum definitions read from a generated enum artifact are open sets
fn is_collected_enum(def: &Definition) -> bool {
    matches!(def.node.kind, NodeKind::Enum(_))
        && def
            .document
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(ENUM_ARTIFACT_SUFFIX))
}

// =============================================================================
// Type Mapping
// =============================================================================

pub(crate) fn scalar_type(kind: ScalarKind, format: Option<&str>) -> &'static str {
    match (kind, format) {
        (ScalarKind::Bool, _) => "bool",
        (ScalarKind::Int, Some("int64")) => "i64",
        (ScalarKind::Int, _) => "i32",
        (ScalarKind::Float, Some("float")) => "f32",
        (ScalarKind::Float, _) => "f64",
        (ScalarKind::String, _) => "String",
    }
}

// =============================================================================
// Helper Utilities
// =============================================================================

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub",
    "ref", "return", "static", "struct", "trait", "true", "type", "unsafe", "use", "where", "while",
];

/// Type name for a schema name: PascalCase, identifier characters only
pub(crate) fn type_name(name: &str) -> String {
    let name = to_pascal_case(name);
    match name.chars().next() {
        Some(c) if c.is_ascii_digit() => format!("T{}", name),
        _ => name,
    }
}

fn variant_name(value: &str) -> String {
    let name = to_pascal_case(value);
    match name.chars().next() {
        None => "Empty".to_string(),
        Some(c) if c.is_ascii_digit() => format!("V{}", name),
        _ => name,
    }
}

/// Field name for a property: snake_case, keywords escaped
pub(crate) fn field_name(name: &str) -> String {
    let snake = to_snake_case(name);
    if KEYWORDS.contains(&snake.as_str()) {
        format!("r#{}", snake)
    } else {
        snake
    }
}

/// Convert to PascalCase
pub(crate) fn to_pascal_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = true;

    for c in s.chars() {
        if !c.is_ascii_alphanumeric() {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }

    result
}

/// Convert to snake_case
pub(crate) fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;

    for c in s.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if c.is_ascii_alphanumeric() {
            result.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        } else if !result.is_empty() && !result.ends_with('_') {
            result.push('_');
            prev_lower = false;
        }
    }

    result
}
