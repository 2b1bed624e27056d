//! Schema Loading
//!
//! Reads a JSON Schema document with the sheet extension blocks into a
//! [`ContentSchema`]. `$ref`s are resolved through the
//! [`ReferenceRegistry`]; refs into sibling documents
//! (`reward.schema.json#/definitions/Reward`) load those documents on demand.
//!
//! Extension keys read here:
//! - `x-contentConfig` (legacy `content_config`): `sheets`, `enums`, `keys`
//! - `x-valueRange` (legacy `extra.xlsxRead`): `SingleRow|MultiRow|SingleColumn`
//! - `x-oneOf`: object whose properties are exclusive variants
//! - `x-enumNames`: names paired with `enum` values
//!
//! Any other key is ignored.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::enums::ENUM_ARTIFACT_SUFFIX;
use crate::error::{ProjectError, Result};
use crate::registry::ReferenceRegistry;
use crate::schema::{
    ContentSchema, DefId, EnumDef, EnumValue, GroupConfig, LayoutMode, NodeKind, Property,
    ScalarKind, SchemaNode, UniqueKey,
};

/// Reads schema documents and the documents they reference
pub struct SchemaLoader {
    documents: HashMap<PathBuf, Value>,
    registry: ReferenceRegistry,
}

impl SchemaLoader {
    /// Load a schema file
    pub fn load(path: &Path) -> Result<ContentSchema> {
        let mut loader = Self::new();
        let document = loader.document(path)?.clone();
        loader.finish(path, &document)
    }

    /// Load from an already parsed root document; sibling refs resolve next to `path`
    pub fn from_value(path: &Path, document: Value) -> Result<ContentSchema> {
        let mut loader = Self::new();
        loader.documents.insert(path.to_path_buf(), document.clone());
        loader.finish(path, &document)
    }

    fn new() -> Self {
        Self {
            documents: HashMap::new(),
            registry: ReferenceRegistry::new(),
        }
    }

    fn finish(mut self, path: &Path, document: &Value) -> Result<ContentSchema> {
        // Every local definition is registered, referenced or not
        for key in ["definitions", "$defs"] {
            if let Some(defs) = document.get(key).and_then(Value::as_object) {
                for name in defs.keys() {
                    self.resolve_reference(&format!("#/{}/{}", key, name), path)?;
                }
            }
        }

        let root = self.read_node(document, path, None, "#")?;
        if !matches!(root.kind, NodeKind::Object { .. }) {
            return Err(ProjectError::SchemaRead {
                path: path.to_path_buf(),
                reason: "root schema must be an object".to_string(),
            });
        }

        let title = document
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| document_stem(path));

        debug!(
            schema = %path.display(),
            definitions = self.registry.definition_count(),
            "loaded schema"
        );

        Ok(ContentSchema {
            title,
            path: path.to_path_buf(),
            root,
            registry: self.registry,
        })
    }

    /// Load (once) and return a document
    fn document(&mut self, path: &Path) -> Result<&Value> {
        if !self.documents.contains_key(path) {
            let content = fs::read_to_string(path).map_err(|e| ProjectError::SchemaRead {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            let value: Value =
                serde_json::from_str(&content).map_err(|e| ProjectError::SchemaRead {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            self.documents.insert(path.to_path_buf(), value);
        }

        Ok(&self.documents[path])
    }

    /// Resolve a `$ref` to a registry slot, reading the target on first use
    fn resolve_reference(&mut self, reference: &str, document: &Path) -> Result<DefId> {
        let (file, pointer) = reference.split_once('#').unwrap_or((reference, ""));
        let target_doc = if file.is_empty() {
            document.to_path_buf()
        } else {
            document
                .parent()
                .map(|dir| dir.join(file))
                .unwrap_or_else(|| PathBuf::from(file))
        };

        let name = if pointer.is_empty() {
            document_stem(&target_doc)
        } else {
            pointer.rsplit('/').next().unwrap_or_default().to_string()
        };

        if let Some(id) = self.registry.lookup(&name) {
            return Ok(id);
        }

        let unresolved = || ProjectError::UnresolvedReference {
            reference: reference.to_string(),
            document: document.display().to_string(),
        };

        if !target_doc.exists() && is_enum_artifact(&target_doc) {
            // Not generated yet; values pass through until it is
            warn!(
                reference,
                artifact = %target_doc.display(),
                "enum artifact missing, run genenum"
            );
            let (id, _) = self.registry.reserve(&name, &target_doc);
            let def = EnumDef {
                name: Some(name.clone()),
                kind: ScalarKind::String,
                values: Vec::new(),
            };
            let node = SchemaNode::new(NodeKind::Enum(self.registry.register_enum(def)));
            self.registry.populate(id, node);
            return Ok(id);
        }

        let raw = self
            .document(&target_doc)
            .map_err(|_| unresolved())?
            .pointer(pointer)
            .cloned()
            .ok_or_else(unresolved)?;

        // Slot goes in before the body is read so self references land on it
        let (id, _) = self.registry.reserve(&name, &target_doc);
        let node = self.read_node(&raw, &target_doc, Some(&name), reference)?;
        self.registry.populate(id, node);

        Ok(id)
    }

    fn read_node(
        &mut self,
        raw: &Value,
        document: &Path,
        definition: Option<&str>,
        at: &str,
    ) -> Result<SchemaNode> {
        let obj = raw.as_object().ok_or_else(|| ProjectError::SchemaRead {
            path: document.to_path_buf(),
            reason: format!("schema at {} is not an object", at),
        })?;

        let kind = if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            NodeKind::Reference(self.resolve_reference(reference, document)?)
        } else if let Some(values) = obj.get("enum").and_then(Value::as_array) {
            let def = read_enum(definition, raw, values);
            NodeKind::Enum(self.registry.register_enum(def))
        } else {
            match type_name(raw) {
                Some("object") | None if obj.contains_key("properties") => {
                    self.read_object(raw, document, at)?
                }
                Some("object") => NodeKind::Object {
                    properties: Vec::new(),
                },
                Some("array") => {
                    let items = obj.get("items").ok_or_else(|| ProjectError::SchemaRead {
                        path: document.to_path_buf(),
                        reason: format!("array at {} has no items", at),
                    })?;
                    let element = self.read_node(items, document, None, &format!("{}/items", at))?;
                    NodeKind::Array {
                        element: Box::new(element),
                    }
                }
                Some(other) => NodeKind::Scalar {
                    kind: scalar_kind(other).ok_or_else(|| ProjectError::SchemaRead {
                        path: document.to_path_buf(),
                        reason: format!("unsupported type '{}' at {}", other, at),
                    })?,
                    format: obj.get("format").and_then(Value::as_str).map(str::to_string),
                },
                None => {
                    return Err(ProjectError::SchemaRead {
                        path: document.to_path_buf(),
                        reason: format!("schema at {} has no type", at),
                    })
                }
            }
        };

        let mut node = SchemaNode::new(kind);
        node.description = obj
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        read_extensions(&mut node, raw, at)?;
        Ok(node)
    }

    fn read_object(&mut self, raw: &Value, document: &Path, at: &str) -> Result<NodeKind> {
        let mut properties = Vec::new();
        if let Some(props) = raw.get("properties").and_then(Value::as_object) {
            for (name, prop) in props {
                let node = self.read_node(prop, document, None, &format!("{}/properties/{}", at, name))?;
                properties.push(Property::new(name.clone(), node));
            }
        }
        Ok(NodeKind::Object { properties })
    }
}

/// The single non-null `type` of a schema
fn type_name(raw: &Value) -> Option<&str> {
    match raw.get("type")? {
        Value::String(s) => Some(s.as_str()),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null"),
        _ => None,
    }
}

fn scalar_kind(name: &str) -> Option<ScalarKind> {
    match name {
        "boolean" => Some(ScalarKind::Bool),
        "integer" => Some(ScalarKind::Int),
        "number" => Some(ScalarKind::Float),
        "string" => Some(ScalarKind::String),
        _ => None,
    }
}

/// File name without `.schema.json` / `.json`
pub(crate) fn document_stem(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .trim_end_matches(".json")
        .trim_end_matches(".schema")
        .to_string()
}

fn is_enum_artifact(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.ends_with(ENUM_ARTIFACT_SUFFIX))
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn read_enum(name: Option<&str>, raw: &Value, values: &[Value]) -> EnumDef {
    let kind = match type_name(raw) {
        Some("integer") => ScalarKind::Int,
        _ => ScalarKind::String,
    };

    let to_enum_value = |v: &Value| match v.as_i64() {
        Some(i) => EnumValue::Int(i),
        None => EnumValue::Text(value_text(v)),
    };

    let names: Vec<&str> = raw
        .get("x-enumNames")
        .and_then(Value::as_array)
        .map(|n| n.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    // Paired names only when the counts agree; otherwise each value names itself
    let pairs = if names.len() == values.len() {
        names
            .iter()
            .zip(values)
            .map(|(n, v)| (n.to_string(), to_enum_value(v)))
            .collect()
    } else {
        values
            .iter()
            .map(|v| (value_text(v), to_enum_value(v)))
            .collect()
    };

    EnumDef {
        name: name.map(str::to_string),
        kind,
        values: pairs,
    }
}

fn read_extensions(node: &mut SchemaNode, raw: &Value, at: &str) -> Result<()> {
    let invalid = |reason: String| ProjectError::InvalidExtension {
        path: at.to_string(),
        reason,
    };

    for key in ["content_config", "x-contentConfig"] {
        if let Some(block) = raw.get(key) {
            let block = block
                .as_object()
                .ok_or_else(|| invalid(format!("{} must be an object", key)))?;
            node.group = Some(read_group(block, at)?);
        }
    }

    let legacy_layout = raw.pointer("/extra/xlsxRead").and_then(Value::as_str);
    let layout = raw.get("x-valueRange").and_then(Value::as_str).or(legacy_layout);
    if let Some(layout) = layout {
        node.layout = Some(
            LayoutMode::parse(layout)
                .ok_or_else(|| invalid(format!("unknown value range '{}'", layout)))?,
        );
    }

    if let Some(one_of) = raw.get("x-oneOf") {
        node.one_of = one_of
            .as_bool()
            .ok_or_else(|| invalid("x-oneOf must be a boolean".to_string()))?;
    }

    Ok(())
}

fn read_group(block: &serde_json::Map<String, Value>, at: &str) -> Result<GroupConfig> {
    let strings = |key: &str| -> Vec<String> {
        block
            .get(key)
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default()
    };

    let mut unique_keys = Vec::new();
    match block.get("keys") {
        Some(Value::Object(keys)) => {
            for (name, key) in keys {
                let fields: Vec<String> = key
                    .get("fields")
                    .and_then(Value::as_array)
                    .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
                    .unwrap_or_default();

                if fields.is_empty() {
                    warn!(key = %name, at, "key has no fields, skipped");
                    continue;
                }

                unique_keys.push(UniqueKey {
                    name: upper_first(name),
                    fields,
                    unique: key.get("unique").and_then(Value::as_bool).unwrap_or(true),
                });
            }
        }
        // Generated schemas sometimes carry an empty `keys: []`
        Some(Value::Array(a)) if a.is_empty() => {}
        Some(_) => {
            return Err(ProjectError::InvalidExtension {
                path: at.to_string(),
                reason: "keys must be an object".to_string(),
            })
        }
        None => {}
    }

    Ok(GroupConfig {
        sheets: strings("sheets"),
        enum_columns: strings("enums"),
        unique_keys,
    })
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
