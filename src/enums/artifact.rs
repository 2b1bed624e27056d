use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};

use super::EnumCollector;
use crate::schema::{ContentSchema, GroupConfig, NodeKind};

/// File name suffix of generated enum schemas
pub const ENUM_ARTIFACT_SUFFIX: &str = ".enum.json";

const DRAFT_04: &str = "http://json-schema.org/draft-04/schema#";

/// `quest.schema.json` -> `quest.enum.json`, next to the schema
pub fn artifact_path(schema_path: &Path) -> PathBuf {
    let stem = crate::loader::document_stem(schema_path);
    schema_path.with_file_name(format!("{}{}", stem, ENUM_ARTIFACT_SUFFIX))
}

/// Build the enum schema document for `schema` from collected values.
///
/// Every declared enum gets a definition, `"None"` first and the collected
/// values after it with duplicates removed.
pub fn enum_artifact(schema: &ContentSchema, collector: &EnumCollector) -> Value {
    let mut definitions = Map::new();

    for (property, group) in schema.sheet_properties() {
        if !matches!(schema.registry.resolve(&property.node).node.kind, NodeKind::Array { .. }) {
            continue;
        }

        for column in &group.enum_columns {
            let name = GroupConfig::enum_name(&property.name, column);
            let mut seen = HashSet::new();
            let mut values = vec![Value::String("None".to_string())];
            seen.insert("None");
            for value in collector.values(&name).unwrap_or_default() {
                if seen.insert(value.as_str()) {
                    values.push(Value::String(value.clone()));
                }
            }

            definitions.insert(name, json!({ "type": "string", "enum": values }));
        }
    }

    json!({
        "$schema": DRAFT_04,
        "title": format!("{}Enum", schema.title),
        "type": "object",
        "additionalProperties": false,
        "definitions": definitions,
    })
}
