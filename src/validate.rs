//! Data file validation against content schemas
//!
//! The content schema is compiled once per content. A file identifier is
//! injected into the compiled document so `other.json#/definitions/X`
//! references resolve against the schema's own directory.

use std::fs;
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ProjectError, Result};

/// Compiled validator for one content schema
pub struct DataValidator {
    schema_path: PathBuf,
    compiled: JSONSchema,
}

/// Outcome of validating a batch of data files
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub passed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, Vec<String>)>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.failed.iter().map(|(_, errors)| errors.len()).sum()
    }
}

impl DataValidator {
    /// Compile the schema at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let read_error = |reason: String| ProjectError::SchemaRead {
            path: path.to_path_buf(),
            reason,
        };

        let text = fs::read_to_string(path).map_err(|e| read_error(e.to_string()))?;
        let mut document: Value = serde_json::from_str(&text).map_err(|e| read_error(e.to_string()))?;

        let canonical = fs::canonicalize(path).map_err(|e| read_error(e.to_string()))?;
        inject_id(&mut document, &format!("file://{}", canonical.display()));

        Self::compile(path, &document)
    }

    /// Compile an in-memory schema document
    pub fn compile(path: &Path, document: &Value) -> Result<Self> {
        let compiled = JSONSchema::compile(document).map_err(|e| ProjectError::SchemaRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            schema_path: path.to_path_buf(),
            compiled,
        })
    }

    pub fn schema_path(&self) -> &Path {
        &self.schema_path
    }

    /// Validate one value; `file` names it in the error
    pub fn validate_value(&self, file: &Path, data: &Value) -> Result<()> {
        let errors: Vec<String> = match self.compiled.validate(data) {
            Ok(()) => return Ok(()),
            Err(errors) => errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    let at = if path.is_empty() { "/" } else { path.as_str() };
                    format!("{}: {} ({})", at, e, e.instance)
                })
                .collect(),
        };

        Err(ProjectError::Validation {
            file: file.to_path_buf(),
            errors,
        })
    }

    pub fn validate_file(&self, file: &Path) -> Result<()> {
        let text = fs::read_to_string(file)?;
        let data: Value = serde_json::from_str(&text)?;
        self.validate_value(file, &data)
    }

    /// Validate every file, logging each failure
    pub fn validate_files(&self, files: &[PathBuf]) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();
        for file in files {
            match self.validate_file(file) {
                Ok(()) => {
                    debug!(file = %file.display(), "valid");
                    report.passed.push(file.clone());
                }
                Err(ProjectError::Validation { file, errors }) => {
                    for error in &errors {
                        warn!(file = %file.display(), "{}", error);
                    }
                    report.failed.push((file, errors));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }
}

/// Draft-04 documents identify themselves with `id`, later drafts with `$id`
fn inject_id(document: &mut Value, id: &str) {
    let Some(object) = document.as_object_mut() else {
        return;
    };
    let draft_04 = object
        .get("$schema")
        .and_then(Value::as_str)
        .is_some_and(|s| s.contains("draft-04"));
    let key = if draft_04 { "id" } else { "$id" };
    object.insert(key.to_string(), Value::String(id.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quest_schema() -> Value {
        json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "properties": {
                "Quests": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "QuestId": { "type": "integer" },
                            "Title": { "type": "string" }
                        },
                        "required": ["QuestId"]
                    },
                    "x-contentConfig": { "sheets": ["Quest"] }
                }
            }
        })
    }

    #[test]
    fn test_valid_data_passes() {
        let validator = DataValidator::compile(Path::new("quest.schema.json"), &quest_schema()).unwrap();
        let data = json!({ "Quests": [{ "QuestId": 1, "Title": "Intro" }] });
        assert!(validator.validate_value(Path::new("quest.json"), &data).is_ok());
    }

    #[test]
    fn test_errors_carry_path_and_value() {
        let validator = DataValidator::compile(Path::new("quest.schema.json"), &quest_schema()).unwrap();
        let data = json!({ "Quests": [{ "QuestId": "one" }] });

        match validator.validate_value(Path::new("quest.json"), &data) {
            Err(ProjectError::Validation { file, errors }) => {
                assert_eq!(file, PathBuf::from("quest.json"));
                assert_eq!(errors.len(), 1);
                assert!(errors[0].starts_with("/Quests/0/QuestId: "));
                assert!(errors[0].ends_with("(\"one\")"));
            }
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_sibling_reference_resolves_from_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("common.json"),
            json!({ "definitions": { "Id": { "type": "integer" } } }).to_string(),
        )
        .unwrap();
        let schema = json!({
            "type": "object",
            "properties": { "Id": { "$ref": "common.json#/definitions/Id" } }
        });
        let schema_path = dir.path().join("item.schema.json");
        fs::write(&schema_path, schema.to_string()).unwrap();

        let validator = DataValidator::load(&schema_path).unwrap();
        assert!(validator.validate_value(Path::new("a.json"), &json!({ "Id": 3 })).is_ok());
        assert!(validator.validate_value(Path::new("b.json"), &json!({ "Id": "x" })).is_err());
    }

    #[test]
    fn test_report_counts_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        let bad = dir.path().join("bad.json");
        fs::write(&good, json!({ "Quests": [{ "QuestId": 1 }] }).to_string()).unwrap();
        fs::write(&bad, json!({ "Quests": [{}, { "QuestId": 2.5 }] }).to_string()).unwrap();

        let validator = DataValidator::compile(Path::new("quest.schema.json"), &quest_schema()).unwrap();
        let report = validator.validate_files(&[good.clone(), bad.clone()]).unwrap();
        assert!(!report.is_ok());
        assert_eq!(report.passed, vec![good]);
        assert_eq!(report.failed[0].0, bad);
        assert_eq!(report.error_count(), 2);
    }

    #[test]
    fn test_inject_id_follows_draft() {
        let mut draft4 = json!({ "$schema": "http://json-schema.org/draft-04/schema#" });
        inject_id(&mut draft4, "file:///a.json");
        assert_eq!(draft4["id"], "file:///a.json");

        let mut later = json!({});
        inject_id(&mut later, "file:///a.json");
        assert_eq!(later["$id"], "file:///a.json");
    }
}
