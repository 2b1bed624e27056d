//! Code Generation
//!
//! Generates Rust modules from content schemas. The generator only reads the
//! schema model; names emitted for one content are not emitted again for the
//! next, so definitions shared through sibling schema files exist once.
//!
//! Output layout in the code directory:
//! - `{content}.rs` per content
//! - `mod.rs` declaring and re-exporting every content module

pub mod cycles;
pub mod rust;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::checksum::{write_if_changed, WriteOutcome};
use crate::error::Result;
use crate::schema::ContentSchema;

// =============================================================================
// Generated Output
// =============================================================================

/// One generated module
#[derive(Debug, Clone)]
pub struct GeneratedModule {
    /// Module name, also the file stem
    pub name: String,
    pub code: String,
    /// Number of items emitted
    pub type_count: usize,
}

/// Generator state for one run
#[derive(Debug, Default)]
pub struct RustGenerator {
    emitted: HashSet<String>,
    modules: Vec<GeneratedModule>,
}

impl RustGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the module for one content
    pub fn generate(&mut self, content_name: &str, schema: &ContentSchema) -> &GeneratedModule {
        let (code, type_count) = rust::ModuleEmitter::new(schema, &mut self.emitted).emit();
        self.modules.push(GeneratedModule {
            name: rust::to_snake_case(content_name),
            code,
            type_count,
        });
        &self.modules[self.modules.len() - 1]
    }

    pub fn modules(&self) -> &[GeneratedModule] {
        &self.modules
    }

    /// `mod.rs` for the generated modules
    pub fn mod_file(&self) -> String {
        let mut output = String::new();
        output.push_str("//! Generated content types - DO NOT EDIT\n\n");
        for module in &self.modules {
            output.push_str(&format!("pub mod {};\n", module.name));
        }
        output.push('\n');
        for module in &self.modules {
            output.push_str(&format!("pub use {}::*;\n", module.name));
        }
        output
    }

    /// Write every module plus `mod.rs` into `dir`, skipping unchanged files
    pub fn write(&self, dir: &Path) -> Result<Vec<(PathBuf, WriteOutcome)>> {
        let mut written = Vec::with_capacity(self.modules.len() + 1);
        for module in &self.modules {
            let path = dir.join(format!("{}.rs", module.name));
            let outcome = write_if_changed(&path, &module.code)?;
            info!(file = %path.display(), types = module.type_count, ?outcome, "generated module");
            written.push((path, outcome));
        }

        let path = dir.join("mod.rs");
        let outcome = write_if_changed(&path, &self.mod_file())?;
        written.push((path, outcome));
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::SchemaLoader;
    use serde_json::json;

    fn quest_schema() -> ContentSchema {
        SchemaLoader::from_value(
            Path::new("quest.schema.json"),
            json!({
                "title": "QuestData",
                "type": "object",
                "properties": {
                    "Quests": {
                        "type": "array",
                        "items": { "$ref": "#/definitions/Quest" },
                        "x-contentConfig": {
                            "sheets": ["Quest"],
                            "keys": { "id": { "fields": ["QuestId"] } }
                        }
                    },
                    "Notes": { "type": "string" }
                },
                "definitions": {
                    "Quest": {
                        "type": "object",
                        "x-valueRange": "MultiRow",
                        "properties": {
                            "QuestId": { "type": "integer" },
                            "Element": { "$ref": "#/definitions/Element" },
                            "Effect": { "$ref": "#/definitions/Effect" },
                            "Next": { "$ref": "#/definitions/Quest" },
                            "Rewards": { "type": "array", "items": { "$ref": "#/definitions/Quest" } }
                        }
                    },
                    "Element": { "type": "integer", "enum": [1, 2], "x-enumNames": ["Fire", "Ice"] },
                    "Effect": {
                        "type": "object",
                        "x-oneOf": true,
                        "x-valueRange": "SingleColumn",
                        "properties": {
                            "Heal": {
                                "type": "object",
                                "properties": { "amount": { "type": "integer", "format": "int64" } }
                            }
                        }
                    }
                }
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_generates_structs_enums_and_table() {
        let schema = quest_schema();
        let mut generator = RustGenerator::new();
        let code = generator.generate("Quest", &schema).code.clone();

        assert!(code.contains("pub struct Quest {"));
        assert!(code.contains("    #[serde(rename = \"QuestId\")]\n    pub quest_id: i32,"));
        assert!(code.contains("pub next: Box<Quest>,"));
        assert!(code.contains("pub rewards: Vec<Quest>,"));
        assert!(code.contains("#[serde(try_from = \"i64\", into = \"i64\")]\npub enum Element {"));
        assert!(code.contains("    Fire = 1,"));
        assert!(code.contains("pub enum Effect {\n    Heal(EffectHeal),"));
        assert!(code.contains("pub amount: i64,"));
        assert!(code.contains("pub struct QuestData {"));
        assert!(!code.contains("notes"));
        assert!(code.contains("quests_by_id: HashMap<i32, usize>,"));
        assert!(code.contains("pub fn quests_by_id(&self, key: &i32) -> Option<&Quest> {"));
    }

    #[test]
    fn test_shared_names_are_emitted_once_per_run() {
        let schema = quest_schema();
        let mut generator = RustGenerator::new();
        generator.generate("Quest", &schema);
        let second = generator.generate("QuestCopy", &schema).code.clone();

        assert!(!second.contains("pub struct Quest {"));
        assert!(second.contains("pub struct QuestDataContent {"));

        let mod_file = generator.mod_file();
        assert!(mod_file.contains("pub mod quest;\npub mod quest_copy;"));
        assert!(mod_file.contains("pub use quest_copy::*;"));
    }

    #[test]
    fn test_write_skips_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let schema = quest_schema();
        let mut generator = RustGenerator::new();
        generator.generate("Quest", &schema);

        let first = generator.write(dir.path()).unwrap();
        assert!(first.iter().all(|(_, o)| *o == WriteOutcome::Written));
        let second = generator.write(dir.path()).unwrap();
        assert!(second.iter().all(|(_, o)| *o == WriteOutcome::Unchanged));
        assert!(dir.path().join("quest.rs").exists());
    }
}
