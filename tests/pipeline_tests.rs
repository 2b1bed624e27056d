//! End-to-end tests of the configured pipeline: enum generation, conversion,
//! validation and code generation in a scratch project directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tempfile::TempDir;

use sheet_projector::{Converter, RustGenerator, SchemaLoader, ToolConfig, WriteOutcome};

fn fixtures_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Scratch project with the quest fixtures and a config file pointing at it
fn project() -> (TempDir, ToolConfig) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("schemas")).unwrap();
    fs::create_dir_all(root.join("sheets")).unwrap();

    for schema in ["quest.schema.json", "reward.schema.json"] {
        fs::copy(fixtures_path().join(schema), root.join("schemas").join(schema)).unwrap();
    }
    fs::copy(fixtures_path().join("Quest.json"), root.join("sheets/Quest_main.json")).unwrap();

    let config_path = root.join("sheet-projector.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[paths]
schema_dir = '{root}/schemas'
source_dir = '{root}/sheets'
data_dir = '{root}/data'
code_dir = '{root}/generated'

[output]
indent = 4

[[contents]]
name = "Quest"
schema = "quest.schema.json"
source = "Quest_*.json"
"#,
            root = root.display()
        ),
    )
    .unwrap();

    let config = ToolConfig::load_from(Some(&config_path)).unwrap();
    (dir, config)
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_convert_writes_then_skips_unchanged() {
    let (dir, config) = project();
    let converter = Converter::new(&config);
    let content = config.content("Quest").unwrap();

    let report = converter.convert_content(content).unwrap();
    let output = dir.path().join("data/Quest_main.json");
    assert_eq!(report.written, vec![output.clone()]);
    assert!(report.is_ok());

    let text = fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("{\n    \"Quests\": ["));
    assert!(text.ends_with("}\n"));

    let expected: Value = serde_json::from_str(include_str!("fixtures/quest.expected.json")).unwrap();
    assert_eq!(read_json(&output), expected);

    let again = converter.convert_content(content).unwrap();
    assert!(again.written.is_empty());
    assert_eq!(again.unchanged, vec![output]);
}

#[test]
fn test_bad_workbook_does_not_stop_the_batch() {
    let (dir, config) = project();
    fs::write(
        dir.path().join("sheets/Quest_broken.json"),
        json!({ "Quest": [{ "QuestId": "first" }], "Settings": [] }).to_string(),
    )
    .unwrap();

    let report = Converter::new(&config)
        .convert_content(config.content("Quest").unwrap())
        .unwrap();

    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].0.ends_with("Quest_broken.json"));
    assert!(report.failed[0].1.contains("column 'QuestId'"));
    assert_eq!(report.written, vec![dir.path().join("data/Quest_main.json")]);
}

#[test]
fn test_genenum_writes_artifact_once() {
    let (dir, config) = project();
    let converter = Converter::new(&config);
    let content = config.content("Quest").unwrap();

    let (path, outcome) = converter.generate_enums(content).unwrap().unwrap();
    assert_eq!(path, dir.path().join("schemas/quest.enum.json"));
    assert_eq!(outcome, WriteOutcome::Written);

    let artifact = read_json(&path);
    assert_eq!(
        artifact["definitions"]["Quests_CategoryEnum"],
        json!({ "type": "string", "enum": ["None", "Main", "Side"] })
    );

    let (_, outcome) = converter.generate_enums(content).unwrap().unwrap();
    assert_eq!(outcome, WriteOutcome::Unchanged);
}

#[test]
fn test_genenum_from_converted_data() {
    let (dir, config) = project();
    let converter = Converter::new(&config);
    let content = config.content("Quest").unwrap();

    converter.convert_content(content).unwrap();
    let (path, _) = converter.generate_enums_from_data(content).unwrap().unwrap();
    assert_eq!(path, dir.path().join("schemas/quest.enum.json"));
    assert_eq!(
        read_json(&path)["definitions"]["Quests_CategoryEnum"]["enum"],
        json!(["None", "Main", "Side"])
    );
}

#[test]
fn test_validate_reports_failing_file() {
    let (_dir, config) = project();
    let converter = Converter::new(&config);
    let content = config.content("Quest").unwrap();

    converter.convert_content(content).unwrap();
    let report = converter.validate_content(content).unwrap();

    // The fixture keeps one element name the schema does not list
    assert_eq!(report.failed.len(), 1);
    assert!(report.passed.is_empty());
    assert!(report.error_count() >= 1);
}

#[test]
fn test_gencode_writes_modules() {
    let (dir, config) = project();
    let content = config.content("Quest").unwrap();
    let schema = SchemaLoader::load(&config.schema_path(content)).unwrap();

    let mut generator = RustGenerator::new();
    generator.generate(&content.name, &schema);
    let written = generator.write(&config.paths.code_dir).unwrap();

    assert_eq!(written.len(), 2);
    let module = fs::read_to_string(dir.path().join("generated/quest.rs")).unwrap();
    assert!(module.contains("pub struct Quest {"));
    let mod_file = fs::read_to_string(dir.path().join("generated/mod.rs")).unwrap();
    assert!(mod_file.contains("pub mod quest;"));
}

#[test]
fn test_unknown_content_is_fatal() {
    let (_dir, config) = project();
    let err = config.content("Quests").unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(config.suggest("quest"), Some("Quest"));
}
