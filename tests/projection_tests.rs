//! Golden Tests for Workbook Projection
//!
//! Projects the fixture workbook through the fixture schema and checks the
//! produced content, the Rust types generated from the same schema, and
//! validation of the produced data.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use sheet_projector::enums::{enum_artifact, EnumCollector};
use sheet_projector::schema::LayoutMode;
use sheet_projector::{
    open_workbook, project_workbook, DataValidator, ProjectError, RustGenerator, SchemaLoader,
};

fn fixtures_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn project_fixture() -> Value {
    let schema = SchemaLoader::load(&fixtures_path().join("quest.schema.json")).unwrap();
    let source = fixtures_path().join("Quest.json");
    let workbook = open_workbook(&source).unwrap();
    project_workbook(&schema, &workbook, &source).unwrap()
}

// =============================================================================
// Projection
// =============================================================================

#[test]
fn test_fixture_matches_golden_output() {
    let expected: Value = serde_json::from_str(include_str!("fixtures/quest.expected.json")).unwrap();
    assert_eq!(project_fixture(), expected);
}

#[test]
fn test_multirow_run_groups_continuation_rows() {
    let data = project_fixture();
    let quests = data["Quests"].as_array().unwrap();

    // Four rows, three quests: the second row continues the first quest
    assert_eq!(quests.len(), 3);
    assert_eq!(quests[0]["QuestId"], 1);
    assert_eq!(quests[0]["Steps"].as_array().unwrap().len(), 2);
    assert_eq!(quests[1]["QuestId"], 2);
}

#[test]
fn test_packed_cell_with_wrong_token_count_is_left_out() {
    let data = project_fixture();
    assert_eq!(data["Quests"][0]["Effect"], json!({ "Heal": { "amount": 10, "duration": 5 } }));
    assert_eq!(data["Quests"][1]["Effect"], json!({}));
}

#[test]
fn test_unbound_root_property_is_omitted() {
    let data = project_fixture();
    assert!(data.get("Notes").is_none());
    assert_eq!(data["Settings"]["Season"], "Spring");
}

#[test]
fn test_schema_layouts_from_fixture() {
    let schema = SchemaLoader::load(&fixtures_path().join("quest.schema.json")).unwrap();
    let quest = schema.registry.lookup("Quest").unwrap();
    assert_eq!(schema.registry.definition(quest).node.layout(), LayoutMode::MultiRow);

    let effect = schema.registry.lookup("Effect").unwrap();
    assert_eq!(schema.registry.definition(effect).node.layout(), LayoutMode::SingleColumn);

    // Loaded from the sibling document
    let reward = schema.registry.lookup("Reward").unwrap();
    assert!(schema
        .registry
        .definition(reward)
        .document
        .ends_with("reward.schema.json"));
}

#[test]
fn test_missing_sheet_fails_the_file() {
    let schema = SchemaLoader::load(&fixtures_path().join("quest.schema.json")).unwrap();
    let workbook = sheet_projector::source::Workbook::default();

    let err = project_workbook(&schema, &workbook, Path::new("Empty.xlsx")).unwrap_err();
    match &err {
        ProjectError::MissingSheet { sheet, file } => {
            assert_eq!(sheet, "Quest");
            assert_eq!(file, "Empty.xlsx");
        }
        other => panic!("Expected MissingSheet, got {:?}", other),
    }
    assert!(!err.is_fatal());
}

// =============================================================================
// Enum Collection
// =============================================================================

#[test]
fn test_enum_values_from_fixture() {
    let schema = SchemaLoader::load(&fixtures_path().join("quest.schema.json")).unwrap();
    let workbook = open_workbook(&fixtures_path().join("Quest.json")).unwrap();

    let mut collector = EnumCollector::new();
    collector.collect_workbook(&schema, &workbook);
    let expected: &[String] = &["Main".to_string(), "Side".to_string()];
    assert_eq!(collector.values("Quests_CategoryEnum"), Some(expected));

    let artifact = enum_artifact(&schema, &collector);
    assert_eq!(artifact["title"], "QuestDataEnum");
    assert_eq!(
        artifact["definitions"]["Quests_CategoryEnum"]["enum"],
        json!(["None", "Main", "Side"])
    );
}

#[test]
fn test_enum_values_from_converted_data() {
    let schema = SchemaLoader::load(&fixtures_path().join("quest.schema.json")).unwrap();
    let mut collector = EnumCollector::new();
    collector.collect_json(&schema, &project_fixture());

    let expected: &[String] = &["Main".to_string(), "Side".to_string()];
    assert_eq!(collector.values("Quests_CategoryEnum"), Some(expected));
}

// =============================================================================
// Code Generation
// =============================================================================

#[test]
fn test_generated_types_for_fixture() {
    let schema = SchemaLoader::load(&fixtures_path().join("quest.schema.json")).unwrap();
    let mut generator = RustGenerator::new();
    let code = generator.generate("Quest", &schema).code.clone();

    assert!(code.contains("/// One quest and its steps\n#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]\npub struct Quest {"));
    assert!(code.contains("pub element: Element,"));
    assert!(code.contains("pub tags: Vec<String>,"));
    assert!(code.contains("pub effect: Effect,"));
    assert!(code.contains("pub steps: Vec<Step>,"));
    assert!(code.contains("pub reward: Reward,"));
    assert!(code.contains("    Heal(EffectHeal),\n    Buff(EffectBuff),"));
    assert!(code.contains("pub struct Reward {"));
    assert!(code.contains("pub struct QuestData {"));
    assert!(code.contains("pub settings: QuestDataSettings,"));
    assert!(code.contains("pub struct QuestDataTable {"));
    assert!(code.contains("quests_by_id: HashMap<i32, usize>,"));
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_validation_flags_unknown_enum_value() {
    let validator = DataValidator::load(&fixtures_path().join("quest.schema.json")).unwrap();
    let mut data = project_fixture();

    match validator.validate_value(Path::new("Quest.json"), &data) {
        Err(ProjectError::Validation { errors, .. }) => {
            assert!(!errors.is_empty());
            assert!(errors.iter().all(|e| e.starts_with("/Quests/2/Element: ")));
        }
        other => panic!("Expected Validation error, got {:?}", other),
    }

    data["Quests"][2]["Element"] = json!(2);
    assert!(validator.validate_value(Path::new("Quest.json"), &data).is_ok());
}
