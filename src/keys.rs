//! Unique key checks over projected arrays

use std::collections::HashSet;

use serde_json::Value;

use crate::error::{ProjectError, Result};
use crate::schema::{ContentSchema, UniqueKey};

/// Check every `unique` key of every sheet-bound array in `data`
pub fn check_content(schema: &ContentSchema, data: &Value) -> Result<()> {
    for (property, group) in schema.sheet_properties() {
        if let Some(elements) = data.get(&property.name).and_then(Value::as_array) {
            check_keys(&property.name, elements, &group.unique_keys)?;
        }
    }
    Ok(())
}

/// Fail on the first repeated key tuple
pub fn check_keys(property: &str, elements: &[Value], keys: &[UniqueKey]) -> Result<()> {
    for key in keys.iter().filter(|k| k.unique) {
        let mut seen = HashSet::with_capacity(elements.len());
        for element in elements {
            let tuple = key_tuple(element, &key.fields);
            if !seen.insert(tuple.clone()) {
                return Err(ProjectError::DuplicateKey {
                    key: key.name.clone(),
                    value: tuple,
                    property: property.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn key_tuple(element: &Value, fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| match element.get(f) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(fields: &[&str], unique: bool) -> UniqueKey {
        UniqueKey {
            name: "Id".to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            unique,
        }
    }

    #[test]
    fn test_duplicate_single_field() {
        let rows = vec![json!({ "Id": 1 }), json!({ "Id": 2 }), json!({ "Id": 1 })];
        let err = check_keys("Quests", &rows, &[key(&["Id"], true)]).unwrap_err();
        match err {
            ProjectError::DuplicateKey { key, value, property } => {
                assert_eq!(key, "Id");
                assert_eq!(value, "1");
                assert_eq!(property, "Quests");
            }
            other => panic!("Expected DuplicateKey, got {:?}", other),
        }
    }

    #[test]
    fn test_composite_key() {
        let rows = vec![
            json!({ "Zone": "A", "Slot": 1 }),
            json!({ "Zone": "A", "Slot": 2 }),
            json!({ "Zone": "B", "Slot": 1 }),
        ];
        assert!(check_keys("Spawns", &rows, &[key(&["Zone", "Slot"], true)]).is_ok());
    }

    #[test]
    fn test_non_unique_key_is_not_checked() {
        let rows = vec![json!({ "Id": 1 }), json!({ "Id": 1 })];
        assert!(check_keys("Quests", &rows, &[key(&["Id"], false)]).is_ok());
    }
}
