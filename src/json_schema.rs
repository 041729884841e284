//! JSON Schema generation for machine-readable output types.
//!
//! Schemas are generated with schemars and exported via the `schema`
//! subcommand so external consumers (notebook kernels, scripts) can
//! validate the JSON the engine emits.

use schemars::{schema_for, Schema};
use std::collections::BTreeMap;

/// Non-standard format values that schemars generates for Rust numeric
/// types. They are not part of JSON Schema Draft-07 and break strict
/// validators, so they are stripped.
const NONSTANDARD_FORMATS: &[&str] = &[
    "uint", "uint8", "uint16", "uint32", "uint64", "int8", "int16", "int32", "int64", "float",
    "double",
];

/// All exported schemas by name. BTreeMap for deterministic ordering.
pub fn all_schemas() -> BTreeMap<&'static str, Schema> {
    let mut schemas = BTreeMap::new();
    schemas.insert(
        "query",
        clean_schema(schema_for!(crate::output::QueryJsonOutput)),
    );
    schemas.insert(
        "statistics",
        clean_schema(schema_for!(crate::resultset::ExecStats)),
    );
    schemas.insert(
        "analyze",
        clean_schema(schema_for!(crate::cmd::analyze::AnalyzeJsonOutput)),
    );
    schemas.insert(
        "check",
        clean_schema(schema_for!(crate::cmd::check::CheckJsonOutput)),
    );
    schemas
}

/// Generate a single schema by name.
pub fn get_schema(name: &str) -> Option<Schema> {
    all_schemas().remove(name)
}

/// List all available schema names.
pub fn schema_names() -> Vec<&'static str> {
    all_schemas().keys().copied().collect()
}

fn clean_schema(schema: Schema) -> Schema {
    let mut value = serde_json::to_value(&schema).unwrap_or_default();
    strip_formats(&mut value);
    serde_json::from_value(value).unwrap_or(schema)
}

fn strip_formats(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            let drop = map
                .get("format")
                .and_then(|f| f.as_str())
                .is_some_and(|f| NONSTANDARD_FORMATS.contains(&f));
            if drop {
                map.remove("format");
            }
            for nested in map.values_mut() {
                strip_formats(nested);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                strip_formats(item);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_names() {
        assert_eq!(
            schema_names(),
            vec!["analyze", "check", "query", "statistics"]
        );
    }

    #[test]
    fn test_no_nonstandard_formats_survive() {
        for (_, schema) in all_schemas() {
            let text = serde_json::to_string(&schema).unwrap();
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_no_formats(&value);
        }
    }

    fn assert_no_formats(value: &serde_json::Value) {
        match value {
            serde_json::Value::Object(map) => {
                if let Some(f) = map.get("format").and_then(|f| f.as_str()) {
                    assert!(
                        !NONSTANDARD_FORMATS.contains(&f),
                        "nonstandard format {f} left in schema"
                    );
                }
                map.values().for_each(assert_no_formats);
            }
            serde_json::Value::Array(items) => items.iter().for_each(assert_no_formats),
            _ => {}
        }
    }
}
