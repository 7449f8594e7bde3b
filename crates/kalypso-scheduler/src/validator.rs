//! Config data validation against JSON Schemas
//!
//! Workloads and the platform contribute draft-07 schemas the resolved
//! config must satisfy. ConfigMap values are string-typed on the wire, so
//! scalars that parse as integers or floats are coerced to numbers before
//! validation; everything else validates as-is.

use std::collections::BTreeMap;

use serde_json::Value;

use kalypso_common::{Error, Result};

/// Validate config data against one schema document.
///
/// All schema violations are collected into a single message, one
/// `- ...` line per error, with any `" (root):"` noise stripped.
pub fn validate(values: &BTreeMap<String, Value>, schema_json: &str) -> Result<()> {
    let coerced: serde_json::Map<String, Value> = values
        .iter()
        .map(|(key, value)| (key.clone(), coerce_numeric(value)))
        .collect();

    let instance = Value::Object(coerced);

    let schema: Value =
        serde_json::from_str(schema_json).map_err(|e| Error::schema_eval(e.to_string()))?;
    let validator = jsonschema::options()
        .with_draft(jsonschema::Draft::Draft7)
        .build(&schema)
        .map_err(|e| Error::schema_eval(e.to_string()))?;

    let mut message = String::new();
    for error in validator.iter_errors(&instance) {
        let path = error.instance_path.to_string();
        if path.is_empty() {
            message.push_str(&format!("- {error}\n"));
        } else {
            message.push_str(&format!("- {path}: {error}\n"));
        }
    }

    if message.is_empty() {
        Ok(())
    } else {
        Err(Error::SchemaValidation {
            message: message.replace(" (root):", ""),
        })
    }
}

/// Coerce string scalars that look numeric into numbers; integers win over
/// floats.
fn coerce_numeric(value: &Value) -> Value {
    let Some(s) = value.as_str() else {
        return value.clone();
    };

    if let Ok(i) = s.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        if let Some(number) = serde_json::Number::from_f64(f) {
            return Value::Number(number);
        }
    }
    value.clone()
}
