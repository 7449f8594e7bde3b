//! Custom filters for manifest templates
//!
//! The four scheduler-specific helpers (`toYaml`, `stringify`, `hash`,
//! `unquote`) plus a small sprig-style family (`b64enc`, `b64dec`, `quote`,
//! `indent`, `nindent`).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use minijinja::{Error, ErrorKind, Value};

use crate::hash::hash_string_of;

fn invalid_op(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidOperation, message.into())
}

/// YAML-marshal a value and strip the trailing newline.
///
/// Usage: `{{ ConfigData | toYaml }}`
pub fn to_yaml(value: Value) -> Result<String, Error> {
    let yaml = serde_yaml::to_string(&value)
        .map_err(|e| invalid_op(format!("toYaml failed: {e}")))?;
    Ok(yaml.strip_suffix('\n').unwrap_or(&yaml).to_string())
}

/// Flatten a mapping one level: values that are themselves mappings or
/// sequences are replaced by their YAML string form, then the whole mapping
/// is YAML-marshaled. Non-mappings fall through to [`to_yaml`].
///
/// Usage: `{{ ConfigData | stringify }}`
pub fn stringify(value: Value) -> Result<String, Error> {
    let json = serde_json::to_value(&value)
        .map_err(|e| invalid_op(format!("stringify failed: {e}")))?;

    let serde_json::Value::Object(map) = json else {
        return to_yaml(value);
    };

    let mut flattened = serde_json::Map::with_capacity(map.len());
    for (key, entry) in map {
        match entry {
            serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                let yaml = serde_yaml::to_string(&entry)
                    .map_err(|e| invalid_op(format!("stringify failed: {e}")))?;
                flattened.insert(key, serde_json::Value::String(yaml));
            }
            other => {
                flattened.insert(key, other);
            }
        }
    }

    let yaml = serde_yaml::to_string(&flattened)
        .map_err(|e| invalid_op(format!("stringify failed: {e}")))?;
    Ok(yaml.strip_suffix('\n').unwrap_or(&yaml).to_string())
}

/// Stable structural hash rendered as a decimal string.
///
/// Usage: `{{ ConfigData | hash }}`
pub fn hash(value: Value) -> Result<String, Error> {
    hash_string_of(&value).map_err(|e| invalid_op(format!("hash failed: {e}")))
}

/// Trim surrounding whitespace and surrounding double/single quotes.
/// Non-string input yields an empty string.
///
/// Usage: `{{ ConfigData.servicePorts | unquote }}`
pub fn unquote(value: Value) -> String {
    match value.as_str() {
        Some(s) => s
            .trim()
            .trim_matches('"')
            .trim_matches('\'')
            .to_string(),
        None => String::new(),
    }
}

/// Base64-encode a string.
pub fn b64enc(value: &str) -> String {
    STANDARD.encode(value.as_bytes())
}

/// Base64-decode a string.
pub fn b64dec(value: &str) -> Result<String, Error> {
    let bytes = STANDARD
        .decode(value)
        .map_err(|e| invalid_op(format!("b64dec failed: {e}")))?;
    String::from_utf8(bytes).map_err(|e| invalid_op(format!("b64dec produced invalid UTF-8: {e}")))
}

/// Wrap a value in double quotes.
pub fn quote(value: Value) -> String {
    format!("\"{value}\"")
}

/// Indent every line by `width` spaces.
pub fn indent(value: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    value
        .lines()
        .map(|line| format!("{pad}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Like [`indent`] but with a leading newline, for inline YAML embedding.
pub fn nindent(value: &str, width: usize) -> String {
    format!("\n{}", indent(value, width))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn to_yaml_strips_trailing_newline() {
        let value = Value::from_serialize(json!({"foo": "bar"}));
        assert_eq!(to_yaml(value).unwrap(), "foo: bar");
    }

    #[test]
    fn stringify_flattens_nested_structures_to_strings() {
        let value = Value::from_serialize(json!({
            "scalar": "plain",
            "nested": {"a": 1},
            "list": ["x"]
        }));
        let out = stringify(value).unwrap();
        // nested values are embedded as YAML strings, not structures
        assert!(out.contains("scalar: plain"));
        assert!(out.contains("nested: "));
        assert!(out.contains("a: 1"));
        assert!(out.contains("- x"));
    }

    #[test]
    fn stringify_on_scalar_degrades_to_to_yaml() {
        assert_eq!(stringify(Value::from("hello")).unwrap(), "hello");
    }

    #[test]
    fn hash_is_deterministic() {
        let a = hash(Value::from_serialize(json!({"a": 1, "b": 2}))).unwrap();
        let b = hash(Value::from_serialize(json!({"b": 2, "a": 1}))).unwrap();
        assert_eq!(a, b);
        assert!(a.parse::<u64>().is_ok());
    }

    #[test]
    fn unquote_trims_quotes_and_space() {
        assert_eq!(unquote(Value::from("  'quoted' ")), "quoted");
        assert_eq!(unquote(Value::from("\"double\"")), "double");
        assert_eq!(unquote(Value::from("bare")), "bare");
        assert_eq!(unquote(Value::from(7)), "");
    }

    #[test]
    fn base64_round_trip() {
        assert_eq!(b64enc("platform"), "cGxhdGZvcm0=");
        assert_eq!(b64dec("cGxhdGZvcm0=").unwrap(), "platform");
        assert!(b64dec("!!!").is_err());
    }

    #[test]
    fn indent_and_nindent() {
        assert_eq!(indent("a\nb", 2), "  a\n  b");
        assert_eq!(nindent("a", 4), "\n    a");
    }
}
