//! Stable structural hashing
//!
//! Repo content and GitHub issue bodies are deduplicated by a 64-bit
//! structural hash stored as a decimal string in resource statuses. The hash
//! must be stable across processes and releases, field-order-independent for
//! mappings, and order-sensitive for sequences, so it is computed over a
//! canonical byte form fed into SHA-256 and truncated to the first eight
//! bytes.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Hash any serializable value; see [`hash_value`].
pub fn hash_of<T: Serialize>(value: &T) -> Result<u64> {
    let json = serde_json::to_value(value).map_err(|e| Error::serialization(e.to_string()))?;
    Ok(hash_value(&json))
}

/// Hash any serializable value and render it as the decimal string stored in
/// resource statuses.
pub fn hash_string_of<T: Serialize>(value: &T) -> Result<String> {
    Ok(hash_of(value)?.to_string())
}

/// Structural hash of a JSON value.
///
/// Mapping keys are visited in sorted order; sequence elements in sequence
/// order. Type tags keep `"1"` and `1` and `[1]` distinct.
pub fn hash_value(value: &Value) -> u64 {
    let mut hasher = Sha256::new();
    write_canonical(value, &mut hasher);
    let digest = hasher.finalize();
    u64::from_be_bytes(digest[..8].try_into().expect("digest is 32 bytes"))
}

fn write_canonical(value: &Value, hasher: &mut Sha256) {
    match value {
        Value::Null => hasher.update(b"n"),
        Value::Bool(b) => {
            hasher.update(b"b");
            hasher.update([*b as u8]);
        }
        Value::Number(n) => {
            hasher.update(b"d");
            hasher.update(n.to_string().as_bytes());
        }
        Value::String(s) => {
            hasher.update(b"s");
            hasher.update(s.len().to_be_bytes());
            hasher.update(s.as_bytes());
        }
        Value::Array(items) => {
            hasher.update(b"a");
            hasher.update(items.len().to_be_bytes());
            for item in items {
                write_canonical(item, hasher);
            }
        }
        Value::Object(map) => {
            hasher.update(b"m");
            hasher.update(map.len().to_be_bytes());
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                hasher.update(key.len().to_be_bytes());
                hasher.update(key.as_bytes());
                write_canonical(&map[key], hasher);
            }
        }
    }
}
