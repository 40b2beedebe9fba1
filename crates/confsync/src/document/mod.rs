//! The per-user configuration document.
//!
//! A `ConfigDocument` is an opaque JSON object owned by the user. Nothing
//! about its shape is validated; readers go through [`path`] and fall back
//! to defaults wherever the expected structure is missing.

pub mod path;

use serde::Serialize;
use serde_json::{Map, Value};

pub use path::{get, get_array, get_str, lookup, FromField};

/// A user's configuration tree. Always a JSON object at the top level.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConfigDocument {
    root: Value,
}

impl ConfigDocument {
    /// The empty map, used whenever no configuration has been saved.
    pub fn empty() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Wraps a JSON value. Anything other than an object degrades to the
    /// empty document.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(_) => Self { root: value },
            Value::Null => Self::empty(),
            other => {
                log::warn!(
                    "Configuration root is a {} instead of an object, using empty document",
                    json_kind(&other)
                );
                Self::empty()
            }
        }
    }

    /// Parses a stored blob. Malformed JSON degrades to the empty document.
    pub fn parse(blob: &str) -> Self {
        if blob.trim().is_empty() {
            return Self::empty();
        }
        match serde_json::from_str::<Value>(blob) {
            Ok(value) => Self::from_value(value),
            Err(e) => {
                log::warn!("Stored configuration is not valid JSON ({}), using empty document", e);
                Self::empty()
            }
        }
    }

    /// Serializes the document for storage.
    pub fn to_blob(&self) -> String {
        self.root.to_string()
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.as_object().map_or(true, Map::is_empty)
    }

    pub fn lookup(&self, path: &str) -> Option<&Value> {
        path::lookup(&self.root, path)
    }

    pub fn get<T: FromField>(&self, path: &str, default: T) -> T {
        path::get(&self.root, path, default)
    }

    pub fn get_str(&self, path: &str, default: &str) -> String {
        path::get_str(&self.root, path, default)
    }

    pub fn get_array(&self, path: &str) -> &[Value] {
        path::get_array(&self.root, path)
    }
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Map<String, Value>> for ConfigDocument {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            root: Value::Object(map),
        }
    }
}

impl From<Value> for ConfigDocument {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_valid_blob() {
        let doc = ConfigDocument::parse(r#"{"device":{"type":"Energy Meter"}}"#);
        assert_eq!(doc.get_str("device.type", ""), "Energy Meter");
    }

    #[test]
    fn test_parse_malformed_blob_is_empty() {
        let doc = ConfigDocument::parse("{not json");
        assert!(doc.is_empty());
        assert_eq!(doc, ConfigDocument::empty());
    }

    #[test]
    fn test_parse_blank_blob_is_empty() {
        assert!(ConfigDocument::parse("").is_empty());
        assert!(ConfigDocument::parse("   ").is_empty());
        assert!(ConfigDocument::parse("null").is_empty());
    }

    #[test]
    fn test_non_object_root_is_empty() {
        assert!(ConfigDocument::parse("[1, 2, 3]").is_empty());
        assert!(ConfigDocument::from_value(json!("text")).is_empty());
    }

    #[test]
    fn test_blob_roundtrip_preserves_content() {
        let doc = ConfigDocument::from(json!({"protocol": {"mode": "tcp"}}));
        let restored = ConfigDocument::parse(&doc.to_blob());
        assert_eq!(restored, doc);
        assert_eq!(restored.get_str("protocol.mode", "rtu"), "tcp");
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let doc = ConfigDocument::from(json!({"device": {"manufacturer": "Acme"}}));
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value, json!({"device": {"manufacturer": "Acme"}}));
    }
}
