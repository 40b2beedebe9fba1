//! Dotted-path navigation over a JSON value tree.
//!
//! Every accessor here is total: a missing key, a wrong-typed intermediate
//! level, an out-of-range index or a `null` leaf all resolve to "absent",
//! and the typed accessors turn "absent" into the caller's default.

use serde_json::{Map, Value};

/// Conversion from a present (non-null) JSON leaf into a typed field value.
///
/// Returns `None` when the leaf has the wrong shape, in which case the
/// caller's default is used instead.
pub trait FromField: Sized {
    fn from_field(value: &Value) -> Option<Self>;
}

impl FromField for String {
    fn from_field(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl FromField for bool {
    fn from_field(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromField for i64 {
    fn from_field(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FromField for f64 {
    fn from_field(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FromField for Vec<Value> {
    fn from_field(value: &Value) -> Option<Self> {
        value.as_array().cloned()
    }
}

impl FromField for Map<String, Value> {
    fn from_field(value: &Value) -> Option<Self> {
        value.as_object().cloned()
    }
}

impl FromField for Value {
    fn from_field(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

/// Resolves a dotted path (`"mqtt.broker.url"`) against `value`.
///
/// Segments address object keys. A numeric segment also indexes arrays,
/// so `"protocol.rtuRows.0.slaveId"` reaches into the first row. An empty
/// path returns `value` itself.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let found = if path.is_empty() {
        Some(value)
    } else {
        path.split('.')
            .try_fold(value, |current, segment| match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    };
    found.filter(|v| !v.is_null())
}

/// Returns the typed value at `path`, or `default` when it is absent or
/// has the wrong shape.
pub fn get<T: FromField>(value: &Value, path: &str, default: T) -> T {
    lookup(value, path)
        .and_then(T::from_field)
        .unwrap_or(default)
}

/// String shorthand for [`get`].
pub fn get_str(value: &Value, path: &str, default: &str) -> String {
    lookup(value, path)
        .and_then(String::from_field)
        .unwrap_or_else(|| default.to_string())
}

/// Borrows the array at `path`, or an empty slice.
pub fn get_array<'a>(value: &'a Value, path: &str) -> &'a [Value] {
    lookup(value, path)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
