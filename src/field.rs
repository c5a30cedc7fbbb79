//! Access to proxy JSON across schema versions.
//!
//! Older proxy builds wrap every scalar in a single-element list
//! (`"rt": ["72.0"]`) and use `{}` for a field that is intentionally absent.
//! Newer builds send bare scalars and use `""`. Every lookup in the crate
//! goes through [`get`] so both shapes read the same.

use serde_json::Value;

use crate::{Error, Result};

/// Look up `key` in `source`.
///
/// With `index = None` the raw value is returned (for nested containers).
/// Otherwise element `index` of a list is returned; a bare scalar counts as
/// element 0. `{}`, `null` and `""` all read as absent.
pub fn get<'a>(source: &'a Value, key: &str, index: Option<usize>) -> Option<&'a Value> {
    let raw = source.get(key)?;
    let value = match (index, raw) {
        (None, v) => v,
        (Some(i), Value::Array(items)) => items.get(i)?,
        (Some(0), v) => v,
        (Some(_), _) => return None,
    };
    if is_absent(value) { None } else { Some(value) }
}

fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(m) => m.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

pub fn str_field<'a>(source: &'a Value, key: &str) -> Option<&'a str> {
    get(source, key, Some(0)).and_then(|v| v.as_str())
}

/// Numeric field sent either as a JSON number or a numeric string.
pub fn f64_field(source: &Value, key: &str) -> Option<f64> {
    match get(source, key, Some(0))? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `"on"`/`"off"` flag.
pub fn flag_field(source: &Value, key: &str) -> Option<bool> {
    match get(source, key, Some(0))? {
        Value::String(s) => match s.as_str() {
            "on" => Some(true),
            "off" => Some(false),
            _ => None,
        },
        Value::Bool(b) => Some(*b),
        _ => None,
    }
}

pub fn required_str<'a>(source: &'a Value, key: &str) -> Result<&'a str> {
    str_field(source, key).ok_or_else(|| Error::MissingField(key.to_string()))
}

pub fn required_f64(source: &Value, key: &str) -> Result<f64> {
    f64_field(source, key).ok_or_else(|| Error::MissingField(key.to_string()))
}

pub fn required_flag(source: &Value, key: &str) -> Result<bool> {
    flag_field(source, key).ok_or_else(|| Error::MissingField(key.to_string()))
}

/// Records of a nested collection such as `zones/zone`, `activities/activity`,
/// `program/day` or `day/period`.
///
/// Accepts `{outer: [{inner: [..]}]}`, `{outer: {inner: [..]}}` and
/// `{outer: [..]}` where the list holds the records themselves.
pub fn records<'a>(source: &'a Value, outer: &str, inner: &str) -> Vec<&'a Value> {
    let Some(container) = get(source, outer, None) else {
        return Vec::new();
    };
    let wrapper = match container {
        Value::Array(items) => match items.first() {
            Some(first) if first.get(inner).is_some() => first,
            _ => return items.iter().collect(),
        },
        other => other,
    };
    match wrapper.get(inner) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single @ Value::Object(_)) => vec![single],
        _ => Vec::new(),
    }
}

/// Elements of a list-valued field such as `day/period`.
pub fn list_field<'a>(source: &'a Value, key: &str) -> Vec<&'a Value> {
    match get(source, key, None) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single @ Value::Object(_)) => vec![single],
        _ => Vec::new(),
    }
}

/// `id` attribute of a record, as a string (`"1"` and `1` both read as `"1"`).
pub fn record_id(record: &Value) -> Option<String> {
    match get(record, "id", Some(0))? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
