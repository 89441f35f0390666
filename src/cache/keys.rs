//! Cache-key derivation and payload codec.
//!
//! Keys take the form `<resource>:<selector>`. An id selector is used
//! verbatim; a page-request selector is rendered as canonical JSON (object
//! keys sorted, no whitespace) so equivalent requests share one entry.

use std::fmt::Write as _;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::application::pagination::PageRequest;

use super::error::CacheError;

#[derive(Debug, Clone, Copy)]
pub enum Selector<'a> {
    Id(&'a str),
    Page(&'a PageRequest),
}

pub fn key_for(resource: &str, selector: Selector<'_>) -> Result<String, CacheError> {
    match selector {
        Selector::Id(id) => Ok(format!("{resource}:{id}")),
        Selector::Page(request) => {
            let value = serde_json::to_value(request)?;
            Ok(format!("{resource}:{}", canonical_json(&value)))
        }
    }
}

/// Render `value` as compact JSON with object keys in sorted order at every
/// depth.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(left, _), (right, _)| left.cmp(right));
            out.push('{');
            for (index, (key, inner)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_scalar(&Value::String(key.clone()), out);
                out.push(':');
                write_canonical(inner, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => write_scalar(scalar, out),
    }
}

fn write_scalar(value: &Value, out: &mut String) {
    // Display on a scalar `Value` is its compact JSON form.
    let _ = write!(out, "{value}");
}

pub fn encode<T: Serialize>(value: &T) -> Result<String, CacheError> {
    Ok(serde_json::to_string(value)?)
}

pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, CacheError> {
    Ok(serde_json::from_str(raw)?)
}
