//! One-of resolution - selects which variant of a one-of property a payload matches.
//!
//! Works over a mapping-artifact entry: discriminator lookup when one is
//! configured, schema inference otherwise. Failures surface as validation
//! errors, never as a silently-chosen default variant.

use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::paths;
use crate::property::is_reserved;

/// Outcome of variant selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The named variant's shape applies.
    Variant(String),
    /// The one-of is nullable and the value is null or absent.
    Null,
}

/// External path of the one-of value described by an entry.
pub(crate) fn entry_path(entry: &Map<String, Value>) -> Option<String> {
    if let Some(path) = entry.get("_nullable_path").and_then(Value::as_str) {
        return Some(path.to_string());
    }
    if let Some(path) = entry.get("_variant_path").and_then(Value::as_str) {
        return Some(path.to_string());
    }
    // "<path>/<property>" - drop the discriminator field segment
    let disc = entry.get("_discriminator")?.as_str()?;
    match disc.rfind('/') {
        Some(idx) => Some(disc[..idx].to_string()),
        None => Some(String::new()),
    }
}

/// Variant names of an entry, in declaration order.
pub(crate) fn variant_names(entry: &Map<String, Value>) -> Vec<&str> {
    entry
        .keys()
        .map(String::as_str)
        .filter(|k| !is_reserved(k))
        .collect()
}

/// Determine which variant of a one-of entry the payload matches.
///
/// # Errors
///
/// Returns a `SchemaError` when the discriminator value is missing or
/// unknown, when no inference variant validates, or when more than one
/// does (ambiguity is an explicit failure, not a first-match tie-break).
pub fn select_variant(
    entry: &Map<String, Value>,
    payload: &Value,
) -> Result<Selection, SchemaError> {
    let path = entry_path(entry).ok_or_else(|| SchemaError {
        path: String::new(),
        message: "one-of entry carries no path metadata".to_string(),
    })?;

    let nullable = entry
        .get("_nullable")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let value = paths::get(payload, &path);

    if nullable && matches!(value, None | Some(Value::Null)) {
        return Ok(Selection::Null);
    }

    if let Some(disc_path) = entry.get("_discriminator").and_then(Value::as_str) {
        return select_by_discriminator(entry, payload, disc_path);
    }

    let value = value.ok_or_else(|| SchemaError {
        path: path.clone(),
        message: "missing one-of value".to_string(),
    })?;
    select_by_inference(entry, value, &path)
}

fn select_by_discriminator(
    entry: &Map<String, Value>,
    payload: &Value,
    disc_path: &str,
) -> Result<Selection, SchemaError> {
    let Some(Value::String(key)) = paths::get(payload, disc_path) else {
        return Err(SchemaError {
            path: disc_path.to_string(),
            message: "missing discriminator value".to_string(),
        });
    };

    if !is_reserved(key) && entry.contains_key(key) {
        Ok(Selection::Variant(key.clone()))
    } else {
        Err(SchemaError {
            path: disc_path.to_string(),
            message: format!("unknown discriminator value \"{key}\""),
        })
    }
}

/// Schema inference: test each variant's constraints in declaration order.
fn select_by_inference(
    entry: &Map<String, Value>,
    value: &Value,
    path: &str,
) -> Result<Selection, SchemaError> {
    let schemas = entry
        .get("_variant_schemas")
        .and_then(Value::as_array)
        .ok_or_else(|| SchemaError {
            path: path.to_string(),
            message: "one-of entry carries no variant schemas".to_string(),
        })?;
    let names = variant_names(entry);

    let mut matched = Vec::new();
    for (name, schema) in names.iter().zip(schemas) {
        let validator = jsonschema::validator_for(schema).map_err(|e| SchemaError {
            path: path.to_string(),
            message: format!("invalid variant schema: {e}"),
        })?;
        if validator.is_valid(value) {
            matched.push(*name);
        }
    }

    match matched.len() {
        1 => Ok(Selection::Variant(matched[0].to_string())),
        0 => Err(SchemaError {
            path: path.to_string(),
            message: "no one-of variant matches the value".to_string(),
        }),
        _ => Err(SchemaError {
            path: path.to_string(),
            message: format!("ambiguous one-of value: matches {}", matched.join(", ")),
        }),
    }
}
