//! Payload processing - applies a mapping artifact to an external payload.
//!
//! The walk is driven by the artifact, not the schema: leaves copy values
//! from their external path to their target path, nullable nodes
//! short-circuit, and one-of entries first resolve their variant, then
//! recurse into that variant's own sub-artifact.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{BuildError, ProcessError, SchemaError};
use crate::oneof::{self, Selection};
use crate::paths;
use crate::property::is_reserved;

/// Result of processing one payload.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<SchemaError>,
}

impl Outcome {
    pub(crate) fn transformed(value: Value) -> Self {
        Self {
            valid: true,
            value: Some(value),
            errors: Vec::new(),
        }
    }

    pub(crate) fn invalid(errors: Vec<SchemaError>) -> Self {
        Self {
            valid: false,
            value: None,
            errors,
        }
    }

    /// Convert into a raising-style result.
    pub fn into_result(self) -> Result<Value, ProcessError> {
        if self.valid {
            Ok(self.value.unwrap_or(Value::Null))
        } else {
            Err(ProcessError::Invalid {
                errors: self.errors,
            })
        }
    }
}

/// Apply a mapping artifact to an external payload.
///
/// Returns the internal-shaped payload. No partial result is returned on
/// failure: any one-of resolution error discards the transformation, after
/// every independent one-of has been given the chance to report.
pub fn transform(artifact: &Value, payload: &Value) -> Result<Value, ProcessError> {
    let node = artifact.as_object().ok_or_else(|| {
        ProcessError::Build(BuildError::InvalidSchema {
            message: "mapping artifact is not an object".to_string(),
        })
    })?;

    let mut out = Value::Object(Map::new());
    let mut errors = Vec::new();
    apply(node, payload, &mut Vec::new(), &mut out, &mut errors);

    if errors.is_empty() {
        Ok(out)
    } else {
        Err(ProcessError::Invalid { errors })
    }
}

fn apply(
    node: &Map<String, Value>,
    payload: &Value,
    tgt_prefix: &mut Vec<String>,
    out: &mut Value,
    errors: &mut Vec<SchemaError>,
) {
    // Nullable structural node: emit null once, skip descent.
    if node
        .get("_nullable")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        if let Some(ext) = node.get("_nullable_path").and_then(Value::as_str) {
            if matches!(paths::get(payload, ext), Some(Value::Null)) {
                let target = node
                    .get("_nullable_target_path")
                    .and_then(Value::as_str)
                    .unwrap_or(ext);
                paths::set(out, &paths::split(target), Value::Null);
                return;
            }
        }
    }

    for (key, value) in node {
        if is_reserved(key) {
            continue;
        }
        match value {
            Value::String(external) => {
                if let Some(found) = paths::get(payload, external) {
                    tgt_prefix.push(key.clone());
                    paths::set(out, tgt_prefix, found.clone());
                    tgt_prefix.pop();
                }
            }
            Value::Object(child) => {
                tgt_prefix.push(key.clone());
                apply(child, payload, tgt_prefix, out, errors);
                tgt_prefix.pop();
            }
            _ => {}
        }
    }

    // One-of entries resolve independently; one failure never short-circuits
    // the others.
    if let Some(Value::Array(entries)) = node.get("_oneOfs") {
        for entry in entries {
            if let Some(entry) = entry.as_object() {
                apply_one_of(entry, payload, out, errors);
            }
        }
    }
}

fn apply_one_of(
    entry: &Map<String, Value>,
    payload: &Value,
    out: &mut Value,
    errors: &mut Vec<SchemaError>,
) {
    let nullable = entry
        .get("_nullable")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    // Optional one-of not supplied at all: nothing to process.
    if !nullable {
        if let Some(path) = oneof::entry_path(entry) {
            if paths::get(payload, &path).is_none() {
                return;
            }
        }
    }

    match oneof::select_variant(entry, payload) {
        Ok(Selection::Null) => {
            let external = entry
                .get("_nullable_path")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let target = entry
                .get("_nullable_target_path")
                .and_then(Value::as_str)
                .unwrap_or(external);
            if !target.is_empty() {
                paths::set(out, &paths::split(target), Value::Null);
            }
        }
        Ok(Selection::Variant(name)) => {
            // Variant artifacts carry full paths from the root.
            if let Some(Value::Object(sub)) = entry.get(&name) {
                apply(sub, payload, &mut Vec::new(), out, errors);
            }
        }
        Err(error) => errors.push(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn leaves_copy_external_to_target() {
        let artifact = json!({
            "total": "amount",
            "customer": { "full_name": "buyer/name" }
        });
        let payload = json!({ "amount": 100, "buyer": { "name": "Ada" } });

        let out = transform(&artifact, &payload).unwrap();
        assert_eq!(out, json!({ "total": 100, "customer": { "full_name": "Ada" } }));
    }

    #[test]
    fn absent_external_keys_are_skipped() {
        let artifact = json!({ "total": "amount", "note": "note" });
        let payload = json!({ "amount": 100 });

        let out = transform(&artifact, &payload).unwrap();
        assert_eq!(out, json!({ "total": 100 }));
    }

    #[test]
    fn identity_mapping_round_trips() {
        let artifact = json!({
            "amount": "amount",
            "buyer": { "name": "buyer/name", "email": "buyer/email" }
        });
        let payload = json!({ "amount": 1, "buyer": { "name": "Ada", "email": "a@b.c" } });

        assert_eq!(transform(&artifact, &payload).unwrap(), payload);
    }

    #[test]
    fn nullable_node_short_circuits() {
        let artifact = json!({
            "address": {
                "street": "shipping/street",
                "_nullable": true,
                "_nullable_path": "shipping",
                "_nullable_target_path": "address"
            }
        });

        let out = transform(&artifact, &json!({ "shipping": null })).unwrap();
        assert_eq!(out, json!({ "address": null }));

        let out = transform(&artifact, &json!({ "shipping": { "street": "Main St" } })).unwrap();
        assert_eq!(out, json!({ "address": { "street": "Main St" } }));
    }

    #[test]
    fn one_of_variant_dispatch() {
        let artifact = json!({
            "_oneOfs": [{
                "card": { "payment": { "number": "payment/number" } },
                "bank": { "payment": { "iban": "payment/iban" } },
                "_discriminator": "payment/method"
            }]
        });

        let payload = json!({ "payment": { "method": "bank", "iban": "DE89" } });
        let out = transform(&artifact, &payload).unwrap();
        assert_eq!(out, json!({ "payment": { "iban": "DE89" } }));
    }

    #[test]
    fn nullable_one_of_emits_null_at_remapped_target() {
        let artifact = json!({
            "_oneOfs": [{
                "task": { "taskable": { "id": "resource/id" } },
                "_discriminator": "resource/type",
                "_nullable": true,
                "_nullable_path": "resource",
                "_nullable_target_path": "taskable"
            }]
        });

        let out = transform(&artifact, &json!({ "resource": null })).unwrap();
        assert_eq!(out, json!({ "taskable": null }));
    }

    #[test]
    fn absent_optional_one_of_is_skipped() {
        let artifact = json!({
            "total": "amount",
            "_oneOfs": [{
                "card": { "payment": { "number": "payment/number" } },
                "_discriminator": "payment/method"
            }]
        });

        let out = transform(&artifact, &json!({ "amount": 5 })).unwrap();
        assert_eq!(out, json!({ "total": 5 }));
    }

    #[test]
    fn independent_one_ofs_all_report() {
        let artifact = json!({
            "_oneOfs": [
                {
                    "card": { "payment": { "number": "payment/number" } },
                    "_discriminator": "payment/method"
                },
                {
                    "mail": { "shipping": { "address": "shipping/address" } },
                    "_discriminator": "shipping/carrier"
                }
            ]
        });

        // both discriminators invalid: both failures reported
        let payload = json!({
            "payment": { "method": "crypto" },
            "shipping": { "carrier": "pigeon" }
        });
        let err = transform(&artifact, &payload).unwrap_err();
        match err {
            ProcessError::Invalid { errors } => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].path, "payment/method");
                assert_eq!(errors[1].path, "shipping/carrier");
            }
            other => panic!("expected Invalid, got {other:?}"),
        }

        // one invalid: the valid one still fails the whole transform, with
        // exactly one reported error
        let payload = json!({
            "payment": { "method": "crypto" },
            "shipping": { "carrier": "mail", "address": "Main St" }
        });
        let err = transform(&artifact, &payload).unwrap_err();
        match err {
            ProcessError::Invalid { errors } => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].path, "payment/method");
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn nested_one_of_inside_variant() {
        let artifact = json!({
            "_oneOfs": [{
                "card": {
                    "payment": { "number": "payment/number" },
                    "_oneOfs": [{
                        "points": { "payment": { "bonus": { "points": "payment/bonus/points" } } },
                        "_discriminator": "payment/bonus/kind"
                    }]
                },
                "_discriminator": "payment/method"
            }]
        });

        let payload = json!({
            "payment": {
                "method": "card",
                "number": "4111",
                "bonus": { "kind": "points", "points": 12 }
            }
        });
        let out = transform(&artifact, &payload).unwrap();
        assert_eq!(
            out,
            json!({ "payment": { "number": "4111", "bonus": { "points": 12 } } })
        );
    }

    #[test]
    fn outcome_into_result() {
        let ok = Outcome::transformed(json!({ "a": 1 }));
        assert_eq!(ok.into_result().unwrap(), json!({ "a": 1 }));

        let bad = Outcome::invalid(vec![SchemaError {
            path: "/a".into(),
            message: "bad".into(),
        }]);
        assert!(matches!(
            bad.into_result(),
            Err(ProcessError::Invalid { errors }) if errors.len() == 1
        ));
    }
}
