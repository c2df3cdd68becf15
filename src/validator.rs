//! Payload validation against rendered schema documents.

use serde_json::Value;

use crate::error::{BuildError, SchemaError};

/// Validate a payload against a rendered schema document, collecting every
/// violation rather than stopping at the first.
///
/// # Errors
///
/// Returns `BuildError::InvalidSchema` if the document itself cannot be
/// compiled as a JSON Schema.
pub fn collect_errors(schema: &Value, payload: &Value) -> Result<Vec<SchemaError>, BuildError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| BuildError::InvalidSchema {
        message: e.to_string(),
    })?;

    Ok(validator
        .iter_errors(payload)
        .map(|e| SchemaError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect())
}
