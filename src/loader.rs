//! Definition loading.
//!
//! Handles loading JSON documents from files and strings, and parsing
//! definition documents into [`Schema`] values. A definition document
//! declares one schema and its versions:
//!
//! ```json
//! {
//!   "schema": "orders",
//!   "versions": [
//!     {
//!       "version": "2024-01-01",
//!       "properties": {
//!         "amount": { "type": "integer", "required": true }
//!       }
//!     }
//!   ]
//! }
//! ```
//!
//! Cross-schema references are resolved against a [`Registry`] of
//! previously loaded schemas.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::DefinitionError;
use crate::property::{ItemKind, Property, Variant};
use crate::version::{Schema, VersionDef};

/// Previously loaded schemas, by name, for resolving references.
pub type Registry = HashMap<String, Arc<Schema>>;

/// Load a JSON document from a file path.
///
/// # Errors
///
/// Returns `DefinitionError::FileNotFound` if the file doesn't exist,
/// or `DefinitionError::InvalidJson` if the file isn't valid JSON.
pub fn load_document(path: &Path) -> Result<Value, DefinitionError> {
    if !path.exists() {
        return Err(DefinitionError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| DefinitionError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| DefinitionError::InvalidJson { source })
}

/// Load a JSON document from a string.
///
/// # Errors
///
/// Returns `DefinitionError::InvalidJson` if the string isn't valid JSON.
pub fn load_document_str(content: &str) -> Result<Value, DefinitionError> {
    serde_json::from_str(content).map_err(|source| DefinitionError::InvalidJson { source })
}

/// Load and parse a definition document from a file path.
pub fn load_definition(path: &Path, registry: &Registry) -> Result<Schema, DefinitionError> {
    let document = load_document(path)?;
    parse_definition(&document, registry)
}

/// Parse a definition document into a [`Schema`].
///
/// # Errors
///
/// Returns `DefinitionError::Invalid` for structural problems,
/// `DefinitionError::UnknownKind` for unrecognized property kinds, and
/// `DefinitionError::UnknownSchema` when a reference names a schema the
/// registry doesn't hold.
pub fn parse_definition(document: &Value, registry: &Registry) -> Result<Schema, DefinitionError> {
    let root = document
        .as_object()
        .ok_or_else(|| invalid("", "definition must be an object"))?;

    let name = root
        .get("schema")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("/schema", "expected a string schema name"))?;

    let versions = root
        .get("versions")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("/versions", "expected an array of versions"))?;

    let mut defs = Vec::with_capacity(versions.len());
    for (i, version) in versions.iter().enumerate() {
        let path = format!("/versions/{i}");
        let obj = version
            .as_object()
            .ok_or_else(|| invalid(&path, "expected a version object"))?;
        defs.push(parse_version(obj, &path, registry)?);
    }

    Ok(Schema::new(name, defs))
}

fn parse_version(
    obj: &Map<String, Value>,
    path: &str,
    registry: &Registry,
) -> Result<VersionDef, DefinitionError> {
    let id = obj
        .get("version")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(&format!("{path}/version"), "expected a string version id"))?;

    let mut def = VersionDef::new(id);

    if let Some(description) = obj.get("description") {
        let text = description
            .as_str()
            .ok_or_else(|| invalid(&format!("{path}/description"), "expected a string"))?;
        def = def.description(text);
    }

    if let Some(options) = obj.get("schema_options") {
        let map = options
            .as_object()
            .ok_or_else(|| invalid(&format!("{path}/schema_options"), "expected an object"))?;
        for (key, value) in map {
            def = def.schema_option(key, value.clone());
        }
    }

    if let Some(options) = obj.get("with_options") {
        let map = options
            .as_object()
            .ok_or_else(|| invalid(&format!("{path}/with_options"), "expected an object"))?;
        def = def.with_options(map.clone());
    }

    if let Some(excluded) = obj.get("exclude") {
        let names = excluded
            .as_array()
            .ok_or_else(|| invalid(&format!("{path}/exclude"), "expected an array of names"))?;
        for (i, name) in names.iter().enumerate() {
            let name = name.as_str().ok_or_else(|| {
                invalid(&format!("{path}/exclude/{i}"), "expected a string name")
            })?;
            def = def.exclude(name);
        }
    }

    if let Some(properties) = obj.get("properties") {
        let map = properties
            .as_object()
            .ok_or_else(|| invalid(&format!("{path}/properties"), "expected an object"))?;
        for (name, value) in map {
            let prop_path = format!("{path}/properties/{name}");
            def = def.property(parse_property(name, value, &prop_path, registry)?);
        }
    }

    Ok(def)
}

/// Parse one property definition.
///
/// The kind may be declared explicitly (`"kind"`) or inferred from shape:
/// `variants` makes a one-of, `schema` a reference, `const`/`enum`/`items`/
/// `properties` their respective kinds, and anything else a scalar field.
fn parse_property(
    name: &str,
    value: &Value,
    path: &str,
    registry: &Registry,
) -> Result<Property, DefinitionError> {
    let obj = value
        .as_object()
        .ok_or_else(|| invalid(path, "expected a property object"))?;

    let kind = match obj.get("kind").and_then(Value::as_str) {
        Some(kind) => kind.to_string(),
        None => infer_kind(obj),
    };

    let mut prop = match kind.as_str() {
        "field" => {
            let type_name = obj
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("string");
            Property::field(name, type_name)
        }
        "const" => {
            let value = obj
                .get("const")
                .cloned()
                .ok_or_else(|| invalid(path, "const property needs a \"const\" value"))?;
            Property::constant(name, value)
        }
        "enum" => {
            let values = obj
                .get("enum")
                .and_then(Value::as_array)
                .ok_or_else(|| invalid(path, "enum property needs an \"enum\" array"))?;
            Property::enumeration(name, values.clone())
        }
        "object" => Property::object(name, parse_children(obj, path, registry)?),
        "collection" => Property::collection(name, parse_children(obj, path, registry)?),
        "array" => Property::array(name, parse_items(obj, path, registry)?),
        "reference" => parse_reference(name, obj, path, registry)?,
        "one_of" => parse_one_of(name, obj, path, registry)?,
        other => {
            return Err(DefinitionError::UnknownKind {
                kind: other.to_string(),
                path: path.to_string(),
            })
        }
    };

    match obj.get("required") {
        None => {}
        Some(Value::Bool(required)) => prop = prop.required(*required),
        Some(Value::Array(siblings)) => {
            let mut names = Vec::with_capacity(siblings.len());
            for (i, sibling) in siblings.iter().enumerate() {
                let name = sibling.as_str().ok_or_else(|| {
                    invalid(&format!("{path}/required/{i}"), "expected a string name")
                })?;
                names.push(name.to_string());
            }
            prop = prop.depends_on(names);
        }
        Some(_) => {
            return Err(invalid(
                &format!("{path}/required"),
                "expected a bool or an array of sibling names",
            ))
        }
    }

    if let Some(nullable) = obj.get("nullable") {
        let nullable = nullable
            .as_bool()
            .ok_or_else(|| invalid(&format!("{path}/nullable"), "expected a bool"))?;
        prop = prop.nullable(nullable);
    }

    if let Some(map) = obj.get("map") {
        let target = map
            .as_str()
            .ok_or_else(|| invalid(&format!("{path}/map"), "expected a string path"))?;
        prop = prop.map_to(target);
    }

    if let Some(options) = obj.get("options") {
        let map = options
            .as_object()
            .ok_or_else(|| invalid(&format!("{path}/options"), "expected an object"))?;
        for (key, value) in map {
            prop = prop.with_option(key, value.clone());
        }
    }

    Ok(prop)
}

fn infer_kind(obj: &Map<String, Value>) -> String {
    let kind = if obj.contains_key("variants") {
        "one_of"
    } else if obj.contains_key("schema") {
        "reference"
    } else if obj.contains_key("const") {
        "const"
    } else if obj.contains_key("enum") {
        "enum"
    } else if obj.contains_key("items") {
        "array"
    } else if obj.contains_key("properties") {
        "object"
    } else {
        "field"
    };
    kind.to_string()
}

fn parse_children(
    obj: &Map<String, Value>,
    path: &str,
    registry: &Registry,
) -> Result<Vec<Property>, DefinitionError> {
    let properties = obj
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| invalid(path, "expected a \"properties\" object"))?;

    let mut children = Vec::with_capacity(properties.len());
    for (name, value) in properties {
        let child_path = format!("{path}/properties/{name}");
        children.push(parse_property(name, value, &child_path, registry)?);
    }
    Ok(children)
}

fn parse_items(
    obj: &Map<String, Value>,
    path: &str,
    registry: &Registry,
) -> Result<ItemKind, DefinitionError> {
    match obj.get("items") {
        Some(Value::String(type_name)) => Ok(ItemKind::Scalar(type_name.clone())),
        Some(Value::Object(items)) => Ok(ItemKind::Object(parse_children(
            items,
            &format!("{path}/items"),
            registry,
        )?)),
        _ => Err(invalid(
            &format!("{path}/items"),
            "expected a type name or an object with \"properties\"",
        )),
    }
}

fn parse_reference(
    name: &str,
    obj: &Map<String, Value>,
    path: &str,
    registry: &Registry,
) -> Result<Property, DefinitionError> {
    let target = obj
        .get("schema")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(&format!("{path}/schema"), "expected a string schema name"))?;

    let schema = registry
        .get(target)
        .cloned()
        .ok_or_else(|| DefinitionError::UnknownSchema {
            name: target.to_string(),
            path: path.to_string(),
        })?;

    let version = obj
        .get("version")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(&format!("{path}/version"), "expected a string version id"))?;

    let mut prop = Property::reference(name, schema, version);
    if let Some(narrowed) = obj.get("property") {
        let narrowed = narrowed
            .as_str()
            .ok_or_else(|| invalid(&format!("{path}/property"), "expected a string name"))?;
        prop = prop.narrowed(narrowed);
    }
    Ok(prop)
}

fn parse_one_of(
    name: &str,
    obj: &Map<String, Value>,
    path: &str,
    registry: &Registry,
) -> Result<Property, DefinitionError> {
    let variants = obj
        .get("variants")
        .and_then(Value::as_object)
        .ok_or_else(|| invalid(&format!("{path}/variants"), "expected a variants object"))?;

    let mut parsed = Vec::with_capacity(variants.len());
    for (variant_name, value) in variants {
        let variant_path = format!("{path}/variants/{variant_name}");
        let variant = value
            .as_object()
            .ok_or_else(|| invalid(&variant_path, "expected a variant object"))?;
        parsed.push(Variant::new(
            variant_name,
            parse_children(variant, &variant_path, registry)?,
        ));
    }

    let discriminator = match obj.get("discriminator") {
        None => None,
        Some(value) => Some(
            value
                .as_str()
                .ok_or_else(|| {
                    invalid(&format!("{path}/discriminator"), "expected a string name")
                })?
                .to_string(),
        ),
    };

    Ok(Property::one_of(name, parsed, discriminator))
}

fn invalid(path: &str, message: &str) -> DefinitionError {
    DefinitionError::Invalid {
        path: path.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{PropertyKind, Required};
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_document_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"schema": "orders"}}"#).unwrap();

        let document = load_document(file.path()).unwrap();
        assert_eq!(document["schema"], "orders");
    }

    #[test]
    fn load_document_file_not_found() {
        let result = load_document(Path::new("/nonexistent/path.json"));
        assert!(matches!(result, Err(DefinitionError::FileNotFound { .. })));
    }

    #[test]
    fn load_document_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let result = load_document(file.path());
        assert!(matches!(result, Err(DefinitionError::InvalidJson { .. })));
    }

    #[test]
    fn load_document_str_invalid() {
        let result = load_document_str("not json");
        assert!(matches!(result, Err(DefinitionError::InvalidJson { .. })));
    }

    #[test]
    fn parse_minimal_definition() {
        let document = json!({
            "schema": "orders",
            "versions": [
                {
                    "version": "2024-01-01",
                    "properties": {
                        "amount": { "type": "integer", "required": true },
                        "note": { "type": "string" }
                    }
                }
            ]
        });

        let schema = parse_definition(&document, &Registry::new()).unwrap();
        assert_eq!(schema.name(), "orders");

        let tree = schema.resolved("2024-01-01").unwrap();
        let amount = tree.get("amount").unwrap();
        assert_eq!(
            amount.kind,
            PropertyKind::Field {
                type_name: "integer".into()
            }
        );
        assert_eq!(amount.required, Required::Unconditional(true));
    }

    #[test]
    fn kind_inference_from_shape() {
        let document = json!({
            "schema": "orders",
            "versions": [
                {
                    "version": "v1",
                    "properties": {
                        "status": { "enum": ["open", "closed"] },
                        "currency": { "const": "EUR" },
                        "tags": { "items": "string" },
                        "buyer": { "properties": { "name": { "type": "string" } } },
                        "payment": {
                            "variants": {
                                "card": { "properties": { "number": { "type": "string" } } }
                            },
                            "discriminator": "method"
                        }
                    }
                }
            ]
        });

        let schema = parse_definition(&document, &Registry::new()).unwrap();
        let tree = schema.resolved("v1").unwrap();

        assert!(matches!(
            tree.get("status").unwrap().kind,
            PropertyKind::Enum { .. }
        ));
        assert!(matches!(
            tree.get("currency").unwrap().kind,
            PropertyKind::Const { .. }
        ));
        assert!(matches!(
            tree.get("tags").unwrap().kind,
            PropertyKind::Array {
                items: ItemKind::Scalar(_)
            }
        ));
        assert!(matches!(
            tree.get("buyer").unwrap().kind,
            PropertyKind::Object { .. }
        ));
        match &tree.get("payment").unwrap().kind {
            PropertyKind::OneOf(one_of) => {
                assert_eq!(one_of.discriminator.as_deref(), Some("method"));
                assert_eq!(one_of.variants.len(), 1);
            }
            other => panic!("expected one_of, got {other:?}"),
        }
    }

    #[test]
    fn explicit_collection_kind() {
        let document = json!({
            "schema": "orders",
            "versions": [
                {
                    "version": "v1",
                    "properties": {
                        "line_items": {
                            "kind": "collection",
                            "properties": { "sku": { "type": "string" } }
                        }
                    }
                }
            ]
        });

        let schema = parse_definition(&document, &Registry::new()).unwrap();
        let tree = schema.resolved("v1").unwrap();
        assert!(matches!(
            tree.get("line_items").unwrap().kind,
            PropertyKind::Collection { .. }
        ));
    }

    #[test]
    fn unknown_kind_reports_path() {
        let document = json!({
            "schema": "orders",
            "versions": [
                {
                    "version": "v1",
                    "properties": {
                        "amount": { "kind": "tuple" }
                    }
                }
            ]
        });

        let err = parse_definition(&document, &Registry::new()).unwrap_err();
        match err {
            DefinitionError::UnknownKind { kind, path } => {
                assert_eq!(kind, "tuple");
                assert_eq!(path, "/versions/0/properties/amount");
            }
            other => panic!("expected UnknownKind, got {other:?}"),
        }
    }

    #[test]
    fn dependent_required_array() {
        let document = json!({
            "schema": "orders",
            "versions": [
                {
                    "version": "v1",
                    "properties": {
                        "discount_code": { "type": "string", "required": ["discount_amount"] },
                        "discount_amount": { "type": "integer" }
                    }
                }
            ]
        });

        let schema = parse_definition(&document, &Registry::new()).unwrap();
        let tree = schema.resolved("v1").unwrap();
        assert_eq!(
            tree.get("discount_code").unwrap().required,
            Required::DependentOn(vec!["discount_amount".into()])
        );
    }

    #[test]
    fn map_nullable_and_options() {
        let document = json!({
            "schema": "orders",
            "versions": [
                {
                    "version": "v1",
                    "properties": {
                        "amount": {
                            "type": "integer",
                            "nullable": true,
                            "map": "/total",
                            "options": { "minimum": 0 }
                        }
                    }
                }
            ]
        });

        let schema = parse_definition(&document, &Registry::new()).unwrap();
        let tree = schema.resolved("v1").unwrap();
        let amount = tree.get("amount").unwrap();
        assert!(amount.nullable);
        assert_eq!(amount.map.as_deref(), Some("/total"));
        assert_eq!(amount.schema_options.get("minimum"), Some(&json!(0)));
    }

    #[test]
    fn reference_resolves_through_registry() {
        let buyers = json!({
            "schema": "buyers",
            "versions": [
                {
                    "version": "v1",
                    "properties": {
                        "name": { "type": "string", "required": true }
                    }
                }
            ]
        });
        let orders = json!({
            "schema": "orders",
            "versions": [
                {
                    "version": "v1",
                    "properties": {
                        "buyer": { "schema": "buyers", "version": "v1" }
                    }
                }
            ]
        });

        let mut registry = Registry::new();
        let buyers = parse_definition(&buyers, &registry).unwrap();
        registry.insert(buyers.name().to_string(), Arc::new(buyers));

        let orders = parse_definition(&orders, &registry).unwrap();
        let tree = orders.resolved("v1").unwrap();
        assert!(matches!(
            tree.get("buyer").unwrap().kind,
            PropertyKind::Reference(_)
        ));
    }

    #[test]
    fn unknown_schema_reference_fails() {
        let document = json!({
            "schema": "orders",
            "versions": [
                {
                    "version": "v1",
                    "properties": {
                        "buyer": { "schema": "buyers", "version": "v1" }
                    }
                }
            ]
        });

        let err = parse_definition(&document, &Registry::new()).unwrap_err();
        assert!(matches!(
            err,
            DefinitionError::UnknownSchema { name, .. } if name == "buyers"
        ));
    }

    #[test]
    fn version_exclude_and_description() {
        let document = json!({
            "schema": "orders",
            "versions": [
                {
                    "version": "v1",
                    "description": "orders API",
                    "properties": {
                        "amount": { "type": "integer" },
                        "legacy_total": { "type": "string" }
                    }
                },
                {
                    "version": "v2",
                    "exclude": ["legacy_total"]
                }
            ]
        });

        let schema = parse_definition(&document, &Registry::new()).unwrap();
        let tree = schema.resolved("v2").unwrap();
        assert!(tree.get("legacy_total").is_none());
        assert_eq!(tree.description.as_deref(), Some("orders API"));
    }

    #[test]
    fn missing_schema_name_fails() {
        let document = json!({ "versions": [] });
        let err = parse_definition(&document, &Registry::new()).unwrap_err();
        assert!(matches!(err, DefinitionError::Invalid { path, .. } if path == "/schema"));
    }
}
