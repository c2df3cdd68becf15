//! Schema building - renders a resolved property tree into a JSON Schema document.

use serde_json::{json, Map, Value};

use crate::error::BuildError;
use crate::property::{
    ItemKind, OneOf, Property, PropertyKind, ReferencedShape, Required, ResolvedTree, Variant,
};

/// Dialect tag stamped on rendered root documents.
pub const DIALECT: &str = "https://json-schema.org/draft/2020-12/schema";

/// Render a resolved tree into a JSON Schema document.
///
/// Pure function: the same tree always renders to the same document.
///
/// # Errors
///
/// Returns `BuildError` when a reference cannot be resolved.
pub fn build_document(tree: &ResolvedTree) -> Result<Value, BuildError> {
    let mut doc = Map::new();
    doc.insert("$schema".to_string(), json!(DIALECT));
    if let Some(description) = &tree.description {
        doc.insert("description".to_string(), json!(description));
    }
    for (key, value) in object_body(&tree.properties)? {
        doc.insert(key, value);
    }
    merge_options(&mut doc, &tree.schema_options);
    Ok(Value::Object(doc))
}

/// Render the object-schema body for a property list:
/// `type`, `properties`, `required`, `dependentRequired`.
fn object_body(properties: &[Property]) -> Result<Map<String, Value>, BuildError> {
    let mut rendered = Map::new();
    let mut required = Vec::new();
    let mut dependent = Map::new();

    for prop in properties {
        rendered.insert(prop.name.clone(), render_property(prop)?);
        match &prop.required {
            Required::Unconditional(true) => required.push(json!(prop.name)),
            Required::Unconditional(false) => {}
            Required::DependentOn(siblings) => {
                dependent.insert(prop.name.clone(), json!(siblings));
            }
        }
    }

    let mut body = Map::new();
    body.insert("type".to_string(), json!("object"));
    body.insert("properties".to_string(), Value::Object(rendered));
    if !required.is_empty() {
        body.insert("required".to_string(), Value::Array(required));
    }
    if !dependent.is_empty() {
        body.insert("dependentRequired".to_string(), Value::Object(dependent));
    }
    Ok(body)
}

/// Render a single property to its JSON Schema shape.
pub fn render_property(prop: &Property) -> Result<Value, BuildError> {
    let mut schema = match &prop.kind {
        PropertyKind::Field { type_name } => {
            let mut m = Map::new();
            m.insert("type".to_string(), json!(type_name));
            m
        }
        PropertyKind::Const { value } => {
            let mut m = Map::new();
            m.insert("const".to_string(), value.clone());
            m
        }
        PropertyKind::Enum { values } => {
            let mut m = Map::new();
            m.insert("enum".to_string(), Value::Array(values.clone()));
            m
        }
        PropertyKind::Object { children } => object_body(children)?,
        PropertyKind::Array { items } => {
            let item_schema = match items {
                ItemKind::Scalar(type_name) => json!({ "type": type_name }),
                ItemKind::Object(children) => Value::Object(object_body(children)?),
            };
            let mut m = Map::new();
            m.insert("type".to_string(), json!("array"));
            m.insert("items".to_string(), item_schema);
            m
        }
        PropertyKind::Collection { children } => {
            let mut m = Map::new();
            m.insert("type".to_string(), json!("array"));
            m.insert("items".to_string(), Value::Object(object_body(children)?));
            m
        }
        PropertyKind::Reference(reference) => match reference.resolve()? {
            ReferencedShape::Tree(tree) => {
                let mut m = object_body(&tree.properties)?;
                if let Some(description) = &tree.description {
                    m.insert("description".to_string(), json!(description));
                }
                merge_options(&mut m, &tree.schema_options);
                m
            }
            // A narrowed reference takes the shape of the single property.
            ReferencedShape::Property(target) => match render_property(&target)? {
                Value::Object(m) => m,
                other => {
                    return Err(BuildError::InvalidSchema {
                        message: format!("narrowed reference rendered non-object: {other}"),
                    })
                }
            },
        },
        PropertyKind::OneOf(one_of) => {
            // Nullability injects the synthetic null variant inside.
            let mut m = render_one_of(one_of, prop.nullable)?;
            merge_options(&mut m, &prop.schema_options);
            return Ok(Value::Object(m));
        }
    };

    if prop.nullable {
        make_nullable(&mut schema);
    }
    merge_options(&mut schema, &prop.schema_options);
    Ok(Value::Object(schema))
}

/// Render a one-of property: `oneOf` branches plus an optional discriminator.
///
/// When a discriminator is set, each named variant pins the discriminator
/// field to its variant key and requires it, so a plain JSON Schema validator
/// enforces variant selection. The synthetic null variant appears in the
/// `oneOf` array but never in the discriminator mapping.
fn render_one_of(one_of: &OneOf, nullable: bool) -> Result<Map<String, Value>, BuildError> {
    let mut branches = Vec::new();
    for variant in &one_of.variants {
        branches.push(render_variant(variant, one_of.discriminator.as_deref())?);
    }
    if nullable {
        branches.push(json!({ "type": "null" }));
    }

    let mut schema = Map::new();
    schema.insert("oneOf".to_string(), Value::Array(branches));

    if let Some(discriminator) = &one_of.discriminator {
        let mut mapping = Map::new();
        for (idx, variant) in one_of.variants.iter().enumerate() {
            mapping.insert(variant.name.clone(), json!(format!("#/oneOf/{idx}")));
        }
        schema.insert(
            "discriminator".to_string(),
            json!({ "propertyName": discriminator, "mapping": mapping }),
        );
    }

    Ok(schema)
}

/// Render one variant's object schema.
///
/// Exposed to the path mapper for `_variant_schemas` entries, where
/// `discriminator` is always `None` (inference variants carry no pin).
pub(crate) fn render_variant(
    variant: &Variant,
    discriminator: Option<&str>,
) -> Result<Value, BuildError> {
    let mut body = object_body(&variant.properties)?;

    if let Some(field) = discriminator {
        if let Some(Value::Object(props)) = body.get_mut("properties") {
            props.insert(field.to_string(), json!({ "const": variant.name }));
        }
        let required = body
            .entry("required".to_string())
            .or_insert_with(|| json!([]));
        if let Some(arr) = required.as_array_mut() {
            if !arr.iter().any(|v| v == field) {
                arr.push(json!(field));
            }
        }
    }

    Ok(Value::Object(body))
}

/// Extend a rendered schema to accept null.
fn make_nullable(schema: &mut Map<String, Value>) {
    if let Some(Value::Array(branches)) = schema.get_mut("oneOf") {
        branches.push(json!({ "type": "null" }));
        return;
    }
    if let Some(Value::Array(values)) = schema.get_mut("enum") {
        if !values.iter().any(Value::is_null) {
            values.push(Value::Null);
        }
        return;
    }
    if let Some(value) = schema.remove("const") {
        schema.insert("enum".to_string(), json!([value, null]));
        return;
    }
    match schema.get_mut("type") {
        Some(Value::String(s)) => {
            let current = s.clone();
            schema.insert("type".to_string(), json!([current, "null"]));
        }
        Some(Value::Array(types)) => {
            if !types.iter().any(|t| t == "null") {
                types.push(json!("null"));
            }
        }
        _ => {}
    }
}

fn merge_options(schema: &mut Map<String, Value>, options: &Map<String, Value>) {
    for (key, value) in options {
        schema.insert(key.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Property;
    use crate::version::{Schema, VersionDef};
    use serde_json::json;
    use std::sync::Arc;

    fn tree(properties: Vec<Property>) -> ResolvedTree {
        ResolvedTree {
            properties,
            ..Default::default()
        }
    }

    #[test]
    fn renders_scalar_fields_and_required_order() {
        let doc = build_document(&tree(vec![
            Property::field("amount", "integer").required(true),
            Property::field("currency", "string").required(true),
            Property::field("note", "string"),
        ]))
        .unwrap();

        assert_eq!(doc["type"], "object");
        assert_eq!(doc["properties"]["amount"], json!({ "type": "integer" }));
        // declaration order preserved
        assert_eq!(doc["required"], json!(["amount", "currency"]));
    }

    #[test]
    fn renders_dependent_required() {
        let doc = build_document(&tree(vec![
            Property::field("discount_amount", "integer"),
            Property::field("discount_code", "string").depends_on(vec!["discount_amount".into()]),
        ]))
        .unwrap();

        assert_eq!(
            doc["dependentRequired"],
            json!({ "discount_code": ["discount_amount"] })
        );
        assert!(doc.get("required").is_none());
    }

    #[test]
    fn nullable_field_unions_null_type() {
        let doc = build_document(&tree(vec![Property::field("note", "string").nullable(true)]))
            .unwrap();
        assert_eq!(doc["properties"]["note"]["type"], json!(["string", "null"]));
    }

    #[test]
    fn nullable_enum_gains_null_member() {
        let doc = build_document(&tree(vec![Property::enumeration(
            "status",
            vec![json!("open"), json!("closed")],
        )
        .nullable(true)]))
        .unwrap();
        assert_eq!(
            doc["properties"]["status"]["enum"],
            json!(["open", "closed", null])
        );
    }

    #[test]
    fn nullable_const_becomes_two_member_enum() {
        let doc = build_document(&tree(vec![
            Property::constant("kind", json!("order")).nullable(true)
        ]))
        .unwrap();
        assert_eq!(doc["properties"]["kind"]["enum"], json!(["order", null]));
    }

    #[test]
    fn renders_arrays_and_collections() {
        let doc = build_document(&tree(vec![
            Property::array("tags", ItemKind::Scalar("string".into())),
            Property::collection(
                "items",
                vec![Property::field("sku", "string").required(true)],
            ),
        ]))
        .unwrap();

        assert_eq!(
            doc["properties"]["tags"],
            json!({ "type": "array", "items": { "type": "string" } })
        );
        assert_eq!(doc["properties"]["items"]["type"], "array");
        assert_eq!(doc["properties"]["items"]["items"]["required"], json!(["sku"]));
    }

    #[test]
    fn discriminator_pins_variants_and_skips_null() {
        let one_of = Property::one_of(
            "payment",
            vec![
                Variant::new("card", vec![Property::field("number", "string").required(true)]),
                Variant::new("bank", vec![Property::field("iban", "string").required(true)]),
            ],
            Some("method".into()),
        )
        .nullable(true);

        let doc = build_document(&tree(vec![one_of])).unwrap();
        let rendered = &doc["properties"]["payment"];

        let branches = rendered["oneOf"].as_array().unwrap();
        assert_eq!(branches.len(), 3);
        assert_eq!(branches[0]["properties"]["method"], json!({ "const": "card" }));
        assert!(branches[0]["required"].as_array().unwrap().contains(&json!("method")));
        assert_eq!(branches[2], json!({ "type": "null" }));

        let mapping = rendered["discriminator"]["mapping"].as_object().unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping["card"], "#/oneOf/0");
        assert_eq!(rendered["discriminator"]["propertyName"], "method");
    }

    #[test]
    fn inference_one_of_has_no_discriminator_key() {
        let one_of = Property::one_of(
            "resource",
            vec![
                Variant::new("with_id", vec![Property::field("id", "string").required(true)]),
                Variant::new(
                    "without_id",
                    vec![Property::field("description", "string").required(true)],
                ),
            ],
            None,
        );

        let doc = build_document(&tree(vec![one_of])).unwrap();
        assert!(doc["properties"]["resource"].get("discriminator").is_none());
        assert_eq!(doc["properties"]["resource"]["oneOf"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn reference_inlines_target_document() {
        let buyer = Arc::new(Schema::new(
            "buyer",
            vec![VersionDef::new("v1")
                .property(Property::field("name", "string").required(true))
                .property(Property::field("email", "string"))],
        ));

        let doc = build_document(&tree(vec![Property::reference(
            "buyer",
            Arc::clone(&buyer),
            "v1",
        )]))
        .unwrap();
        assert_eq!(doc["properties"]["buyer"]["required"], json!(["name"]));

        // Narrowed to a single property of the referenced tree
        let doc = build_document(&tree(vec![Property::reference(
            "buyer_email",
            buyer,
            "v1",
        )
        .narrowed("email")]))
        .unwrap();
        assert_eq!(doc["properties"]["buyer_email"], json!({ "type": "string" }));
    }

    #[test]
    fn schema_options_pass_through() {
        let doc = build_document(&ResolvedTree {
            properties: vec![Property::field("amount", "integer")
                .with_option("minimum", json!(0))],
            description: Some("orders".into()),
            schema_options: {
                let mut m = Map::new();
                m.insert("$id".to_string(), json!("https://example.com/orders"));
                m
            },
        })
        .unwrap();

        assert_eq!(doc["description"], "orders");
        assert_eq!(doc["$id"], "https://example.com/orders");
        assert_eq!(doc["properties"]["amount"]["minimum"], 0);
        assert_eq!(doc["$schema"], DIALECT);
    }
}
