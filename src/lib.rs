//! Wiremap
//!
//! Versioned property-tree schemas that derive two artifacts per version:
//! a JSON Schema document for validating external payloads, and a path
//! mapping that transforms the external (wire) shape into the internal
//! (application) shape.
//!
//! Versions inherit: each version starts from the previous version's
//! resolved tree and applies its own declarations, overrides, and
//! exclusions. Resolved trees, mapping artifacts, and rendered documents
//! are cached per version after first use.
//!
//! # Example
//!
//! ```
//! use wiremap::{ErrorMode, Property, Schema, VersionDef};
//! use serde_json::json;
//!
//! let schema = Schema::new(
//!     "orders",
//!     vec![VersionDef::new("2024-01-01")
//!         .property(Property::field("amount", "integer").required(true))
//!         .property(Property::object(
//!             "buyer",
//!             vec![Property::field("name", "string").map_to("full_name")],
//!         ))],
//! );
//!
//! // Rendered JSON Schema document
//! let document = schema.document("2024-01-01").unwrap();
//! assert_eq!(document["properties"]["amount"]["type"], "integer");
//!
//! // External payload transformed to the internal shape
//! let payload = json!({ "amount": 100, "buyer": { "name": "Ada" } });
//! let outcome = schema
//!     .process_with_mode(&payload, "2024-01-01", true, ErrorMode::Raise)
//!     .unwrap();
//! assert_eq!(
//!     outcome.value.unwrap(),
//!     json!({ "amount": 100, "buyer": { "full_name": "Ada" } })
//! );
//! ```
//!
//! # Polymorphic properties
//!
//! A one-of property declares named variants. At processing time the
//! variant is selected by a discriminator field when one is declared, or
//! by validating the value against each variant's schema otherwise.
//! Nullable one-ofs additionally accept `null`.

mod config;
mod error;
mod loader;
mod mapping;
mod oneof;
mod paths;
mod processor;
mod property;
mod render;
mod validator;
mod version;

pub use config::{error_mode, set_error_mode, ErrorMode};
pub use error::{BuildError, DefinitionError, ProcessError, SchemaError};
pub use loader::{
    load_definition, load_document, load_document_str, parse_definition, Registry,
};
pub use mapping::build_mapping;
pub use oneof::{select_variant, Selection};
pub use processor::{transform, Outcome};
pub use property::{
    ItemKind, OneOf, Property, PropertyKind, Reference, ReferencedShape, Required, ResolvedTree,
    Variant, RESERVED_KEYS,
};
pub use render::build_document;
pub use validator::collect_errors;
pub use version::{Schema, VersionDef};
