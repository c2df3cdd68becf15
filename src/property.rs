//! Property tree model.
//!
//! A schema version is described by an ordered tree of [`Property`] values.
//! Each property has a closed [`PropertyKind`] with kind-specific payload;
//! the schema builder and path mapper dispatch over this tag.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::BuildError;
use crate::version::Schema;

/// Keys reserved for mapping-artifact metadata.
///
/// Property and variant names must never collide with these.
pub const RESERVED_KEYS: &[&str] = &[
    "_oneOfs",
    "_discriminator",
    "_variant_schemas",
    "_variant_path",
    "_nullable",
    "_nullable_path",
    "_nullable_target_path",
];

/// Returns true when a property or variant name is reserved.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_KEYS.contains(&name)
}

/// Requiredness of a property.
///
/// A property is either unconditionally required (or not), or required only
/// when all of its listed sibling properties are present
/// (`dependentRequired` in the rendered schema). Never both.
#[derive(Debug, Clone, PartialEq)]
pub enum Required {
    Unconditional(bool),
    DependentOn(Vec<String>),
}

impl Default for Required {
    fn default() -> Self {
        Required::Unconditional(false)
    }
}

/// Item shape for array properties.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    /// Scalar items, named by JSON type ("string", "integer", ...).
    Scalar(String),
    /// Object items with their own property sub-tree.
    Object(Vec<Property>),
}

/// Closed set of property kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    Field { type_name: String },
    Const { value: Value },
    Enum { values: Vec<Value> },
    Object { children: Vec<Property> },
    Array { items: ItemKind },
    Collection { children: Vec<Property> },
    Reference(Reference),
    OneOf(OneOf),
}

/// A property that delegates its subtree to another schema's resolved tree.
#[derive(Debug, Clone)]
pub struct Reference {
    pub schema: Arc<Schema>,
    pub version: String,
    /// Narrow the reference to a single named property of the target tree.
    pub property: Option<String>,
}

impl Reference {
    /// Resolve the referenced tree, applying narrowing.
    pub fn resolve(&self) -> Result<ReferencedShape, BuildError> {
        let tree = self.schema.resolved(&self.version)?;
        match &self.property {
            None => Ok(ReferencedShape::Tree(tree)),
            Some(name) => {
                let prop =
                    tree.get(name)
                        .cloned()
                        .ok_or_else(|| BuildError::PropertyNotFound {
                            schema: self.schema.name().to_string(),
                            property: name.clone(),
                        })?;
                Ok(ReferencedShape::Property(Box::new(prop)))
            }
        }
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name()
            && self.version == other.version
            && self.property == other.property
    }
}

/// What a reference resolves to after narrowing.
pub enum ReferencedShape {
    Tree(Arc<ResolvedTree>),
    Property(Box<Property>),
}

/// A polymorphic property with ordered, named variants.
#[derive(Debug, Clone, PartialEq)]
pub struct OneOf {
    pub variants: Vec<Variant>,
    /// Field inside the payload whose value selects the variant.
    /// When unset, variant selection falls back to schema inference.
    pub discriminator: Option<String>,
}

/// One named alternative shape of a one-of property.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub name: String,
    pub properties: Vec<Property>,
}

impl Variant {
    pub fn new(name: impl Into<String>, properties: Vec<Property>) -> Self {
        Self {
            name: name.into(),
            properties,
        }
    }
}

/// One named unit in a schema's declared structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub kind: PropertyKind,
    pub required: Required,
    pub nullable: bool,
    /// Target-path override. Absolute when prefixed with `/`, otherwise
    /// relative to the enclosing node.
    pub map: Option<String>,
    /// Opaque options merged into the rendered schema node.
    pub schema_options: Map<String, Value>,
}

impl Property {
    fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: Required::default(),
            nullable: false,
            map: None,
            schema_options: Map::new(),
        }
    }

    /// Scalar field with a JSON type name ("string", "integer", ...).
    pub fn field(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(
            name,
            PropertyKind::Field {
                type_name: type_name.into(),
            },
        )
    }

    /// Constant-valued property.
    pub fn constant(name: impl Into<String>, value: Value) -> Self {
        Self::new(name, PropertyKind::Const { value })
    }

    /// Enumerated property.
    pub fn enumeration(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(name, PropertyKind::Enum { values })
    }

    /// Object property with child properties.
    pub fn object(name: impl Into<String>, children: Vec<Property>) -> Self {
        Self::new(name, PropertyKind::Object { children })
    }

    /// Array property.
    pub fn array(name: impl Into<String>, items: ItemKind) -> Self {
        Self::new(name, PropertyKind::Array { items })
    }

    /// Collection property: an array of objects.
    pub fn collection(name: impl Into<String>, children: Vec<Property>) -> Self {
        Self::new(name, PropertyKind::Collection { children })
    }

    /// Reference to another schema's resolved tree.
    pub fn reference(
        name: impl Into<String>,
        schema: Arc<Schema>,
        version: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            PropertyKind::Reference(Reference {
                schema,
                version: version.into(),
                property: None,
            }),
        )
    }

    /// One-of property with ordered variants and an optional discriminator.
    pub fn one_of(
        name: impl Into<String>,
        variants: Vec<Variant>,
        discriminator: Option<String>,
    ) -> Self {
        Self::new(
            name,
            PropertyKind::OneOf(OneOf {
                variants,
                discriminator,
            }),
        )
    }

    /// Set unconditional requiredness.
    pub fn required(mut self, required: bool) -> Self {
        self.required = Required::Unconditional(required);
        self
    }

    /// Require this property only when the named siblings are present.
    pub fn depends_on(mut self, siblings: Vec<String>) -> Self {
        self.required = Required::DependentOn(siblings);
        self
    }

    /// Mark the property nullable.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Override the target path. A leading `/` escapes to the schema root.
    pub fn map_to(mut self, path: impl Into<String>) -> Self {
        self.map = Some(path.into());
        self
    }

    /// Narrow a reference property to one property of the referenced tree.
    ///
    /// No effect on non-reference kinds.
    pub fn narrowed(mut self, property: impl Into<String>) -> Self {
        if let PropertyKind::Reference(r) = &mut self.kind {
            r.property = Some(property.into());
        }
        self
    }

    /// Attach an opaque schema option, passed through to the rendered schema.
    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.schema_options.insert(key.into(), value);
        self
    }

    /// Child properties for structural kinds.
    pub fn children(&self) -> Option<&[Property]> {
        match &self.kind {
            PropertyKind::Object { children } | PropertyKind::Collection { children } => {
                Some(children)
            }
            PropertyKind::Array {
                items: ItemKind::Object(children),
            } => Some(children),
            _ => None,
        }
    }
}

/// The fully-inherited, override-applied property structure for one version.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedTree {
    pub properties: Vec<Property>,
    pub description: Option<String>,
    pub schema_options: Map<String, Value>,
}

impl ResolvedTree {
    /// Look up a top-level property by name.
    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}
