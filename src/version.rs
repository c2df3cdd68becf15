//! Versioned schemas: inheritance, override, exclusion, and per-version caches.
//!
//! A [`Schema`] holds its versions in declaration order. Resolving version
//! *k* starts from the resolved tree of version *k−1*, deep-merges that
//! version's declarations, then removes its exclusions. Resolved trees,
//! mapping artifacts, and rendered documents are computed lazily on first
//! use and cached for the process lifetime.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::{Map, Value};

use crate::config::{self, ErrorMode};
use crate::error::{BuildError, ProcessError};
use crate::mapping;
use crate::processor::{self, Outcome};
use crate::property::{is_reserved, ItemKind, Property, PropertyKind, ResolvedTree};
use crate::render;
use crate::validator;

/// One version's local declarations.
#[derive(Debug, Clone, Default)]
pub struct VersionDef {
    pub id: String,
    pub description: Option<String>,
    /// Options merged into the rendered root document.
    pub schema_options: Map<String, Value>,
    /// Batched option defaults applied to every property declared in this
    /// version (the property's own options win).
    pub with_options: Map<String, Value>,
    /// New properties and overrides of inherited ones, in declaration order.
    pub properties: Vec<Property>,
    /// Top-level property names removed relative to the previous version.
    pub excluded: Vec<String>,
}

impl VersionDef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare or override a property.
    pub fn property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Exclude an inherited top-level property.
    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.excluded.push(name.into());
        self
    }

    /// Attach an option to the rendered root document.
    pub fn schema_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.schema_options.insert(key.into(), value);
        self
    }

    /// Option defaults for every property declared in this version.
    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.with_options = options;
        self
    }
}

#[derive(Debug)]
struct VersionSlot {
    def: VersionDef,
    resolved: OnceCell<Arc<ResolvedTree>>,
    mapping: OnceCell<Arc<Value>>,
    document: OnceCell<Arc<Value>>,
}

impl VersionSlot {
    fn new(def: VersionDef) -> Self {
        Self {
            def,
            resolved: OnceCell::new(),
            mapping: OnceCell::new(),
            document: OnceCell::new(),
        }
    }
}

/// A named schema with totally ordered versions.
///
/// Built once at declaration time and immutable afterwards; share it with
/// `Arc` when other schemas reference it.
#[derive(Debug)]
pub struct Schema {
    name: String,
    versions: Vec<VersionSlot>,
}

impl Schema {
    pub fn new(name: impl Into<String>, versions: Vec<VersionDef>) -> Self {
        Self {
            name: name.into(),
            versions: versions.into_iter().map(VersionSlot::new).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version identifiers in declaration order.
    pub fn version_ids(&self) -> Vec<&str> {
        self.versions.iter().map(|s| s.def.id.as_str()).collect()
    }

    /// The most recently declared version, if any.
    pub fn latest(&self) -> Option<&str> {
        self.versions.last().map(|s| s.def.id.as_str())
    }

    fn index_of(&self, version: &str) -> Result<usize, BuildError> {
        self.versions
            .iter()
            .position(|s| s.def.id == version)
            .ok_or_else(|| BuildError::VersionNotFound {
                schema: self.name.clone(),
                version: version.to_string(),
            })
    }

    /// The effective property tree for a version.
    pub fn resolved(&self, version: &str) -> Result<Arc<ResolvedTree>, BuildError> {
        let idx = self.index_of(version)?;
        self.resolved_at(idx)
    }

    fn resolved_at(&self, idx: usize) -> Result<Arc<ResolvedTree>, BuildError> {
        self.versions[idx]
            .resolved
            .get_or_try_init(|| {
                let base = if idx == 0 {
                    ResolvedTree::default()
                } else {
                    (*self.resolved_at(idx - 1)?).clone()
                };
                apply_version(base, &self.versions[idx].def, &self.name).map(Arc::new)
            })
            .cloned()
    }

    /// The mapping artifact for a version, built on first use.
    pub fn mapping(&self, version: &str) -> Result<Arc<Value>, BuildError> {
        let idx = self.index_of(version)?;
        self.versions[idx]
            .mapping
            .get_or_try_init(|| {
                let tree = self.resolved_at(idx)?;
                mapping::build_mapping(&tree).map(Arc::new)
            })
            .cloned()
    }

    /// The rendered JSON Schema document for a version, built on first use.
    pub fn document(&self, version: &str) -> Result<Arc<Value>, BuildError> {
        let idx = self.index_of(version)?;
        self.versions[idx]
            .document
            .get_or_try_init(|| {
                let tree = self.resolved_at(idx)?;
                render::build_document(&tree).map(Arc::new)
            })
            .cloned()
    }

    /// Transform an external payload into its internal shape.
    ///
    /// When `validate` is set, the payload is checked against the rendered
    /// schema first and is not transformed on failure. Propagation of
    /// validation failures follows the process-wide [`ErrorMode`].
    pub fn process(
        &self,
        payload: &Value,
        version: &str,
        validate: bool,
    ) -> Result<Outcome, ProcessError> {
        self.process_with_mode(payload, version, validate, config::error_mode())
    }

    /// Like [`Schema::process`] with an explicit error-handling mode.
    pub fn process_with_mode(
        &self,
        payload: &Value,
        version: &str,
        validate: bool,
        mode: ErrorMode,
    ) -> Result<Outcome, ProcessError> {
        let artifact = self.mapping(version)?;

        if validate {
            let document = self.document(version)?;
            let errors = validator::collect_errors(&document, payload)?;
            if !errors.is_empty() {
                return finish_invalid(mode, errors);
            }
        }

        match processor::transform(&artifact, payload) {
            Ok(value) => Ok(Outcome::transformed(value)),
            Err(ProcessError::Invalid { errors }) => finish_invalid(mode, errors),
            Err(other) => Err(other),
        }
    }
}

fn finish_invalid(
    mode: ErrorMode,
    errors: Vec<crate::error::SchemaError>,
) -> Result<Outcome, ProcessError> {
    match mode {
        ErrorMode::Raise => Err(ProcessError::Invalid { errors }),
        ErrorMode::Result => Ok(Outcome::invalid(errors)),
    }
}

/// Apply one version's declarations and exclusions to the inherited tree.
fn apply_version(
    base: ResolvedTree,
    def: &VersionDef,
    schema_name: &str,
) -> Result<ResolvedTree, BuildError> {
    let mut properties = base.properties;

    for declared in &def.properties {
        validate_names(declared)?;

        let mut declared = declared.clone();
        for (key, value) in &def.with_options {
            declared
                .schema_options
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        match properties.iter().position(|p| p.name == declared.name) {
            Some(idx) => {
                let merged = merge_property(&properties[idx], declared);
                properties[idx] = merged;
            }
            None => properties.push(declared),
        }
    }

    for excluded in &def.excluded {
        let idx = properties
            .iter()
            .position(|p| &p.name == excluded)
            .ok_or_else(|| BuildError::PropertyNotFound {
                schema: schema_name.to_string(),
                property: excluded.clone(),
            })?;
        properties.remove(idx);
    }

    let mut schema_options = base.schema_options;
    for (key, value) in &def.schema_options {
        schema_options.insert(key.clone(), value.clone());
    }

    Ok(ResolvedTree {
        properties,
        description: def.description.clone().or(base.description),
        schema_options,
    })
}

/// Deep-merge an override into an inherited property.
///
/// Matching structural kinds refine children without discarding unmentioned
/// ones; everything else (including one-of variants) is replaced wholesale.
/// Scalar attributes always come from the override.
fn merge_property(base: &Property, over: Property) -> Property {
    let kind = match (&base.kind, over.kind) {
        (PropertyKind::Object { children: b }, PropertyKind::Object { children: o }) => {
            PropertyKind::Object {
                children: merge_children(b, o),
            }
        }
        (PropertyKind::Collection { children: b }, PropertyKind::Collection { children: o }) => {
            PropertyKind::Collection {
                children: merge_children(b, o),
            }
        }
        (
            PropertyKind::Array {
                items: ItemKind::Object(b),
            },
            PropertyKind::Array {
                items: ItemKind::Object(o),
            },
        ) => PropertyKind::Array {
            items: ItemKind::Object(merge_children(b, o)),
        },
        (_, kind) => kind,
    };

    let mut schema_options = base.schema_options.clone();
    for (key, value) in over.schema_options {
        schema_options.insert(key, value);
    }

    Property {
        name: over.name,
        kind,
        required: over.required,
        nullable: over.nullable,
        map: over.map,
        schema_options,
    }
}

fn merge_children(base: &[Property], over: Vec<Property>) -> Vec<Property> {
    let mut merged = base.to_vec();
    for child in over {
        match merged.iter().position(|p| p.name == child.name) {
            Some(idx) => {
                let replaced = merge_property(&merged[idx], child);
                merged[idx] = replaced;
            }
            None => merged.push(child),
        }
    }
    merged
}

/// Reject property and variant names that collide with reserved mapping keys.
fn validate_names(property: &Property) -> Result<(), BuildError> {
    if is_reserved(&property.name) {
        return Err(BuildError::ReservedName {
            name: property.name.clone(),
        });
    }
    if let Some(children) = property.children() {
        for child in children {
            validate_names(child)?;
        }
    }
    if let PropertyKind::OneOf(one_of) = &property.kind {
        for variant in &one_of.variants {
            if is_reserved(&variant.name) {
                return Err(BuildError::ReservedName {
                    name: variant.name.clone(),
                });
            }
            for child in &variant.properties {
                validate_names(child)?;
            }
        }
    }
    Ok(())
}
