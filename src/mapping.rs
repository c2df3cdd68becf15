//! Path mapping - derives the wire-to-internal mapping artifact from a resolved tree.
//!
//! The artifact is one nested structure keyed by target-path segments whose
//! leaves are external path strings. One-of and nullable metadata live under
//! reserved keys (`_oneOfs`, `_discriminator`, `_variant_schemas`,
//! `_variant_path`, `_nullable`, `_nullable_path`, `_nullable_target_path`)
//! so the processor can walk the artifact without consulting the schema.

use std::collections::HashSet;

use serde_json::{json, Map, Value};

use crate::error::BuildError;
use crate::paths;
use crate::property::{
    ItemKind, OneOf, Property, PropertyKind, ReferencedShape, ResolvedTree,
};
use crate::render;

/// Build the mapping artifact for a resolved tree.
///
/// Pure function: the same tree always produces the same artifact.
///
/// # Errors
///
/// Fails fast on duplicate target paths, maps declared inside array
/// elements, and unresolvable references.
pub fn build_mapping(tree: &ResolvedTree) -> Result<Value, BuildError> {
    let mut builder = Builder::default();
    builder.walk(&tree.properties, &[], &[])?;
    Ok(builder.finish())
}

#[derive(Default)]
struct Builder {
    root: Map<String, Value>,
    one_ofs: Vec<Value>,
    /// Every target path claimed by a one-of: the anchors plus each
    /// variant's leaf targets. Leaves declared later are checked against
    /// this set in both directions.
    one_of_targets: HashSet<String>,
    leaf_targets: HashSet<String>,
}

impl Builder {
    fn finish(mut self) -> Value {
        if !self.one_ofs.is_empty() {
            self.root
                .insert("_oneOfs".to_string(), Value::Array(self.one_ofs));
        }
        Value::Object(self.root)
    }

    fn walk(
        &mut self,
        properties: &[Property],
        ext: &[String],
        tgt: &[String],
    ) -> Result<(), BuildError> {
        for prop in properties {
            let mut ext_path = ext.to_vec();
            ext_path.push(prop.name.clone());
            let tgt_path = target_segments(tgt, &prop.name, prop.map.as_deref());
            self.walk_kind(prop, &ext_path, &tgt_path)?;
        }
        Ok(())
    }

    fn walk_kind(
        &mut self,
        prop: &Property,
        ext_path: &[String],
        tgt_path: &[String],
    ) -> Result<(), BuildError> {
        match &prop.kind {
            PropertyKind::Field { .. } | PropertyKind::Const { .. } | PropertyKind::Enum { .. } => {
                self.insert_leaf(tgt_path, paths::join(ext_path))
            }

            // Arrays move as a unit. Index-free target paths cannot address
            // individual elements, so element-level maps fail fast.
            PropertyKind::Array { items } => {
                if let ItemKind::Object(children) = items {
                    ensure_no_element_maps(children, ext_path)?;
                }
                self.insert_leaf(tgt_path, paths::join(ext_path))
            }
            PropertyKind::Collection { children } => {
                ensure_no_element_maps(children, ext_path)?;
                self.insert_leaf(tgt_path, paths::join(ext_path))
            }

            PropertyKind::Object { children } => {
                self.walk(children, ext_path, tgt_path)?;
                if prop.nullable {
                    self.annotate_nullable(tgt_path, ext_path)?;
                }
                Ok(())
            }

            PropertyKind::Reference(reference) => match reference.resolve()? {
                // Splice the referenced tree, re-anchored at this position.
                ReferencedShape::Tree(tree) => {
                    self.walk(&tree.properties, ext_path, tgt_path)?;
                    if prop.nullable {
                        self.annotate_nullable(tgt_path, ext_path)?;
                    }
                    Ok(())
                }
                // Narrowing adopts the single property's shape in place.
                ReferencedShape::Property(target) => {
                    let mut adopted = (*target).clone();
                    adopted.nullable = prop.nullable || target.nullable;
                    adopted.map = None;
                    self.walk_kind(&adopted, ext_path, tgt_path)
                }
            },

            PropertyKind::OneOf(one_of) => {
                let (entry, targets) = self.one_of_entry(prop, one_of, ext_path, tgt_path)?;
                let tgt_str = paths::join(tgt_path);
                if self.occupied(tgt_path) || !self.one_of_targets.insert(tgt_str.clone()) {
                    return Err(BuildError::DuplicateTargetPath { path: tgt_str });
                }
                for target in targets {
                    if self.occupied(&paths::split(&target))
                        || !self.one_of_targets.insert(target.clone())
                    {
                        return Err(BuildError::DuplicateTargetPath { path: target });
                    }
                }
                self.one_ofs.push(entry);
                Ok(())
            }
        }
    }

    /// One `_oneOfs` entry: variant name → that variant's own mapping
    /// artifact (full paths from the root), plus resolution and nullability
    /// metadata. Also returns every target path the variants claim, so the
    /// caller can register them against later declarations.
    fn one_of_entry(
        &mut self,
        prop: &Property,
        one_of: &OneOf,
        ext_path: &[String],
        tgt_path: &[String],
    ) -> Result<(Value, HashSet<String>), BuildError> {
        let mut entry = Map::new();
        let mut targets = HashSet::new();

        for variant in &one_of.variants {
            let mut sub = Builder::default();
            sub.walk(&variant.properties, ext_path, tgt_path)?;
            targets.extend(sub.leaf_targets.drain());
            targets.extend(sub.one_of_targets.drain());
            entry.insert(variant.name.clone(), sub.finish());
        }

        match &one_of.discriminator {
            Some(field) => {
                entry.insert(
                    "_discriminator".to_string(),
                    json!(format!("{}/{}", paths::join(ext_path), field)),
                );
            }
            None => {
                let mut schemas = Vec::new();
                for variant in &one_of.variants {
                    schemas.push(render::render_variant(variant, None)?);
                }
                entry.insert("_variant_schemas".to_string(), Value::Array(schemas));
                entry.insert("_variant_path".to_string(), json!(paths::join(ext_path)));
            }
        }

        if prop.nullable {
            entry.insert("_nullable".to_string(), json!(true));
            entry.insert("_nullable_path".to_string(), json!(paths::join(ext_path)));
            if ext_path != tgt_path {
                entry.insert(
                    "_nullable_target_path".to_string(),
                    json!(paths::join(tgt_path)),
                );
            }
        }

        Ok((Value::Object(entry), targets))
    }

    fn insert_leaf(&mut self, segments: &[String], external: String) -> Result<(), BuildError> {
        if let Some(path) = self.one_of_collision(segments) {
            return Err(BuildError::DuplicateTargetPath { path });
        }

        let mut current = &mut self.root;
        for (idx, segment) in segments[..segments.len() - 1].iter().enumerate() {
            let slot = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match slot {
                Value::Object(map) => map,
                _ => {
                    return Err(BuildError::DuplicateTargetPath {
                        path: paths::join(&segments[..=idx]),
                    })
                }
            };
        }

        let last = &segments[segments.len() - 1];
        if current.contains_key(last) {
            return Err(BuildError::DuplicateTargetPath {
                path: paths::join(segments),
            });
        }
        current.insert(last.clone(), Value::String(external));
        self.leaf_targets.insert(paths::join(segments));
        Ok(())
    }

    /// A leaf collides with a one-of when a registered one-of target is the
    /// leaf's own path, an ancestor of it, or nested underneath it.
    fn one_of_collision(&self, segments: &[String]) -> Option<String> {
        let mut prefix = String::new();
        for segment in segments {
            if !prefix.is_empty() {
                prefix.push(paths::SEPARATOR);
            }
            prefix.push_str(segment);
            if self.one_of_targets.contains(&prefix) {
                return Some(prefix);
            }
        }
        prefix.push(paths::SEPARATOR);
        if self.one_of_targets.iter().any(|t| t.starts_with(&prefix)) {
            return Some(paths::join(segments));
        }
        None
    }

    /// Record nullability on a structural node's own target-keyed object.
    fn annotate_nullable(&mut self, tgt_path: &[String], ext_path: &[String]) -> Result<(), BuildError> {
        let differs = tgt_path != ext_path;
        let ext_join = paths::join(ext_path);
        let tgt_join = paths::join(tgt_path);

        let node = self.node_at(tgt_path)?;
        node.insert("_nullable".to_string(), json!(true));
        node.insert("_nullable_path".to_string(), json!(ext_join));
        if differs {
            node.insert("_nullable_target_path".to_string(), json!(tgt_join));
        }
        Ok(())
    }

    fn node_at(&mut self, segments: &[String]) -> Result<&mut Map<String, Value>, BuildError> {
        let mut current = &mut self.root;
        for (idx, segment) in segments.iter().enumerate() {
            let slot = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match slot {
                Value::Object(map) => map,
                _ => {
                    return Err(BuildError::DuplicateTargetPath {
                        path: paths::join(&segments[..=idx]),
                    })
                }
            };
        }
        Ok(current)
    }

    fn occupied(&self, segments: &[String]) -> bool {
        let Some((first, rest)) = segments.split_first() else {
            return true;
        };
        let mut current = match self.root.get(first) {
            Some(value) => value,
            None => return false,
        };
        for segment in rest {
            match current.get(segment) {
                Some(value) => current = value,
                None => return false,
            }
        }
        true
    }
}

/// Compute a property's target-path segments.
///
/// A relative `map` replaces the property's own trailing segment, anchored
/// at its position; an absolute `map` discards the inherited prefix and
/// resolves from the schema root.
fn target_segments(prefix: &[String], name: &str, map: Option<&str>) -> Vec<String> {
    match map {
        None => {
            let mut segments = prefix.to_vec();
            segments.push(name.to_string());
            segments
        }
        Some(m) if paths::is_absolute(m) => paths::split(m),
        Some(m) => {
            let mut segments = prefix.to_vec();
            segments.extend(paths::split(m));
            segments
        }
    }
}

/// Reject `map` overrides anywhere inside an array element subtree.
fn ensure_no_element_maps(children: &[Property], ext_path: &[String]) -> Result<(), BuildError> {
    for child in children {
        if child.map.is_some() {
            return Err(BuildError::ElementMap {
                path: format!("{}/{}", paths::join(ext_path), child.name),
            });
        }
        if let Some(grandchildren) = child.children() {
            let mut child_path = ext_path.to_vec();
            child_path.push(child.name.clone());
            ensure_no_element_maps(grandchildren, &child_path)?;
        }
        if let PropertyKind::OneOf(one_of) = &child.kind {
            let mut child_path = ext_path.to_vec();
            child_path.push(child.name.clone());
            for variant in &one_of.variants {
                ensure_no_element_maps(&variant.properties, &child_path)?;
            }
        }
    }
    Ok(())
}
