//! Slash-separated path helpers over JSON values.

use serde_json::{Map, Value};

/// Separator between path segments in external and target paths.
pub const SEPARATOR: char = '/';

/// Returns true when a `map` expression escapes to the schema root.
pub fn is_absolute(map: &str) -> bool {
    map.starts_with(SEPARATOR)
}

/// Split a path into its segments, ignoring a leading root marker.
pub fn split(path: &str) -> Vec<String> {
    path.trim_start_matches(SEPARATOR)
        .split(SEPARATOR)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Join segments into a single path string.
pub fn join(segments: &[String]) -> String {
    segments.join("/")
}

/// Read the value at a slash-separated path, if present.
pub fn get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.trim_start_matches(SEPARATOR).split(SEPARATOR) {
        if segment.is_empty() {
            continue;
        }
        current = current.get(segment)?;
    }
    Some(current)
}

/// Write a value at the given segments, creating intermediate objects.
/// Writing at no segments at all leaves the target untouched.
pub fn set(target: &mut Value, segments: &[String], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut current = target;
    for segment in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        current = current
            .as_object_mut()
            .unwrap()
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    current
        .as_object_mut()
        .unwrap()
        .insert(last.clone(), value);
}
