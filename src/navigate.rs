//! Schema path navigation
//!
//! Walks a resolved schema along a JSON path of object keys. Arrays are
//! transparent: paths never contain indices, so an array node is entered
//! through its `items` without consuming a segment.
//!
//! `None` means "no constraint known" and is never an error.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};

use regex::Regex;
use serde_json::{Map, Value};

use crate::schema::{CombinatorKind, SchemaNode};

/// Upper bound on chained `$ref` hops, guards against reference cycles
const MAX_REF_DEPTH: usize = 16;

/// Follow local `#/...` references from `node`
pub fn deref<'a>(root: &'a Value, mut node: &'a Value) -> &'a Value {
    for _ in 0..MAX_REF_DEPTH {
        match node.get("$ref").and_then(Value::as_str).and_then(|r| r.strip_prefix('#')) {
            Some(pointer) => match root.pointer(pointer) {
                Some(target) => node = target,
                None => break,
            },
            None => break,
        }
    }
    node
}

/// Match `key` against a `patternProperties` pattern, compiling each pattern once
///
/// Invalid patterns are remembered as never matching.
fn pattern_matches(pattern: &str, key: &str) -> bool {
    static COMPILED: OnceLock<Mutex<HashMap<String, Option<Regex>>>> = OnceLock::new();
    let mut compiled = COMPILED
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(regex) = compiled.get(pattern) {
        return regex.as_ref().is_some_and(|re| re.is_match(key));
    }
    let regex = Regex::new(pattern).ok();
    let matched = regex.as_ref().is_some_and(|re| re.is_match(key));
    compiled.insert(pattern.to_string(), regex);
    matched
}

/// Structural child lookup for one key on an object-like node
fn property<'a>(node: &'a Value, key: &str) -> Option<&'a Value> {
    if let Some(child) = node.get("properties").and_then(|p| p.get(key)) {
        return Some(child);
    }

    if let Some(patterns) = node.get("patternProperties").and_then(Value::as_object) {
        let matched = patterns
            .iter()
            .find(|(pattern, _)| pattern_matches(pattern, key));
        if let Some((_, child)) = matched {
            return Some(child);
        }
    }

    node.get("additionalProperties").filter(|a| a.is_object())
}

/// Schema for the value of `key` on an object node, references followed
pub fn child_schema<'a>(root: &'a Value, node: &'a Value, key: &str) -> Option<&'a Value> {
    property(deref(root, node), key).map(|c| deref(root, c))
}

/// Step from `node` into `key`, entering arrays through `items`
fn step<'a>(root: &'a Value, node: &'a Value, key: &str) -> Option<&'a Value> {
    let mut current = deref(root, node);
    loop {
        match SchemaNode::classify(current) {
            SchemaNode::Array { items } => {
                current = deref(root, items.filter(|i| i.is_object())?);
            }
            SchemaNode::Object { .. } => return property(current, key).map(|c| deref(root, c)),
            _ => return None,
        }
    }
}

/// Navigate `schema` along `path` without merging alternatives
pub fn navigate<'a>(schema: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = schema;
    for segment in path {
        current = step(schema, current, segment)?;
    }
    Some(deref(schema, current))
}

/// Navigate, collapsing `oneOf`/`anyOf`/`allOf` nodes along the way
///
/// Used by completion and hover, where a single coherent node is wanted.
pub fn navigate_merged(schema: &Value, path: &[String]) -> Option<Value> {
    let mut current = merge_alternatives(schema, schema);
    for segment in path {
        // Merge at every array hop too, items are often combinators
        while let SchemaNode::Array { items } = SchemaNode::classify(&current) {
            let items = items.filter(|i| i.is_object())?;
            current = merge_alternatives(schema, items);
        }
        let next = step(schema, &current, segment)?;
        current = merge_alternatives(schema, next);
    }
    Some(current)
}

/// If `node` is an array, the node for its items; otherwise `node` itself
pub fn item_scope(root: &Value, node: &Value) -> Value {
    let mut current = merge_alternatives(root, node);
    while let SchemaNode::Array { items: Some(items) } = SchemaNode::classify(&current) {
        if !items.is_object() {
            break;
        }
        current = merge_alternatives(root, items);
    }
    current
}

/// Collapse combinators on `node` into one synthetic node
///
/// Properties are unioned with later alternatives overwriting earlier ones,
/// `type` falls back to the first alternative that has one, and
/// descriptions are concatenated with numbering. This is lossy and only
/// meant for presentation.
pub fn merge_alternatives(root: &Value, node: &Value) -> Value {
    let node = deref(root, node);
    let Value::Object(source) = node else {
        return node.clone();
    };

    let mut merged = source.clone();
    let mut headers = Vec::new();

    for kind in CombinatorKind::ALL {
        let Some(alternatives) = merged.remove(kind.keyword()) else {
            continue;
        };
        let Value::Array(alternatives) = alternatives else {
            continue;
        };
        let alternatives: Vec<Value> = alternatives.iter().map(|alt| merge_alternatives(root, alt)).collect();

        let mut properties = merged
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let mut numbered = Vec::new();
        let mut enums: Vec<Value> = Vec::new();

        for (i, alt) in alternatives.iter().enumerate() {
            if let Some(props) = alt.get("properties").and_then(Value::as_object) {
                for (name, schema) in props {
                    properties.insert(name.clone(), schema.clone());
                }
            }
            if let Some(desc) = alt.get("description").and_then(Value::as_str) {
                numbered.push(format!("{}. {}", i + 1, desc));
            }
            for value in alt.get("enum").and_then(Value::as_array).into_iter().flatten() {
                if !enums.contains(value) {
                    enums.push(value.clone());
                }
            }
            if let Some(value) = alt.get("const") {
                if !enums.contains(value) {
                    enums.push(value.clone());
                }
            }
        }

        if !properties.is_empty() {
            merged.insert("properties".to_string(), Value::Object(properties));
        }
        if !merged.contains_key("type") {
            if let Some(ty) = alternatives.iter().find_map(|alt| alt.get("type")) {
                merged.insert("type".to_string(), ty.clone());
            }
        }
        if !enums.is_empty() && !merged.contains_key("enum") {
            merged.insert("enum".to_string(), Value::Array(enums));
        }
        merge_required(&mut merged, &alternatives);
        if !merged.contains_key("items") {
            if let Some(items) = alternatives.iter().find_map(|alt| alt.get("items")) {
                merged.insert("items".to_string(), items.clone());
            }
        }

        if !numbered.is_empty() {
            headers.push(format!("{} (merged):\n{}", kind.keyword(), numbered.join("\n")));
        }
    }

    if !headers.is_empty() {
        let mut description = merged
            .get("description")
            .and_then(Value::as_str)
            .map(|d| vec![d.to_string()])
            .unwrap_or_default();
        description.extend(headers);
        merged.insert("description".to_string(), Value::String(description.join("\n\n")));
    }

    Value::Object(merged)
}

/// Union of `required` lists, keeping first-seen order
fn merge_required(merged: &mut Map<String, Value>, alternatives: &[Value]) {
    let mut required: Vec<Value> = merged
        .get("required")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for name in alternatives
        .iter()
        .filter_map(|alt| alt.get("required").and_then(Value::as_array))
        .flatten()
    {
        if !required.contains(name) {
            required.push(name.clone());
        }
    }
    if !required.is_empty() {
        merged.insert("required".to_string(), Value::Array(required));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    fn entity_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "minecraft:entity": {
                    "type": "object",
                    "properties": {
                        "description": {
                            "properties": {"identifier": {"type": "string"}}
                        },
                        "events": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {"name": {"type": "string"}}
                            }
                        },
                        "components": {
                            "type": "object",
                            "patternProperties": {"^minecraft:": {"type": "object", "description": "component"}}
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn test_navigate_nested_properties() {
        let schema = entity_schema();
        let node = navigate(&schema, &path(&["minecraft:entity", "description", "identifier"])).unwrap();
        assert_eq!(node["type"], "string");
    }

    #[test]
    fn test_navigate_through_array_items() {
        let schema = entity_schema();
        let node = navigate(&schema, &path(&["minecraft:entity", "events", "name"])).unwrap();
        assert_eq!(node, &json!({"type": "string"}));
        // The path itself may end on the array
        let events = navigate(&schema, &path(&["minecraft:entity", "events"])).unwrap();
        assert_eq!(events["type"], "array");
    }

    #[test]
    fn test_navigate_pattern_properties() {
        let schema = entity_schema();
        let node = navigate(&schema, &path(&["minecraft:entity", "components", "minecraft:health"])).unwrap();
        assert_eq!(node["description"], "component");
    }

    #[test]
    fn test_pattern_matching_is_stable_across_lookups() {
        for _ in 0..3 {
            assert!(pattern_matches("^minecraft:", "minecraft:health"));
            assert!(!pattern_matches("^minecraft:", "custom:health"));
            assert!(!pattern_matches("([unclosed", "anything"));
        }
    }

    #[test]
    fn test_unknown_segment_is_absent() {
        let schema = entity_schema();
        assert!(navigate(&schema, &path(&["nope"])).is_none());
        assert!(navigate(&schema, &path(&["minecraft:entity", "description", "identifier", "deeper"])).is_none());
    }

    #[test]
    fn test_empty_path_is_root() {
        let schema = entity_schema();
        assert_eq!(navigate(&schema, &[]), Some(&schema));
    }

    #[test]
    fn test_local_refs_are_followed() {
        let schema = json!({
            "definitions": {"range": {"type": "object", "properties": {"min": {"type": "number"}}}},
            "type": "object",
            "properties": {"spawn": {"$ref": "#/definitions/range"}}
        });
        let node = navigate(&schema, &path(&["spawn", "min"])).unwrap();
        assert_eq!(node["type"], "number");
    }

    #[test]
    fn test_ref_cycles_terminate() {
        let schema = json!({"definitions": {"a": {"$ref": "#/definitions/a"}}, "$ref": "#/definitions/a"});
        let _ = navigate(&schema, &[]);
    }

    #[test]
    fn test_merge_alternatives_unions_properties() {
        let node = json!({
            "oneOf": [
                {"type": "object", "description": "short form", "properties": {"a": {"type": "string"}, "b": {"type": "string"}}},
                {"description": "long form", "properties": {"b": {"type": "number"}, "c": {}}}
            ]
        });
        let merged = merge_alternatives(&node, &node);
        assert_eq!(merged["type"], "object");
        assert_eq!(merged["properties"]["b"]["type"], "number");
        assert!(merged["properties"].get("a").is_some());
        assert!(merged["properties"].get("c").is_some());
        assert_eq!(merged["description"], "oneOf (merged):\n1. short form\n2. long form");
        assert!(merged.get("oneOf").is_none());
    }

    #[test]
    fn test_merge_keeps_own_description_and_type() {
        let node = json!({
            "type": "string",
            "description": "Mode",
            "anyOf": [{"type": "number"}, {"description": "named", "enum": ["x"]}]
        });
        let merged = merge_alternatives(&node, &node);
        assert_eq!(merged["type"], "string");
        assert_eq!(merged["description"], "Mode\n\nanyOf (merged):\n2. named");
        assert_eq!(merged["enum"], json!(["x"]));
    }

    #[test]
    fn test_merge_plain_node_is_clone() {
        let node = json!({"type": "boolean"});
        assert_eq!(merge_alternatives(&node, &node), node);
    }

    #[test]
    fn test_navigate_merged_through_oneof() {
        let schema = json!({
            "type": "object",
            "properties": {
                "loot": {
                    "oneOf": [
                        {"type": "string"},
                        {"type": "object", "properties": {"table": {"type": "string", "description": "table path"}}}
                    ]
                }
            }
        });
        assert!(navigate(&schema, &path(&["loot", "table"])).is_none());
        let node = navigate_merged(&schema, &path(&["loot", "table"])).unwrap();
        assert_eq!(node["description"], "table path");
    }

    #[test]
    fn test_item_scope_unwraps_arrays() {
        let schema = json!({"type": "array", "items": {"type": "array", "items": {"enum": ["a"]}}});
        assert_eq!(item_scope(&schema, &schema), json!({"enum": ["a"]}));
    }
}
