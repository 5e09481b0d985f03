//! Schema types and structures

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::checksum::Checksum;
use crate::version::FormatVersion;

/// Extension keyword naming dynamic example sources for a node
pub const DYNAMIC_EXAMPLES_KEY: &str = "dynamicExamples";

/// Extension keyword marking string values as Molang expressions
pub const MOLANG_KEY: &str = "molang";

/// Kind of versioned change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Add,
    Modify,
    Remove,
}

/// One edit to a schema tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaChange {
    pub action: ChangeAction,
    /// Keys from the schema root to the edited entry
    pub target_path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl SchemaChange {
    pub fn add(target_path: &[&str], value: Value) -> Self {
        Self::with_action(ChangeAction::Add, target_path, Some(value))
    }

    pub fn modify(target_path: &[&str], value: Value) -> Self {
        Self::with_action(ChangeAction::Modify, target_path, Some(value))
    }

    pub fn remove(target_path: &[&str]) -> Self {
        Self::with_action(ChangeAction::Remove, target_path, None)
    }

    fn with_action(action: ChangeAction, target_path: &[&str], value: Option<Value>) -> Self {
        Self {
            action,
            target_path: target_path.iter().map(|s| s.to_string()).collect(),
            value,
        }
    }
}

/// Changes that activate at a given format_version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedChange {
    pub version: String,
    pub changes: Vec<SchemaChange>,
}

/// A registered kind of Bedrock file and its schema
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaType {
    /// Unique name (e.g., "behavior_entity")
    pub name: String,
    /// Glob patterns selecting files, tried in order
    pub file_match: Vec<String>,
    /// Schema before any versioned change
    pub base_schema: Value,
    /// Ordered changesets
    #[serde(default)]
    pub versioned_changes: Vec<VersionedChange>,
}

impl SchemaType {
    pub fn new(name: impl Into<String>, file_match: Vec<String>, base_schema: Value) -> Self {
        Self {
            name: name.into(),
            file_match,
            base_schema,
            versioned_changes: Vec::new(),
        }
    }

    /// Append a changeset
    pub fn with_changes(mut self, version: impl Into<String>, changes: Vec<SchemaChange>) -> Self {
        self.versioned_changes.push(VersionedChange {
            version: version.into(),
            changes,
        });
        self
    }
}

/// Schema for one document after versioning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSchema {
    /// Name of the originating [`SchemaType`]
    pub schema_type: String,
    /// Version the schema was resolved for, `None` for the base schema
    pub format_version: Option<FormatVersion>,
    pub root: Value,
}

impl ResolvedSchema {
    pub fn checksum(&self) -> Checksum {
        Checksum::of_schema(&self.root)
    }
}

// =============================================================================
// Typed schema view
// =============================================================================

/// Which combinator a node uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombinatorKind {
    OneOf,
    AnyOf,
    AllOf,
}

impl CombinatorKind {
    pub const ALL: [CombinatorKind; 3] = [Self::OneOf, Self::AnyOf, Self::AllOf];

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::OneOf => "oneOf",
            Self::AnyOf => "anyOf",
            Self::AllOf => "allOf",
        }
    }

    /// First combinator present on a node
    pub fn of(node: &Value) -> Option<(Self, &Vec<Value>)> {
        Self::ALL
            .into_iter()
            .find_map(|kind| node.get(kind.keyword()).and_then(Value::as_array).map(|alts| (kind, alts)))
    }
}

/// Borrowed, classified view of a schema node
///
/// Classification looks at `type` first and falls back to structural hints
/// (`properties`, `items`, `enum`), the way hand-written Bedrock schemas
/// often omit `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode<'a> {
    Object {
        properties: Option<&'a Map<String, Value>>,
        required: Vec<&'a str>,
        additional: Option<&'a Value>,
    },
    Array {
        items: Option<&'a Value>,
    },
    String {
        format: Option<&'a str>,
        enum_values: Option<&'a Vec<Value>>,
        pattern: Option<&'a str>,
    },
    Number {
        minimum: Option<f64>,
        maximum: Option<f64>,
        integer: bool,
    },
    Boolean,
    Combinator {
        kind: CombinatorKind,
        alternatives: &'a [Value],
    },
    Any,
}

impl<'a> SchemaNode<'a> {
    pub fn classify(node: &'a Value) -> Self {
        if node.get("type").is_none() {
            if let Some((kind, alternatives)) = CombinatorKind::of(node) {
                return Self::Combinator { kind, alternatives };
            }
        }

        match type_name(node) {
            Some("object") => Self::object(node),
            Some("array") => Self::Array { items: node.get("items") },
            Some("string") => Self::string(node),
            Some("number") => Self::number(node, false),
            Some("integer") => Self::number(node, true),
            Some("boolean") => Self::Boolean,
            _ if node.get("properties").is_some() => Self::object(node),
            _ if node.get("items").is_some() => Self::Array { items: node.get("items") },
            _ if node.get("enum").is_some() => Self::string(node),
            _ => Self::Any,
        }
    }

    fn object(node: &'a Value) -> Self {
        Self::Object {
            properties: node.get("properties").and_then(Value::as_object),
            required: node
                .get("required")
                .and_then(Value::as_array)
                .map(|r| r.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default(),
            additional: node.get("additionalProperties").filter(|v| v.is_object()),
        }
    }

    fn string(node: &'a Value) -> Self {
        Self::String {
            format: node.get("format").and_then(Value::as_str),
            enum_values: node.get("enum").and_then(Value::as_array),
            pattern: node.get("pattern").and_then(Value::as_str),
        }
    }

    fn number(node: &'a Value, integer: bool) -> Self {
        Self::Number {
            minimum: node.get("minimum").and_then(Value::as_f64),
            maximum: node.get("maximum").and_then(Value::as_f64),
            integer,
        }
    }
}

/// The node's `type`, taking the first entry of a type array
pub fn type_name(node: &Value) -> Option<&str> {
    match node.get("type")? {
        Value::String(s) => Some(s.as_str()),
        Value::Array(types) => types.iter().find_map(Value::as_str),
        _ => None,
    }
}

pub fn description(node: &Value) -> Option<&str> {
    node.get("description").and_then(Value::as_str)
}

pub fn enum_values(node: &Value) -> Option<&Vec<Value>> {
    node.get("enum").and_then(Value::as_array)
}

pub fn default_value(node: &Value) -> Option<&Value> {
    node.get("default")
}

/// Example source names declared by a node (string or list of strings)
pub fn dynamic_examples(node: &Value) -> Vec<&str> {
    match node.get(DYNAMIC_EXAMPLES_KEY) {
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(list)) => list.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

pub fn is_molang(node: &Value) -> bool {
    node.get(MOLANG_KEY).and_then(Value::as_bool).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_explicit_types() {
        let obj = json!({"type": "object", "properties": {"a": {}}, "required": ["a"]});
        match SchemaNode::classify(&obj) {
            SchemaNode::Object { properties, required, .. } => {
                assert!(properties.unwrap().contains_key("a"));
                assert_eq!(required, vec!["a"]);
            }
            other => panic!("Expected Object, got {:?}", other),
        }

        let num = json!({"type": "integer", "minimum": 0});
        assert_eq!(
            SchemaNode::classify(&num),
            SchemaNode::Number { minimum: Some(0.0), maximum: None, integer: true }
        );
    }

    #[test]
    fn test_classify_structural_hints() {
        assert!(matches!(SchemaNode::classify(&json!({"properties": {}})), SchemaNode::Object { .. }));
        assert!(matches!(SchemaNode::classify(&json!({"items": {}})), SchemaNode::Array { .. }));
        assert!(matches!(SchemaNode::classify(&json!({"enum": ["a"]})), SchemaNode::String { .. }));
        assert_eq!(SchemaNode::classify(&json!({})), SchemaNode::Any);
    }

    #[test]
    fn test_classify_combinator() {
        let node = json!({"anyOf": [{"type": "string"}, {"type": "number"}]});
        match SchemaNode::classify(&node) {
            SchemaNode::Combinator { kind, alternatives } => {
                assert_eq!(kind, CombinatorKind::AnyOf);
                assert_eq!(alternatives.len(), 2);
            }
            other => panic!("Expected Combinator, got {:?}", other),
        }
    }

    #[test]
    fn test_type_arrays_use_first_entry() {
        assert_eq!(type_name(&json!({"type": ["string", "null"]})), Some("string"));
    }

    #[test]
    fn test_schema_type_serde_shape() {
        let raw = json!({
            "name": "item",
            "fileMatch": ["**/items/*.json"],
            "baseSchema": {"type": "object"},
            "versionedChanges": [{
                "version": "1.20.0",
                "changes": [{"action": "remove", "targetPath": ["properties", "old"]}]
            }]
        });
        let parsed: SchemaType = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.versioned_changes[0].changes[0], SchemaChange::remove(&["properties", "old"]));
    }

    #[test]
    fn test_dynamic_examples_accepts_string_or_list() {
        assert_eq!(dynamic_examples(&json!({"dynamicExamples": "block_ids"})), vec!["block_ids"]);
        assert_eq!(
            dynamic_examples(&json!({"dynamicExamples": ["item_ids", "block_ids"]})),
            vec!["item_ids", "block_ids"]
        );
        assert!(dynamic_examples(&json!({})).is_empty());
    }
}
