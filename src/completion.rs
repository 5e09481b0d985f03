//! Completion
//!
//! Suggests property names and values for a classified cursor position,
//! using the merged schema node at the cursor's path.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::CompletionConfig;
use crate::examples::DynamicExamplesCache;
use crate::navigate::{item_scope, navigate_merged};
use crate::position::{ContextKind, JsonPositionContext};
use crate::schema::{default_value, description, dynamic_examples, enum_values, type_name};

/// What a completion item inserts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionKind {
    Property,
    Value,
    Example,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionItem {
    pub label: String,
    pub kind: CompletionKind,
    pub detail: Option<String>,
    pub documentation: Option<String>,
    /// JSON text to insert, strings quoted
    pub insert_text: String,
}

impl CompletionItem {
    fn value(value: &Value, detail: Option<String>) -> Self {
        Self {
            label: label_of(value),
            kind: CompletionKind::Value,
            detail,
            documentation: None,
            insert_text: value.to_string(),
        }
    }
}

fn label_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Completion items for `context` against the resolved `schema` root
pub fn complete(
    context: &JsonPositionContext,
    schema: &Value,
    examples: &mut DynamicExamplesCache,
    config: &CompletionConfig,
) -> Vec<CompletionItem> {
    let items = match context.kind {
        ContextKind::PropertyKey => navigate_merged(schema, &context.path)
            .map(|node| property_items(&item_scope(schema, &node)))
            .unwrap_or_default(),
        ContextKind::PropertyValue if !context.in_array => navigate_merged(schema, &context.value_path())
            .map(|node| value_items(&node, examples))
            .unwrap_or_default(),
        // A string being typed inside an array is an item too
        ContextKind::PropertyValue | ContextKind::ArrayItem => navigate_merged(schema, &context.value_path())
            .map(|node| value_items(&item_scope(schema, &node), examples))
            .unwrap_or_default(),
        ContextKind::Root => Vec::new(),
    };

    rank(items, &context.current_token, config)
}

fn property_items(node: &Value) -> Vec<CompletionItem> {
    let Some(properties) = node.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };
    let required: Vec<&str> = node
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut items: Vec<(bool, CompletionItem)> = properties
        .iter()
        .map(|(name, schema)| {
            let is_required = required.contains(&name.as_str());
            let mut detail = type_name(schema).map(str::to_string);
            if is_required {
                detail = Some(match detail {
                    Some(ty) => format!("{} (required)", ty),
                    None => "required".to_string(),
                });
            }
            let item = CompletionItem {
                label: name.clone(),
                kind: CompletionKind::Property,
                detail,
                documentation: description(schema).map(str::to_string),
                insert_text: Value::String(name.clone()).to_string(),
            };
            (is_required, item)
        })
        .collect();

    // Stable: required first, otherwise schema order
    items.sort_by_key(|(is_required, _)| !*is_required);
    items.into_iter().map(|(_, item)| item).collect()
}

fn value_items(node: &Value, examples: &mut DynamicExamplesCache) -> Vec<CompletionItem> {
    let mut items = Vec::new();

    if let Some(values) = enum_values(node) {
        items.extend(values.iter().map(|v| CompletionItem::value(v, type_name(node).map(str::to_string))));
    } else if type_name(node) == Some("boolean") {
        items.push(CompletionItem::value(&Value::Bool(true), Some("boolean".into())));
        items.push(CompletionItem::value(&Value::Bool(false), Some("boolean".into())));
    }

    if let Some(default) = default_value(node) {
        let label = label_of(default);
        if !items.iter().any(|i| i.label == label) {
            items.push(CompletionItem::value(default, Some("default".into())));
        }
    }

    let sources = dynamic_examples(node);
    if !sources.is_empty() {
        for example in examples.get_examples(&sources) {
            if items.iter().any(|i| i.label == example) {
                continue;
            }
            items.push(CompletionItem {
                insert_text: Value::String(example.clone()).to_string(),
                label: example,
                kind: CompletionKind::Example,
                detail: Some(sources.join(", ")),
                documentation: None,
            });
        }
    }

    items
}

/// Fuzzy filter and order by score, then cap the list
fn rank(items: Vec<CompletionItem>, token: &str, config: &CompletionConfig) -> Vec<CompletionItem> {
    let mut items = if config.fuzzy && !token.is_empty() {
        let matcher = SkimMatcherV2::default();
        let mut scored: Vec<(i64, CompletionItem)> = items
            .into_iter()
            .filter_map(|item| matcher.fuzzy_match(&item.label, token).map(|score| (score, item)))
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, item)| item).collect()
    } else {
        items
    };
    items.truncate(config.max_items);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::examples::StaticContentProvider;
    use crate::position::analyze;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["format_version"],
            "properties": {
                "description": {"type": "object", "properties": {
                    "identifier": {"type": "string", "dynamicExamples": "entity_ids"},
                    "is_spawnable": {"type": "boolean", "default": true}
                }},
                "format_version": {"type": "string", "enum": ["1.19.0", "1.20.0"]},
                "loot": {"oneOf": [
                    {"type": "string", "description": "path"},
                    {"type": "object", "properties": {"table": {"type": "string"}}}
                ]},
                "tags": {"type": "array", "items": {"type": "string", "enum": ["mob", "boss"]}}
            }
        })
    }

    fn complete_at(text: &str, config: &CompletionConfig) -> Vec<CompletionItem> {
        let offset = text.find('|').unwrap();
        let text = text.replace('|', "");
        let context = analyze(&text, offset);
        let mut examples = DynamicExamplesCache::new(StaticContentProvider);
        complete(&context, &schema(), &mut examples, config)
    }

    fn labels(items: &[CompletionItem]) -> Vec<&str> {
        items.iter().map(|i| i.label.as_str()).collect()
    }

    #[test]
    fn test_property_keys_required_first() {
        let items = complete_at("{|}", &CompletionConfig::default());
        assert_eq!(labels(&items), vec!["format_version", "description", "loot", "tags"]);
        assert_eq!(items[0].detail.as_deref(), Some("string (required)"));
        assert_eq!(items[0].insert_text, "\"format_version\"");
        assert_eq!(items[0].kind, CompletionKind::Property);
    }

    #[test]
    fn test_enum_values() {
        let items = complete_at(r#"{"format_version": |}"#, &CompletionConfig::default());
        assert_eq!(labels(&items), vec!["1.19.0", "1.20.0"]);
        assert_eq!(items[0].insert_text, "\"1.19.0\"");
    }

    #[test]
    fn test_boolean_and_default_deduped() {
        let items = complete_at(r#"{"description": {"is_spawnable": |}}"#, &CompletionConfig::default());
        assert_eq!(labels(&items), vec!["true", "false"]);
        assert_eq!(items[0].insert_text, "true");
    }

    #[test]
    fn test_dynamic_examples() {
        let items = complete_at(r#"{"description": {"identifier": "|"}}"#, &CompletionConfig::default());
        assert!(labels(&items).contains(&"minecraft:pig"));
        assert!(items.iter().all(|i| i.kind == CompletionKind::Example));
    }

    #[test]
    fn test_array_items() {
        let items = complete_at(r#"{"tags": [|]}"#, &CompletionConfig::default());
        assert_eq!(labels(&items), vec!["mob", "boss"]);
    }

    #[test]
    fn test_string_inside_array_uses_items() {
        let items = complete_at(r#"{"tags": ["mob", "bo|"]}"#, &CompletionConfig::default());
        assert_eq!(labels(&items), vec!["boss"]);
    }

    #[test]
    fn test_properties_through_combinator() {
        let items = complete_at(r#"{"loot": {|}}"#, &CompletionConfig::default());
        assert_eq!(labels(&items), vec!["table"]);
    }

    #[test]
    fn test_fuzzy_filter_on_token() {
        let items = complete_at(r#"{"fv|"}"#, &CompletionConfig::default());
        assert_eq!(labels(&items), vec!["format_version"]);

        let unfiltered = CompletionConfig {
            fuzzy: false,
            ..CompletionConfig::default()
        };
        assert_eq!(complete_at(r#"{"fv|"}"#, &unfiltered).len(), 4);
    }

    #[test]
    fn test_max_items() {
        let config = CompletionConfig {
            max_items: 2,
            ..CompletionConfig::default()
        };
        assert_eq!(complete_at("{|}", &config).len(), 2);
    }

    #[test]
    fn test_root_and_unknown_path_are_empty() {
        assert!(complete_at("|", &CompletionConfig::default()).is_empty());
        assert!(complete_at(r#"{"nope": {|}}"#, &CompletionConfig::default()).is_empty());
    }
}
