//! Hover
//!
//! Renders the schema node under the cursor as a markdown panel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::navigate::{item_scope, navigate_merged};
use crate::position::{analyze, enclosing_string, token_range, ContextKind};
use crate::schema::{default_value, description, enum_values, type_name};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hover {
    /// Markdown
    pub contents: String,
    /// Byte span of the hovered token
    pub range: Option<(usize, usize)>,
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Hover panel for `offset` in `text` against the resolved `schema` root
pub fn hover(text: &str, offset: usize, schema: &Value) -> Option<Hover> {
    let context = analyze(text, offset);

    let mut span = None;
    let (name, node) = match context.kind {
        ContextKind::PropertyKey => {
            // Keys are usually namespaced (`minecraft:health`), so read the whole string
            let key = match enclosing_string(text, offset) {
                Some((key, key_span)) => {
                    span = Some(key_span);
                    key
                }
                None => context.current_token.clone(),
            };
            if key.is_empty() {
                return None;
            }
            let mut path = context.path.clone();
            path.push(key.clone());
            let node = navigate_merged(schema, &path)?;
            (key, node)
        }
        ContextKind::PropertyValue if !context.in_array => {
            (context.property_key.clone()?, navigate_merged(schema, &context.value_path())?)
        }
        ContextKind::PropertyValue | ContextKind::ArrayItem => {
            let array = navigate_merged(schema, &context.value_path())?;
            (context.property_key.clone()?, item_scope(schema, &array))
        }
        ContextKind::Root => return None,
    };

    let range = span.or_else(|| {
        let (start, end) = token_range(text, offset);
        (start < end).then_some((start, end))
    });
    Some(Hover {
        contents: render(&name, &node),
        range,
    })
}

/// Markdown for one schema node
pub fn render(name: &str, node: &Value) -> String {
    let mut sections = vec![format!("**{}**", name)];

    if let Some(desc) = description(node) {
        sections.push(desc.to_string());
    }

    let mut facts = Vec::new();
    if let Some(ty) = type_name(node) {
        facts.push(format!("Type: {}", ty));
    }
    if let Some(values) = enum_values(node) {
        let values: Vec<String> = values.iter().map(display).collect();
        facts.push(format!("Allowed values: {}", values.join(", ")));
    }
    if let Some(default) = default_value(node) {
        facts.push(format!("Default: {}", default));
    }
    if let Some(pattern) = node.get("pattern").and_then(Value::as_str) {
        facts.push(format!("Pattern: `{}`", pattern));
    }
    let minimum = node.get("minimum").map(display);
    let maximum = node.get("maximum").map(display);
    if minimum.is_some() || maximum.is_some() {
        facts.push(format!(
            "Range: {}..{}",
            minimum.unwrap_or_default(),
            maximum.unwrap_or_default()
        ));
    }

    if !facts.is_empty() {
        sections.push(facts.join("\n\n"));
    }
    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "health": {
                    "type": "number",
                    "description": "Starting health",
                    "default": 10,
                    "minimum": 1,
                    "maximum": 20
                },
                "mode": {"type": "string", "enum": ["a", "b"]},
                "slots": {"type": "array", "items": {"type": "string", "pattern": "^slot\\.[a-z]+$"}}
            }
        })
    }

    fn hover_at(text: &str) -> Option<Hover> {
        let offset = text.find('|').unwrap();
        hover(&text.replace('|', ""), offset, &schema())
    }

    #[test]
    fn test_hover_on_key() {
        let hover = hover_at(r#"{"hea|lth": 3}"#).unwrap();
        assert!(hover.contents.starts_with("**health**\n\nStarting health"));
        assert!(hover.contents.contains("Type: number"));
        assert!(hover.contents.contains("Default: 10"));
        assert!(hover.contents.contains("Range: 1..20"));
        assert_eq!(hover.range, Some((2, 8)));
    }

    #[test]
    fn test_hover_on_namespaced_key() {
        let schema = json!({
            "type": "object",
            "properties": {
                "minecraft:entity": {
                    "type": "object",
                    "properties": {"minecraft:health": {"type": "object", "description": "Health"}}
                }
            }
        });
        let text = r#"{"minecraft:entity": {"minecraft:health": {}}}"#;

        let offset = text.find("hea").unwrap();
        let panel = hover(text, offset, &schema).unwrap();
        assert!(panel.contents.starts_with("**minecraft:health**\n\nHealth"));
        assert_eq!(panel.range, Some((23, 39)));

        let panel = hover(text, 4, &schema).unwrap();
        assert!(panel.contents.starts_with("**minecraft:entity**"));
        assert_eq!(panel.range, Some((2, 18)));
    }

    #[test]
    fn test_hover_on_value() {
        let hover = hover_at(r#"{"mode": "|"}"#).unwrap();
        assert!(hover.contents.contains("Allowed values: a, b"));
        assert_eq!(hover.range, None);
    }

    #[test]
    fn test_hover_on_array_item() {
        let hover = hover_at(r#"{"slots": ["sl|ot.main"]}"#).unwrap();
        assert!(hover.contents.starts_with("**slots**"));
        assert!(hover.contents.contains("Pattern: `^slot\\.[a-z]+$`"));
    }

    #[test]
    fn test_no_hover_without_schema_node() {
        assert!(hover_at(r#"{"unknown|": 1}"#).is_none());
        assert!(hover_at("|").is_none());
    }

    #[test]
    fn test_render_minimal() {
        assert_eq!(render("x", &json!({})), "**x**");
        assert_eq!(render("x", &json!({"maximum": 5})), "**x**\n\nRange: ..5");
    }
}
