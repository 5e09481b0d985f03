//! Structural validation against resolved schemas
//!
//! Standard keywords are checked by a compiled `jsonschema` validator. The
//! `molang` extension keyword is checked by a second pass that walks schema
//! and instance together.

use std::collections::HashMap;
use std::fmt;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, JSONSchema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::checksum::Checksum;
use crate::error::{Result, SchemaError};
use crate::navigate::{child_schema, deref, merge_alternatives};
use crate::schema::{is_molang, ResolvedSchema};

/// Keyword that produced an issue
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueKeyword {
    Required,
    Enum,
    Type,
    Pattern,
    MinLength,
    MaxLength,
    Minimum,
    Maximum,
    Molang,
    Other(String),
}

impl IssueKeyword {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Required => "required",
            Self::Enum => "enum",
            Self::Type => "type",
            Self::Pattern => "pattern",
            Self::MinLength => "minLength",
            Self::MaxLength => "maxLength",
            Self::Minimum => "minimum",
            Self::Maximum => "maximum",
            Self::Molang => "molang",
            Self::Other(keyword) => keyword,
        }
    }
}

impl fmt::Display for IssueKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One structural validation failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Instance location as unescaped JSON pointer segments
    pub instance_path: Vec<String>,
    pub keyword: IssueKeyword,
    pub message: String,
    /// Keyword-specific parameters (`missingProperty`, `allowedValues`, `limit`, ...)
    pub params: Value,
}

impl ValidationIssue {
    fn new(instance_path: Vec<String>, keyword: IssueKeyword, message: String, params: Value) -> Self {
        Self {
            instance_path,
            keyword,
            message,
            params,
        }
    }
}

/// Split a rendered JSON pointer into unescaped segments
pub fn pointer_segments(pointer: &str) -> Vec<String> {
    if pointer.is_empty() {
        return Vec::new();
    }
    pointer
        .trim_start_matches('/')
        .split('/')
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A compiled schema plus what is needed for the extension pass
pub struct CompiledValidator {
    checksum: Checksum,
    schema: JSONSchema,
    root: Value,
}

impl CompiledValidator {
    pub fn compile(id: &str, resolved: &ResolvedSchema) -> Result<Self> {
        let schema = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&resolved.root)
            .map_err(|e| SchemaError::Compile {
                id: id.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            checksum: resolved.checksum(),
            schema,
            root: resolved.root.clone(),
        })
    }

    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    /// Validate an instance; `molang` enables the Molang expression pass
    pub fn validate(&self, instance: &Value, molang: bool) -> Vec<ValidationIssue> {
        let mut issues = match self.schema.validate(instance) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|error| {
                    let instance_path = pointer_segments(&error.instance_path.to_string());
                    let (keyword, message, params) = describe(&error.kind, &error.schema_path.to_string(), &error.to_string());
                    ValidationIssue::new(instance_path, keyword, message, params)
                })
                .collect(),
        };

        if molang {
            let mut path = Vec::new();
            check_molang_tree(&self.root, &self.root, instance, &mut path, &mut issues);
        }
        issues
    }
}

fn describe(kind: &ValidationErrorKind, schema_path: &str, rendered: &str) -> (IssueKeyword, String, Value) {
    match kind {
        ValidationErrorKind::Required { property } => {
            let name = display_value(property);
            (
                IssueKeyword::Required,
                format!("Missing required property: {}", name),
                json!({ "missingProperty": name }),
            )
        }
        ValidationErrorKind::Enum { options } => {
            let allowed: Vec<String> = options
                .as_array()
                .map(|values| values.iter().map(display_value).collect())
                .unwrap_or_default();
            (
                IssueKeyword::Enum,
                format!("Value must be one of: {}", allowed.join(", ")),
                json!({ "allowedValues": options }),
            )
        }
        ValidationErrorKind::Type { .. } => (
            IssueKeyword::Type,
            format!("Incorrect type: {}", rendered),
            json!({}),
        ),
        ValidationErrorKind::Pattern { pattern } => (
            IssueKeyword::Pattern,
            format!("Value does not match pattern: {}", pattern),
            json!({ "pattern": pattern }),
        ),
        ValidationErrorKind::MinLength { limit } => (
            IssueKeyword::MinLength,
            format!("String is shorter than {} characters", limit),
            json!({ "limit": limit }),
        ),
        ValidationErrorKind::MaxLength { limit } => (
            IssueKeyword::MaxLength,
            format!("String is longer than {} characters", limit),
            json!({ "limit": limit }),
        ),
        ValidationErrorKind::Minimum { limit } => (
            IssueKeyword::Minimum,
            format!("Value is less than minimum {}", limit),
            json!({ "limit": limit }),
        ),
        ValidationErrorKind::Maximum { limit } => (
            IssueKeyword::Maximum,
            format!("Value is greater than maximum {}", limit),
            json!({ "limit": limit }),
        ),
        _ => {
            let keyword = schema_path.rsplit('/').next().unwrap_or_default().to_string();
            (IssueKeyword::Other(keyword), rendered.to_string(), json!({}))
        }
    }
}

// =============================================================================
// Molang
// =============================================================================

fn check_molang_tree(
    root: &Value,
    schema: &Value,
    instance: &Value,
    path: &mut Vec<String>,
    issues: &mut Vec<ValidationIssue>,
) {
    let schema = merge_alternatives(root, deref(root, schema));

    match instance {
        Value::String(expr) if is_molang(&schema) => {
            if let Some(problem) = molang_problem(expr) {
                issues.push(ValidationIssue::new(
                    path.clone(),
                    IssueKeyword::Molang,
                    problem,
                    json!({ "expression": expr }),
                ));
            }
        }
        Value::Object(map) => {
            for (key, value) in map {
                if let Some(child) = child_schema(root, &schema, key) {
                    path.push(key.clone());
                    check_molang_tree(root, child, value, path, issues);
                    path.pop();
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                let item_schema = match schema.get("items") {
                    Some(Value::Array(tuple)) => tuple.get(i),
                    Some(single) if single.is_object() => Some(single),
                    _ => None,
                };
                if let Some(item_schema) = item_schema {
                    path.push(i.to_string());
                    check_molang_tree(root, item_schema, item, path, issues);
                    path.pop();
                }
            }
        }
        _ => {}
    }
}

/// Describe what is wrong with a Molang expression, if anything
///
/// This is a shallow lexical check: balanced brackets, terminated `'`
/// strings, no dangling operator.
pub fn molang_problem(expr: &str) -> Option<String> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Some("Molang expression is empty".to_string());
    }

    let mut stack = Vec::new();
    let mut in_string = false;
    for ch in trimmed.chars() {
        if in_string {
            if ch == '\'' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '\'' => in_string = true,
            '(' | '[' | '{' => stack.push(ch),
            ')' | ']' | '}' => {
                let expected = match ch {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(expected) {
                    return Some(format!("Unbalanced '{}' in Molang expression", ch));
                }
            }
            _ => {}
        }
    }

    if in_string {
        return Some("Unterminated string in Molang expression".to_string());
    }
    if let Some(open) = stack.pop() {
        return Some(format!("Unclosed '{}' in Molang expression", open));
    }

    let body = trimmed.trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    match body.chars().last() {
        Some(c) if "+-*/&|<>=!?:,".contains(c) => Some("Molang expression ends with an operator".to_string()),
        None => Some("Molang expression is empty".to_string()),
        _ => None,
    }
}

// =============================================================================
// Cache
// =============================================================================

/// Compiled validators keyed by schema identifier (the document's file path)
///
/// Holds at most one validator per identifier. The entry is recompiled when
/// the resolved schema for that identifier changes, e.g. after the document's
/// `format_version` was edited.
#[derive(Default)]
pub struct ValidatorCache {
    compiled: HashMap<String, CompiledValidator>,
}

impl ValidatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compile(&mut self, id: &str, resolved: &ResolvedSchema) -> Result<&CompiledValidator> {
        let checksum = resolved.checksum();
        let stale = self
            .compiled
            .get(id)
            .map(|c| c.checksum != checksum)
            .unwrap_or(true);

        if stale {
            let compiled = CompiledValidator::compile(id, resolved)?;
            debug!(id, schema_type = %resolved.schema_type, checksum = compiled.checksum.short(), "compiled validator");
            self.compiled.insert(id.to_string(), compiled);
        }

        self.compiled.get(id).ok_or_else(|| SchemaError::Compile {
            id: id.to_string(),
            reason: "validator missing after compilation".to_string(),
        })
    }

    pub fn remove(&mut self, id: &str) {
        self.compiled.remove(id);
    }

    pub fn clear(&mut self) {
        self.compiled.clear();
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

impl fmt::Debug for ValidatorCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorCache")
            .field("ids", &self.compiled.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(root: Value) -> ResolvedSchema {
        ResolvedSchema {
            schema_type: "test".into(),
            format_version: None,
            root,
        }
    }

    fn issues_for(schema: Value, instance: Value) -> Vec<ValidationIssue> {
        CompiledValidator::compile("test.json", &resolved(schema))
            .unwrap()
            .validate(&instance, true)
    }

    #[test]
    fn test_missing_required_property() {
        let issues = issues_for(json!({"type": "object", "required": ["name"]}), json!({}));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].keyword, IssueKeyword::Required);
        assert_eq!(issues[0].message, "Missing required property: name");
        assert_eq!(issues[0].params["missingProperty"], "name");
        assert!(issues[0].instance_path.is_empty());
    }

    #[test]
    fn test_enum_violation_has_path() {
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "object", "properties": {"mode": {"enum": ["x", "y"]}}}}
        });
        let issues = issues_for(schema, json!({"a": {"mode": "z"}}));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].keyword, IssueKeyword::Enum);
        assert_eq!(issues[0].instance_path, vec!["a", "mode"]);
        assert_eq!(issues[0].message, "Value must be one of: x, y");
    }

    #[test]
    fn test_type_and_bounds() {
        let schema = json!({
            "type": "object",
            "properties": {
                "health": {"type": "number", "minimum": 1, "maximum": 100},
                "name": {"type": "string", "minLength": 2, "maxLength": 4, "pattern": "^[a-z]+$"}
            }
        });
        let keywords = |instance: Value| -> Vec<IssueKeyword> {
            issues_for(schema.clone(), instance).into_iter().map(|i| i.keyword).collect()
        };

        assert_eq!(keywords(json!({"health": "ten"})), vec![IssueKeyword::Type]);
        assert_eq!(keywords(json!({"health": 0})), vec![IssueKeyword::Minimum]);
        assert_eq!(keywords(json!({"health": 101})), vec![IssueKeyword::Maximum]);
        assert_eq!(keywords(json!({"name": "a"})), vec![IssueKeyword::MinLength]);
        assert_eq!(keywords(json!({"name": "abcde"})), vec![IssueKeyword::MaxLength]);
        assert_eq!(keywords(json!({"name": "AB"})), vec![IssueKeyword::Pattern]);
        assert!(keywords(json!({"health": 20, "name": "abc"})).is_empty());
    }

    #[test]
    fn test_molang_keyword() {
        let schema = json!({
            "type": "object",
            "properties": {
                "condition": {"type": "string", "molang": true},
                "plain": {"type": "string"},
                "list": {"type": "array", "items": {"type": "string", "molang": true}}
            }
        });
        let issues = issues_for(
            schema,
            json!({"condition": "query.is_baby && (", "plain": "((", "list": ["1.0", "math.sin(", ""]}),
        );
        let paths: Vec<Vec<String>> = issues.iter().map(|i| i.instance_path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                vec!["condition".to_string()],
                vec!["list".to_string(), "1".to_string()],
                vec!["list".to_string(), "2".to_string()],
            ]
        );
        assert!(issues.iter().all(|i| i.keyword == IssueKeyword::Molang));
    }

    #[test]
    fn test_molang_disabled() {
        let schema = json!({"type": "object", "properties": {"c": {"type": "string", "molang": true}}});
        let validator = CompiledValidator::compile("t", &resolved(schema)).unwrap();
        assert!(validator.validate(&json!({"c": "(("}), false).is_empty());
    }

    #[test]
    fn test_molang_problems() {
        assert_eq!(molang_problem("query.is_baby ? 1 : 0"), None);
        assert_eq!(molang_problem("v.x = math.random(0, 1); return v.x;"), None);
        assert_eq!(molang_problem("q.get_name == 'a(b'"), None);
        assert!(molang_problem("  ").is_some());
        assert!(molang_problem("(1 + 2").unwrap().contains("Unclosed"));
        assert!(molang_problem("1 + 2)").unwrap().contains("Unbalanced"));
        assert!(molang_problem("'abc").unwrap().contains("Unterminated"));
        assert!(molang_problem("q.health *").unwrap().contains("operator"));
    }

    #[test]
    fn test_pointer_segments_unescape() {
        assert!(pointer_segments("").is_empty());
        assert_eq!(pointer_segments("/a~1b/c~0d/0"), vec!["a/b", "c~d", "0"]);
    }

    #[test]
    fn test_cache_recompiles_on_schema_change() {
        let mut cache = ValidatorCache::new();
        let v1 = resolved(json!({"type": "object"}));
        let v2 = resolved(json!({"type": "object", "required": ["a"]}));

        let first = cache.get_or_compile("a.json", &v1).unwrap().checksum().clone();
        let again = cache.get_or_compile("a.json", &v1).unwrap().checksum().clone();
        assert_eq!(first, again);

        let changed = cache.get_or_compile("a.json", &v2).unwrap().checksum().clone();
        assert_ne!(first, changed);
        assert_eq!(cache.len(), 1);

        cache.get_or_compile("b.json", &v1).unwrap();
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalid_schema_fails_to_compile() {
        let result = CompiledValidator::compile("bad.json", &resolved(json!({"type": 12})));
        assert!(matches!(result, Err(SchemaError::Compile { .. })));
    }
}
