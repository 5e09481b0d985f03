//! Schema version resolution
//!
//! Picks the schema type for a file, reads the document's `format_version`
//! and applies every changeset at or below that version, in registration
//! order. Alternatives inside `oneOf`/`anyOf`/`allOf` may carry their own
//! `format_version` tag and are dropped when it is newer than the document.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::registry::SchemaRegistry;
use crate::schema::{ChangeAction, CombinatorKind, ResolvedSchema, SchemaChange, SchemaType, VersionedChange};
use crate::version::FormatVersion;

/// Key holding the document version, both in documents and on alternatives
pub const FORMAT_VERSION_KEY: &str = "format_version";

fn format_version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""format_version"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("static regex is valid")
    })
}

/// Read the top-level `format_version` string of a document
///
/// Documents being edited are often not valid JSON; those fall back to the
/// first textual `"format_version": "..."` occurrence.
pub fn extract_format_version(text: &str) -> Option<String> {
    match serde_json::from_str::<Value>(text) {
        Ok(doc) => doc
            .get(FORMAT_VERSION_KEY)
            .and_then(Value::as_str)
            .map(str::to_string),
        Err(_) => format_version_regex()
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string()),
    }
}

/// Apply one change in place
pub fn apply_change(root: &mut Value, change: &SchemaChange) {
    match change.action {
        ChangeAction::Add | ChangeAction::Modify => {
            let value = change.value.clone().unwrap_or(Value::Null);
            set_at(root, &change.target_path, value);
        }
        ChangeAction::Remove => remove_at(root, &change.target_path),
    }
}

fn set_at(root: &mut Value, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return;
    };

    let mut current = root;
    for segment in parents {
        current = match child_mut(current, segment) {
            Some(child) => child,
            None => return,
        };
    }

    let array_index = current.as_array().and_then(|items| index_in(items, last));
    match array_index {
        Some(index) => current[index] = value,
        None => {
            if let Some(map) = ensure_object(current, last) {
                map.insert(last.clone(), value);
            }
        }
    }
}

/// Step into `segment`, creating an empty object when it is missing
fn child_mut<'v>(current: &'v mut Value, segment: &str) -> Option<&'v mut Value> {
    let array_index = current.as_array().and_then(|items| index_in(items, segment));
    match array_index {
        Some(index) => current.get_mut(index),
        None => Some(
            ensure_object(current, segment)?
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
        ),
    }
}

/// Replace a scalar with an empty object and borrow its map
///
/// Arrays are only addressed by index; a key segment on one is skipped.
fn ensure_object<'v>(value: &'v mut Value, segment: &str) -> Option<&'v mut Map<String, Value>> {
    if let Value::Array(items) = value {
        warn!(segment, len = items.len(), "change targets an array by key, skipped");
        return None;
    }
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    value.as_object_mut()
}

fn remove_at(root: &mut Value, path: &[String]) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut current = root;
    for segment in parents {
        current = match current {
            Value::Object(map) => match map.get_mut(segment) {
                Some(next) => next,
                None => return,
            },
            Value::Array(items) => match index_in(items, segment) {
                Some(index) => &mut items[index],
                None => return,
            },
            _ => return,
        };
    }

    match current {
        Value::Object(map) => {
            map.remove(last);
        }
        Value::Array(items) => {
            if let Some(index) = index_in(items, last) {
                items.remove(index);
            }
        }
        _ => {}
    }
}

fn index_in(items: &[Value], segment: &str) -> Option<usize> {
    segment.parse::<usize>().ok().filter(|i| *i < items.len())
}

/// Deep-copy `base` and apply every changeset at or below `version`
pub fn apply_versioned_changes(base: &Value, changesets: &[VersionedChange], version: &FormatVersion) -> Value {
    let mut schema = base.clone();
    for changeset in changesets {
        let activates_at = match FormatVersion::parse(&changeset.version) {
            Ok(v) => v,
            Err(e) => {
                warn!(version = %changeset.version, error = %e, "skipping changeset with invalid version");
                continue;
            }
        };
        if activates_at <= *version {
            for change in &changeset.changes {
                apply_change(&mut schema, change);
            }
        }
    }
    schema
}

/// Drop combinator alternatives tagged with a newer `format_version`
pub fn filter_versioned_alternatives(node: &mut Value, version: &FormatVersion) {
    let Value::Object(map) = node else {
        return;
    };

    for kind in CombinatorKind::ALL {
        if let Some(Value::Array(alternatives)) = map.get_mut(kind.keyword()) {
            alternatives.retain(|alt| alternative_applies(alt, version));
            for alt in alternatives.iter_mut() {
                if let Value::Object(alt_map) = alt {
                    alt_map.remove(FORMAT_VERSION_KEY);
                }
                filter_versioned_alternatives(alt, version);
            }
        }
    }

    for key in ["properties", "patternProperties"] {
        if let Some(Value::Object(children)) = map.get_mut(key) {
            for child in children.values_mut() {
                filter_versioned_alternatives(child, version);
            }
        }
    }

    match map.get_mut("items") {
        Some(Value::Array(tuple)) => tuple.iter_mut().for_each(|item| filter_versioned_alternatives(item, version)),
        Some(items) => filter_versioned_alternatives(items, version),
        None => {}
    }

    if let Some(additional) = map.get_mut("additionalProperties") {
        if additional.is_object() {
            filter_versioned_alternatives(additional, version);
        }
    }
}

fn alternative_applies(alt: &Value, version: &FormatVersion) -> bool {
    let Some(tag) = alt.get(FORMAT_VERSION_KEY).and_then(Value::as_str) else {
        return true;
    };
    match FormatVersion::parse(tag) {
        Ok(tagged) => tagged <= *version,
        Err(_) => true,
    }
}

/// Resolve a schema type against a document version
pub fn resolve_schema_type(schema_type: &SchemaType, version: Option<FormatVersion>) -> ResolvedSchema {
    let root = match &version {
        Some(version) => {
            let mut root = apply_versioned_changes(&schema_type.base_schema, &schema_type.versioned_changes, version);
            filter_versioned_alternatives(&mut root, version);
            root
        }
        None => schema_type.base_schema.clone(),
    };

    ResolvedSchema {
        schema_type: schema_type.name.clone(),
        format_version: version,
        root,
    }
}

/// Resolves documents to their versioned schema
#[derive(Debug, Clone, Copy)]
pub struct SchemaVersionResolver<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> SchemaVersionResolver<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Schema for `file_path` given its current text, `None` when no type matches
    pub fn resolve(&self, file_path: &str, text: &str) -> Option<ResolvedSchema> {
        let schema_type = self.registry.find(file_path)?;

        let version = extract_format_version(text).and_then(|raw| match FormatVersion::parse(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(file = file_path, error = %e, "unusable format_version, using base schema");
                None
            }
        });

        debug!(
            file = file_path,
            schema_type = %schema_type.name,
            version = ?version.as_ref().map(|v| v.to_string()),
            "resolved schema"
        );
        Some(resolve_schema_type(schema_type, version))
    }
}
