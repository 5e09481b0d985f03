//! Schema Registry
//!
//! Ordered, read-only table of [`SchemaType`] records keyed by file-match
//! globs. The first registered type whose pattern matches a path wins, so
//! registration order is significant.

use std::fs;
use std::path::Path;

use include_dir::{include_dir, Dir};
use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::RegistryConfig;
use crate::error::{Result, SchemaError};
use crate::schema::SchemaType;

/// Schema definitions shipped with the crate
static BUILTIN_SCHEMAS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/schemas");

/// A compiled file-match glob
///
/// `*` matches a run of non-separator characters, `?` a single one, and a
/// leading `**/` lets the rest of the pattern match at any depth as long as
/// it starts the path or follows a `/`.
#[derive(Debug, Clone)]
pub struct FileMatcher {
    pattern: String,
    regex: Regex,
}

impl FileMatcher {
    pub fn new(pattern: &str) -> Result<Self> {
        let (prefix, rest) = match pattern.strip_prefix("**/") {
            Some(rest) => ("^(?:.*/)?", rest),
            None => ("^", pattern),
        };

        let mut source = String::from(prefix);
        let mut chars = rest.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '*' if chars.peek() == Some(&'*') => {
                    chars.next();
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        source.push_str("(?:.*/)?");
                    } else {
                        source.push_str(".*");
                    }
                }
                '*' => source.push_str("[^/]*"),
                '?' => source.push_str("[^/]"),
                other => source.push_str(&regex::escape(&other.to_string())),
            }
        }
        source.push('$');

        let regex = Regex::new(&source).map_err(|source| SchemaError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Match a path, normalizing backslashes first
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(&normalize_path(path))
    }
}

/// Normalize separators to forward slashes
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

#[derive(Debug, Clone)]
struct RegisteredType {
    schema_type: SchemaType,
    matchers: Vec<FileMatcher>,
}

/// The schema registry
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    types: Vec<RegisteredType>,
}

impl SchemaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in Bedrock schema definitions
    pub fn builtin() -> Result<Self> {
        let mut files: Vec<_> = BUILTIN_SCHEMAS
            .files()
            .filter(|f| f.path().extension().map(|e| e == "json").unwrap_or(false))
            .collect();
        files.sort_by(|a, b| a.path().cmp(b.path()));

        let mut registry = Self::new();
        for file in files {
            let content = file.contents_utf8().ok_or_else(|| SchemaError::InvalidDefinition {
                name: file.path().display().to_string(),
                reason: "not UTF-8".to_string(),
            })?;
            registry.register(parse_definition(&file.path().display().to_string(), content)?)?;
        }
        Ok(registry)
    }

    /// Build the registry described by configuration
    ///
    /// Built-ins come first so they win on overlapping patterns.
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        let mut registry = if config.builtin {
            Self::builtin()?
        } else {
            Self::new()
        };
        for dir in &config.extra_dirs {
            registry.load_dir(dir)?;
        }
        Ok(registry)
    }

    /// Register one schema type after the existing ones
    pub fn register(&mut self, schema_type: SchemaType) -> Result<()> {
        let matchers = schema_type
            .file_match
            .iter()
            .map(|p| FileMatcher::new(p))
            .collect::<Result<Vec<_>>>()?;
        debug!(name = %schema_type.name, patterns = matchers.len(), "registered schema type");
        self.types.push(RegisteredType { schema_type, matchers });
        Ok(())
    }

    /// Load every `*.json` definition file under `dir`, in path order
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let mut paths: Vec<_> = WalkDir::new(dir.as_ref())
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.is_file() && p.extension().map(|e| e == "json").unwrap_or(false))
            .collect();
        paths.sort();

        for path in &paths {
            let content = fs::read_to_string(path)?;
            self.register(parse_definition(&path.display().to_string(), &content)?)?;
        }
        Ok(paths.len())
    }

    /// First schema type matching `file_path`
    pub fn find(&self, file_path: &str) -> Option<&SchemaType> {
        let normalized = normalize_path(file_path);
        self.types
            .iter()
            .find(|t| t.matchers.iter().any(|m| m.regex.is_match(&normalized)))
            .map(|t| &t.schema_type)
    }

    /// Look a schema type up by name
    pub fn get(&self, name: &str) -> Option<&SchemaType> {
        self.schema_types().find(|t| t.name == name)
    }

    pub fn schema_types(&self) -> impl Iterator<Item = &SchemaType> {
        self.types.iter().map(|t| &t.schema_type)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

fn parse_definition(name: &str, content: &str) -> Result<SchemaType> {
    serde_json::from_str(content).map_err(|e| SchemaError::InvalidDefinition {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn schema_type(name: &str, patterns: &[&str]) -> SchemaType {
        SchemaType::new(
            name,
            patterns.iter().map(|p| p.to_string()).collect(),
            json!({"type": "object"}),
        )
    }

    #[test]
    fn test_double_star_prefix_matches_any_depth() {
        let m = FileMatcher::new("**/entities/*.json").unwrap();
        assert!(m.is_match("entities/pig.json"));
        assert!(m.is_match("/home/me/BP/entities/pig.json"));
        assert!(m.is_match("C:\\addons\\BP\\entities\\pig.json"));
        assert!(!m.is_match("/home/me/BP/myentities/pig.json"));
        assert!(!m.is_match("/home/me/BP/entities/sub/pig.json"));
    }

    #[test]
    fn test_single_star_stops_at_separator() {
        let m = FileMatcher::new("BP/*.json").unwrap();
        assert!(m.is_match("BP/manifest.json"));
        assert!(!m.is_match("BP/x/manifest.json"));
    }

    #[test]
    fn test_literal_characters_are_escaped() {
        let m = FileMatcher::new("**/*.entity.json").unwrap();
        assert!(m.is_match("RP/entity/pig.entity.json"));
        assert!(!m.is_match("RP/entity/pigxentityxjson"));
    }

    #[test]
    fn test_first_match_wins() {
        let mut registry = SchemaRegistry::new();
        registry.register(schema_type("client", &["**/*.entity.json"])).unwrap();
        registry.register(schema_type("any", &["**/*.json"])).unwrap();

        assert_eq!(registry.find("RP/entity/pig.entity.json").unwrap().name, "client");
        assert_eq!(registry.find("BP/items/apple.json").unwrap().name, "any");
        assert!(registry.find("README.md").is_none());
    }

    #[test]
    fn test_load_dir_in_path_order() {
        let dir = tempdir().unwrap();
        for (file, name) in [("b.json", "second"), ("a.json", "first")] {
            let def = json!({
                "name": name,
                "fileMatch": ["**/*.json"],
                "baseSchema": {"type": "object"}
            });
            fs::write(dir.path().join(file), def.to_string()).unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut registry = SchemaRegistry::new();
        assert_eq!(registry.load_dir(dir.path()).unwrap(), 2);
        assert_eq!(registry.find("x.json").unwrap().name, "first");
    }

    #[test]
    fn test_invalid_definition_is_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bad.json"), "{\"name\": 1}").unwrap();
        let mut registry = SchemaRegistry::new();
        assert!(matches!(
            registry.load_dir(dir.path()),
            Err(SchemaError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn test_builtin_registry_loads() {
        let registry = SchemaRegistry::builtin().unwrap();
        assert!(!registry.is_empty());
        assert_eq!(
            registry.find("/addon/BP/entities/pig.json").map(|t| t.name.as_str()),
            Some("behavior_entity")
        );
        assert_eq!(
            registry.find("/addon/RP/entity/pig.entity.json").map(|t| t.name.as_str()),
            Some("client_entity")
        );
        assert_eq!(
            registry.find("/addon/BP/manifest.json").map(|t| t.name.as_str()),
            Some("manifest")
        );
    }
}
