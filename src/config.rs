//! Configuration management for schema assistance
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (bedrock-schemas.toml)
//! - Environment variables (BEDROCK_SCHEMAS__*)
//!
//! ## Example config file (bedrock-schemas.toml):
//! ```toml
//! [diagnostics]
//! enabled = true
//! debounce_ms = 500
//! molang = true
//!
//! [examples]
//! ttl_secs = 300
//!
//! [registry]
//! builtin = true
//! extra_dirs = ["./schemas/custom"]
//!
//! [completion]
//! fuzzy = true
//! max_items = 200
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistConfig {
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    #[serde(default)]
    pub examples: ExamplesConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub completion: CompletionConfig,
}

/// Diagnostics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Validate documents at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Quiet period after the last edit before validating
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Check strings marked `"molang": true`
    #[serde(default = "default_true")]
    pub molang: bool,
}

/// Dynamic examples configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamplesConfig {
    /// How long a fetched example list stays fresh
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Load the embedded Bedrock schema definitions
    #[serde(default = "default_true")]
    pub builtin: bool,

    /// Directories of additional definition files, registered after built-ins
    #[serde(default)]
    pub extra_dirs: Vec<PathBuf>,
}

/// Completion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Filter and rank items by fuzzy match against the typed token
    #[serde(default = "default_true")]
    pub fuzzy: bool,

    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_max_items() -> usize {
    200
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: default_debounce_ms(),
            molang: true,
        }
    }
}

impl Default for ExamplesConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            builtin: true,
            extra_dirs: Vec::new(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            fuzzy: true,
            max_items: default_max_items(),
        }
    }
}

impl DiagnosticsConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl ExamplesConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl AssistConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "bedrock-schemas.toml",
            ".bedrock-schemas.toml",
            "config/bedrock-schemas.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "bedrock", "bedrock-schemas") {
            let xdg_config = config_dir.config_dir().join("bedrock-schemas.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // BEDROCK_SCHEMAS__DIAGNOSTICS__DEBOUNCE_MS=250
        builder = builder.add_source(
            Environment::with_prefix("BEDROCK_SCHEMAS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = AssistConfig::default();
        assert!(config.diagnostics.enabled);
        assert_eq!(config.diagnostics.debounce(), Duration::from_millis(500));
        assert_eq!(config.examples.ttl(), Duration::from_secs(300));
        assert!(config.registry.builtin);
    }

    #[test]
    fn test_serialize_config() {
        let config = AssistConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[diagnostics]"));
        assert!(toml_str.contains("[examples]"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[diagnostics]\ndebounce_ms = 250\n\n[completion]\nfuzzy = false\n").unwrap();

        let config = AssistConfig::load_from(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.diagnostics.debounce_ms, 250);
        assert!(config.diagnostics.enabled);
        assert!(!config.completion.fuzzy);
        assert_eq!(config.completion.max_items, 200);
    }
}
