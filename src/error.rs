//! Error types for schema resolution and validation

use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema assistance errors
///
/// None of these reach the editor surface: the assistance entry points log
/// them and degrade to "no assistance".
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Invalid format version: {0}")]
    InvalidVersion(String),

    #[error("Invalid schema definition {name}: {reason}")]
    InvalidDefinition { name: String, reason: String },

    #[error("Invalid file pattern {pattern}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Failed to compile schema for {id}: {reason}")]
    Compile { id: String, reason: String },

    #[error("Unknown example source: {0}")]
    UnknownSource(String),

    #[error("Content provider failed for {source_name}: {reason}")]
    Provider { source_name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}
