//! Bedrock Schema Assistance
//!
//! JSON-schema-driven authoring help for Minecraft Bedrock content files:
//! completion, hover and diagnostics computed directly from raw, possibly
//! incomplete document text.
//!
//! ## Features
//!
//! - **Position Analysis**: Classifies any byte offset as key, value, array item or root
//! - **Versioned Schemas**: `format_version` selects additive/removal patches per file type
//! - **Schema Navigation**: Walks `properties`/`items` and merges `oneOf`/`anyOf`/`allOf`
//! - **Diagnostics**: Compiled validators, Molang checks, debounced per document
//! - **Dynamic Examples**: TTL-cached game identifiers offered as completion values
//!
//! ## Architecture
//!
//! ```text
//! text + offset ──► position ──► path + ContextKind
//! file path + text ──► resolver (registry) ──► ResolvedSchema
//! (context, schema) ──► navigate ──► node ──► completion / hover
//! document ──► validation ──► issues ──► diagnostics ──► sink
//! ```

pub mod checksum;
pub mod completion;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod examples;
pub mod hover;
pub mod navigate;
pub mod position;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod service;
pub mod validation;
pub mod version;

pub use checksum::Checksum;
pub use completion::{CompletionItem, CompletionKind};
pub use config::AssistConfig;
pub use diagnostics::{Diagnostic, DiagnosticCollection, DiagnosticsSink, DocumentState, SchemaDiagnosticEngine, Severity};
pub use document::{Position, Range, SourceDocument, TextDocument};
pub use error::{Result, SchemaError};
pub use examples::{ContentProvider, DynamicExamplesCache, StaticContentProvider};
pub use hover::Hover;
pub use position::{analyze, ContextKind, JsonPositionContext};
pub use registry::SchemaRegistry;
pub use resolver::SchemaVersionResolver;
pub use schema::{ResolvedSchema, SchemaType};
pub use service::AssistService;
pub use validation::{IssueKeyword, ValidationIssue, ValidatorCache};
pub use version::FormatVersion;
