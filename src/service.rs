//! Assistance service
//!
//! One long-lived object that owns the registry, the examples cache and the
//! diagnostic engine. Editor integrations construct it once and route every
//! request through it.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::completion::{complete, CompletionItem};
use crate::config::AssistConfig;
use crate::diagnostics::SchemaDiagnosticEngine;
use crate::error::Result;
use crate::examples::{DynamicExamplesCache, StaticContentProvider};
use crate::hover::{hover, Hover};
use crate::position::{analyze, JsonPositionContext};
use crate::registry::SchemaRegistry;
use crate::resolver::SchemaVersionResolver;
use crate::schema::ResolvedSchema;

pub struct AssistService {
    registry: Arc<SchemaRegistry>,
    examples: DynamicExamplesCache,
    diagnostics: SchemaDiagnosticEngine,
    config: AssistConfig,
}

impl AssistService {
    pub fn new(registry: SchemaRegistry, examples: DynamicExamplesCache, config: AssistConfig) -> Self {
        let registry = Arc::new(registry);
        let diagnostics = SchemaDiagnosticEngine::new(Arc::clone(&registry), config.diagnostics.clone());
        Self {
            registry,
            examples,
            diagnostics,
            config,
        }
    }

    /// Service backed by the configured registry and the static content lists
    pub fn from_config(config: AssistConfig) -> Result<Self> {
        let registry = SchemaRegistry::from_config(&config.registry)?;
        let examples = DynamicExamplesCache::new(StaticContentProvider).with_ttl(config.examples.ttl());
        debug!(schema_types = registry.len(), "assist service ready");
        Ok(Self::new(registry, examples, config))
    }

    pub fn config(&self) -> &AssistConfig {
        &self.config
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn diagnostics(&mut self) -> &mut SchemaDiagnosticEngine {
        &mut self.diagnostics
    }

    pub fn examples(&mut self) -> &mut DynamicExamplesCache {
        &mut self.examples
    }

    /// Classify `offset` in `text`
    pub fn context(&self, text: &str, offset: usize) -> JsonPositionContext {
        analyze(text, offset)
    }

    /// Versioned schema for a document
    pub fn resolve(&self, file_path: &str, text: &str) -> Option<ResolvedSchema> {
        SchemaVersionResolver::new(&self.registry).resolve(file_path, text)
    }

    pub fn complete(&mut self, file_path: &str, text: &str, offset: usize) -> Vec<CompletionItem> {
        let Some(resolved) = self.resolve(file_path, text) else {
            return Vec::new();
        };
        let context = analyze(text, offset);
        complete(&context, &resolved.root, &mut self.examples, &self.config.completion)
    }

    pub fn hover(&self, file_path: &str, text: &str, offset: usize) -> Option<Hover> {
        let resolved = self.resolve(file_path, text)?;
        hover(text, offset, &resolved.root)
    }
}

impl fmt::Debug for AssistService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssistService")
            .field("schema_types", &self.registry.len())
            .field("examples", &self.examples)
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}
