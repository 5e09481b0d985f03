//! Diagnostics
//!
//! Turns validation issues into ranged diagnostics and schedules validation
//! per document. Each open document moves through
//! `Idle -> PendingValidation -> Validated`; a new edit while pending replaces
//! the scheduled run, so only the last edit in a quiet period is validated.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

use crate::config::DiagnosticsConfig;
use crate::document::{LineIndex, Range, TextDocument};
use crate::error::Result;
use crate::position::{find_key_range, find_word_range};
use crate::registry::SchemaRegistry;
use crate::resolver::SchemaVersionResolver;
use crate::schema::ResolvedSchema;
use crate::validation::{IssueKeyword, ValidationIssue, ValidatorCache};

/// Value of [`Diagnostic::source`]
pub const DIAGNOSTIC_SOURCE: &str = "bedrock-schemas";

// =============================================================================
// Diagnostic
// =============================================================================

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A problem located in a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub range: Range,
    pub severity: Severity,
    pub message: String,
    /// Keyword that produced the problem, `None` for syntax errors
    pub code: Option<String>,
    pub source: String,
}

impl Diagnostic {
    /// The single diagnostic reported for unparseable text
    pub fn syntax(reason: impl fmt::Display) -> Self {
        Self {
            range: Range::document_start(),
            severity: Severity::Error,
            message: format!("Syntax error: {}", reason),
            code: None,
            source: DIAGNOSTIC_SOURCE.to_string(),
        }
    }

    fn from_issue(issue: &ValidationIssue, range: Range) -> Self {
        let severity = match issue.keyword {
            IssueKeyword::Molang => Severity::Warning,
            _ => Severity::Error,
        };
        Self {
            range,
            severity,
            message: issue.message.clone(),
            code: Some(issue.keyword.as_str().to_string()),
            source: DIAGNOSTIC_SOURCE.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.range.start.line + 1,
            self.range.start.character + 1,
            self.severity
        )?;
        if let Some(code) = &self.code {
            write!(f, "[{}]", code)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Byte span for an issue, found by searching the text
///
/// The deepest object key of the instance path is looked up as a quoted
/// string; missing `required` properties are looked up by name. Anything
/// not found lands at the document start.
pub fn issue_span(text: &str, issue: &ValidationIssue) -> Option<(usize, usize)> {
    if issue.keyword == IssueKeyword::Required {
        return issue
            .params
            .get("missingProperty")
            .and_then(|v| v.as_str())
            .and_then(|name| find_word_range(text, name));
    }

    let key = issue
        .instance_path
        .iter()
        .rev()
        .find(|segment| segment.parse::<usize>().is_err())?;
    find_key_range(text, key)
}

/// Map issues to diagnostics against `text`
pub fn map_issues(text: &str, issues: &[ValidationIssue]) -> Vec<Diagnostic> {
    let index = LineIndex::new(text);
    issues
        .iter()
        .map(|issue| {
            let range = issue_span(text, issue)
                .map(|(start, end)| Range::new(index.position_at(text, start), index.position_at(text, end)))
                .unwrap_or_else(Range::document_start);
            Diagnostic::from_issue(issue, range)
        })
        .collect()
}

// =============================================================================
// Sink
// =============================================================================

/// Where diagnostics are published
pub trait DiagnosticsSink {
    /// Replace the diagnostics of one document
    fn set(&mut self, uri: &str, diagnostics: Vec<Diagnostic>);

    /// Forget one document
    fn delete(&mut self, uri: &str);
}

/// In-memory diagnostics per document
#[derive(Debug, Clone, Default)]
pub struct DiagnosticCollection {
    entries: HashMap<String, Vec<Diagnostic>>,
}

impl DiagnosticCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uri: &str) -> Option<&[Diagnostic]> {
        self.entries.get(uri).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Diagnostic>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DiagnosticsSink for DiagnosticCollection {
    fn set(&mut self, uri: &str, diagnostics: Vec<Diagnostic>) {
        self.entries.insert(uri.to_string(), diagnostics);
    }

    fn delete(&mut self, uri: &str) {
        self.entries.remove(uri);
    }
}

// =============================================================================
// Debouncer
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct Pending {
    generation: u64,
    deadline: Instant,
}

/// Keyed debouncer driven by explicit instants
///
/// Scheduling a key that is already pending replaces its deadline, which
/// cancels the earlier run.
#[derive(Debug, Clone)]
pub struct Debouncer<K> {
    delay: Duration,
    next_generation: u64,
    pending: HashMap<K, Pending>,
}

impl<K: Eq + Hash + Clone> Debouncer<K> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_generation: 0,
            pending: HashMap::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `key` to fire at `now + delay`, returning its generation
    pub fn schedule(&mut self, key: K, now: Instant) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.pending.insert(
            key,
            Pending {
                generation,
                deadline: now + self.delay,
            },
        );
        generation
    }

    /// Drop a pending key; true if something was pending
    pub fn cancel(&mut self, key: &K) -> bool {
        self.pending.remove(key).is_some()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    /// Remove and return every key whose deadline has passed, oldest first
    pub fn due(&mut self, now: Instant) -> Vec<K> {
        let mut fired: Vec<(K, Pending)> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(k, p)| (k.clone(), *p))
            .collect();
        fired.sort_by_key(|(_, p)| (p.deadline, p.generation));

        for (key, _) in &fired {
            self.pending.remove(key);
        }
        fired.into_iter().map(|(key, _)| key).collect()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Validation state of one open document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentState {
    Idle,
    PendingValidation,
    Validated,
}

/// Validates documents and publishes their diagnostics
pub struct SchemaDiagnosticEngine {
    registry: Arc<SchemaRegistry>,
    config: DiagnosticsConfig,
    validators: ValidatorCache,
    debouncer: Debouncer<String>,
    states: HashMap<String, DocumentState>,
}

impl SchemaDiagnosticEngine {
    pub fn new(registry: Arc<SchemaRegistry>, config: DiagnosticsConfig) -> Self {
        let debouncer = Debouncer::new(config.debounce());
        Self {
            registry,
            config,
            validators: ValidatorCache::new(),
            debouncer,
            states: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Current state of a document; unknown documents are `Idle`
    pub fn state(&self, uri: &str) -> DocumentState {
        self.states.get(uri).copied().unwrap_or(DocumentState::Idle)
    }

    /// Record an edit; validation runs once the quiet period has passed
    pub fn on_change(&mut self, uri: &str, now: Instant) {
        if !self.config.enabled {
            return;
        }
        self.debouncer.schedule(uri.to_string(), now);
        self.states.insert(uri.to_string(), DocumentState::PendingValidation);
    }

    /// Forget a closed document and its diagnostics
    pub fn on_close(&mut self, uri: &str, sink: &mut dyn DiagnosticsSink) {
        self.debouncer.cancel(&uri.to_string());
        self.states.remove(uri);
        sink.delete(uri);
    }

    /// Earliest instant at which [`poll`](Self::poll) has work
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.next_deadline()
    }

    /// Validate every document whose quiet period has elapsed
    ///
    /// Text is read from `documents` at this point, never from the edit that
    /// scheduled the run. Documents no longer present are dropped.
    pub fn poll<D: TextDocument>(
        &mut self,
        now: Instant,
        documents: &HashMap<String, D>,
        sink: &mut dyn DiagnosticsSink,
    ) -> usize {
        let due = self.debouncer.due(now);
        let mut validated = 0;
        for uri in due {
            match documents.get(&uri) {
                Some(doc) => {
                    self.validate_now(doc, sink);
                    validated += 1;
                }
                None => {
                    debug!(uri = %uri, "document closed before validation");
                    self.states.remove(&uri);
                }
            }
        }
        validated
    }

    /// Validate a document immediately and publish the result
    pub fn validate_now(&mut self, doc: &dyn TextDocument, sink: &mut dyn DiagnosticsSink) {
        self.debouncer.cancel(&doc.uri().to_string());
        let diagnostics = self.compute_diagnostics(doc.uri(), doc.text());
        sink.set(doc.uri(), diagnostics);
        self.states.insert(doc.uri().to_string(), DocumentState::Validated);
    }

    /// Diagnostics for `text` as the contents of `file_path`
    pub fn compute_diagnostics(&mut self, file_path: &str, text: &str) -> Vec<Diagnostic> {
        let instance: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => return vec![Diagnostic::syntax(e)],
        };

        let Some(resolved) = SchemaVersionResolver::new(&self.registry).resolve(file_path, text) else {
            return Vec::new();
        };

        match self.issues(file_path, &resolved, &instance) {
            Ok(issues) => map_issues(text, &issues),
            Err(e) => {
                error!(file = file_path, error = %e, "validation failed, diagnostics suppressed");
                Vec::new()
            }
        }
    }

    fn issues(
        &mut self,
        file_path: &str,
        resolved: &ResolvedSchema,
        instance: &serde_json::Value,
    ) -> Result<Vec<ValidationIssue>> {
        let molang = self.config.molang;
        let validator = self.validators.get_or_compile(file_path, resolved)?;
        Ok(validator.validate(instance, molang))
    }

    /// Drop every compiled validator
    pub fn clear_validator_cache(&mut self) {
        self.validators.clear();
    }

    pub fn validator_count(&self) -> usize {
        self.validators.len()
    }
}

impl fmt::Debug for SchemaDiagnosticEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaDiagnosticEngine")
            .field("config", &self.config)
            .field("validators", &self.validators)
            .field("pending", &self.debouncer.len())
            .finish()
    }
}
