//! Validation orchestration
//!
//! Drives the per-document pipeline: load, extract the `schema` reference,
//! resolve it, validate. Every failure is isolated to its own document; the
//! batch always completes with one [`ValidationResult`] per input path plus
//! a tally of failures by kind.
//!
//! Documents never touch shared mutable state once the registry is built,
//! so the batch runs on a rayon worker pool; the indexed parallel map keeps
//! results in input order, identical to a sequential run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::engine::{self, ValidationError};
use crate::error::DocumentError;
use crate::loader;
use crate::registry::SchemaRegistry;
use crate::resolver;

/// Outcome of validating one document
#[derive(Debug)]
pub enum DocumentStatus {
    /// Loaded, resolved and passed every schema check
    Valid,
    /// Loaded and resolved, but violated its schema
    Invalid(Vec<ValidationError>),
    /// Never reached validation (unreadable, malformed, unresolvable)
    Failed(DocumentError),
}

impl DocumentStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, DocumentStatus::Valid)
    }

    /// Tally category; `None` for a valid document
    pub fn kind(&self) -> Option<&'static str> {
        match self {
            DocumentStatus::Valid => None,
            DocumentStatus::Invalid(_) => Some("invalid"),
            DocumentStatus::Failed(err) => Some(err.kind()),
        }
    }
}

/// One result per input document
#[derive(Debug)]
pub struct ValidationResult {
    pub path: PathBuf,
    pub status: DocumentStatus,
}

/// Aggregated results for a whole batch
#[derive(Debug)]
pub struct RunSummary {
    pub results: Vec<ValidationResult>,
    /// Failure count per category ("invalid", "parse", "schema-not-found", ...)
    pub tally: BTreeMap<&'static str, usize>,
}

impl RunSummary {
    fn from_results(results: Vec<ValidationResult>) -> Self {
        let mut tally = BTreeMap::new();
        for result in &results {
            if let Some(kind) = result.status.kind() {
                *tally.entry(kind).or_insert(0) += 1;
            }
        }
        Self { results, tally }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn valid_count(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_valid()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.total() - self.valid_count()
    }

    /// True when every document validated cleanly
    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }
}

/// Validates documents against a built registry
pub struct Runner<'a> {
    registry: &'a SchemaRegistry,
    base: Url,
}

impl<'a> Runner<'a> {
    pub fn new(registry: &'a SchemaRegistry, base: Url) -> Self {
        Self { registry, base }
    }

    /// Validate every path, in parallel, preserving input order
    pub fn run(&self, paths: &[PathBuf]) -> RunSummary {
        info!(documents = paths.len(), "validating batch");
        let results = paths
            .par_iter()
            .map(|path| self.validate_document(path))
            .collect();
        RunSummary::from_results(results)
    }

    /// Sequential variant of [`run`](Self::run); same results, same order
    pub fn run_sequential(&self, paths: &[PathBuf]) -> RunSummary {
        let results = paths.iter().map(|path| self.validate_document(path)).collect();
        RunSummary::from_results(results)
    }

    /// Validate a single document; never panics, never aborts the batch
    pub fn validate_document(&self, path: &Path) -> ValidationResult {
        let status = self.document_status(path);
        debug!(path = %path.display(), valid = status.is_valid(), "validated document");
        ValidationResult {
            path: path.to_path_buf(),
            status,
        }
    }

    fn document_status(&self, path: &Path) -> DocumentStatus {
        let value = match loader::load_json(path) {
            Ok(value) => value,
            Err(err) => return DocumentStatus::Failed(err),
        };

        let reference = match value.get("schema").and_then(Value::as_str) {
            Some(reference) => reference.to_string(),
            None => return DocumentStatus::Failed(DocumentError::MissingSchemaRef),
        };

        let schema = match resolver::resolve(&reference, &self.base, self.registry) {
            Ok(schema) => schema,
            Err(err) => return DocumentStatus::Failed(err.into()),
        };

        let errors = engine::validate(&value, schema, self.registry, &self.base);
        if errors.is_empty() {
            DocumentStatus::Valid
        } else {
            DocumentStatus::Invalid(errors)
        }
    }
}
