//! Error types for the validator
//!
//! Two severity classes: [`RegistryError`] is fatal and aborts the whole run
//! (a broken schema corpus makes every result meaningless), while
//! [`DocumentError`] is recoverable and scoped to a single document.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::ValidationError;

/// Result type for registry-build operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Fatal errors raised while building the schema registry
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in schema file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("embedded draft-04 meta-schema is malformed: {0}")]
    MetaSchema(#[source] serde_json::Error),

    #[error("schema {} failed draft-04 meta-schema validation ({} error(s), first: {})",
        path.display(),
        errors.len(),
        errors.first().map(|e| e.to_string()).unwrap_or_default())]
    SchemaInvalid {
        path: PathBuf,
        errors: Vec<ValidationError>,
    },

    #[error("schema id {uri} declared by both {} and {}", first.display(), second.display())]
    DuplicateSchemaId {
        uri: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("schema {} declares an invalid id {id}: {source}", path.display())]
    InvalidSchemaId {
        path: PathBuf,
        id: String,
        #[source]
        source: url::ParseError,
    },
}

/// Errors raised while resolving a schema URI reference
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("malformed URI reference {reference}: {source}")]
    Malformed {
        reference: String,
        #[source]
        source: url::ParseError,
    },

    #[error("URI {uri} is outside the configured base authority {base}")]
    OutOfScope { uri: String, base: String },

    #[error("no registered schema with id {uri}")]
    NotFound { uri: String },
}

/// Recoverable, per-document failures
///
/// Each variant maps to one tally category in the run summary; none of them
/// stop the batch.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("document has no `schema` property referencing its schema")]
    MissingSchemaRef,

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl DocumentError {
    /// Stable category name used for the per-kind failure tally
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentError::Io(_) => "io",
            DocumentError::Parse(_) => "parse",
            DocumentError::MissingSchemaRef => "missing-schema-ref",
            DocumentError::Resolve(ResolveError::Malformed { .. }) => "malformed-uri",
            DocumentError::Resolve(ResolveError::OutOfScope { .. }) => "out-of-scope",
            DocumentError::Resolve(ResolveError::NotFound { .. }) => "schema-not-found",
        }
    }
}
