//! Schema registry
//!
//! Scans a directory tree for draft-04 schema files, validates each one
//! against the embedded meta-schema, and indexes them by their declared
//! `id` URI. The registry is built once, before any document validation,
//! and is read-only afterwards; any structural problem in the corpus
//! (invalid schema, duplicate id) aborts the build.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::engine;
use crate::error::{RegistryError, Result};
use crate::loader;

/// The draft-04 meta-schema, embedded so registry builds need no network
pub const DRAFT04_META: &str = include_str!("draft04.json");

/// Parse the embedded draft-04 meta-schema
pub fn load_meta_schema() -> Result<Value> {
    serde_json::from_str(DRAFT04_META).map_err(RegistryError::MetaSchema)
}

/// A schema indexed by the registry, immutable once built
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    /// The schema's declared `id`, the registry key
    pub id: Url,
    /// File the schema was loaded from
    pub path: PathBuf,
    /// The raw schema document
    pub json: Value,
}

/// URI-indexed collection of validated schema documents
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<Url, SchemaDocument>,
}

impl SchemaRegistry {
    /// Build a registry from every schema file under `schema_root`
    ///
    /// Files without both an `id` and a `$schema` string property are not
    /// schemas and are skipped. Parsing and meta-schema validation run in
    /// parallel; indexing and duplicate detection stay serialized.
    pub fn build(schema_root: &Path, meta_schema: &Value) -> Result<Self> {
        let files = loader::find_json_files(schema_root);

        let candidates: Vec<Option<SchemaDocument>> = files
            .par_iter()
            .map(|path| Self::load_candidate(path, meta_schema))
            .collect::<Result<_>>()?;

        let mut schemas: HashMap<Url, SchemaDocument> = HashMap::new();
        for doc in candidates.into_iter().flatten() {
            if let Some(existing) = schemas.get(&doc.id) {
                return Err(RegistryError::DuplicateSchemaId {
                    uri: doc.id.to_string(),
                    first: existing.path.clone(),
                    second: doc.path,
                });
            }
            debug!(id = %doc.id, path = %doc.path.display(), "registered schema");
            schemas.insert(doc.id.clone(), doc);
        }

        Ok(Self { schemas })
    }

    /// Load one file; `Ok(None)` means it is not a schema file
    fn load_candidate(path: &Path, meta_schema: &Value) -> Result<Option<SchemaDocument>> {
        let content = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let json: Value = serde_json::from_str(&content).map_err(|source| RegistryError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        let id = match (
            json.get("id").and_then(Value::as_str),
            json.get("$schema").and_then(Value::as_str),
        ) {
            (Some(id), Some(_)) => id.to_string(),
            _ => {
                debug!(path = %path.display(), "no schema marker, skipping");
                return Ok(None);
            }
        };

        let errors = engine::validate_self_contained(&json, meta_schema);
        if !errors.is_empty() {
            return Err(RegistryError::SchemaInvalid {
                path: path.to_path_buf(),
                errors,
            });
        }

        let mut uri = Url::parse(&id).map_err(|source| RegistryError::InvalidSchemaId {
            path: path.to_path_buf(),
            id: id.clone(),
            source,
        })?;
        // Ids conventionally end in `#`; key them without the empty fragment
        // so lookups and `$ref` resolution agree.
        if uri.fragment() == Some("") {
            uri.set_fragment(None);
        }

        Ok(Some(SchemaDocument {
            id: uri,
            path: path.to_path_buf(),
            json,
        }))
    }

    /// Look up a schema by its absolute id URI
    pub fn get(&self, uri: &Url) -> Option<&SchemaDocument> {
        self.schemas.get(uri)
    }

    /// All registered ids, sorted for stable diagnostic output
    pub fn uris(&self) -> Vec<&Url> {
        let mut uris: Vec<&Url> = self.schemas.keys().collect();
        uris.sort_by_key(|u| u.as_str());
        uris
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_schema(dir: &Path, name: &str, id: &str) {
        let schema = serde_json::json!({
            "id": id,
            "$schema": "http://json-schema.org/draft-04/schema#",
            "type": "object"
        });
        fs::write(dir.join(name), serde_json::to_string_pretty(&schema).unwrap()).unwrap();
    }

    #[test]
    fn test_meta_schema_parses() {
        let meta = load_meta_schema().unwrap();
        assert_eq!(
            meta["id"].as_str(),
            Some("http://json-schema.org/draft-04/schema#")
        );
    }

    #[test]
    fn test_build_indexes_by_id() {
        let dir = tempdir().unwrap();
        let meta = load_meta_schema().unwrap();
        write_schema(dir.path(), "a.json", "http://roche.com/rmd/a.json");
        write_schema(dir.path(), "b.json", "http://roche.com/rmd/b.json#");

        let registry = SchemaRegistry::build(dir.path(), &meta).unwrap();
        assert_eq!(registry.len(), 2);
        // Trailing empty fragment is normalized away.
        let uri = Url::parse("http://roche.com/rmd/b.json").unwrap();
        assert!(registry.get(&uri).is_some());
    }

    #[test]
    fn test_non_schema_files_skipped() {
        let dir = tempdir().unwrap();
        let meta = load_meta_schema().unwrap();
        fs::write(dir.path().join("data.json"), r#"{"some": "document"}"#).unwrap();

        let registry = SchemaRegistry::build(dir.path(), &meta).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_id_is_fatal() {
        let dir = tempdir().unwrap();
        let meta = load_meta_schema().unwrap();
        write_schema(dir.path(), "a.json", "http://roche.com/rmd/dup.json");
        write_schema(dir.path(), "b.json", "http://roche.com/rmd/dup.json");

        let err = SchemaRegistry::build(dir.path(), &meta).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateSchemaId { .. }));
    }

    #[test]
    fn test_invalid_schema_aborts_build() {
        let dir = tempdir().unwrap();
        let meta = load_meta_schema().unwrap();
        // `type` must be a simple type name or array of them.
        let bad = serde_json::json!({
            "id": "http://roche.com/rmd/bad.json",
            "$schema": "http://json-schema.org/draft-04/schema#",
            "type": 12
        });
        fs::write(dir.path().join("bad.json"), bad.to_string()).unwrap();

        let err = SchemaRegistry::build(dir.path(), &meta).unwrap_err();
        assert!(matches!(err, RegistryError::SchemaInvalid { .. }));
    }

    #[test]
    fn test_exclusive_bound_without_bound_fails_meta_validation() {
        let dir = tempdir().unwrap();
        let meta = load_meta_schema().unwrap();
        // Draft-04: exclusiveMinimum is only meaningful alongside minimum.
        let bad = serde_json::json!({
            "id": "http://roche.com/rmd/exclusive.json",
            "$schema": "http://json-schema.org/draft-04/schema#",
            "type": "number",
            "exclusiveMinimum": true
        });
        fs::write(dir.path().join("exclusive.json"), bad.to_string()).unwrap();

        let err = SchemaRegistry::build(dir.path(), &meta).unwrap_err();
        assert!(matches!(err, RegistryError::SchemaInvalid { .. }));
    }

    #[test]
    fn test_malformed_schema_json_is_fatal() {
        let dir = tempdir().unwrap();
        let meta = load_meta_schema().unwrap();
        fs::write(dir.path().join("broken.json"), "{oops").unwrap();

        let err = SchemaRegistry::build(dir.path(), &meta).unwrap_err();
        assert!(matches!(err, RegistryError::Json { .. }));
    }
}
