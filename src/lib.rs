//! JSON corpus validator
//!
//! Validates a directory of JSON documents against a registry of JSON
//! Schema draft-04 definitions indexed by their declared `id` URI. Each
//! document names its schema in a `schema` property holding an absolute
//! URI under a configured base authority.
//!
//! ## Pipeline
//!
//! ```text
//! schema dir ──> SchemaRegistry::build ──┐   (meta-schema checked, ids unique)
//!                                        v
//! document dir ──> Runner::run ──> resolver ──> engine ──> RunSummary
//! ```
//!
//! The registry is built once, up front, and is read-only afterwards;
//! documents validate independently (and in parallel) against it. Failures
//! in a single document never abort the batch — the corpus itself being
//! broken (invalid schema, duplicate id) does.

pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod registry;
pub mod resolver;
pub mod runner;

pub use config::ValidatorConfig;
pub use engine::{validate, ValidationError};
pub use error::{DocumentError, RegistryError, ResolveError};
pub use registry::{load_meta_schema, SchemaDocument, SchemaRegistry};
pub use runner::{DocumentStatus, RunSummary, Runner, ValidationResult};
