//! Draft-04 validation engine
//!
//! An explicit keyword-dispatch evaluator over `serde_json::Value` schema
//! nodes. Evaluation is fail-soft: every applicable keyword on a node runs
//! and its errors accumulate, so a single document reports all of its
//! violations in one pass. Unknown keywords are ignored (forward-compatible
//! draft-04 behavior).
//!
//! `$ref` nodes are resolved relative to the referencing schema's own `id`,
//! crossing into other registered schemas when the target is a different
//! document. Recursive schema graphs are legal; the evaluator guards against
//! non-termination by tracking in-progress (value location, target URI)
//! pairs and a depth backstop.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::registry::{SchemaDocument, SchemaRegistry};
use crate::resolver;

/// A single keyword violation found during evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// JSON pointer into the document under validation (empty = root)
    pub location: String,
    /// Human-readable description of the violation
    pub message: String,
    /// The schema keyword that failed
    pub keyword: &'static str,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let loc = if self.location.is_empty() { "/" } else { &self.location };
        write!(f, "{}: {} [{}]", loc, self.message, self.keyword)
    }
}

/// Hard ceiling on `$ref` chaining depth; the in-progress pair set catches
/// loops first, this only bounds pathological non-looping chains.
const MAX_REF_DEPTH: usize = 64;

/// Validate `value` against a registered schema, following cross-document
/// `$ref`s through `registry`
pub fn validate(
    value: &Value,
    schema: &SchemaDocument,
    registry: &SchemaRegistry,
    base: &Url,
) -> Vec<ValidationError> {
    let mut eval = Evaluator::new(Some(registry), Some(base));
    let scope = Scope {
        root: &schema.json,
        uri: Some(schema.id.clone()),
    };
    eval.eval(value, &schema.json, "", &scope);
    eval.errors
}

/// Validate `value` against a standalone schema value
///
/// `$ref`s must stay inside the schema document (fragment-only or
/// self-referencing); used to check candidate schemas against the embedded
/// meta-schema before any registry exists.
pub fn validate_self_contained(value: &Value, schema: &Value) -> Vec<ValidationError> {
    let mut eval = Evaluator::new(None, None);
    let uri = schema
        .get("id")
        .and_then(Value::as_str)
        .and_then(|s| Url::parse(s).ok());
    let scope = Scope { root: schema, uri };
    eval.eval(value, schema, "", &scope);
    eval.errors
}

/// The schema document a subschema node belongs to; `$ref` resolution is
/// relative to this, never to the document under validation.
struct Scope<'a> {
    root: &'a Value,
    uri: Option<Url>,
}

struct Evaluator<'a> {
    registry: Option<&'a SchemaRegistry>,
    base: Option<&'a Url>,
    errors: Vec<ValidationError>,
    /// (value location, resolved ref target) pairs currently being evaluated
    in_progress: HashSet<(String, String)>,
    depth: usize,
    /// Compiled `pattern` / `patternProperties` regexes; `None` marks a
    /// pattern that failed to compile (checked once, then skipped)
    regexes: HashMap<String, Option<Regex>>,
}

impl<'a> Evaluator<'a> {
    fn new(registry: Option<&'a SchemaRegistry>, base: Option<&'a Url>) -> Self {
        Self {
            registry,
            base,
            errors: Vec::new(),
            in_progress: HashSet::new(),
            depth: 0,
            regexes: HashMap::new(),
        }
    }

    fn error(&mut self, location: &str, keyword: &'static str, message: String) {
        self.errors.push(ValidationError {
            location: location.to_string(),
            message,
            keyword,
        });
    }

    /// Evaluate one schema node against one value location
    fn eval(&mut self, value: &Value, schema: &Value, location: &str, scope: &Scope<'a>) {
        let obj = match schema.as_object() {
            Some(obj) => obj,
            // Draft-04 schemas are objects; anything else constrains nothing.
            None => return,
        };

        // $ref replaces in-place evaluation entirely (siblings are ignored).
        if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            self.eval_ref(value, reference, location, scope);
            return;
        }

        if let Some(expected) = obj.get("type") {
            self.check_type(value, expected, location);
        }
        if let Some(candidates) = obj.get("enum").and_then(Value::as_array) {
            if !candidates.iter().any(|c| json_eq(value, c)) {
                self.error(
                    location,
                    "enum",
                    format!("value {} is not one of the permitted values", terse(value)),
                );
            }
        }

        self.check_combinators(value, obj, location, scope);

        match value {
            Value::Object(map) => self.check_object(value, map, obj, location, scope),
            Value::Array(items) => self.check_array(items, obj, location, scope),
            Value::String(s) => self.check_string(s, obj, location),
            Value::Number(n) => self.check_number(n, obj, location),
            _ => {}
        }
    }

    fn eval_ref(&mut self, value: &Value, reference: &str, location: &str, scope: &Scope<'a>) {
        if self.depth >= MAX_REF_DEPTH {
            self.error(
                location,
                "$ref",
                format!("reference chain exceeds {} levels at {}", MAX_REF_DEPTH, reference),
            );
            return;
        }

        // Split the reference into a document part and a JSON-pointer
        // fragment. A fragment-only reference stays inside the current
        // schema document.
        let (doc_part, fragment) = match reference.find('#') {
            Some(idx) => (&reference[..idx], &reference[idx + 1..]),
            None => (reference, ""),
        };

        enum Target<'v> {
            Current,
            Other(&'v SchemaDocument),
        }

        let target = if doc_part.is_empty() {
            Target::Current
        } else {
            let resolve_base = match scope.uri.as_ref().or(self.base) {
                Some(b) => b,
                None => {
                    self.error(
                        location,
                        "$ref",
                        format!("cannot resolve external reference {} without a base URI", reference),
                    );
                    return;
                }
            };
            match resolver::resolve_reference(doc_part, resolve_base) {
                Ok(uri) if Some(&uri) == scope.uri.as_ref() => Target::Current,
                Ok(uri) => {
                    let registry = match self.registry {
                        Some(r) => r,
                        None => {
                            self.error(
                                location,
                                "$ref",
                                format!("external reference {} is not available here", uri),
                            );
                            return;
                        }
                    };
                    // Containment applies to cross-document refs exactly as
                    // it does to the document-level schema reference.
                    if let Some(base) = self.base {
                        if !resolver::is_within_base(&uri, base) {
                            self.error(
                                location,
                                "$ref",
                                format!("reference {} escapes the base authority {}", uri, base),
                            );
                            return;
                        }
                    }
                    match registry.get(&uri) {
                        Some(doc) => Target::Other(doc),
                        None => {
                            self.error(
                                location,
                                "$ref",
                                format!("no registered schema with id {}", uri),
                            );
                            return;
                        }
                    }
                }
                Err(err) => {
                    self.error(location, "$ref", err.to_string());
                    return;
                }
            }
        };

        let (target_root, target_uri) = match &target {
            Target::Current => (
                scope.root,
                scope.uri.as_ref().map(Url::to_string).unwrap_or_default(),
            ),
            Target::Other(doc) => (&doc.json, doc.id.to_string()),
        };

        let node = if fragment.is_empty() {
            Some(target_root)
        } else {
            target_root.pointer(fragment)
        };
        let node = match node {
            Some(node) => node,
            None => {
                self.error(
                    location,
                    "$ref",
                    format!("reference {} points at nothing in its target schema", reference),
                );
                return;
            }
        };

        // A repeat of the same (location, target) pair means the reference
        // graph loops without consuming any input.
        let key = (location.to_string(), format!("{}#{}", target_uri, fragment));
        if !self.in_progress.insert(key.clone()) {
            self.error(
                location,
                "$ref",
                format!("cyclic reference {} re-entered without progress", reference),
            );
            return;
        }
        self.depth += 1;

        let next_scope = match &target {
            Target::Current => Scope {
                root: scope.root,
                uri: scope.uri.clone(),
            },
            Target::Other(doc) => Scope {
                root: &doc.json,
                uri: Some(doc.id.clone()),
            },
        };
        self.eval(value, node, location, &next_scope);

        self.depth -= 1;
        self.in_progress.remove(&key);
    }

    fn check_type(&mut self, value: &Value, expected: &Value, location: &str) {
        let matches = match expected {
            Value::String(t) => type_matches(t, value),
            Value::Array(ts) => ts
                .iter()
                .filter_map(Value::as_str)
                .any(|t| type_matches(t, value)),
            _ => return,
        };
        if !matches {
            let wanted = match expected {
                Value::String(t) => t.clone(),
                Value::Array(ts) => ts
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(" or "),
                _ => unreachable!(),
            };
            self.error(
                location,
                "type",
                format!("expected {}, found {}", wanted, type_name(value)),
            );
        }
    }

    fn check_combinators(
        &mut self,
        value: &Value,
        obj: &serde_json::Map<String, Value>,
        location: &str,
        scope: &Scope<'a>,
    ) {
        if let Some(schemas) = obj.get("allOf").and_then(Value::as_array) {
            for schema in schemas {
                self.eval(value, schema, location, scope);
            }
        }
        if let Some(schemas) = obj.get("anyOf").and_then(Value::as_array) {
            let matched = schemas.iter().any(|s| self.probe(value, s, location, scope));
            if !matched {
                self.error(
                    location,
                    "anyOf",
                    "value does not match any of the alternative schemas".to_string(),
                );
            }
        }
        if let Some(schemas) = obj.get("oneOf").and_then(Value::as_array) {
            let count = schemas
                .iter()
                .filter(|s| self.probe(value, s, location, scope))
                .count();
            if count != 1 {
                self.error(
                    location,
                    "oneOf",
                    format!("value matches {} schemas, exactly one required", count),
                );
            }
        }
        if let Some(schema) = obj.get("not") {
            if self.probe(value, schema, location, scope) {
                self.error(
                    location,
                    "not",
                    "value matches a schema it must not match".to_string(),
                );
            }
        }
    }

    /// Evaluate a subschema without recording its errors; true = it matched
    fn probe(&mut self, value: &Value, schema: &Value, location: &str, scope: &Scope<'a>) -> bool {
        let saved = std::mem::take(&mut self.errors);
        self.eval(value, schema, location, scope);
        let matched = self.errors.is_empty();
        self.errors = saved;
        matched
    }

    fn check_object(
        &mut self,
        value: &Value,
        map: &serde_json::Map<String, Value>,
        obj: &serde_json::Map<String, Value>,
        location: &str,
        scope: &Scope<'a>,
    ) {
        if let Some(required) = obj.get("required").and_then(Value::as_array) {
            for name in required.iter().filter_map(Value::as_str) {
                if !map.contains_key(name) {
                    self.error(
                        location,
                        "required",
                        format!("required property '{}' is missing", name),
                    );
                }
            }
        }

        if let Some(dependencies) = obj.get("dependencies").and_then(Value::as_object) {
            for (trigger, dependency) in dependencies {
                if !map.contains_key(trigger) {
                    continue;
                }
                match dependency {
                    // Property-list form: the named properties must also
                    // be present.
                    Value::Array(names) => {
                        for name in names.iter().filter_map(Value::as_str) {
                            if !map.contains_key(name) {
                                self.error(
                                    location,
                                    "dependencies",
                                    format!(
                                        "property '{}' requires property '{}'",
                                        trigger, name
                                    ),
                                );
                            }
                        }
                    }
                    // Schema form: the whole object must also match the
                    // dependent schema.
                    Value::Object(_) => {
                        self.eval(value, dependency, location, scope);
                    }
                    _ => {}
                }
            }
        }

        if let Some(min) = obj.get("minProperties").and_then(Value::as_u64) {
            if (map.len() as u64) < min {
                self.error(
                    location,
                    "minProperties",
                    format!("object has {} properties, at least {} required", map.len(), min),
                );
            }
        }
        if let Some(max) = obj.get("maxProperties").and_then(Value::as_u64) {
            if (map.len() as u64) > max {
                self.error(
                    location,
                    "maxProperties",
                    format!("object has {} properties, at most {} allowed", map.len(), max),
                );
            }
        }

        let properties = obj.get("properties").and_then(Value::as_object);
        let pattern_properties = obj.get("patternProperties").and_then(Value::as_object);

        for (name, child) in map {
            let child_location = format!("{}/{}", location, escape_pointer(name));
            let mut covered = false;

            if let Some(props) = properties {
                if let Some(subschema) = props.get(name) {
                    covered = true;
                    self.eval(child, subschema, &child_location, scope);
                }
            }
            if let Some(patterns) = pattern_properties {
                for (pattern, subschema) in patterns {
                    if self.pattern_matches(pattern, name) {
                        covered = true;
                        self.eval(child, subschema, &child_location, scope);
                    }
                }
            }

            if !covered {
                match obj.get("additionalProperties") {
                    Some(Value::Bool(false)) => {
                        self.error(
                            location,
                            "additionalProperties",
                            format!("property '{}' is not permitted", name),
                        );
                    }
                    Some(schema @ Value::Object(_)) => {
                        self.eval(child, schema, &child_location, scope);
                    }
                    _ => {}
                }
            }
        }
    }

    fn check_array(
        &mut self,
        items: &[Value],
        obj: &serde_json::Map<String, Value>,
        location: &str,
        scope: &Scope<'a>,
    ) {
        if let Some(min) = obj.get("minItems").and_then(Value::as_u64) {
            if (items.len() as u64) < min {
                self.error(
                    location,
                    "minItems",
                    format!("array has {} items, at least {} required", items.len(), min),
                );
            }
        }
        if let Some(max) = obj.get("maxItems").and_then(Value::as_u64) {
            if (items.len() as u64) > max {
                self.error(
                    location,
                    "maxItems",
                    format!("array has {} items, at most {} allowed", items.len(), max),
                );
            }
        }
        if obj.get("uniqueItems").and_then(Value::as_bool) == Some(true) {
            for i in 0..items.len() {
                for j in (i + 1)..items.len() {
                    if json_eq(&items[i], &items[j]) {
                        self.error(
                            location,
                            "uniqueItems",
                            format!("items {} and {} are equal", i, j),
                        );
                    }
                }
            }
        }

        match obj.get("items") {
            Some(schema @ Value::Object(_)) => {
                for (i, item) in items.iter().enumerate() {
                    let child_location = format!("{}/{}", location, i);
                    self.eval(item, schema, &child_location, scope);
                }
            }
            Some(Value::Array(tuple)) => {
                for (i, item) in items.iter().enumerate() {
                    let child_location = format!("{}/{}", location, i);
                    if let Some(subschema) = tuple.get(i) {
                        self.eval(item, subschema, &child_location, scope);
                    } else {
                        match obj.get("additionalItems") {
                            Some(Value::Bool(false)) => {
                                self.error(
                                    &child_location,
                                    "additionalItems",
                                    format!("item {} exceeds the tuple schema", i),
                                );
                            }
                            Some(schema @ Value::Object(_)) => {
                                self.eval(item, schema, &child_location, scope);
                            }
                            _ => {}
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn check_string(&mut self, s: &str, obj: &serde_json::Map<String, Value>, location: &str) {
        // Length limits count Unicode code points, not bytes.
        if let Some(min) = obj.get("minLength").and_then(Value::as_u64) {
            let len = s.chars().count() as u64;
            if len < min {
                self.error(
                    location,
                    "minLength",
                    format!("string has {} characters, at least {} required", len, min),
                );
            }
        }
        if let Some(max) = obj.get("maxLength").and_then(Value::as_u64) {
            let len = s.chars().count() as u64;
            if len > max {
                self.error(
                    location,
                    "maxLength",
                    format!("string has {} characters, at most {} allowed", len, max),
                );
            }
        }
        if let Some(pattern) = obj.get("pattern").and_then(Value::as_str) {
            if let Some(matched) = self.try_pattern(pattern, s) {
                if !matched {
                    self.error(
                        location,
                        "pattern",
                        format!("string does not match pattern {}", pattern),
                    );
                }
            }
        }
    }

    fn check_number(
        &mut self,
        num: &serde_json::Number,
        obj: &serde_json::Map<String, Value>,
        location: &str,
    ) {
        if let Some(min) = obj.get("minimum").and_then(as_number) {
            let exclusive = obj.get("exclusiveMinimum").and_then(Value::as_bool) == Some(true);
            let ord = compare_numbers(num, min);
            let ok = if exclusive {
                ord == std::cmp::Ordering::Greater
            } else {
                ord != std::cmp::Ordering::Less
            };
            if !ok {
                self.error(
                    location,
                    "minimum",
                    format!(
                        "{} is {} the minimum {}",
                        num,
                        if exclusive { "not above" } else { "below" },
                        min
                    ),
                );
            }
        }
        if let Some(max) = obj.get("maximum").and_then(as_number) {
            let exclusive = obj.get("exclusiveMaximum").and_then(Value::as_bool) == Some(true);
            let ord = compare_numbers(num, max);
            let ok = if exclusive {
                ord == std::cmp::Ordering::Less
            } else {
                ord != std::cmp::Ordering::Greater
            };
            if !ok {
                self.error(
                    location,
                    "maximum",
                    format!(
                        "{} is {} the maximum {}",
                        num,
                        if exclusive { "not below" } else { "above" },
                        max
                    ),
                );
            }
        }
        if let Some(divisor) = obj.get("multipleOf").and_then(as_number) {
            if !is_multiple_of(num, divisor) {
                self.error(
                    location,
                    "multipleOf",
                    format!("{} is not a multiple of {}", num, divisor),
                );
            }
        }
    }

    fn pattern_matches(&mut self, pattern: &str, text: &str) -> bool {
        self.try_pattern(pattern, text).unwrap_or(false)
    }

    /// None = the pattern does not compile (logged once, then skipped)
    fn try_pattern(&mut self, pattern: &str, text: &str) -> Option<bool> {
        if !self.regexes.contains_key(pattern) {
            let compiled = match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(err) => {
                    warn!(pattern, %err, "unsupported pattern, skipping check");
                    None
                }
            };
            self.regexes.insert(pattern.to_string(), compiled);
        }
        self.regexes
            .get(pattern)
            .and_then(|re| re.as_ref())
            .map(|re| re.is_match(text))
    }
}

fn type_matches(t: &str, value: &Value) -> bool {
    match t {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => matches!(value, Value::Number(n) if n.is_i64() || n.is_u64()),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Deep equality with draft-04 numeric semantics: `1` and `1.0` are equal
fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            compare_numbers(x, y) == std::cmp::Ordering::Equal
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_eq(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).map(|w| json_eq(v, w)).unwrap_or(false))
        }
        _ => a == b,
    }
}

/// Compare two JSON numbers, exactly when both are integers
///
/// Integer pairs go through i128 so 64-bit values near the representable
/// edge never round through a float; a float on either side falls back to
/// f64 comparison.
fn compare_numbers(a: &serde_json::Number, b: &serde_json::Number) -> std::cmp::Ordering {
    match (as_i128(a), as_i128(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => {
            let x = a.as_f64().unwrap_or(f64::NAN);
            let y = b.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal)
        }
    }
}

fn as_number(v: &Value) -> Option<&serde_json::Number> {
    match v {
        Value::Number(n) => Some(n),
        _ => None,
    }
}

fn as_i128(n: &serde_json::Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

fn is_multiple_of(value: &serde_json::Number, divisor: &serde_json::Number) -> bool {
    if let (Some(v), Some(d)) = (as_i128(value), as_i128(divisor)) {
        return d != 0 && v % d == 0;
    }
    let v = value.as_f64().unwrap_or(f64::NAN);
    let d = divisor.as_f64().unwrap_or(f64::NAN);
    if d == 0.0 || !v.is_finite() || !d.is_finite() {
        return false;
    }
    let quotient = v / d;
    (quotient - quotient.round()).abs() < 1e-9
}

/// JSON pointer token escaping per RFC 6901
fn escape_pointer(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Compact rendering of a value for error messages
fn terse(value: &Value) -> String {
    let s = value.to_string();
    if s.len() > 40 {
        format!("{}…", &s[..s.char_indices().take(39).last().map(|(i, c)| i + c.len_utf8()).unwrap_or(0)])
    } else {
        s
    }
}
