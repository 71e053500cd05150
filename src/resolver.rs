//! Schema reference resolution
//!
//! Resolves URI references (RFC 3986 §5) against a base authority and looks
//! the result up in the registry. Resolution enforces a containment policy:
//! a resolved URI outside the configured base authority is rejected rather
//! than fetched, so a stray reference can never pull in a cross-origin
//! schema.

use url::Url;

use crate::error::ResolveError;
use crate::registry::{SchemaDocument, SchemaRegistry};

/// Resolve a URI reference against `base` per RFC 3986 §5
///
/// Relative references (including `..` segments, query and fragment parts)
/// are joined onto `base`; absolute references pass through unchanged. The
/// result is normalized: an empty trailing fragment (`...#`) is dropped so
/// `http://a/b#` and `http://a/b` key identically.
pub fn resolve_reference(reference: &str, base: &Url) -> Result<Url, ResolveError> {
    let mut resolved = base.join(reference).map_err(|source| ResolveError::Malformed {
        reference: reference.to_string(),
        source,
    })?;
    if resolved.fragment() == Some("") {
        resolved.set_fragment(None);
    }
    Ok(resolved)
}

/// Whether `uri` lies under the `base` authority
///
/// Same scheme, host and port, and the path must extend the base path at a
/// segment boundary (mirrors `Uri.IsBaseOf` semantics).
pub fn is_within_base(uri: &Url, base: &Url) -> bool {
    if uri.scheme() != base.scheme()
        || uri.host_str() != base.host_str()
        || uri.port_or_known_default() != base.port_or_known_default()
    {
        return false;
    }
    let base_path = base.path();
    let path = uri.path();
    if base_path.ends_with('/') {
        path.starts_with(base_path)
    } else {
        path == base_path || path.starts_with(&format!("{}/", base_path))
    }
}

/// Resolve `reference` against `base`, enforce containment, and look the
/// resulting URI up in `registry`
///
/// The three failure modes are distinct: a reference that cannot be parsed,
/// one that escapes the base authority, and one that is well-formed and
/// in-scope but simply not registered.
pub fn resolve<'a>(
    reference: &str,
    base: &Url,
    registry: &'a SchemaRegistry,
) -> Result<&'a SchemaDocument, ResolveError> {
    let uri = resolve_reference(reference, base)?;
    if !is_within_base(&uri, base) {
        return Err(ResolveError::OutOfScope {
            uri: uri.to_string(),
            base: base.to_string(),
        });
    }
    registry
        .get(&uri)
        .ok_or_else(|| ResolveError::NotFound { uri: uri.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://roche.com/rmd/").unwrap()
    }

    #[test]
    fn test_relative_reference_joins_base() {
        let uri = resolve_reference("X800/types/sample.json", &base()).unwrap();
        assert_eq!(uri.as_str(), "http://roche.com/rmd/X800/types/sample.json");
    }

    #[test]
    fn test_dot_segments_removed() {
        let uri = resolve_reference("X800/../shared/common.json", &base()).unwrap();
        assert_eq!(uri.as_str(), "http://roche.com/rmd/shared/common.json");
    }

    #[test]
    fn test_empty_fragment_normalized() {
        let uri = resolve_reference("http://roche.com/rmd/a.json#", &base()).unwrap();
        assert_eq!(uri.as_str(), "http://roche.com/rmd/a.json");
    }

    #[test]
    fn test_absolute_reference_passes_through() {
        let uri = resolve_reference("http://roche.com/rmd/a.json", &base()).unwrap();
        assert!(is_within_base(&uri, &base()));
    }

    #[test]
    fn test_other_authority_out_of_scope() {
        let uri = resolve_reference("http://example.com/a.json", &base()).unwrap();
        assert!(!is_within_base(&uri, &base()));
    }

    #[test]
    fn test_dot_segment_escape_out_of_scope() {
        let uri = resolve_reference("../outside/a.json", &base()).unwrap();
        assert_eq!(uri.as_str(), "http://roche.com/outside/a.json");
        assert!(!is_within_base(&uri, &base()));
    }

    #[test]
    fn test_segment_boundary() {
        let base = Url::parse("http://roche.com/rmd").unwrap();
        assert!(is_within_base(&Url::parse("http://roche.com/rmd/a").unwrap(), &base));
        assert!(!is_within_base(&Url::parse("http://roche.com/rmdx/a").unwrap(), &base));
    }
}
