//! Cache key derivation.
//!
//! A cache key is a single flat, filesystem-safe token such as
//! `https_github_com_org_charts_git.ref=v1.0`. It is a pure function of the
//! scheme, host, directory and (redacted) query of a [`Source`].

use crate::source::Source;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::collections::BTreeMap;
use url::form_urlencoded;

/// Bytes escaped in query keys and values: everything outside the RFC 3986
/// unreserved set.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Query parameters whose values never reach a cache key.
pub const SECRET_QUERY_PARAMS: &[&str] = &["sshkey"];

/// Value substituted for secret query parameters.
pub const REDACTION_MARKER: &str = "redacted";

/// Derive the cache key for a parsed source.
///
/// References that differ only in the value of a secret parameter map to the
/// same key.
pub fn derive_cache_key(source: &Source) -> String {
    let dir_key = sanitize(&source.source_dir());
    if source.raw_query().is_empty() {
        return dir_key;
    }
    format!("{}.{}", dir_key, encode_query(source.raw_query()).join("_"))
}

/// Replace path-significant characters so the result is one path segment.
fn sanitize(source_dir: &str) -> String {
    let mut out = String::with_capacity(source_dir.len());
    let mut rest = source_dir;
    while let Some(c) = rest.chars().next() {
        if rest.starts_with("//") {
            out.push('_');
            rest = &rest[2..];
            continue;
        }
        match c {
            ':' => {}
            '/' | '.' => out.push('_'),
            c => out.push(c),
        }
        rest = &rest[c.len_utf8()..];
    }
    out
}

/// Decode a raw query, redact secrets and re-encode it as sorted `key=value`
/// pairs.
pub(crate) fn encode_query(raw_query: &str) -> Vec<String> {
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in form_urlencoded::parse(raw_query.as_bytes()) {
        params
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }

    for secret in SECRET_QUERY_PARAMS {
        if let Some(values) = params.get_mut(*secret) {
            *values = vec![REDACTION_MARKER.to_string()];
        }
    }

    params
        .iter()
        .flat_map(|(key, values)| {
            values.iter().map(move |value| {
                format!("{}={}", query_escape(key), query_escape(value))
            })
        })
        .collect()
}

/// Escape a query component with spaces written as `+`.
fn query_escape(component: &str) -> String {
    utf8_percent_encode(component, QUERY_COMPONENT)
        .to_string()
        .replace("%20", "+")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(reference: &str) -> String {
        derive_cache_key(&Source::parse(reference).unwrap())
    }

    #[test]
    fn test_key_for_git_reference_with_ref() {
        assert_eq!(
            key("git::https://github.com/cloudposse/helmfiles.git@releases/kiam.yaml?ref=0.40.0"),
            "https_github_com_cloudposse_helmfiles_git.ref=0.40.0"
        );
    }

    #[test]
    fn test_key_without_query() {
        assert_eq!(key("s3://my-bucket/path/to/object.yaml"), "s3_my-bucket_path_to");
        assert_eq!(key("https://example.com/values.yaml"), "https_example_com");
    }

    #[test]
    fn test_key_keeps_explicit_port() {
        assert_eq!(key("https://example.com:443/values.yaml"), "https_example_com443");
        assert_ne!(
            key("https://example.com:443/values.yaml"),
            key("https://example.com/values.yaml")
        );
    }

    #[test]
    fn test_key_has_no_path_separators() {
        let k = key("git::https://example.com/org/repo.git//sub@file.yaml?ref=v1.0&depth=1");
        assert!(!k.contains('/'));
        assert!(!k.contains(':'));
        assert_eq!(k, "https_example_com_org_repo_git_sub.depth=1_ref=v1.0");
    }

    #[test]
    fn test_key_is_deterministic() {
        let reference = "git::https://example.com/org/repo.git@f.yaml?ref=main";
        assert_eq!(key(reference), key(reference));
    }

    #[test]
    fn test_key_ignores_user_info() {
        assert_eq!(
            key("git::https://alice@example.com/repo.git@f.yaml"),
            key("git::https://example.com/repo.git@f.yaml")
        );
    }

    #[test]
    fn test_key_redacts_secret_parameter() {
        let a = key("git::ssh://git@example.com/repo.git@f.yaml?ref=v1&sshkey=AAAA");
        let b = key("git::ssh://git@example.com/repo.git@f.yaml?ref=v1&sshkey=BBBB");
        assert_eq!(a, b);
        assert!(!a.contains("AAAA"));
        assert!(a.contains("sshkey=redacted"));
    }

    #[test]
    fn test_query_escaping() {
        assert_eq!(
            key("git::https://example.com/repo.git@f.yaml?ref=a*b~c%20d"),
            "https_example_com_repo_git.ref=a%2Ab~c+d"
        );
        assert_eq!(query_escape("x/y%z"), "x%2Fy%25z");
    }

    #[test]
    fn test_key_sorts_query_parameters() {
        assert_eq!(
            key("git::https://example.com/repo.git@f.yaml?ref=v1&depth=1"),
            key("git::https://example.com/repo.git@f.yaml?depth=1&ref=v1")
        );
    }

    #[test]
    fn test_sanitize_double_slash() {
        assert_eq!(sanitize("https://a.b//c"), "https_a_b_c");
    }

    #[test]
    fn test_encode_query_escapes_values() {
        assert_eq!(encode_query("q=a b&x=1"), vec!["q=a+b", "x=1"]);
    }
}
