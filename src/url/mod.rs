//! URL handling module for Pagepack
//!
//! This module provides URL normalization, origin comparison, and scheme
//! classification. Normalized URLs are the identity keys for the crawler's
//! visited set, the path mapper, and the manifest.

mod normalize;

pub use normalize::normalize_url;

use url::Url;

/// Classification of a raw reference string by its scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemeClass {
    /// http/https - may be fetched and localized
    Fetchable,
    /// mailto:, javascript:, tel:, data:, blob:, about: - passed through
    /// verbatim by the rewriter, never fetched
    Opaque,
}

/// Classifies a raw reference string before any resolution happens
///
/// Relative references (no scheme) classify as `Fetchable` because they
/// resolve against an http(s) base. Fragment-only references are opaque:
/// they point into the document that contains them.
pub fn classify_scheme(raw: &str) -> SchemeClass {
    let raw = raw.trim();

    if raw.starts_with('#') {
        return SchemeClass::Opaque;
    }

    // A scheme is everything before the first ':' when that prefix is a
    // valid scheme name. "foo/bar:baz" has no scheme.
    let Some(colon) = raw.find(':') else {
        return SchemeClass::Fetchable;
    };
    let prefix = &raw[..colon];
    if prefix.is_empty()
        || !prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
        || prefix.contains('/')
    {
        return SchemeClass::Fetchable;
    }

    match prefix.to_ascii_lowercase().as_str() {
        "http" | "https" => SchemeClass::Fetchable,
        _ => SchemeClass::Opaque,
    }
}

/// Returns true if two URLs share scheme, host, and port
///
/// Both URLs are expected to be normalized already, so host case and
/// default ports have been taken care of by `normalize_url`.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme() && a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}
