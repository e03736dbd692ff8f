//! Pure codecs shared by every transport.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`headers`] | Raw header blob parsing, case-insensitive multi-value dictionary |
//! | [`query`] | Query merging into URLs, timestamp formatting |

pub mod headers;
pub mod query;

pub use headers::{format_headers, parse_headers, HeaderFields, HeaderValue};
pub use query::{encode_query, format_timestamp, with_query, QueryValue};

use regex::Regex;
use std::sync::LazyLock;

/// Header names and values used across the crate.
pub mod constants {
    /// `content-type` header name.
    pub const CONTENT_TYPE: &str = "content-type";
    /// Media type set by JSON encoding.
    pub const APPLICATION_JSON: &str = "application/json";
    /// Method used when none is given.
    pub const DEFAULT_METHOD: &str = "GET";
}

static JSON_MEDIA_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*application/(?:[a-z0-9.!#$&^_-]+\+)?json\s*(?:;|$)")
        .expect("static regex is valid")
});

/// Whether a `content-type` value names JSON.
///
/// Accepts `application/json` and structured `+json` suffixes, with or
/// without parameters.
///
/// ```
/// use unifetch::protocol::is_json_content_type;
///
/// assert!(is_json_content_type("application/json; charset=utf-8"));
/// assert!(is_json_content_type("application/problem+json"));
/// assert!(!is_json_content_type("text/json-ish"));
/// ```
pub fn is_json_content_type(value: &str) -> bool {
    JSON_MEDIA_TYPE.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_json_content_type() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("Application/JSON"));
        assert!(is_json_content_type("application/vnd.api+json;charset=utf-8"));
        assert!(!is_json_content_type("application/jsonp"));
        assert!(!is_json_content_type("text/plain"));
        assert!(!is_json_content_type(""));
    }
}
