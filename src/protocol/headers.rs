//! Header parsing and formatting.
//!
//! Header names are case-insensitive, so every [`HeaderFields`] key is stored
//! lowercased. A name that appears more than once folds into a list:
//!
//! | Input lines | Stored value |
//! |-------------|--------------|
//! | `X-Foo: a` | `Single("a")` |
//! | `X-Foo: a` + `x-foo: b` | `Multi(["a", "b"])` |
//! | `X-Foo: a` + `x-foo: b` + `X-FOO: c` | `Multi(["a", "b", "c"])` |
//!
//! # Examples
//!
//! ```
//! use unifetch::protocol::{parse_headers, HeaderValue};
//!
//! let headers = parse_headers("X-Foo: a\nx-foo: b");
//! assert_eq!(headers.len(), 1);
//! assert_eq!(
//!     headers.get("x-foo"),
//!     Some(&HeaderValue::Multi(vec!["a".into(), "b".into()]))
//! );
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A header value: one occurrence or several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    /// The header appeared once.
    Single(String),
    /// The header appeared repeatedly, in arrival order.
    Multi(Vec<String>),
}

impl HeaderValue {
    /// All occurrences in order.
    pub fn values(&self) -> &[String] {
        match self {
            HeaderValue::Single(v) => std::slice::from_ref(v),
            HeaderValue::Multi(vs) => vs,
        }
    }

    /// First occurrence, if any.
    pub fn first(&self) -> Option<&str> {
        self.values().first().map(String::as_str)
    }

    /// Occurrences joined with `", "`, the HTTP list form.
    pub fn joined(&self) -> String {
        self.values().join(", ")
    }

    fn push(&mut self, value: String) {
        match self {
            HeaderValue::Single(existing) => {
                let first = std::mem::take(existing);
                *self = HeaderValue::Multi(vec![first, value]);
            }
            HeaderValue::Multi(vs) => vs.push(value),
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(v: &str) -> Self {
        HeaderValue::Single(v.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(v: String) -> Self {
        HeaderValue::Single(v)
    }
}

impl From<Vec<String>> for HeaderValue {
    fn from(vs: Vec<String>) -> Self {
        HeaderValue::Multi(vs)
    }
}

/// Case-insensitive header dictionary with multi-value folding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderFields(BTreeMap<String, HeaderValue>);

impl HeaderFields {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        HeaderFields(BTreeMap::new())
    }

    /// Append an occurrence, folding repeats into a list.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        let key = header_key(name);
        let value = value.into();
        match self.0.get_mut(&key) {
            Some(existing) => existing.push(value),
            None => {
                self.0.insert(key, HeaderValue::Single(value));
            }
        }
    }

    /// Replace whatever is stored under `name`.
    pub fn set(&mut self, name: &str, value: impl Into<HeaderValue>) {
        self.0.insert(header_key(name), value.into());
    }

    /// Look up a header by name, in any casing.
    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.0.get(&header_key(name))
    }

    /// First occurrence of a header, in any casing.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(HeaderValue::first)
    }

    /// Remove a header, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<HeaderValue> {
        self.0.remove(&header_key(name))
    }

    /// Whether a header is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&header_key(name))
    }

    /// Iterate `(lowercase name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no headers are stored.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Storage key for a header name: trimmed and lowercased.
fn header_key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

impl From<&http::HeaderMap> for HeaderFields {
    fn from(map: &http::HeaderMap) -> Self {
        let mut fields = HeaderFields::new();
        for (name, value) in map {
            fields.append(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
        }
        fields
    }
}

/// Parse a raw newline-delimited header blob.
///
/// Each line is `name: value`. A line without a colon is a name with an empty
/// value. Blank lines and lines with an empty name are skipped. Both `\n` and `\r\n` line endings work.
pub fn parse_headers(raw: &str) -> HeaderFields {
    let mut fields = HeaderFields::new();

    for line in raw.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        match line.find(':') {
            Some(colon_pos) if line[..colon_pos].trim().is_empty() => continue,
            Some(colon_pos) => {
                fields.append(&line[..colon_pos], line[colon_pos + 1..].trim());
            }
            None => fields.append(line, ""),
        }
    }

    fields
}

/// Register every header occurrence with a transport.
///
/// List values expand into one `sink` call per element, in order. Empty lists
/// register nothing. The first error from `sink` stops registration.
pub fn format_headers<E, F>(fields: &HeaderFields, mut sink: F) -> Result<(), E>
where
    F: FnMut(&str, &str) -> Result<(), E>,
{
    for (name, value) in fields.iter() {
        for v in value.values() {
            sink(name, v)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_headers_folds_case_insensitive_repeats() {
        let headers = parse_headers("X-Foo: a\nx-foo: b");
        assert_eq!(headers.len(), 1);
        assert_eq!(
            headers.get("x-foo"),
            Some(&HeaderValue::Multi(vec!["a".into(), "b".into()]))
        );
    }

    #[test]
    fn test_parse_headers_third_repeat_pushes() {
        let headers = parse_headers("A: 1\r\na: 2\r\nA: 3\r\n");
        assert_eq!(headers.get("a").unwrap().values(), ["1", "2", "3"]);
    }

    #[test]
    fn test_parse_headers_missing_value() {
        let headers = parse_headers("X-Empty:\nX-Bare\n\nContent-Type: text/plain");
        assert_eq!(headers.get_str("x-empty"), Some(""));
        assert_eq!(headers.get_str("x-bare"), Some(""));
        assert_eq!(headers.get_str("Content-Type"), Some("text/plain"));
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn test_parse_headers_value_keeps_inner_colons() {
        let headers = parse_headers("Location: http://example.com:8080/x");
        assert_eq!(headers.get_str("location"), Some("http://example.com:8080/x"));
    }

    #[test]
    fn test_format_headers_expands_lists() {
        let mut fields = HeaderFields::new();
        fields.set("Accept", "text/plain");
        fields.set("x-multi", vec!["one".to_string(), "two".to_string()]);
        fields.set("x-none", Vec::<String>::new());

        let mut seen = Vec::new();
        format_headers::<(), _>(&fields, |k, v| {
            seen.push((k.to_string(), v.to_string()));
            Ok(())
        })
        .unwrap();

        assert_eq!(
            seen,
            vec![
                ("accept".to_string(), "text/plain".to_string()),
                ("x-multi".to_string(), "one".to_string()),
                ("x-multi".to_string(), "two".to_string()),
            ]
        );
    }

    #[test]
    fn test_format_headers_stops_on_error() {
        let mut fields = HeaderFields::new();
        fields.set("a", "1");
        fields.set("b", "2");
        let mut calls = 0;
        let result = format_headers(&fields, |_, _| {
            calls += 1;
            Err("rejected")
        });
        assert_eq!(result, Err("rejected"));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_from_header_map() {
        let mut map = http::HeaderMap::new();
        map.append("set-cookie", "a=1".parse().unwrap());
        map.append("set-cookie", "b=2".parse().unwrap());
        map.insert("content-length", "3".parse().unwrap());

        let fields = HeaderFields::from(&map);
        assert_eq!(fields.get("Set-Cookie").unwrap().values(), ["a=1", "b=2"]);
        assert_eq!(fields.get_str("content-length"), Some("3"));
    }

    #[test]
    fn test_joined() {
        let value = HeaderValue::Multi(vec!["gzip".into(), "br".into()]);
        assert_eq!(value.joined(), "gzip, br");
        assert_eq!(HeaderValue::from("x").joined(), "x");
    }

    #[test]
    fn test_lookup_matches_padded_names() {
        let mut fields = HeaderFields::new();
        fields.set(" X-Foo ", "1");
        assert_eq!(fields.get_str(" X-Foo"), Some("1"));
        assert!(fields.contains("x-foo "));
        assert_eq!(fields.remove("\tX-FOO"), Some(HeaderValue::from("1")));
        assert!(fields.is_empty());
    }

    #[test]
    fn test_parse_headers_skips_empty_names() {
        let fields = parse_headers(": v\r\n  : w\r\nok: 1\r\n");
        assert_eq!(fields.len(), 1);
        assert!(!fields.contains(""));
        assert_eq!(fields.get_str("ok"), Some("1"));
    }
}
