//! URL query merging.
//!
//! [`with_query`] appends `key=value` pairs to whatever query a URL already
//! carries and keeps any fragment at the very end. Keys are visited in the
//! order the caller supplied them and list values expand into one pair per
//! element, so the output is deterministic.
//!
//! # Examples
//!
//! ```
//! use unifetch::protocol::{with_query, QueryValue};
//!
//! let url = with_query(
//!     "http://example.com/a?x=1#top",
//!     &[
//!         ("y".to_string(), QueryValue::from("two words")),
//!         ("z".to_string(), QueryValue::List(vec!["3".into(), "4".into()])),
//!     ],
//! );
//! assert_eq!(url, "http://example.com/a?x=1&y=two+words&z=3&z=4#top");
//! ```

use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use url::form_urlencoded::byte_serialize;

/// A single query value.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// Encodes as an empty string.
    Null,
    /// Encodes as its string form.
    Scalar(String),
    /// Encodes as a UTC timestamp with millisecond precision.
    Date(OffsetDateTime),
    /// One pair per element, in order. Elements must not be lists.
    List(Vec<QueryValue>),
}

impl QueryValue {
    /// Whether this value is allowed as a list element.
    pub(crate) fn is_flat(&self) -> bool {
        !matches!(self, QueryValue::List(_))
    }

    /// Whether this value can be encoded: flat, or a list of flat values.
    pub fn is_encodable(&self) -> bool {
        match self {
            QueryValue::List(items) => items.iter().all(QueryValue::is_flat),
            _ => true,
        }
    }

    fn encode_flat(&self) -> String {
        match self {
            QueryValue::Null => String::new(),
            QueryValue::Scalar(s) => s.clone(),
            QueryValue::Date(d) => format_timestamp(*d),
            // Nested lists are rejected at normalization.
            QueryValue::List(items) => items
                .iter()
                .map(QueryValue::encode_flat)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(v: &str) -> Self {
        QueryValue::Scalar(v.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(v: String) -> Self {
        QueryValue::Scalar(v)
    }
}

impl From<OffsetDateTime> for QueryValue {
    fn from(v: OffsetDateTime) -> Self {
        QueryValue::Date(v)
    }
}

impl From<i64> for QueryValue {
    fn from(v: i64) -> Self {
        QueryValue::Scalar(v.to_string())
    }
}

impl From<bool> for QueryValue {
    fn from(v: bool) -> Self {
        QueryValue::Scalar(v.to_string())
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(QueryValue::Null, Into::into)
    }
}

impl<T: Into<QueryValue>> From<Vec<T>> for QueryValue {
    fn from(vs: Vec<T>) -> Self {
        QueryValue::List(vs.into_iter().map(Into::into).collect())
    }
}

/// Format a date the way query strings carry it: millisecond-precision UTC,
/// e.g. `2017-03-04T05:06:07.089Z`.
pub fn format_timestamp(date: OffsetDateTime) -> String {
    date.to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
        ))
        .unwrap_or_default()
}

fn escape(s: &str) -> String {
    byte_serialize(s.as_bytes()).collect()
}

/// Encode query pairs as `k=v&k=v` without a leading separator.
pub fn encode_query(query: &[(String, QueryValue)]) -> String {
    let mut pairs = Vec::new();
    for (key, value) in query {
        let key = escape(key);
        match value {
            QueryValue::List(items) => {
                for item in items {
                    pairs.push(format!("{}={}", key, escape(&item.encode_flat())));
                }
            }
            flat => pairs.push(format!("{}={}", key, escape(&flat.encode_flat()))),
        }
    }
    pairs.join("&")
}

/// Merge `query` into `url`, before any fragment.
///
/// Works on absolute and relative URLs alike. An empty `query` (or one whose
/// lists are all empty) returns `url` unchanged.
pub fn with_query(url: &str, query: &[(String, QueryValue)]) -> String {
    let encoded = encode_query(query);
    if encoded.is_empty() {
        return url.to_string();
    }

    let (base, fragment) = match url.find('#') {
        Some(pos) => url.split_at(pos),
        None => (url, ""),
    };

    let separator = match base.find('?') {
        None => "?",
        Some(pos) if pos + 1 == base.len() => "",
        Some(_) if base.ends_with('&') => "",
        Some(_) => "&",
    };

    format!("{}{}{}{}", base, separator, encoded, fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn q(pairs: Vec<(&str, QueryValue)>) -> Vec<(String, QueryValue)> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_with_query_appends_before_fragment() {
        let date = datetime!(2017-01-01 0:00 UTC);
        let query = q(vec![
            ("six", "thirteen".into()),
            ("eight", QueryValue::List(vec!["fourteen".into(), date.into()])),
        ]);
        let url = with_query("http://example.com/path?six=seven&eight=nine#frag", &query);
        assert_eq!(
            url,
            "http://example.com/path?six=seven&eight=nine&six=thirteen&eight=fourteen\
             &eight=2017-01-01T00%3A00%3A00.000Z#frag"
        );
    }

    #[test]
    fn test_with_query_no_existing_query() {
        let url = with_query("/search", &q(vec![("term", "rust lang".into())]));
        assert_eq!(url, "/search?term=rust+lang");
    }

    #[test]
    fn test_with_query_trailing_question_mark() {
        let url = with_query("/a?", &q(vec![("k", "v".into())]));
        assert_eq!(url, "/a?k=v");
    }

    #[test]
    fn test_list_expands_in_order() {
        let values: Vec<QueryValue> = (0..5).map(|i| QueryValue::from(i as i64)).collect();
        let url = with_query("/", &q(vec![("n", QueryValue::List(values))]));
        assert_eq!(url.matches("n=").count(), 5);
        assert_eq!(url, "/?n=0&n=1&n=2&n=3&n=4");
    }

    #[test]
    fn test_null_encodes_empty() {
        let url = with_query("/", &q(vec![("a", QueryValue::Null), ("b", None::<String>.into())]));
        assert_eq!(url, "/?a=&b=");
    }

    #[test]
    fn test_empty_query_is_identity() {
        assert_eq!(with_query("/x#y", &[]), "/x#y");
        let url = with_query("/x", &q(vec![("k", QueryValue::List(vec![]))]));
        assert_eq!(url, "/x");
    }

    #[test]
    fn test_escapes_reserved_characters() {
        let url = with_query("/", &q(vec![("a&b", "c=d#e".into())]));
        assert_eq!(url, "/?a%26b=c%3Dd%23e");
    }

    #[test]
    fn test_timestamp_converts_to_utc() {
        let date = datetime!(2020-06-15 12:30:45.123 +02:00);
        assert_eq!(format_timestamp(date), "2020-06-15T10:30:45.123Z");
    }

    #[test]
    fn test_is_encodable_rejects_nested_lists() {
        let nested = QueryValue::List(vec![QueryValue::List(vec![])]);
        assert!(!nested.is_encodable());
        assert!(QueryValue::List(vec!["a".into(), QueryValue::Null]).is_encodable());
    }
}
