//! Request parameters and their normalization.
//!
//! Callers describe a request with [`RawParams`], either through its fluent
//! setters or from dynamic JSON via [`RawParams::from_json`]. [`normalize`] is
//! the single validation boundary: it produces an immutable [`Parameters`]
//! value or a [`ValidationError`], never both, and never mutates its input.
//!
//! # Examples
//!
//! ```
//! use unifetch::params::{normalize, RawParams};
//!
//! let params = normalize(
//!     RawParams::new("http://example.com/items?page=1#list")
//!         .method("post")
//!         .query("sort", "name")
//!         .header("X-Trace", "abc"),
//! )
//! .unwrap();
//!
//! // Caller casing is preserved.
//! assert_eq!(params.method(), "post");
//! assert_eq!(params.url(), "http://example.com/items?page=1&sort=name#list");
//! assert_eq!(params.headers().get_str("x-trace"), Some("abc"));
//! ```

use crate::client::{BodyStream, BoxError};
use crate::error::ValidationError;
use crate::protocol::constants::{APPLICATION_JSON, CONTENT_TYPE, DEFAULT_METHOD};
use crate::protocol::{with_query, HeaderFields, HeaderValue, QueryValue};
use bytes::Bytes;
use futures::{TryStream, TryStreamExt};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Outgoing request body.
#[derive(Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// Text, sent as UTF-8.
    Text(String),
    /// Raw bytes.
    Bytes(Bytes),
    /// Piped to the transport chunk by chunk. Single use.
    Stream(BodyStream),
    /// Structured value awaiting JSON encoding by [`params_to_json`].
    Json(Value),
}

impl RequestBody {
    /// Wrap any fallible byte stream as a request body.
    pub fn stream<S>(stream: S) -> Self
    where
        S: TryStream + Send + Sync + 'static,
        S::Ok: Into<Bytes>,
        S::Error: Into<BoxError>,
    {
        RequestBody::Stream(Box::pin(
            stream
                .into_stream()
                .map_ok(Into::<Bytes>::into)
                .map_err(Into::<BoxError>::into),
        ))
    }

    /// Whether there is nothing to send.
    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Empty => true,
            RequestBody::Text(s) => s.is_empty(),
            RequestBody::Bytes(b) => b.is_empty(),
            RequestBody::Stream(_) | RequestBody::Json(_) => false,
        }
    }

    /// Copy the body, or `None` for a stream, which can be read only once.
    pub fn try_clone(&self) -> Option<RequestBody> {
        match self {
            RequestBody::Empty => Some(RequestBody::Empty),
            RequestBody::Text(s) => Some(RequestBody::Text(s.clone())),
            RequestBody::Bytes(b) => Some(RequestBody::Bytes(b.clone())),
            RequestBody::Json(v) => Some(RequestBody::Json(v.clone())),
            RequestBody::Stream(_) => None,
        }
    }

    /// Short shape name used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestBody::Empty => "empty",
            RequestBody::Text(_) => "text",
            RequestBody::Bytes(_) => "bytes",
            RequestBody::Stream(_) => "stream",
            RequestBody::Json(_) => "json",
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Text(s) => f.debug_tuple("Text").field(s).finish(),
            RequestBody::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            RequestBody::Stream(_) => f.write_str("Stream(..)"),
            RequestBody::Json(v) => f.debug_tuple("Json").field(v).finish(),
        }
    }
}

impl From<String> for RequestBody {
    fn from(s: String) -> Self {
        RequestBody::Text(s)
    }
}

impl From<&str> for RequestBody {
    fn from(s: &str) -> Self {
        RequestBody::Text(s.to_owned())
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(v: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(v))
    }
}

impl From<Bytes> for RequestBody {
    fn from(b: Bytes) -> Self {
        RequestBody::Bytes(b)
    }
}

impl From<Value> for RequestBody {
    fn from(v: Value) -> Self {
        RequestBody::Json(v)
    }
}

/// Unvalidated request descriptor.
#[derive(Debug, Default)]
pub struct RawParams {
    /// HTTP method, `GET` when absent.
    pub method: Option<String>,
    /// Absolute URL, or a path resolved against a client's base URL.
    pub url: Option<String>,
    /// Query pairs merged into the URL, in this order.
    pub query: Vec<(String, QueryValue)>,
    /// Basic auth user.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
    /// Timeout in milliseconds; `0` or absent disables it.
    pub timeout_ms: Option<u64>,
    /// Request headers; `None` values are dropped.
    pub headers: Vec<(String, Option<HeaderValue>)>,
    /// Request body.
    pub body: Option<RequestBody>,
}

impl RawParams {
    /// Start a descriptor for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        RawParams {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Set the method. Casing is kept as given.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Append a query entry.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.headers.push((name.into(), Some(value.into())));
        self
    }

    /// Set basic auth credentials.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the timeout in milliseconds.
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Set the body.
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a structured body for JSON encoding.
    pub fn json(mut self, value: Value) -> Self {
        self.body = Some(RequestBody::Json(value));
        self
    }

    /// Read a descriptor from untyped JSON, checking the shape of every field.
    ///
    /// ```
    /// use serde_json::json;
    /// use unifetch::error::ValidationError;
    /// use unifetch::params::RawParams;
    ///
    /// let raw = RawParams::from_json(&json!({"url": "/", "query": {"a": [1, 2]}})).unwrap();
    /// assert_eq!(raw.query.len(), 1);
    ///
    /// let err = RawParams::from_json(&json!({"url": "/", "method": 5})).unwrap_err();
    /// assert_eq!(err, ValidationError::MethodNotString);
    /// ```
    pub fn from_json(value: &Value) -> Result<RawParams, ValidationError> {
        let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;
        let mut raw = RawParams::default();

        raw.url = optional_string(obj.get("url"), ValidationError::UrlNotString)?;
        raw.method = optional_string(obj.get("method"), ValidationError::MethodNotString)?;
        raw.username = optional_string(obj.get("username"), ValidationError::CredentialsNotString)?;
        raw.password = optional_string(obj.get("password"), ValidationError::CredentialsNotString)?;

        raw.timeout_ms = match obj.get("timeout") {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.as_u64().ok_or(ValidationError::InvalidTimeout)?),
        };

        match obj.get("query") {
            None | Some(Value::Null) => {}
            Some(Value::Object(query)) => {
                for (key, value) in query {
                    raw.query.push((key.clone(), query_value_from_json(key, value)?));
                }
            }
            Some(_) => return Err(ValidationError::InvalidQueryValue("query".to_string())),
        }

        match obj.get("headers") {
            None | Some(Value::Null) => {}
            Some(Value::Object(headers)) => {
                for (name, value) in headers {
                    raw.headers.push((name.clone(), header_value_from_json(name, value)?));
                }
            }
            Some(_) => return Err(ValidationError::InvalidHeaderValue("headers".to_string())),
        }

        raw.body = match obj.get("body") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(RequestBody::Text(s.clone())),
            Some(v @ (Value::Object(_) | Value::Array(_))) => Some(RequestBody::Json(v.clone())),
            Some(_) => return Err(ValidationError::InvalidBody),
        };

        Ok(raw)
    }
}

fn optional_string(
    value: Option<&Value>,
    err: ValidationError,
) -> Result<Option<String>, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(err),
    }
}

fn scalar_from_json(value: &Value) -> Option<QueryValue> {
    match value {
        Value::Null => Some(QueryValue::Null),
        Value::String(s) => Some(QueryValue::Scalar(s.clone())),
        Value::Number(n) => Some(QueryValue::Scalar(n.to_string())),
        Value::Bool(b) => Some(QueryValue::Scalar(b.to_string())),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn query_value_from_json(key: &str, value: &Value) -> Result<QueryValue, ValidationError> {
    let invalid = || ValidationError::InvalidQueryValue(key.to_string());
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| scalar_from_json(item).ok_or_else(invalid))
            .collect::<Result<Vec<_>, _>>()
            .map(QueryValue::List),
        other => scalar_from_json(other).ok_or_else(invalid),
    }
}

fn header_value_from_json(name: &str, value: &Value) -> Result<Option<HeaderValue>, ValidationError> {
    let invalid = || ValidationError::InvalidHeaderValue(name.to_string());
    let text = |v: &Value| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    };
    match value {
        Value::Null => Ok(None),
        Value::Array(items) => items
            .iter()
            .map(|item| text(item).ok_or_else(invalid))
            .collect::<Result<Vec<_>, _>>()
            .map(|vs| Some(HeaderValue::Multi(vs))),
        other => text(other).map(|s| Some(HeaderValue::Single(s))).ok_or_else(invalid),
    }
}

/// Canonical, validated request descriptor.
///
/// Built only by [`normalize`]; transforms such as [`params_to_json`] return
/// a new value.
#[derive(Debug)]
pub struct Parameters {
    method: String,
    url: String,
    username: Option<String>,
    password: Option<String>,
    timeout: Option<Duration>,
    headers: HeaderFields,
    body: RequestBody,
}

impl Parameters {
    /// Method exactly as the caller wrote it.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// URL with the query merged in.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Basic auth user.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Basic auth password.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Timeout, `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Request headers, lowercased.
    pub fn headers(&self) -> &HeaderFields {
        &self.headers
    }

    /// Request body.
    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    /// Copy, or `None` if the body is a stream.
    pub fn try_clone(&self) -> Option<Parameters> {
        Some(Parameters {
            body: self.body.try_clone()?,
            ..self.clone_without_body()
        })
    }

    /// Copy with the body when it can be copied, otherwise with no body.
    pub fn retained(&self) -> Parameters {
        Parameters {
            body: self.body.try_clone().unwrap_or_default(),
            ..self.clone_without_body()
        }
    }

    /// Split off the body for sending.
    pub fn into_body(self) -> (Parameters, RequestBody) {
        let rest = self.clone_without_body();
        (rest, self.body)
    }

    /// Return a copy with `url` replaced.
    pub(crate) fn with_url(mut self, url: String) -> Parameters {
        self.url = url;
        self
    }

    /// Return a copy with `name` set, replacing any existing value.
    pub fn with_header(mut self, name: &str, value: impl Into<HeaderValue>) -> Parameters {
        self.headers.set(name, value);
        self
    }

    /// Return a copy with `name` set only if it is absent.
    pub fn with_default_header(mut self, name: &str, value: impl Into<HeaderValue>) -> Parameters {
        if !self.headers.contains(name) {
            self.headers.set(name, value);
        }
        self
    }

    /// Return a copy with a different timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Parameters {
        self.timeout = timeout;
        self
    }

    fn clone_without_body(&self) -> Parameters {
        Parameters {
            method: self.method.clone(),
            url: self.url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            timeout: self.timeout,
            headers: self.headers.clone(),
            body: RequestBody::Empty,
        }
    }
}

/// Validate and default a raw descriptor.
///
/// - `method` defaults to `GET`; other values must be HTTP tokens and keep
///   their casing.
/// - `url` must be present and non-empty; `query` is merged into it.
/// - `None` header values are dropped; repeated names fold into lists.
/// - A zero timeout means none.
pub fn normalize(raw: RawParams) -> Result<Parameters, ValidationError> {
    let url = raw
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or(ValidationError::MissingUrl)?;

    match url::Url::parse(&url) {
        Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => {}
        Err(e) => {
            return Err(ValidationError::InvalidUrl {
                url,
                reason: e.to_string(),
            })
        }
    }

    let method = match raw.method {
        None => DEFAULT_METHOD.to_string(),
        Some(m) => {
            http::Method::from_bytes(m.as_bytes())
                .map_err(|_| ValidationError::InvalidMethod(m.clone()))?;
            m
        }
    };

    for (key, value) in &raw.query {
        if !value.is_encodable() {
            return Err(ValidationError::InvalidQueryValue(key.clone()));
        }
    }
    let url = with_query(&url, &raw.query);

    let mut headers = HeaderFields::new();
    for (name, value) in raw.headers {
        let Some(value) = value else { continue };
        http::HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|_| ValidationError::InvalidHeaderName(name.clone()))?;
        for v in value.values() {
            http::HeaderValue::from_str(v)
                .map_err(|_| ValidationError::InvalidHeaderValue(name.clone()))?;
            headers.append(&name, v.clone());
        }
    }

    Ok(Parameters {
        method,
        url,
        username: raw.username,
        password: raw.password,
        timeout: raw.timeout_ms.filter(|ms| *ms > 0).map(Duration::from_millis),
        headers,
        body: raw.body.unwrap_or_default(),
    })
}

/// JSON-encode the body and force `content-type: application/json`.
///
/// Structured values and text are serialized; an empty body stays empty.
/// Bytes and streams have no JSON form and are rejected.
pub fn params_to_json(params: Parameters) -> Result<Parameters, ValidationError> {
    let (params, body) = params.into_body();
    let body = match body {
        RequestBody::Empty => RequestBody::Empty,
        RequestBody::Json(v) => RequestBody::Text(v.to_string()),
        RequestBody::Text(s) => RequestBody::Text(Value::String(s).to_string()),
        RequestBody::Bytes(_) | RequestBody::Stream(_) => {
            return Err(ValidationError::BodyNotJson)
        }
    };
    Ok(Parameters {
        body,
        ..params.with_header(CONTENT_TYPE, APPLICATION_JSON)
    })
}
