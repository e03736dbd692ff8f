//! Canonical response value and the stages that materialize its body.
//!
//! Every request ends in exactly one [`Reason`], and every reason produces
//! the same [`Response`] shape:
//!
//! | Reason | `status` | `status_text` | `ok` | `body` |
//! |--------|----------|---------------|------|--------|
//! | `Load` | from the server | canonical reason phrase | 2xx | stream or text |
//! | `Error` | 0 | error description | false | empty |
//! | `Timeout` | 408 | `request timeout` | false | empty |
//! | `Abort` | 0 | `aborted by client` | false | empty |
//! | `RemoteAbort` | 0 | `aborted by remote` | false | empty |
//!
//! Bodies then move forward through the pipeline and never back:
//!
//! ```text
//! Stream ──to_complete──▶ Bytes ──to_string──▶ Text ──from_json──▶ Json
//! ```
//!
//! # Module Organization
//!
//! ```text
//! response/
//! ├── lifecycle - terminal-signal state machine, RequestHandle, PendingRequest
//! └── pipeline  - to_complete, to_string, from_json, only_ok, only_complete
//! ```

mod lifecycle;
mod pipeline;

pub use lifecycle::{LifecycleState, PendingRequest, RequestHandle};
pub(crate) use lifecycle::{spawn_lifecycle, Loaded, Signal};
pub use pipeline::{
    from_json, from_json_if_json, only_complete, only_ok, to_complete, to_string,
};

use crate::client::{is_success_status, BodyStream};
use crate::error::Result;
use crate::params::Parameters;
use crate::protocol::HeaderFields;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// Why a request left the in-flight state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    /// A response was received.
    Load,
    /// The transport reported a failure.
    Error,
    /// The configured timeout elapsed first.
    Timeout,
    /// The caller aborted through the [`RequestHandle`].
    Abort,
    /// The peer closed the connection before responding.
    RemoteAbort,
}

impl Reason {
    /// Status reported for a terminal signal that carries no response.
    pub fn synthetic_status(self) -> u16 {
        match self {
            Reason::Timeout => 408,
            _ => 0,
        }
    }

    /// Status text reported for a terminal signal that carries no response.
    pub fn synthetic_status_text(self) -> &'static str {
        match self {
            Reason::Load | Reason::Error => "",
            Reason::Timeout => "request timeout",
            Reason::Abort => "aborted by client",
            Reason::RemoteAbort => "aborted by remote",
        }
    }

    /// Lower-camel name, matching how the reason is logged.
    pub fn as_str(self) -> &'static str {
        match self {
            Reason::Load => "load",
            Reason::Error => "error",
            Reason::Timeout => "timeout",
            Reason::Abort => "abort",
            Reason::RemoteAbort => "remoteAbort",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response body in exactly one representation.
#[derive(Default)]
pub enum Body {
    /// Nothing was received.
    #[default]
    Empty,
    /// Live stream, not yet drained.
    Stream(BodyStream),
    /// Fully buffered bytes.
    Bytes(Bytes),
    /// Fully buffered text.
    Text(String),
    /// Decoded JSON.
    Json(Value),
}

impl Body {
    /// Whether the body still needs draining.
    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_))
    }

    /// The text form, if the body is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The raw bytes, if the body is bytes or text.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Body::Bytes(b) => Some(b),
            Body::Text(s) => Some(s.as_bytes()),
            Body::Empty => Some(&[]),
            Body::Stream(_) | Body::Json(_) => None,
        }
    }

    /// The decoded value, if the body is JSON.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Body::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Short shape name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Body::Empty => "empty",
            Body::Stream(_) => "stream",
            Body::Bytes(_) => "bytes",
            Body::Text(_) => "text",
            Body::Json(_) => "json",
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Stream(_) => f.write_str("Stream(..)"),
            Body::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            Body::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Body::Json(v) => f.debug_tuple("Json").field(v).finish(),
        }
    }
}

/// Outcome of one request, whatever ended it.
///
/// Pipeline stages consume a response and return a new one; nothing is
/// shared between stages.
#[derive(Debug)]
pub struct Response {
    /// Handle of the request, for correlation. Aborting it now is a no-op.
    pub handle: RequestHandle,
    /// Terminal cause.
    pub reason: Reason,
    /// `reason == Load` and `status` in 200..=299.
    pub ok: bool,
    /// The body is fully materialized.
    pub complete: bool,
    /// HTTP status, 0 when no response was received.
    pub status: u16,
    /// Reason phrase or synthesized description.
    pub status_text: String,
    /// Response headers, lowercased.
    pub headers: HeaderFields,
    /// Response body.
    pub body: Body,
    /// Text the JSON body was decoded from.
    pub body_text: Option<String>,
    /// The request that produced this response. Stream bodies are not kept.
    pub params: Parameters,
}

/// `reason == Load` and `status` in 200..=299.
pub fn is_ok(reason: Reason, status: u16) -> bool {
    reason == Reason::Load && is_success_status(status)
}

impl Response {
    /// Build the response for a signal that carries no HTTP response.
    pub(crate) fn terminal(
        handle: RequestHandle,
        params: Parameters,
        reason: Reason,
        status_text: Option<String>,
    ) -> Self {
        Response {
            handle,
            reason,
            ok: false,
            complete: false,
            status: reason.synthetic_status(),
            status_text: status_text.unwrap_or_else(|| reason.synthetic_status_text().to_string()),
            headers: HeaderFields::new(),
            body: Body::Empty,
            body_text: None,
            params,
        }
    }

    /// Build the response for a received HTTP response.
    pub(crate) fn loaded(handle: RequestHandle, params: Parameters, loaded: Loaded) -> Self {
        Response {
            handle,
            reason: Reason::Load,
            ok: is_ok(Reason::Load, loaded.status),
            complete: loaded.complete,
            status: loaded.status,
            status_text: loaded.status_text,
            headers: loaded.headers,
            body: loaded.body,
            body_text: None,
            params,
        }
    }

    /// Deserialize an already decoded JSON body.
    ///
    /// Run [`to_complete`], [`to_string`] and [`from_json`] first; a body
    /// in any other representation fails with [`Error::BodyNotComplete`](crate::Error::BodyNotComplete).
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.body {
            Body::Json(v) => Ok(T::deserialize(v)?),
            _ => Err(crate::Error::BodyNotComplete),
        }
    }

    pub(crate) fn with_body(self, body: Body, complete: bool) -> Self {
        Response {
            body,
            complete,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_ok_boundaries() {
        assert!(!is_ok(Reason::Load, 199));
        assert!(is_ok(Reason::Load, 200));
        assert!(is_ok(Reason::Load, 299));
        assert!(!is_ok(Reason::Load, 300));
        assert!(!is_ok(Reason::Error, 200));
    }

    #[test]
    fn test_synthetic_fields() {
        assert_eq!(Reason::Timeout.synthetic_status(), 408);
        assert_eq!(Reason::Timeout.synthetic_status_text(), "request timeout");
        assert_eq!(Reason::Abort.synthetic_status(), 0);
        assert_eq!(Reason::Abort.synthetic_status_text(), "aborted by client");
        assert_eq!(Reason::RemoteAbort.synthetic_status_text(), "aborted by remote");
        assert_eq!(Reason::RemoteAbort.to_string(), "remoteAbort");
    }

    #[test]
    fn test_body_views() {
        assert_eq!(Body::Text("hi".into()).as_bytes(), Some(&b"hi"[..]));
        assert_eq!(Body::Empty.as_bytes(), Some(&b""[..]));
        assert!(Body::Json(Value::Null).as_bytes().is_none());
        assert_eq!(Body::Bytes(Bytes::from_static(b"x")).kind(), "bytes");
    }
}
