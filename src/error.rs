//! Error types for request construction, transport and body handling.
//!
//! The taxonomy mirrors where a failure is detected:
//!
//! | Variant | Raised by | When |
//! |---------|-----------|------|
//! | [`Error::Validation`] | [`normalize`](crate::params::normalize) | malformed parameters |
//! | [`Error::Transport`] / [`Error::UnsupportedBody`] | transport `open` | native request could not be built |
//! | [`Error::Network`] | streaming wait | connection never established |
//! | [`Error::RequestBody`] | streaming wait | request body stream failed mid-send |
//! | [`Error::BodyDrain`] | [`to_complete`](crate::response::to_complete) | response body stream failed |
//! | [`Error::Decode`] | [`from_json`](crate::response::from_json) | malformed JSON |
//! | [`Error::Response`] | [`only_ok`](crate::response::only_ok) | caller opted into non-2xx errors |
//!
//! Non-2xx statuses are never errors on their own.

use crate::client::preview;
use crate::response::{Body, Response};
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure surfaced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Parameters failed validation at the normalization boundary.
    #[error("invalid parameters: {0}")]
    Validation(#[from] ValidationError),

    /// The native request could not be created or opened.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request body shape is not accepted by the selected transport.
    #[error("unsupported request body: {0}")]
    UnsupportedBody(&'static str),

    /// Connection-level failure reported by the streaming transport.
    #[error("network error: {0}")]
    Network(String),

    /// Request body stream failed while being sent.
    #[error("request body error: {0}")]
    RequestBody(String),

    /// Response body stream failed while being drained.
    #[error("failed to read response body: {0}")]
    BodyDrain(String),

    /// A stage needed a materialized body but found a live stream.
    #[error("response body has not been completed")]
    BodyNotComplete,

    /// Body text is not valid JSON.
    #[error("failed to decode JSON body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Raised by the ok/complete assertion combinators.
    #[error(transparent)]
    Response(#[from] ResponseError),
}

impl Error {
    /// The response attached to a [`ResponseError`], if this is one.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Error::Response(e) => Some(e.response()),
            _ => None,
        }
    }
}

/// A malformed request descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// `url` absent or empty.
    #[error("url is required")]
    MissingUrl,
    /// `url` present with a non-string shape.
    #[error("url must be a string")]
    UrlNotString,
    /// `url` could not be parsed or resolved.
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl {
        /// The URL as given.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
    /// `method` present with a non-string shape.
    #[error("method must be a string")]
    MethodNotString,
    /// `method` is not an HTTP token.
    #[error("invalid method {0:?}")]
    InvalidMethod(String),
    /// Query value is an object or a nested list.
    #[error("query value for {0:?} must be a scalar, date or list of those")]
    InvalidQueryValue(String),
    /// Header name is not a valid token.
    #[error("invalid header {0:?}")]
    InvalidHeaderName(String),
    /// Header value has a bad shape or contains forbidden bytes.
    #[error("invalid value for header {0:?}")]
    InvalidHeaderValue(String),
    /// `timeout` is negative or not a number.
    #[error("timeout must be a non-negative number of milliseconds")]
    InvalidTimeout,
    /// `body` has a shape no transport accepts.
    #[error("body must be a string, bytes, a stream or a JSON structure")]
    InvalidBody,
    /// `body` is bytes or a stream, which have no JSON encoding.
    #[error("body cannot be encoded as JSON")]
    BodyNotJson,
    /// `username` or `password` present with a non-string shape.
    #[error("credentials must be strings")]
    CredentialsNotString,
    /// Dynamic parameters were not a JSON object.
    #[error("parameters must be an object")]
    NotAnObject,
}

/// Error produced from a response that failed an assertion combinator.
///
/// The message always carries the status (when one was received) and at most
/// [`PREVIEW_LIMIT`](crate::client::PREVIEW_LIMIT) characters of a textual body.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ResponseError {
    status: u16,
    status_text: String,
    message: String,
    response: Box<Response>,
}

impl ResponseError {
    /// Build the error from the response that triggered it.
    pub fn new(response: Response) -> Self {
        let head = if response.status != 0 {
            format!("request failed with status {}", response.status)
        } else {
            format!("request failed ({})", response.reason)
        };
        let head = if response.status_text.is_empty() {
            head
        } else {
            format!("{}: {}", head, response.status_text)
        };
        let message = match &response.body {
            Body::Text(text) if !text.is_empty() => format!("{}\n{}", head, preview(text)),
            _ => head,
        };

        ResponseError {
            status: response.status,
            status_text: response.status_text.clone(),
            message,
            response: Box::new(response),
        }
    }

    /// Status copied from the response.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Status text copied from the response.
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Bounded human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The full response that triggered the error.
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Recover the response, e.g. to inspect or retry it.
    pub fn into_response(self) -> Response {
        *self.response
    }
}
