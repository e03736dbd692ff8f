//! Transport adapters.
//!
//! A transport turns canonical [`Parameters`] into a started request and a
//! [`PendingRequest`]. Opening is synchronous and has I/O already in flight
//! when it returns; there is no separate "prepare" step.
//!
//! | Kind | Body on load | Network failure | Stream request body |
//! |------|--------------|-----------------|---------------------|
//! | [`TransportKind::Streaming`] | live stream, `complete = false` | rejects the wait | piped |
//! | [`TransportKind::Buffered`] | text, `complete = true` | `reason = error`, status 0 | rejected at open |
//!
//! The two differ on purpose: a buffered (browser-style) transport has no way
//! to tell "could not even connect" apart from any other failure, while the
//! streaming (server-style) one does.
//!
//! Neither follows redirects or keeps idle connections for reuse.

use super::body::BodyStream;
use super::utils::describe_error;
use crate::error::{Error, Result};
use crate::params::{Parameters, RequestBody};
use crate::protocol::format_headers;
use crate::response::PendingRequest;
use url::Url;

/// Which adapter a client uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// Server-style: streams response bodies, rejects on connection failure.
    #[default]
    Streaming,
    /// Browser-style: buffers response text, folds every failure into the response.
    Buffered,
}

/// Opens requests.
pub trait Transport: Send + Sync {
    /// Which adapter this is.
    fn kind(&self) -> TransportKind;

    /// Start the request described by `params`.
    ///
    /// Fails synchronously when the native request cannot be built, including
    /// a body shape this transport does not accept. Must be called inside a
    /// Tokio runtime.
    fn open(&self, params: Parameters) -> Result<PendingRequest>;
}

/// Native client builder shared by both transports.
///
/// Every request gets its own connection and redirects are returned to the
/// caller as they are.
pub(crate) fn client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
}

/// Parse the request URL, which must be absolute by now.
pub(crate) fn absolute_url(params: &Parameters) -> Result<Url> {
    Url::parse(params.url())
        .map_err(|e| Error::Transport(format!("cannot open {:?}: {}", params.url(), e)))
}

/// Build the native request from everything but the body.
pub(crate) fn build_request(
    client: &reqwest::Client,
    params: &Parameters,
    url: Url,
    body: Option<reqwest::Body>,
) -> Result<reqwest::Request> {
    let method = http::Method::from_bytes(params.method().as_bytes())
        .map_err(|e| Error::Transport(format!("invalid method {:?}: {}", params.method(), e)))?;

    let mut headers = http::HeaderMap::new();
    format_headers(params.headers(), |name, value| {
        let name = http::HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Transport(format!("invalid header {:?}: {}", name, e)))?;
        let value = http::HeaderValue::from_str(value)
            .map_err(|e| Error::Transport(format!("invalid value for {:?}: {}", name, e)))?;
        headers.append(name, value);
        Ok::<(), Error>(())
    })?;

    let mut builder = client.request(method, url).headers(headers);
    if let Some(username) = params.username() {
        builder = builder.basic_auth(username, params.password());
    }
    if let Some(body) = body {
        builder = builder.body(body);
    }

    builder
        .build()
        .map_err(|e| Error::Transport(describe_error(&e)))
}

/// A request body in the form the native client takes.
pub(crate) enum NativeBody {
    /// Sent in one piece, or absent.
    Fixed(Option<reqwest::Body>),
    /// Sent chunk by chunk; only the streaming transport accepts it.
    Stream(BodyStream),
}

/// Sort a request body into what can be sent as-is and what must be piped.
///
/// Structured values must be JSON-encoded before they reach a transport.
pub(crate) fn native_body(body: RequestBody) -> Result<NativeBody> {
    match body {
        RequestBody::Empty => Ok(NativeBody::Fixed(None)),
        RequestBody::Text(text) => Ok(NativeBody::Fixed(Some(reqwest::Body::from(text)))),
        RequestBody::Bytes(bytes) => Ok(NativeBody::Fixed(Some(reqwest::Body::from(bytes)))),
        RequestBody::Stream(stream) => Ok(NativeBody::Stream(stream)),
        RequestBody::Json(_) => Err(Error::UnsupportedBody(
            "structured body must be JSON-encoded before sending",
        )),
    }
}
