//! Server-style transport.
//!
//! Responses are handed over as soon as the status line and headers arrive;
//! the body stays a live stream until the caller completes it. A connection
//! that cannot be established rejects the wait instead of producing a
//! response.

use super::body::{forward, BoxError};
use super::transport::{
    absolute_url, build_request, client_builder, native_body, NativeBody, Transport, TransportKind,
};
use super::utils::{describe_error, is_remote_close, status_text};
use crate::error::{Error, Result};
use crate::params::Parameters;
use crate::protocol::HeaderFields;
use crate::response::{spawn_lifecycle, Body, Loaded, PendingRequest, RequestHandle, Signal};
use futures::TryStreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use url::Url;

/// Response chunks read ahead of the consumer.
const RESPONSE_CHUNK_BUFFER: usize = 16;

/// Which connector a request goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Plain TCP.
    Http,
    /// TLS.
    Https,
}

/// Where a request connects and what it asks for once connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// Connector.
    pub scheme: Scheme,
    /// Host name or address.
    pub host: String,
    /// Port, defaulted from the scheme when the URL has none.
    pub port: u16,
    /// Request target: path, query and fragment.
    ///
    /// A fragment is sent as `%23` after the query when there is one, or
    /// after the path otherwise, since a raw `#` never reaches the wire.
    pub path: String,
}

impl ConnectionTarget {
    /// Resolve a parsed URL.
    pub fn resolve(url: &Url) -> Result<Self> {
        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => return Err(Error::Transport(format!("unsupported scheme {:?}", other))),
        };
        let host = url
            .host_str()
            .ok_or_else(|| Error::Transport(format!("no host in {:?}", url.as_str())))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| Error::Transport(format!("no port for {:?}", url.as_str())))?;

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        if let Some(fragment) = url.fragment() {
            path.push_str("%23");
            path.push_str(fragment);
        }

        Ok(ConnectionTarget {
            scheme,
            host,
            port,
            path,
        })
    }

    /// The URL actually requested, with the fragment folded into the target.
    fn wire_url(&self, url: &Url) -> Url {
        let mut wire = url.clone();
        wire.set_fragment(None);
        if url.fragment().is_some() {
            match self.path.split_once('?') {
                Some((path, query)) => {
                    wire.set_path(path);
                    wire.set_query(Some(query));
                }
                None => wire.set_path(&self.path),
            }
        }
        wire
    }
}

/// Streaming transport over `reqwest`.
///
/// Holds one client per scheme.
#[derive(Debug, Clone)]
pub struct StreamingTransport {
    plain: reqwest::Client,
    secure: reqwest::Client,
    enable_logging: bool,
}

impl StreamingTransport {
    /// Create the transport with logging enabled.
    pub fn new() -> Result<Self> {
        let plain = client_builder()
            .build()
            .map_err(|e| Error::Transport(describe_error(&e)))?;
        let secure = client_builder()
            .https_only(true)
            .build()
            .map_err(|e| Error::Transport(describe_error(&e)))?;
        Ok(StreamingTransport {
            plain,
            secure,
            enable_logging: true,
        })
    }

    /// Turn lifecycle `tracing` events on or off.
    pub fn with_logging(mut self, enable_logging: bool) -> Self {
        self.enable_logging = enable_logging;
        self
    }

    fn client(&self, scheme: Scheme) -> &reqwest::Client {
        match scheme {
            Scheme::Http => &self.plain,
            Scheme::Https => &self.secure,
        }
    }
}

impl Transport for StreamingTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Streaming
    }

    fn open(&self, params: Parameters) -> Result<PendingRequest> {
        let url = absolute_url(&params)?;
        let target = ConnectionTarget::resolve(&url)?;
        let client = self.client(target.scheme).clone();

        let retained = params.retained();
        let (params, body) = params.into_body();

        let body_failed = Arc::new(AtomicBool::new(false));
        let body = match native_body(body)? {
            NativeBody::Fixed(body) => body,
            NativeBody::Stream(stream) => {
                let flag = body_failed.clone();
                let stream = stream.inspect_err(move |_| flag.store(true, Ordering::SeqCst));
                Some(reqwest::Body::wrap_stream(stream))
            }
        };
        let request = build_request(&client, &params, target.wire_url(&url), body)?;

        if self.enable_logging {
            tracing::trace!(
                host = %target.host,
                port = target.port,
                "connecting for {}",
                target.path
            );
        }

        let (handle, abort_rx) = RequestHandle::new(&retained);
        let exchange = async move {
            match client.execute(request).await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let headers = HeaderFields::from(response.headers());
                    let body = forward(
                        response.bytes_stream().map_err(|e| Box::new(e) as BoxError),
                        RESPONSE_CHUNK_BUFFER,
                    );
                    Signal::Load(Loaded {
                        status,
                        status_text: status_text(status),
                        headers,
                        body: Body::Stream(body),
                        complete: false,
                    })
                }
                Err(e) if body_failed.load(Ordering::SeqCst) => {
                    Signal::Rejected(Error::RequestBody(describe_error(&e)))
                }
                Err(e) if e.is_timeout() => Signal::Timeout,
                Err(e) if e.is_connect() => Signal::Rejected(Error::Network(describe_error(&e))),
                Err(e) if is_remote_close(&e) => Signal::RemoteAbort,
                Err(e) => Signal::Rejected(Error::Network(describe_error(&e))),
            }
        };

        spawn_lifecycle(handle, abort_rx, retained, exchange, self.enable_logging)
    }
}
