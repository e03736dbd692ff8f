//! Browser-style transport.
//!
//! Waits for the whole body before reporting a load, so responses arrive
//! with `complete = true` and a text body. Every failure, including one to
//! connect, becomes a response with `reason = error`; the wait never rejects.

use super::transport::{
    absolute_url, build_request, client_builder, native_body, NativeBody, Transport, TransportKind,
};
use super::utils::{describe_error, status_text};
use crate::error::{Error, Result};
use crate::params::Parameters;
use crate::protocol::parse_headers;
use crate::response::{spawn_lifecycle, Body, Loaded, PendingRequest, RequestHandle, Signal};

/// Buffered transport over `reqwest`.
#[derive(Debug, Clone)]
pub struct BufferedTransport {
    client: reqwest::Client,
    enable_logging: bool,
}

impl BufferedTransport {
    /// Create the transport with logging enabled.
    pub fn new() -> Result<Self> {
        let client = client_builder()
            .build()
            .map_err(|e| Error::Transport(describe_error(&e)))?;
        Ok(BufferedTransport {
            client,
            enable_logging: true,
        })
    }

    /// Turn lifecycle `tracing` events on or off.
    pub fn with_logging(mut self, enable_logging: bool) -> Self {
        self.enable_logging = enable_logging;
        self
    }
}

/// Render headers the way a browser exposes them: one `name: value` per line.
fn raw_headers(headers: &http::HeaderMap) -> String {
    let mut raw = String::new();
    for (name, value) in headers {
        raw.push_str(name.as_str());
        raw.push_str(": ");
        raw.push_str(&String::from_utf8_lossy(value.as_bytes()));
        raw.push_str("\r\n");
    }
    raw
}

impl Transport for BufferedTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Buffered
    }

    fn open(&self, params: Parameters) -> Result<PendingRequest> {
        let url = absolute_url(&params)?;
        let retained = params.retained();
        let (params, body) = params.into_body();
        let body = match native_body(body)? {
            NativeBody::Fixed(body) => body,
            NativeBody::Stream(_) => {
                return Err(Error::UnsupportedBody(
                    "buffered transport cannot send a streamed body",
                ))
            }
        };
        let request = build_request(&self.client, &params, url, body)?;
        let client = self.client.clone();

        let (handle, abort_rx) = RequestHandle::new(&retained);
        let exchange = async move {
            let response = match client.execute(request).await {
                Ok(response) => response,
                Err(e) if e.is_timeout() => return Signal::Timeout,
                Err(e) => return Signal::Error(describe_error(&e)),
            };

            let status = response.status().as_u16();
            let headers = parse_headers(&raw_headers(response.headers()));
            match response.text().await {
                Ok(text) => Signal::Load(Loaded {
                    status,
                    status_text: status_text(status),
                    headers,
                    body: Body::Text(text),
                    complete: true,
                }),
                Err(e) => Signal::Error(describe_error(&e)),
            }
        };

        spawn_lifecycle(handle, abort_rx, retained, exchange, self.enable_logging)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{normalize, RawParams, RequestBody};

    #[test]
    fn test_raw_headers_round_trip() {
        let mut map = http::HeaderMap::new();
        map.append("content-type", "text/plain".parse().unwrap());
        map.append("set-cookie", "a=1".parse().unwrap());
        map.append("set-cookie", "b=2".parse().unwrap());

        let raw = raw_headers(&map);
        assert!(raw.ends_with("\r\n"));

        let fields = parse_headers(&raw);
        assert_eq!(fields.get_str("content-type"), Some("text/plain"));
        assert_eq!(
            fields.get("set-cookie").unwrap().values(),
            ["a=1".to_string(), "b=2".to_string()]
        );
    }

    #[test]
    fn test_stream_body_rejected_at_open() {
        let transport = BufferedTransport::new().unwrap().with_logging(false);
        let body = RequestBody::stream(futures::stream::empty::<std::io::Result<bytes::Bytes>>());
        let params = normalize(RawParams::new("http://127.0.0.1:9/").method("POST").body(body))
            .unwrap();
        assert!(matches!(transport.open(params), Err(Error::UnsupportedBody(_))));
    }
}
