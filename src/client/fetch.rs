//! The request client.
//!
//! A [`Client`] owns one transport, one middleware chain and one
//! configuration. Nothing is shared between clients.
//!
//! # Examples
//!
//! ## Simple GET request
//!
//! ```ignore
//! use unifetch::{to_string, Client};
//!
//! #[tokio::main]
//! async fn main() -> unifetch::Result<()> {
//!     let client = Client::new()?;
//!     let response = to_string(client.get("http://example.com/").await?).await?;
//!     println!("{} {}", response.status, response.body.as_text().unwrap_or(""));
//!     Ok(())
//! }
//! ```
//!
//! ## JSON round trip against a base URL
//!
//! ```ignore
//! use unifetch::client::{Client, ClientConfig};
//! use unifetch::RawParams;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> unifetch::Result<()> {
//!     let client = Client::with_config(ClientConfig {
//!         base_url: Some("http://localhost:8080/api/".into()),
//!         ..Default::default()
//!     })?;
//!     let response = client
//!         .fetch_json(RawParams::new("items").method("POST").json(json!({"name": "x"})))
//!         .await?;
//!     println!("{:?}", response.body.as_json());
//!     Ok(())
//! }
//! ```
//!
//! ## Aborting
//!
//! ```ignore
//! let pending = client.open(RawParams::new("http://example.com/slow"))?;
//! pending.abort();
//! assert_eq!(pending.wait().await?.reason, Reason::Abort);
//! ```

use super::buffered::BufferedTransport;
use super::config::ClientConfig;
use super::middleware::{Middleware, MiddlewareChain};
use super::streaming::StreamingTransport;
use super::transport::{Transport, TransportKind};
use crate::error::{Result, ValidationError};
use crate::params::{normalize, params_to_json, Parameters, RawParams, RequestBody};
use crate::response::{from_json, to_string, PendingRequest, Response};
use std::sync::Arc;
use url::Url;

/// HTTP client over one transport.
///
/// Cloning is cheap; clones share the transport, the chain and the
/// configuration.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    middleware: MiddlewareChain,
    config: Arc<ClientConfig>,
}

impl Client {
    /// Create a client with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client with the transport named in `config`.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let transport: Arc<dyn Transport> = match config.transport {
            TransportKind::Streaming => {
                Arc::new(StreamingTransport::new()?.with_logging(config.enable_logging))
            }
            TransportKind::Buffered => {
                Arc::new(BufferedTransport::new()?.with_logging(config.enable_logging))
            }
        };
        Ok(Self::with_transport(transport, config))
    }

    /// Create a client over a caller-supplied transport.
    ///
    /// `config.transport` is ignored; the transport reports its own kind.
    pub fn with_transport(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Client {
            transport,
            middleware: MiddlewareChain::new(),
            config: Arc::new(config),
        }
    }

    /// Append a middleware to this client's chain.
    pub fn with_middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Start a request without running response hooks.
    ///
    /// Validation and transport construction errors are returned here, before
    /// any I/O. Must be called inside a Tokio runtime.
    pub fn open(&self, raw: RawParams) -> Result<PendingRequest> {
        let params = self.prepare(raw, false)?;
        self.open_prepared(params)
    }

    /// Start a request, wait for it and run response hooks.
    pub async fn fetch(&self, raw: RawParams) -> Result<Response> {
        let response = self.open(raw)?.wait().await?;
        self.middleware.on_response(response).await
    }

    /// `GET` a URL.
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.fetch(RawParams::new(url)).await
    }

    /// Send the body as JSON and decode the response body as JSON.
    ///
    /// The response body is decoded whatever its `content-type`. Non-2xx
    /// responses are returned, not raised; add [`RequireOk`](super::RequireOk)
    /// for that.
    pub async fn fetch_json(&self, raw: RawParams) -> Result<Response> {
        let params = self.prepare(raw, true)?;
        let response = self.open_prepared(params)?.wait().await?;
        let response = self.middleware.on_response(response).await?;
        from_json(to_string(response).await?)
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Which transport this client opens requests with.
    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    fn open_prepared(&self, params: Parameters) -> Result<PendingRequest> {
        let params = self.middleware.on_request(params)?;
        if self.config.enable_logging {
            tracing::debug!(
                transport = ?self.transport.kind(),
                body = params.body().kind(),
                "opening {} {}",
                params.method(),
                params.url()
            );
        }
        self.transport.open(params)
    }

    /// Apply defaults, validate and resolve against the base URL.
    ///
    /// `as_json` encodes any body as JSON; otherwise only structured bodies
    /// are encoded, and only when the configuration asks for it.
    fn prepare(&self, mut raw: RawParams, as_json: bool) -> Result<Parameters> {
        if raw.timeout_ms.is_none() && self.config.default_timeout_ms > 0 {
            raw.timeout_ms = Some(self.config.default_timeout_ms);
        }

        let mut params = normalize(raw)?;
        if let Some(url) = self.resolve_url(params.url())? {
            params = params.with_url(url);
        }
        for (name, value) in &self.config.default_headers {
            params = params.with_default_header(name, value.as_str());
        }
        let structured = matches!(params.body(), RequestBody::Json(_));
        if as_json || (self.config.encode_json_bodies && structured) {
            params = params_to_json(params)?;
        }
        Ok(params)
    }

    /// The absolute form of `url`, or `None` when it is absolute already.
    fn resolve_url(&self, url: &str) -> std::result::Result<Option<String>, ValidationError> {
        match Url::parse(url) {
            Ok(_) => Ok(None),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.config.base_url.as_deref().ok_or_else(|| {
                    ValidationError::InvalidUrl {
                        url: url.to_string(),
                        reason: "relative URL and no base URL configured".to_string(),
                    }
                })?;
                let joined = Url::parse(base)
                    .and_then(|base| base.join(url))
                    .map_err(|e| ValidationError::InvalidUrl {
                        url: url.to_string(),
                        reason: format!("cannot join to {:?}: {}", base, e),
                    })?;
                Ok(Some(joined.into()))
            }
            Err(e) => Err(ValidationError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("transport", &self.transport.kind())
            .field("middleware", &self.middleware)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RequireOk;
    use crate::error::Error;
    use serde_json::json;

    fn client(config: ClientConfig) -> Client {
        Client::with_config(ClientConfig {
            enable_logging: false,
            ..config
        })
        .unwrap()
    }

    #[test]
    fn test_client_creation() {
        let c = Client::new().unwrap();
        assert_eq!(c.transport_kind(), TransportKind::Streaming);
        assert!(c.config().encode_json_bodies);

        let c = client(ClientConfig {
            transport: TransportKind::Buffered,
            ..Default::default()
        })
        .with_middleware(RequireOk);
        assert_eq!(c.transport_kind(), TransportKind::Buffered);
        assert!(format!("{:?}", c).contains("RequireOk"));
    }

    #[test]
    fn test_relative_url_joins_base() {
        let c = client(ClientConfig {
            base_url: Some("http://api.local/v1/".to_string()),
            ..Default::default()
        });
        let params = c.prepare(RawParams::new("items?x=1"), false).unwrap();
        assert_eq!(params.url(), "http://api.local/v1/items?x=1");

        let params = c.prepare(RawParams::new("http://other/"), false).unwrap();
        assert_eq!(params.url(), "http://other/");
    }

    #[test]
    fn test_relative_url_without_base_fails() {
        let c = client(ClientConfig::default());
        let err = c.prepare(RawParams::new("/items"), false).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_defaults_applied() {
        let c = client(ClientConfig {
            default_timeout_ms: 250,
            default_headers: vec![
                ("User-Agent".to_string(), "unifetch".to_string()),
                ("Accept".to_string(), "*/*".to_string()),
            ],
            ..Default::default()
        });
        let params = c
            .prepare(RawParams::new("http://h/").header("accept", "text/plain"), false)
            .unwrap();
        assert_eq!(params.timeout(), Some(std::time::Duration::from_millis(250)));
        assert_eq!(params.headers().get_str("user-agent"), Some("unifetch"));
        assert_eq!(params.headers().get_str("accept"), Some("text/plain"));

        let params = c.prepare(RawParams::new("http://h/").timeout_ms(0), false).unwrap();
        assert_eq!(params.timeout(), None);
    }

    #[test]
    fn test_json_bodies_encoded() {
        let c = client(ClientConfig::default());
        let params = c
            .prepare(
                RawParams::new("http://h/").method("POST").json(json!({"a": [1, 2]})),
                false,
            )
            .unwrap();
        assert!(matches!(params.body(), RequestBody::Text(t) if t == r#"{"a":[1,2]}"#));
        assert_eq!(params.headers().get_str("content-type"), Some("application/json"));

        let raw = client(ClientConfig {
            encode_json_bodies: false,
            ..Default::default()
        });
        let params = raw
            .prepare(RawParams::new("http://h/").json(json!(1)), false)
            .unwrap();
        assert!(matches!(params.body(), RequestBody::Json(_)));

        let params = c
            .prepare(RawParams::new("http://h/").body("hi"), true)
            .unwrap();
        assert!(matches!(params.body(), RequestBody::Text(t) if t == r#""hi""#));
        let params = c
            .prepare(RawParams::new("http://h/").json(json!([1])), true)
            .unwrap();
        assert!(matches!(params.body(), RequestBody::Text(t) if t == "[1]"));
    }

    #[tokio::test]
    async fn test_unencoded_json_rejected_at_open() {
        let c = client(ClientConfig {
            encode_json_bodies: false,
            ..Default::default()
        });
        let err = c
            .open(RawParams::new("http://127.0.0.1:9/").json(json!({})))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedBody(_)));
    }
}
