//! HTTP client, transports and middleware.
//!
//! This module turns canonical [`Parameters`](crate::params::Parameters) into
//! in-flight requests:
//!
//! - **Two transports** with the same lifecycle: a server-style one that
//!   streams response bodies and a browser-style one that buffers them
//! - **A client** that applies defaults, a base URL and JSON encoding
//! - **An ordered middleware chain** owned by each client
//! - **Streamed request bodies** fed through a channel
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── fetch      - Client and its request operations
//! ├── config     - Client configuration
//! ├── transport  - Transport trait and shared reqwest plumbing
//! ├── streaming  - Server-style transport
//! ├── buffered   - Browser-style transport
//! ├── middleware - Middleware trait, chain and built-in hooks
//! ├── body       - Body stream types and the channel-fed request body
//! └── utils      - Utility functions
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Opens requests through one transport |
//! | [`ClientConfig`] | Client configuration options |
//! | [`Transport`] | Adapter from parameters to a started request |
//! | [`StreamingTransport`] | Streams bodies, rejects on connection failure |
//! | [`BufferedTransport`] | Buffers text bodies, never rejects |
//! | [`Middleware`] | Request and response hook |
//!
//! # Examples
//!
//! ## Creating a Client
//!
//! ```
//! use unifetch::client::{Client, ClientConfig, RequireOk, TransportKind};
//!
//! // Default configuration
//! let client = Client::new().unwrap();
//! assert_eq!(client.transport_kind(), TransportKind::Streaming);
//!
//! // Custom configuration
//! let config = ClientConfig {
//!     transport: TransportKind::Buffered,
//!     default_timeout_ms: 2000,
//!     ..Default::default()
//! };
//! let client = Client::with_config(config).unwrap().with_middleware(RequireOk);
//! assert_eq!(client.transport_kind(), TransportKind::Buffered);
//! ```
//!
//! ## Streaming a Request Body
//!
//! ```ignore
//! use unifetch::client::body_channel;
//! use unifetch::RawParams;
//!
//! let (sender, body) = body_channel(8);
//! let pending = client.open(RawParams::new("http://localhost/upload").method("PUT").body(body))?;
//! sender.send_text("part one").await?;
//! sender.send_text("part two").await?;
//! drop(sender);
//! let response = pending.wait().await?;
//! ```
//!
//! ## Utility Functions
//!
//! ```
//! use unifetch::client::{is_success_status, preview, status_text};
//!
//! assert!(is_success_status(204));
//! assert_eq!(status_text(404), "Not Found");
//! assert_eq!(preview("short body"), "short body");
//! ```

pub mod body;
mod buffered;
mod config;
mod fetch;
mod middleware;
mod streaming;
mod transport;
mod utils;

pub use body::{body_channel, BodyClosed, BodySender, BodyStream, BoxError};
pub use buffered::BufferedTransport;
pub use config::ClientConfig;
pub use fetch::Client;
pub use middleware::{CompleteBody, DecodeJson, Middleware, MiddlewareChain, RequireOk};
pub use streaming::{ConnectionTarget, Scheme, StreamingTransport};
pub use transport::{Transport, TransportKind};
pub use utils::*;
