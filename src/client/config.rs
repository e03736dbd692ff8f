//! Client configuration.

use super::TransportKind;

/// Configuration for a [`Client`](super::Client).
///
/// # Examples
///
/// ```
/// use unifetch::client::{ClientConfig, TransportKind};
///
/// let config = ClientConfig {
///     transport: TransportKind::Buffered,
///     base_url: Some("http://localhost:8080/api/".to_string()),
///     default_timeout_ms: 5_000,
///     ..Default::default()
/// };
/// assert!(config.encode_json_bodies);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Which transport adapter sends requests.
    pub transport: TransportKind,
    /// Base for relative request URLs.
    pub base_url: Option<String>,
    /// Timeout applied when a request sets none; `0` disables it.
    pub default_timeout_ms: u64,
    /// Headers added to every request that does not set them itself.
    pub default_headers: Vec<(String, String)>,
    /// JSON-encode structured request bodies before sending.
    pub encode_json_bodies: bool,
    /// Emit `tracing` events for request lifecycles.
    pub enable_logging: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            transport: TransportKind::Streaming,
            base_url: None,
            default_timeout_ms: 0,
            default_headers: Vec::new(),
            encode_json_bodies: true,
            enable_logging: true,
        }
    }
}
