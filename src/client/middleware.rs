//! Request and response hooks.
//!
//! A [`Middleware`] sees every request a [`Client`](super::Client) opens and
//! every response it delivers through [`fetch`](super::Client::fetch). Hooks
//! run in the order they were added; the first error stops the chain.
//!
//! ```ignore
//! let client = Client::new()?
//!     .with_middleware(DecodeJson)
//!     .with_middleware(RequireOk);
//! ```

use crate::error::Result;
use crate::params::Parameters;
use crate::response::{from_json_if_json, only_ok, to_complete, to_string, Response};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A hook around request opening and response delivery.
///
/// Both methods default to passing their input through.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Adjust parameters before the transport opens them.
    fn on_request(&self, params: Parameters) -> Result<Parameters> {
        Ok(params)
    }

    /// Adjust or reject a response after the wait resolves.
    async fn on_response(&self, response: Response) -> Result<Response> {
        Ok(response)
    }

    /// Name used in log events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Ordered list of middleware owned by one client.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    layers: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// An empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook; it runs after every hook already present.
    pub fn push(&mut self, middleware: impl Middleware + 'static) {
        self.layers.push(Arc::new(middleware));
    }

    /// Number of hooks.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether the chain has no hooks.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Run every request hook in order.
    pub fn on_request(&self, params: Parameters) -> Result<Parameters> {
        self.layers
            .iter()
            .try_fold(params, |params, layer| layer.on_request(params))
    }

    /// Run every response hook in order.
    pub async fn on_response(&self, response: Response) -> Result<Response> {
        let mut response = response;
        for layer in &self.layers {
            response = layer.on_response(response).await?;
        }
        Ok(response)
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.layers.iter().map(|layer| layer.name()))
            .finish()
    }
}

/// Turn non-ok responses into [`Error::Response`](crate::Error::Response).
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireOk;

#[async_trait]
impl Middleware for RequireOk {
    async fn on_response(&self, response: Response) -> Result<Response> {
        Ok(only_ok(response)?)
    }

    fn name(&self) -> &'static str {
        "RequireOk"
    }
}

/// Drain streamed bodies so every delivered response is complete.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompleteBody;

#[async_trait]
impl Middleware for CompleteBody {
    async fn on_response(&self, response: Response) -> Result<Response> {
        to_complete(response).await
    }

    fn name(&self) -> &'static str {
        "CompleteBody"
    }
}

/// Read bodies as text and decode those whose `content-type` names JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeJson;

#[async_trait]
impl Middleware for DecodeJson {
    async fn on_response(&self, response: Response) -> Result<Response> {
        from_json_if_json(to_string(response).await?)
    }

    fn name(&self) -> &'static str {
        "DecodeJson"
    }
}
