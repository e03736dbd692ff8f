//! Byte streams flowing into requests and out of responses.
//!
//! [`BodyStream`] is the one stream shape the crate passes around: a boxed,
//! sendable stream of byte chunks that may fail. Response bodies from the
//! streaming transport arrive as one, and request bodies can be fed through
//! one chunk by chunk.
//!
//! # Feeding a request body from another task
//!
//! ```ignore
//! use unifetch::client::body_channel;
//! use unifetch::params::RawParams;
//!
//! let (sender, body) = body_channel(8);
//! tokio::spawn(async move {
//!     sender.send_text("first,").await.ok();
//!     sender.send_text("second").await.ok();
//!     // dropping the sender ends the body
//! });
//! let raw = RawParams::new("http://example.com/upload").method("PUT").body(body);
//! ```

use crate::params::RequestBody;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Boxed error carried by body streams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A fallible stream of body chunks.
///
/// `Sync` as well as `Send`, so responses and errors holding one can cross
/// into `anyhow` and `Box<dyn Error + Send + Sync>`.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send + Sync>>;

/// Sending half of a channel-fed request body.
///
/// The body ends when every sender is dropped. Sending an error aborts the
/// upload on the streaming transport.
#[derive(Debug, Clone)]
pub struct BodySender {
    sender: mpsc::Sender<Result<Bytes, BoxError>>,
}

impl BodySender {
    /// Queue a chunk. Fails once the request has stopped reading.
    pub async fn send(&self, chunk: impl Into<Bytes>) -> Result<(), BodyClosed> {
        self.sender
            .send(Ok(chunk.into()))
            .await
            .map_err(|_| BodyClosed)
    }

    /// Queue a text chunk.
    pub async fn send_text(&self, chunk: impl Into<String>) -> Result<(), BodyClosed> {
        self.send(Bytes::from(chunk.into())).await
    }

    /// Fail the body with `error`.
    pub async fn abort(&self, error: impl Into<BoxError>) -> Result<(), BodyClosed> {
        self.sender
            .send(Err(error.into()))
            .await
            .map_err(|_| BodyClosed)
    }
}

/// The receiving request is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("request body channel closed")]
pub struct BodyClosed;

/// Create a request body fed through a bounded channel.
///
/// # Arguments
///
/// * `capacity` - Chunks buffered before `send` waits
pub fn body_channel(capacity: usize) -> (BodySender, RequestBody) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let body = RequestBody::Stream(Box::pin(ReceiverStream::new(receiver)));
    (BodySender { sender }, body)
}

/// Put a stream that is only `Send` behind a channel so it becomes a [`BodyStream`].
///
/// A task pumps chunks into a bounded channel. It stops after the first
/// error or as soon as the receiving side is dropped, releasing `stream`
/// even while it is waiting for a chunk. Must be called inside a
/// Tokio runtime.
pub(crate) fn forward<S>(stream: S, capacity: usize) -> BodyStream
where
    S: Stream<Item = Result<Bytes, BoxError>> + Send + 'static,
{
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    tokio::spawn(async move {
        futures::pin_mut!(stream);
        loop {
            let chunk = tokio::select! {
                _ = sender.closed() => break,
                chunk = stream.next() => match chunk {
                    Some(chunk) => chunk,
                    None => break,
                },
            };
            let failed = chunk.is_err();
            if sender.send(chunk).await.is_err() || failed {
                break;
            }
        }
    });
    Box::pin(ReceiverStream::new(receiver))
}
