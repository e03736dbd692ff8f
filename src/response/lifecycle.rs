//! Request lifecycle state machine.
//!
//! A transport hands the lifecycle one future (the exchange) that resolves to
//! the transport's own completion [`Signal`]. The lifecycle races it against
//! the caller's abort and the configured timeout, then settles the
//! [`RequestHandle`] exactly once:
//!
//! ```text
//! Unsent ──open──▶ Opened ──first signal──▶ Done(Load | Error | Timeout | Abort | RemoteAbort)
//! ```
//!
//! Settling is a compare-and-set on the handle state. Whichever signal gets
//! there first wins; every later signal (including a late abort) is inert.
//! The losing exchange future is dropped, which cancels its I/O.

use super::{Body, Reason, Response};
use crate::error::{Error, Result};
use crate::params::Parameters;
use crate::protocol::HeaderFields;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Created, transport not yet started.
    Unsent,
    /// Transport started, no terminal signal yet.
    Opened,
    /// Settled with the given reason.
    Done(Reason),
}

impl LifecycleState {
    /// Whether a terminal signal has been observed.
    pub fn is_done(self) -> bool {
        matches!(self, LifecycleState::Done(_))
    }
}

/// What a transport observed when its exchange finished.
pub(crate) enum Signal {
    /// A response head (and, for buffered transports, the body) arrived.
    Load(Loaded),
    /// Transport failure folded into the response.
    Error(String),
    /// The peer closed the connection before a response.
    RemoteAbort,
    /// The transport noticed a timeout itself.
    Timeout,
    /// The caller's abort won the race.
    Aborted,
    /// Failure that rejects the wait instead of producing a response.
    Rejected(Error),
}

impl Signal {
    fn reason(&self) -> Reason {
        match self {
            Signal::Load(_) => Reason::Load,
            Signal::Error(_) | Signal::Rejected(_) => Reason::Error,
            Signal::RemoteAbort => Reason::RemoteAbort,
            Signal::Timeout => Reason::Timeout,
            Signal::Aborted => Reason::Abort,
        }
    }
}

/// Received response data, before it becomes a [`Response`].
pub(crate) struct Loaded {
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderFields,
    pub body: Body,
    pub complete: bool,
}

struct HandleInner {
    id: Uuid,
    method: String,
    url: String,
    state: Mutex<LifecycleState>,
    abort: Mutex<Option<oneshot::Sender<()>>>,
}

/// Cancellation and introspection handle for one request.
///
/// Clones refer to the same request.
#[derive(Clone)]
pub struct RequestHandle {
    inner: Arc<HandleInner>,
}

impl RequestHandle {
    pub(crate) fn new(params: &Parameters) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let handle = RequestHandle {
            inner: Arc::new(HandleInner {
                id: Uuid::new_v4(),
                method: params.method().to_string(),
                url: params.url().to_string(),
                state: Mutex::new(LifecycleState::Unsent),
                abort: Mutex::new(Some(tx)),
            }),
        };
        (handle, rx)
    }

    /// Unique id, also attached to log events.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Method of the request.
    pub fn method(&self) -> &str {
        &self.inner.method
    }

    /// URL of the request.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.inner.state.lock()
    }

    /// Abort the request.
    ///
    /// Before a terminal signal this forces the `Abort` transition and returns
    /// `true`. Afterwards it does nothing and returns `false`.
    pub fn abort(&self) -> bool {
        if !self.settle(Reason::Abort) {
            return false;
        }
        if let Some(tx) = self.inner.abort.lock().take() {
            let _ = tx.send(());
        }
        true
    }

    pub(crate) fn mark_opened(&self) {
        let mut state = self.inner.state.lock();
        if *state == LifecycleState::Unsent {
            *state = LifecycleState::Opened;
        }
    }

    /// Move to `Done(reason)` unless already done. Returns whether this call won.
    fn settle(&self, reason: Reason) -> bool {
        let mut state = self.inner.state.lock();
        if state.is_done() {
            return false;
        }
        *state = LifecycleState::Done(reason);
        true
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("id", &self.inner.id)
            .field("method", &self.inner.method)
            .field("url", &self.inner.url)
            .field("state", &self.state())
            .finish()
    }
}

/// An in-flight request.
///
/// [`wait`](PendingRequest::wait) is the single place the outcome is
/// delivered. Dropping the pending request does not cancel it; use the
/// handle for that.
#[derive(Debug)]
pub struct PendingRequest {
    handle: RequestHandle,
    receiver: oneshot::Receiver<Result<Response>>,
}

impl PendingRequest {
    /// Handle for cancellation and introspection.
    pub fn handle(&self) -> &RequestHandle {
        &self.handle
    }

    /// Shorthand for `self.handle().abort()`.
    pub fn abort(&self) -> bool {
        self.handle.abort()
    }

    /// Wait for the terminal signal.
    ///
    /// Resolves with a [`Response`] for every terminal reason. Rejects only
    /// when the transport itself rejects; the streaming transport does so for
    /// connection failures, the buffered transport never does.
    pub async fn wait(self) -> Result<Response> {
        self.receiver
            .await
            .map_err(|_| Error::Transport("request task ended without settling".to_string()))?
    }
}

/// Start the lifecycle for an opened request.
///
/// Must be called inside a Tokio runtime; the exchange starts immediately.
pub(crate) fn spawn_lifecycle<F>(
    handle: RequestHandle,
    abort_rx: oneshot::Receiver<()>,
    params: Parameters,
    exchange: F,
    enable_logging: bool,
) -> Result<PendingRequest>
where
    F: Future<Output = Signal> + Send + 'static,
{
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| Error::Transport(format!("no async runtime: {}", e)))?;

    let (tx, rx) = oneshot::channel();
    let timeout = params.timeout();
    let task_handle = handle.clone();
    handle.mark_opened();

    if enable_logging {
        tracing::debug!(
            id = %handle.id(),
            "opened {} {}",
            handle.method(),
            handle.url()
        );
    }

    runtime.spawn(async move {
        let signal = race(exchange, abort_rx, timeout).await;
        let result = conclude(task_handle, params, signal);

        if enable_logging {
            match &result {
                Ok(response) => tracing::debug!(
                    id = %response.handle.id(),
                    "settled with {} (status {})",
                    response.reason,
                    response.status
                ),
                Err(e) => tracing::warn!("request rejected: {}", e),
            }
        }

        // The waiter may be gone; the outcome is then simply dropped.
        let _ = tx.send(result);
    });

    Ok(PendingRequest {
        handle,
        receiver: rx,
    })
}

async fn race<F>(exchange: F, abort_rx: oneshot::Receiver<()>, timeout: Option<Duration>) -> Signal
where
    F: Future<Output = Signal>,
{
    let deadline = async {
        match timeout {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        Ok(()) = abort_rx => Signal::Aborted,
        _ = deadline => Signal::Timeout,
        signal = exchange => signal,
    }
}

fn conclude(handle: RequestHandle, params: Parameters, signal: Signal) -> Result<Response> {
    if !handle.settle(signal.reason()) {
        let winner = match handle.state() {
            LifecycleState::Done(reason) => reason,
            _ => Reason::Abort,
        };
        return Ok(Response::terminal(handle, params, winner, None));
    }

    match signal {
        Signal::Load(loaded) => Ok(Response::loaded(handle, params, loaded)),
        Signal::Error(description) => Ok(Response::terminal(
            handle,
            params,
            Reason::Error,
            Some(description),
        )),
        Signal::Timeout => Ok(Response::terminal(handle, params, Reason::Timeout, None)),
        Signal::RemoteAbort => Ok(Response::terminal(handle, params, Reason::RemoteAbort, None)),
        Signal::Aborted => Ok(Response::terminal(handle, params, Reason::Abort, None)),
        Signal::Rejected(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{normalize, RawParams};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    fn open<F>(raw: RawParams, exchange: F) -> PendingRequest
    where
        F: Future<Output = Signal> + Send + 'static,
    {
        let params = normalize(raw).unwrap();
        let (handle, abort_rx) = RequestHandle::new(&params);
        spawn_lifecycle(handle, abort_rx, params, exchange, false).unwrap()
    }

    fn loaded(status: u16) -> Signal {
        Signal::Load(Loaded {
            status,
            status_text: "OK".to_string(),
            headers: HeaderFields::new(),
            body: Body::Text("done".to_string()),
            complete: true,
        })
    }

    #[tokio::test]
    async fn test_load_settles_once() {
        let pending = open(RawParams::new("http://local/"), async { loaded(200) });
        let handle = pending.handle().clone();
        assert_eq!(handle.state(), LifecycleState::Opened);

        let response = pending.wait().await.unwrap();
        assert_eq!(response.reason, Reason::Load);
        assert!(response.ok);
        assert!(response.complete);
        assert_eq!(response.status, 200);
        assert_eq!(handle.state(), LifecycleState::Done(Reason::Load));

        assert!(!handle.abort());
        assert_eq!(handle.state(), LifecycleState::Done(Reason::Load));
    }

    #[tokio::test]
    async fn test_non_2xx_load_is_not_ok() {
        let response = open(RawParams::new("http://local/"), async { loaded(404) })
            .wait()
            .await
            .unwrap();
        assert_eq!(response.reason, Reason::Load);
        assert!(!response.ok);
    }

    #[tokio::test]
    async fn test_abort_before_signal() {
        let pending = open(RawParams::new("http://local/"), std::future::pending());
        assert!(pending.abort());
        assert!(!pending.abort());

        let response = pending.wait().await.unwrap();
        assert_eq!(response.reason, Reason::Abort);
        assert_eq!(response.status, 0);
        assert_eq!(response.status_text, "aborted by client");
        assert!(!response.ok);
        assert!(!response.complete);
    }

    #[tokio::test]
    async fn test_abort_wins_over_late_load() {
        let release = Arc::new(Notify::new());
        let gate = release.clone();
        let pending = open(RawParams::new("http://local/"), async move {
            gate.notified().await;
            loaded(200)
        });

        assert!(pending.abort());
        release.notify_one();

        let response = pending.wait().await.unwrap();
        assert_eq!(response.reason, Reason::Abort);
    }

    #[tokio::test]
    async fn test_abort_drops_exchange() {
        struct Guard(Arc<AtomicBool>);
        impl Drop for Guard {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let guard = Guard(dropped.clone());
        let pending = open(RawParams::new("http://local/"), async move {
            let _guard = guard;
            std::future::pending::<Signal>().await
        });

        pending.abort();
        pending.wait().await.unwrap();
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_timeout() {
        let pending = open(
            RawParams::new("http://local/").timeout_ms(20),
            std::future::pending(),
        );
        let handle = pending.handle().clone();
        let response = pending.wait().await.unwrap();

        assert_eq!(response.reason, Reason::Timeout);
        assert_eq!(response.status, 408);
        assert_eq!(response.status_text, "request timeout");
        assert!(!response.ok);
        assert!(!handle.abort());
    }

    #[tokio::test]
    async fn test_error_signal_keeps_description() {
        let response = open(RawParams::new("http://local/"), async {
            Signal::Error("connection refused".to_string())
        })
        .wait()
        .await
        .unwrap();
        assert_eq!(response.reason, Reason::Error);
        assert_eq!(response.status, 0);
        assert_eq!(response.status_text, "connection refused");
        assert!(matches!(response.body, Body::Empty));
    }

    #[tokio::test]
    async fn test_remote_abort_signal() {
        let response = open(RawParams::new("http://local/"), async { Signal::RemoteAbort })
            .wait()
            .await
            .unwrap();
        assert_eq!(response.reason, Reason::RemoteAbort);
        assert_eq!(response.status_text, "aborted by remote");
    }

    #[tokio::test]
    async fn test_rejected_signal_rejects_wait() {
        let pending = open(RawParams::new("http://local/"), async {
            Signal::Rejected(Error::Network("dns failure".to_string()))
        });
        let handle = pending.handle().clone();
        let err = pending.wait().await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
        assert!(!handle.abort());
    }

    #[test]
    fn test_open_without_runtime_fails() {
        let params = normalize(RawParams::new("http://local/")).unwrap();
        let (handle, abort_rx) = RequestHandle::new(&params);
        let err = spawn_lifecycle(handle.clone(), abort_rx, params, async { loaded(200) }, false)
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(handle.state(), LifecycleState::Unsent);
    }
}
