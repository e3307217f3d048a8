// SPDX-License-Identifier: MIT OR Apache-2.0

use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace, warn};

use crate::config::Config;
use crate::message::{Reply, ReplyValue, Request, WorkerError};
use crate::traits::EngineLoader;
use crate::worker::{Worker, WorkerLink};

/// Async handle to an isolated encryption worker.
///
/// Calls are queued in call order and pumped into the worker strictly one at a time; since the
/// worker posts exactly one reply per request, the queue position alone correlates replies with
/// callers. Operations return immediately with a [`PendingReply`] future which resolves once the
/// worker has answered that particular request.
///
/// ## Example
///
/// ```rust
/// # #[tokio::main]
/// # async fn main() -> Result<(), age_bridge::BridgeError> {
/// use age_bridge::{AgeEngine, Bridge};
///
/// let bridge = Bridge::builder(AgeEngine::new()).spawn();
///
/// let pair = bridge.generate_identity().await?;
/// let ciphertext = bridge.encrypt("hello", vec![pair.public.clone()]).await?;
/// let plaintext = bridge.decrypt(ciphertext, pair.private.clone()).await?;
///
/// assert_eq!(plaintext, "hello");
/// # Ok(())
/// # }
/// ```
///
/// The handle is cheap to clone; all clones feed the same queue. Dropping the last clone closes
/// the queue, which winds down the pump task and with it the worker.
#[derive(Clone, Debug)]
pub struct Bridge {
    queue_tx: mpsc::UnboundedSender<QueueItem>,
}

impl Bridge {
    /// Creates a bridge pumping requests into the given worker link.
    ///
    /// Most callers want [`Bridge::builder`] instead; taking a raw [`WorkerLink`] is the seam for
    /// standing in a fake worker.
    pub fn new(link: WorkerLink) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        tokio::task::spawn(pump(queue_rx, link));
        Self { queue_tx }
    }

    pub fn builder<L: EngineLoader>(loader: L) -> Builder<L> {
        Builder::new(loader)
    }

    /// Generates a fresh identity in the worker.
    pub fn generate_identity(&self) -> PendingReply<KeyPair> {
        self.enqueue(Request::GenerateIdentity)
    }

    /// Encrypts `plaintext` to all `recipients`, given as encoded public keys in the order they
    /// should be wrapped.
    ///
    /// Inputs are passed through untouched; whether an empty plaintext or recipient list is
    /// acceptable is the engine's call.
    pub fn encrypt(
        &self,
        plaintext: impl Into<String>,
        recipients: impl Into<Vec<String>>,
    ) -> PendingReply<String> {
        self.enqueue(Request::Encrypt(plaintext.into(), recipients.into()))
    }

    /// Decrypts `ciphertext` with the given encoded private key.
    pub fn decrypt(
        &self,
        ciphertext: impl Into<String>,
        private_key: impl Into<String>,
    ) -> PendingReply<String> {
        self.enqueue(Request::Decrypt(ciphertext.into(), private_key.into()))
    }

    /// Places the request on the queue and hands back its completion handle.
    ///
    /// This is synchronous and never blocks: the queue is unbounded and the request takes its
    /// position the moment the operation is called, not when the returned future is first polled.
    fn enqueue<T: FromReply>(&self, request: Request) -> PendingReply<T> {
        let (resolve, resolved) = oneshot::channel();
        trace!(op = request.op(), "enqueue request");

        if let Err(mpsc::error::SendError(item)) = self.queue_tx.send(QueueItem { request, resolve })
        {
            // The pump is gone; reject right away instead of leaving the caller hanging.
            item.resolve.send(Err(BridgeError::Disconnected)).ok();
        }

        PendingReply {
            resolved,
            _marker: PhantomData,
        }
    }
}

/// Wires up a [`Bridge`] with a freshly spawned worker.
pub struct Builder<L> {
    loader: L,
    config: Config,
}

impl<L> Builder<L>
where
    L: EngineLoader,
{
    fn new(loader: L) -> Self {
        Self {
            loader,
            config: Config::default(),
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Bounds how long the engine may take to load.
    pub fn startup_timeout(mut self, startup_timeout: Duration) -> Self {
        self.config.startup_timeout = startup_timeout;
        self
    }

    pub fn spawn(self) -> Bridge {
        Bridge::new(Worker::spawn(self.loader, self.config))
    }
}

/// A queued request paired with the channel resolving its caller's future.
struct QueueItem {
    request: Request,
    resolve: oneshot::Sender<Result<ReplyValue, BridgeError>>,
}

/// Completion handle for an operation already placed on the queue.
///
/// Dropping the handle abandons the result, not the request: the worker still processes it in
/// its queue position.
#[derive(Debug)]
pub struct PendingReply<T> {
    resolved: oneshot::Receiver<Result<ReplyValue, BridgeError>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Future for PendingReply<T>
where
    T: FromReply,
{
    type Output = Result<T, BridgeError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.resolved).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result.and_then(T::from_reply)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(BridgeError::Disconnected)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Conversion from a raw reply value into an operation's typed output.
pub trait FromReply: Sized {
    fn from_reply(value: ReplyValue) -> Result<Self, BridgeError>;
}

impl FromReply for String {
    fn from_reply(value: ReplyValue) -> Result<Self, BridgeError> {
        match value {
            ReplyValue::Text(text) => Ok(text),
            ReplyValue::Identity(..) => Err(BridgeError::ReplyMismatch),
        }
    }
}

impl FromReply for KeyPair {
    fn from_reply(value: ReplyValue) -> Result<Self, BridgeError> {
        match value {
            ReplyValue::Identity(private, public) => Ok(KeyPair { private, public }),
            ReplyValue::Text(_) => Err(BridgeError::ReplyMismatch),
        }
    }
}

/// Generated identity, as encoded key strings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyPair {
    pub private: String,
    pub public: String,
}

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The worker answered this request with an error envelope.
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// The worker or its channels went away before this request was answered.
    #[error("worker disconnected before replying")]
    Disconnected,

    /// The worker's reply has a shape the awaited operation cannot produce.
    #[error("worker reply does not match the awaited operation")]
    ReplyMismatch,
}

/// Forwards queued requests into the worker, one at a time.
///
/// Nothing is dispatched before the readiness gate resolves; afterwards the loop takes one item,
/// posts it, waits for the single reply and resolves the caller before touching the queue again.
/// That discipline is what lets replies correlate to callers without ids.
async fn pump(mut queue: mpsc::UnboundedReceiver<QueueItem>, link: WorkerLink) {
    let WorkerLink {
        requests,
        mut replies,
        ready,
    } = link;

    match ready.await {
        Ok(Ok(())) => debug!("worker ready, pump running"),
        Ok(Err(err)) => {
            warn!("worker startup failed: {err}");
            reject_all(&mut queue, &err).await;
            return;
        }
        Err(_) => {
            warn!("worker went away before reporting readiness");
            disconnect_all(&mut queue).await;
            return;
        }
    }

    while let Some(QueueItem { request, resolve }) = queue.recv().await {
        let op = request.op();
        trace!(op, "dispatch request");

        if requests.send(request).await.is_err() {
            error!(op, "request channel closed, rejecting this and all further requests");
            resolve.send(Err(BridgeError::Disconnected)).ok();
            disconnect_all(&mut queue).await;
            return;
        }

        // One reply per request; the channel buffers it even if it lands before this await.
        let Some(reply) = replies.recv().await else {
            error!(op, "reply channel closed, rejecting this and all further requests");
            resolve.send(Err(BridgeError::Disconnected)).ok();
            disconnect_all(&mut queue).await;
            return;
        };

        let result = match reply {
            Reply::Result(value) => Ok(value),
            Reply::Error(err) => Err(BridgeError::Worker(err)),
        };

        // A dropped caller abandons only its own result.
        resolve.send(result).ok();
    }

    debug!("all bridge handles dropped, pump winding down");
}

/// Rejects every queued and future request with the given startup error.
async fn reject_all(queue: &mut mpsc::UnboundedReceiver<QueueItem>, err: &WorkerError) {
    while let Some(item) = queue.recv().await {
        item.resolve
            .send(Err(BridgeError::Worker(err.clone())))
            .ok();
    }
}

/// Rejects every queued and future request as disconnected.
async fn disconnect_all(queue: &mut mpsc::UnboundedReceiver<QueueItem>) {
    while let Some(item) = queue.recv().await {
        item.resolve.send(Err(BridgeError::Disconnected)).ok();
    }
}
