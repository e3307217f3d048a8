// SPDX-License-Identifier: MIT OR Apache-2.0

use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::Config;
use crate::message::{Reply, ReplyValue, Request, WorkerError};
use crate::traits::{Engine, EngineLoader};

/// Capacity of the request channel.
///
/// The bridge keeps at most one request in flight, so a single slot is never exceeded.
const REQUEST_CHANNEL_SIZE: usize = 1;

/// Capacity of the reply channel, sized like the request channel: one reply per request.
const REPLY_CHANNEL_SIZE: usize = 1;

/// Bridge-side ends of the channels connecting to a worker.
///
/// [`Worker::spawn`] returns this for the real runtime. Tests wire up their own link to let the
/// test play the worker, which is also why the fields are public.
#[derive(Debug)]
pub struct WorkerLink {
    /// Sends requests into the worker.
    pub requests: mpsc::Sender<Request>,

    /// Receives the worker's replies, in request order.
    pub replies: mpsc::Receiver<Reply>,

    /// Resolves once the engine finished loading, or failed to.
    pub ready: oneshot::Receiver<Result<(), WorkerError>>,
}

/// Isolated runtime hosting the crypto engine.
///
/// The worker is a task owning the engine exclusively. It loads the engine once, reports the
/// outcome through the readiness gate, then serves requests strictly one at a time: receive,
/// dispatch, post exactly one reply. Requests are never reordered, coalesced or dropped.
pub struct Worker<E> {
    engine: E,
    inbox: mpsc::Receiver<Request>,
    replies: mpsc::Sender<Reply>,
}

impl<E> Worker<E>
where
    E: Engine,
{
    /// Spawns a worker task hosting the engine produced by `loader`.
    ///
    /// Engine loading is bounded by [`Config::startup_timeout`]; on load failure or timeout the
    /// readiness gate carries a startup error and the task exits without serving anything.
    pub fn spawn<L>(loader: L, config: Config) -> WorkerLink
    where
        L: EngineLoader<Engine = E>,
    {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_CHANNEL_SIZE);
        let (reply_tx, reply_rx) = mpsc::channel(REPLY_CHANNEL_SIZE);
        let (ready_tx, ready_rx) = oneshot::channel();

        tokio::task::spawn(async move {
            let engine = match timeout(config.startup_timeout, loader.load()).await {
                Ok(Ok(engine)) => engine,
                Ok(Err(err)) => {
                    warn!("engine failed to load: {err}");
                    ready_tx
                        .send(Err(WorkerError::startup(format!(
                            "engine failed to load: {err}"
                        ))))
                        .ok();
                    return;
                }
                Err(_) => {
                    warn!(
                        "engine load timed out after {:?}",
                        config.startup_timeout
                    );
                    ready_tx
                        .send(Err(WorkerError::startup(format!(
                            "engine load timed out after {:?}",
                            config.startup_timeout
                        ))))
                        .ok();
                    return;
                }
            };

            // If the bridge is already gone there is no one left to serve.
            if ready_tx.send(Ok(())).is_err() {
                return;
            }

            debug!("engine loaded, worker serving requests");
            Worker {
                engine,
                inbox: request_rx,
                replies: reply_tx,
            }
            .run()
            .await;
        });

        WorkerLink {
            requests: request_tx,
            replies: reply_rx,
            ready: ready_rx,
        }
    }

    async fn run(mut self) {
        while let Some(request) = self.inbox.recv().await {
            let op = request.op();
            let reply = self.dispatch(request);
            if let Reply::Error(err) = &reply {
                warn!(op, "operation failed: {err}");
            }
            if self.replies.send(reply).await.is_err() {
                break;
            }
        }

        debug!("request channel closed, worker winding down");
    }

    /// Maps a request onto the engine capability serving it.
    fn dispatch(&self, request: Request) -> Reply {
        match request {
            Request::GenerateIdentity => match self.engine.generate_identity() {
                Ok((private, public)) => Reply::Result(ReplyValue::Identity(private, public)),
                Err(err) => Reply::Error(WorkerError::engine(err)),
            },
            Request::Encrypt(plaintext, recipients) => {
                match self.engine.encrypt(&plaintext, &recipients) {
                    Ok(ciphertext) => Reply::Result(ReplyValue::Text(ciphertext)),
                    Err(err) => Reply::Error(WorkerError::engine(err)),
                }
            }
            Request::Decrypt(ciphertext, private_key) => {
                match self.engine.decrypt(&ciphertext, &private_key) {
                    Ok(plaintext) => Reply::Result(ReplyValue::Text(plaintext)),
                    Err(err) => Reply::Error(WorkerError::engine(err)),
                }
            }
            Request::Unknown => Reply::Error(WorkerError::unknown_operation()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use tokio::sync::oneshot::error::TryRecvError;

    use crate::message::ErrorKind;
    use crate::test_utils::{FailingLoader, GatedLoader, TestEngine, setup_logging};

    use super::*;

    #[tokio::test]
    async fn serves_one_reply_per_request_in_order() {
        setup_logging();

        let mut link = Worker::spawn(TestEngine::default(), Config::default());
        link.ready.await.unwrap().unwrap();

        link.requests
            .send(Request::Encrypt("hi".to_string(), vec!["k".to_string()]))
            .await
            .unwrap();
        assert_eq!(
            link.replies.recv().await.unwrap(),
            Reply::Result(ReplyValue::Text(TestEngine::ciphertext("hi")))
        );

        link.requests
            .send(Request::Decrypt(TestEngine::ciphertext("hi"), "k".to_string()))
            .await
            .unwrap();
        assert_eq!(
            link.replies.recv().await.unwrap(),
            Reply::Result(ReplyValue::Text("hi".to_string()))
        );

        link.requests.send(Request::GenerateIdentity).await.unwrap();
        assert_eq!(
            link.replies.recv().await.unwrap(),
            Reply::Result(ReplyValue::Identity(
                "test-private-1".to_string(),
                "test-public-1".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn engine_errors_become_error_envelopes() {
        setup_logging();

        let mut link = Worker::spawn(TestEngine::default(), Config::default());
        link.ready.await.unwrap().unwrap();

        link.requests
            .send(Request::Decrypt("garbage".to_string(), "k".to_string()))
            .await
            .unwrap();

        let reply = link.replies.recv().await.unwrap();
        assert_matches!(
            reply,
            Reply::Error(WorkerError {
                kind: ErrorKind::Engine,
                ..
            })
        );
    }

    #[tokio::test]
    async fn unknown_operations_are_answered_not_dropped() {
        let mut link = Worker::spawn(TestEngine::default(), Config::default());
        link.ready.await.unwrap().unwrap();

        link.requests.send(Request::Unknown).await.unwrap();
        assert_eq!(
            link.replies.recv().await.unwrap(),
            Reply::Error(WorkerError::unknown_operation())
        );

        // The worker keeps serving afterwards.
        link.requests.send(Request::GenerateIdentity).await.unwrap();
        assert_matches!(
            link.replies.recv().await.unwrap(),
            Reply::Result(ReplyValue::Identity(..))
        );
    }

    #[tokio::test]
    async fn readiness_waits_for_the_loader() {
        let (loader, trigger) = GatedLoader::new(TestEngine::default());
        let mut link = Worker::spawn(loader, Config::default());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_matches!(link.ready.try_recv(), Err(TryRecvError::Empty));

        trigger.send(()).unwrap();
        link.ready.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn load_failure_reported_through_the_gate() {
        let link = Worker::spawn(FailingLoader::new("engine exploded"), Config::default());

        let err = link.ready.await.unwrap().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Startup);
        assert!(err.message.contains("engine exploded"));
    }

    #[tokio::test]
    async fn load_bounded_by_startup_timeout() {
        let (loader, _trigger) = GatedLoader::new(TestEngine::default());
        let config = Config {
            startup_timeout: Duration::from_millis(10),
        };
        let link = Worker::spawn(loader, config);

        let err = link.ready.await.unwrap().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Startup);
        assert!(err.message.contains("timed out"));
    }
}
