// SPDX-License-Identifier: MIT OR Apache-2.0
#![allow(unused)]

use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::EnvFilter;

use crate::message::{Reply, Request, WorkerError};
use crate::traits::{Engine, EngineLoader};
use crate::worker::WorkerLink;

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct TestError(pub String);

/// Deterministic stand-in engine.
///
/// "Encryption" is a reversible prefix scheme and generated keys are numbered, so tests can
/// assert exact outputs without touching real cryptography.
#[derive(Debug, Default)]
pub struct TestEngine {
    generated: AtomicUsize,
}

impl TestEngine {
    /// The ciphertext this engine produces for `plaintext`.
    pub fn ciphertext(plaintext: &str) -> String {
        format!("test-cipher:{plaintext}")
    }
}

impl Engine for TestEngine {
    type Error = TestError;

    fn generate_identity(&self) -> Result<(String, String), Self::Error> {
        let n = self.generated.fetch_add(1, Ordering::Relaxed) + 1;
        Ok((format!("test-private-{n}"), format!("test-public-{n}")))
    }

    fn encrypt(&self, plaintext: &str, recipients: &[String]) -> Result<String, Self::Error> {
        if recipients.is_empty() {
            return Err(TestError("no recipients".to_string()));
        }
        Ok(Self::ciphertext(plaintext))
    }

    fn decrypt(&self, ciphertext: &str, _private_key: &str) -> Result<String, Self::Error> {
        ciphertext
            .strip_prefix("test-cipher:")
            .map(String::from)
            .ok_or_else(|| TestError("not a test ciphertext".to_string()))
    }
}

impl EngineLoader for TestEngine {
    type Engine = TestEngine;
    type Error = TestError;

    fn load(self) -> impl Future<Output = Result<Self::Engine, Self::Error>> + Send {
        async move { Ok(self) }
    }
}

/// Loader which holds the engine back until an external trigger fires.
#[derive(Debug)]
pub struct GatedLoader<E> {
    engine: E,
    gate: oneshot::Receiver<()>,
}

impl<E> GatedLoader<E> {
    pub fn new(engine: E) -> (Self, oneshot::Sender<()>) {
        let (trigger, gate) = oneshot::channel();
        (Self { engine, gate }, trigger)
    }
}

impl<E> EngineLoader for GatedLoader<E>
where
    E: Engine,
{
    type Engine = E;
    type Error = TestError;

    fn load(self) -> impl Future<Output = Result<Self::Engine, Self::Error>> + Send {
        async move {
            self.gate
                .await
                .map_err(|_| TestError("engine never arrived".to_string()))?;
            Ok(self.engine)
        }
    }
}

/// Loader which never produces an engine.
#[derive(Debug)]
pub struct FailingLoader {
    reason: String,
}

impl FailingLoader {
    pub fn new(reason: impl ToString) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

impl EngineLoader for FailingLoader {
    type Engine = TestEngine;
    type Error = TestError;

    fn load(self) -> impl Future<Output = Result<Self::Engine, Self::Error>> + Send {
        async move { Err(TestError(self.reason)) }
    }
}

/// Hand-operated far end of a [`WorkerLink`].
///
/// Lets a test observe the request wire and script replies and readiness itself, in place of a
/// spawned worker.
#[derive(Debug)]
pub struct ManualWorker {
    pub requests: mpsc::Receiver<Request>,
    pub replies: mpsc::Sender<Reply>,
    ready: Option<oneshot::Sender<Result<(), WorkerError>>>,
}

impl ManualWorker {
    /// Opens the readiness gate.
    pub fn ready(&mut self) {
        if let Some(ready) = self.ready.take() {
            ready.send(Ok(())).ok();
        }
    }

    /// Closes the readiness gate with a startup error.
    pub fn fail_startup(&mut self, err: WorkerError) {
        if let Some(ready) = self.ready.take() {
            ready.send(Err(err)).ok();
        }
    }
}

/// Builds a [`WorkerLink`] whose far end is driven by the test instead of a worker task.
///
/// Channel capacities match the real worker's.
pub fn manual_link() -> (WorkerLink, ManualWorker) {
    let (request_tx, request_rx) = mpsc::channel(1);
    let (reply_tx, reply_rx) = mpsc::channel(1);
    let (ready_tx, ready_rx) = oneshot::channel();

    let link = WorkerLink {
        requests: request_tx,
        replies: reply_rx,
        ready: ready_rx,
    };
    let worker = ManualWorker {
        requests: request_rx,
        replies: reply_tx,
        ready: Some(ready_tx),
    };

    (link, worker)
}
