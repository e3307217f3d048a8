// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue-serialised async bridge to an isolated [age] encryption worker.
//!
//! Some hosts cannot call an encryption engine directly: the engine has to be loaded before it
//! is usable, and its runtime may tolerate neither concurrent nor re-entrant calls. This crate
//! keeps the engine behind a dedicated worker task and narrows all access to a FIFO queue with
//! strictly one request in flight, so callers get plain async functions while the engine only
//! ever sees one self-contained request at a time.
//!
//! ## Example
//!
//! ```rust
//! use age_bridge::{AgeEngine, Bridge, BridgeError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BridgeError> {
//!     let bridge = Bridge::builder(AgeEngine::new()).spawn();
//!
//!     // Operations join the queue immediately and can be awaited in any order.
//!     let pair = bridge.generate_identity().await?;
//!     let ciphertext = bridge
//!         .encrypt("the crow flies at midnight", vec![pair.public.clone()])
//!         .await?;
//!     let plaintext = bridge.decrypt(ciphertext, pair.private).await?;
//!
//!     assert_eq!(plaintext, "the crow flies at midnight");
//!     Ok(())
//! }
//! ```
//!
//! ## Design
//!
//! - [`Bridge`] is the cloneable caller-facing handle. Every operation enqueues a typed request
//!   at call time and returns a [`PendingReply`] future; a pump task forwards queued requests to
//!   the worker one at a time and resolves each caller with the single reply to its request.
//! - [`Worker`] owns the engine on its own task. It answers every request it receives, mapping
//!   engine failures into error envelopes rather than dropping them, and signals through a
//!   readiness gate once the engine has loaded. No request is dispatched before that gate opens.
//! - [`Engine`] and [`EngineLoader`] are the seams for swapping the cryptography out. The
//!   default [`AgeEngine`] produces ASCII-armored age ciphertexts for X25519 recipients.
//!
//! Queueing callers rather than callees means slow or not-yet-loaded engines cost latency, never
//! correctness: requests issued at any time settle in call order with their own results.
//!
//! [age]: https://age-encryption.org

mod bridge;
mod config;
mod engine;
mod message;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
mod traits;
mod worker;

pub use bridge::{Bridge, BridgeError, Builder, FromReply, KeyPair, PendingReply};
pub use config::{Config, DEFAULT_STARTUP_TIMEOUT};
pub use engine::{AgeEngine, EngineError};
pub use message::{ErrorKind, Reply, ReplyValue, Request, WorkerError};
pub use traits::{Engine, EngineLoader};
pub use worker::{Worker, WorkerLink};
