// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

/// Crypto engine serving the three age operations.
///
/// Implementations are synchronous; the worker runtime owns the only instance and calls it for
/// one request at a time. Error values carry human-readable reasons which travel verbatim to the
/// caller that issued the request.
pub trait Engine: Send + 'static {
    type Error: Error;

    /// Generates a fresh x25519 identity.
    ///
    /// Returns the encoded (private, public) key strings, in that order.
    fn generate_identity(&self) -> Result<(String, String), Self::Error>;

    /// Encrypts `plaintext` to all `recipients` given as encoded public keys.
    ///
    /// Recipient order is preserved. An empty recipient list is an error.
    fn encrypt(&self, plaintext: &str, recipients: &[String]) -> Result<String, Self::Error>;

    /// Decrypts `ciphertext` with the given encoded private key.
    fn decrypt(&self, ciphertext: &str, private_key: &str) -> Result<String, Self::Error>;
}

/// Asynchronous construction of an [`Engine`].
///
/// Loading is the single startup step of the worker runtime. The returned future resolving _is_
/// the engine's readiness signal: no requests are dispatched before it completes. The worker
/// gives up when the configured startup timeout elapses first.
pub trait EngineLoader: Send + 'static {
    type Engine: Engine;

    type Error: Error;

    /// Loads the engine, consuming the loader.
    fn load(self) -> impl Future<Output = Result<Self::Engine, Self::Error>> + Send;
}
