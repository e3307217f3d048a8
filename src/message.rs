// SPDX-License-Identifier: MIT OR Apache-2.0

//! Envelopes exchanged between the bridge and the worker runtime.
//!
//! Requests are tagged by operation name with positional arguments, replies carry either a result
//! value or a normalised error. Serialised, the exchange looks like this:
//!
//! ```json
//! { "op": "age_encrypt", "args": ["hello", ["age1..."]] }
//! { "result": "-----BEGIN AGE ENCRYPTED FILE-----..." }
//! { "error": { "kind": "engine", "message": "failed to decrypt text: ..." } }
//! ```
//!
//! No request or reply carries a correlation id. The worker serves strictly one reply per request
//! and the bridge keeps at most one request in flight, so ordering is the correlation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operation request dispatched to the worker.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum Request {
    /// Generate a fresh x25519 identity. Takes no arguments.
    #[serde(rename = "age_generate_x25519_identity")]
    GenerateIdentity,

    /// Encrypt the plaintext (position 0) to the list of encoded public keys (position 1).
    #[serde(rename = "age_encrypt")]
    Encrypt(String, Vec<String>),

    /// Decrypt the ciphertext (position 0) with the encoded private key (position 1).
    #[serde(rename = "age_decrypt")]
    Decrypt(String, String),

    /// Catch-all for operation tags this worker does not serve; answered with an
    /// [`ErrorKind::UnknownOperation`] error rather than being dropped.
    #[serde(other)]
    Unknown,
}

impl Request {
    /// Operation tag, as it appears on the wire.
    pub fn op(&self) -> &'static str {
        match self {
            Self::GenerateIdentity => "age_generate_x25519_identity",
            Self::Encrypt(..) => "age_encrypt",
            Self::Decrypt(..) => "age_decrypt",
            Self::Unknown => "unknown",
        }
    }
}

/// Reply posted by the worker, exactly one per request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Reply {
    Result(ReplyValue),
    Error(WorkerError),
}

/// Successful result payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ReplyValue {
    /// Ciphertext or plaintext, depending on the operation.
    Text(String),

    /// Encoded (private, public) key strings of a generated identity, in that order.
    Identity(String, String),
}

/// Error envelope produced by the worker.
///
/// Every failure is normalised into this shape before it crosses the channel; `message` carries
/// the engine's reason verbatim.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct WorkerError {
    pub kind: ErrorKind,
    pub message: String,
}

impl WorkerError {
    pub fn engine(message: impl ToString) -> Self {
        Self {
            kind: ErrorKind::Engine,
            message: message.to_string(),
        }
    }

    pub fn unknown_operation() -> Self {
        Self {
            kind: ErrorKind::UnknownOperation,
            message: "unknown operation".to_string(),
        }
    }

    pub fn startup(message: impl ToString) -> Self {
        Self {
            kind: ErrorKind::Startup,
            message: message.to_string(),
        }
    }
}

/// Failure classes a worker reply distinguishes.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The engine rejected the operation.
    Engine,

    /// The request carried an operation tag the worker does not serve.
    UnknownOperation,

    /// The engine failed to load, or did not load within the startup timeout.
    Startup,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_wire_format() {
        assert_eq!(
            serde_json::to_value(&Request::GenerateIdentity).unwrap(),
            json!({ "op": "age_generate_x25519_identity" })
        );
        assert_eq!(
            serde_json::to_value(&Request::Encrypt(
                "hello".to_string(),
                vec!["age1abc".to_string(), "age1def".to_string()]
            ))
            .unwrap(),
            json!({ "op": "age_encrypt", "args": ["hello", ["age1abc", "age1def"]] })
        );
        assert_eq!(
            serde_json::to_value(&Request::Decrypt(
                "ciphertext".to_string(),
                "AGE-SECRET-KEY-1...".to_string()
            ))
            .unwrap(),
            json!({ "op": "age_decrypt", "args": ["ciphertext", "AGE-SECRET-KEY-1..."] })
        );
    }

    #[test]
    fn unrecognised_operation_tag() {
        let request: Request = serde_json::from_value(json!({ "op": "age_sign" })).unwrap();
        assert_eq!(request, Request::Unknown);
    }

    #[test]
    fn reply_wire_format() {
        assert_eq!(
            serde_json::to_value(&Reply::Result(ReplyValue::Text("output".to_string()))).unwrap(),
            json!({ "result": "output" })
        );
        assert_eq!(
            serde_json::to_value(&Reply::Result(ReplyValue::Identity(
                "AGE-SECRET-KEY-1...".to_string(),
                "age1abc".to_string()
            )))
            .unwrap(),
            json!({ "result": ["AGE-SECRET-KEY-1...", "age1abc"] })
        );
        assert_eq!(
            serde_json::to_value(&Reply::Error(WorkerError::engine("failed to decrypt text: x")))
                .unwrap(),
            json!({ "error": { "kind": "engine", "message": "failed to decrypt text: x" } })
        );
    }

    #[test]
    fn reply_value_shapes_are_distinguished() {
        let reply: Reply = serde_json::from_value(json!({ "result": "just text" })).unwrap();
        assert_eq!(reply, Reply::Result(ReplyValue::Text("just text".to_string())));

        let reply: Reply = serde_json::from_value(json!({ "result": ["private", "public"] })).unwrap();
        assert_eq!(
            reply,
            Reply::Result(ReplyValue::Identity(
                "private".to_string(),
                "public".to_string()
            ))
        );
    }

    #[test]
    fn worker_error_displays_message_only() {
        let err = WorkerError::startup("engine load timed out after 30s");
        assert_eq!(err.to_string(), "engine load timed out after 30s");
    }
}
