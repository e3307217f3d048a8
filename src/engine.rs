// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::{Read, Write};
use std::iter;

use age::armor::{ArmoredReader, ArmoredWriter, Format};
use age::x25519;
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::traits::{Engine, EngineLoader};

/// Engine built on the `age` crate with x25519 identities.
///
/// Ciphertexts are ASCII-armored so they stay copy-pasteable text; decryption accepts armored and
/// binary inputs alike. The engine is stateless and loads instantly, making its [`EngineLoader`]
/// impl the trivial case of the readiness handshake.
#[derive(Clone, Debug, Default)]
pub struct AgeEngine;

impl AgeEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Engine for AgeEngine {
    type Error = EngineError;

    fn generate_identity(&self) -> Result<(String, String), Self::Error> {
        let identity = x25519::Identity::generate();
        let public = identity.to_public().to_string();
        let private = identity.to_string().expose_secret().to_string();
        Ok((private, public))
    }

    fn encrypt(&self, plaintext: &str, recipients: &[String]) -> Result<String, Self::Error> {
        let mut parsed: Vec<x25519::Recipient> = Vec::with_capacity(recipients.len());
        for (index, recipient) in recipients.iter().enumerate() {
            // Recipient positions are reported 1-based.
            let recipient = recipient
                .parse::<x25519::Recipient>()
                .map_err(|err| EngineError::Recipient {
                    index: index + 1,
                    reason: err.to_string(),
                })?;
            parsed.push(recipient);
        }

        let encryptor = age::Encryptor::with_recipients(
            parsed.iter().map(|recipient| recipient as &dyn age::Recipient),
        )
        .map_err(|err| EngineError::EncryptStart {
            reason: err.to_string(),
        })?;

        let armored = ArmoredWriter::wrap_output(Vec::new(), Format::AsciiArmor).map_err(|err| {
            EngineError::Armor {
                reason: err.to_string(),
            }
        })?;
        let mut writer = encryptor
            .wrap_output(armored)
            .map_err(|err| EngineError::EncryptStart {
                reason: err.to_string(),
            })?;
        writer
            .write_all(plaintext.as_bytes())
            .map_err(|err| EngineError::EncryptWrite {
                reason: err.to_string(),
            })?;
        let armored = writer.finish().map_err(|err| EngineError::EncryptFinish {
            reason: err.to_string(),
        })?;
        let ciphertext = armored.finish().map_err(|err| EngineError::Armor {
            reason: err.to_string(),
        })?;

        // Armor output is plain ASCII.
        String::from_utf8(ciphertext).map_err(|err| EngineError::Armor {
            reason: err.to_string(),
        })
    }

    fn decrypt(&self, ciphertext: &str, private_key: &str) -> Result<String, Self::Error> {
        let identity = private_key
            .parse::<x25519::Identity>()
            .map_err(|err| EngineError::ParseIdentity {
                reason: err.to_string(),
            })?;

        let decryptor = age::Decryptor::new(ArmoredReader::new(ciphertext.as_bytes())).map_err(
            |err| EngineError::Decrypt {
                reason: err.to_string(),
            },
        )?;
        let mut reader = decryptor
            .decrypt(iter::once(&identity as &dyn age::Identity))
            .map_err(|err| EngineError::Decrypt {
                reason: err.to_string(),
            })?;

        let mut plaintext = Vec::new();
        reader
            .read_to_end(&mut plaintext)
            .map_err(|err| EngineError::DecryptRead {
                reason: err.to_string(),
            })?;

        String::from_utf8(plaintext).map_err(|err| EngineError::DecryptEncoding {
            reason: err.to_string(),
        })
    }
}

impl EngineLoader for AgeEngine {
    type Engine = AgeEngine;
    type Error = EngineError;

    fn load(self) -> impl Future<Output = Result<Self::Engine, Self::Error>> + Send {
        async move { Ok(self) }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// One of the recipient strings is not a valid age public key. Positions are 1-based.
    #[error("recipient #{index} could not be parsed as an age public key: {reason}")]
    Recipient { index: usize, reason: String },

    /// Constructing the encryption writer failed, for example because no recipients were given.
    #[error("failed to start age writer: {reason}")]
    EncryptStart { reason: String },

    #[error("failed to write to age encryptor: {reason}")]
    EncryptWrite { reason: String },

    #[error("failed to close age encryptor: {reason}")]
    EncryptFinish { reason: String },

    #[error("failed to write to age armor: {reason}")]
    Armor { reason: String },

    #[error("failed to parse private key: {reason}")]
    ParseIdentity { reason: String },

    /// The ciphertext header is malformed or none of the identities match it.
    #[error("failed to decrypt text: {reason}")]
    Decrypt { reason: String },

    #[error("failed to read decrypted text: {reason}")]
    DecryptRead { reason: String },

    /// The decrypted payload is not valid UTF-8 and cannot be returned as text.
    #[error("failed to decode decrypted text: {reason}")]
    DecryptEncoding { reason: String },
}
