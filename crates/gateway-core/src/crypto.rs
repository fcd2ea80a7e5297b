//! Credential encryption at rest
//!
//! Stored user credentials are sealed with AES-256-CTR under a process-wide key.
//! The envelope format is `hex(iv):hex(ciphertext)` with a fresh 16-byte IV per call.
//!
//! There is no key versioning: rotating the key makes every stored envelope
//! undecryptable, and `decrypt` reports those as [`CipherError::MalformedEnvelope`].

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::{rngs::OsRng, RngCore};
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Key length in bytes (AES-256)
pub const KEY_LENGTH: usize = 32;
/// IV length in bytes
pub const IV_LENGTH: usize = 16;

const DELIMITER: char = ':';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),
}

/// Symmetric cipher for credential material.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct CredentialCipher {
    key: [u8; KEY_LENGTH],
}

impl CredentialCipher {
    pub fn new(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Build a cipher from configured key material: either exactly 32 bytes of
    /// text or 64 hex digits.
    pub fn from_key_material(material: &str) -> Result<Self, CipherError> {
        let bytes = if material.len() == KEY_LENGTH {
            material.as_bytes().to_vec()
        } else if material.len() == KEY_LENGTH * 2 {
            hex::decode(material)
                .map_err(|e| CipherError::InvalidKey(format!("invalid hex key: {e}")))?
        } else {
            return Err(CipherError::InvalidKey(format!(
                "expected {KEY_LENGTH} bytes or {} hex digits, got {} bytes",
                KEY_LENGTH * 2,
                material.len()
            )));
        };

        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(&bytes);
        Ok(Self::new(key))
    }

    /// Encrypt a credential into an envelope.
    pub fn encrypt(&self, plaintext: &str) -> String {
        let mut iv = [0u8; IV_LENGTH];
        OsRng.fill_bytes(&mut iv);

        let mut buffer = plaintext.as_bytes().to_vec();
        self.keystream(&iv).apply_keystream(&mut buffer);

        let envelope = format!("{}{DELIMITER}{}", hex::encode(iv), hex::encode(&buffer));
        buffer.zeroize();
        envelope
    }

    /// Recover the plaintext credential from an envelope.
    pub fn decrypt(&self, envelope: &str) -> Result<String, CipherError> {
        let (iv_hex, ciphertext_hex) = envelope
            .split_once(DELIMITER)
            .ok_or_else(|| CipherError::MalformedEnvelope("missing delimiter".to_string()))?;

        if iv_hex.len() != IV_LENGTH * 2 {
            return Err(CipherError::MalformedEnvelope(format!(
                "iv must be {} hex digits",
                IV_LENGTH * 2
            )));
        }
        let mut iv = [0u8; IV_LENGTH];
        hex::decode_to_slice(iv_hex, &mut iv)
            .map_err(|e| CipherError::MalformedEnvelope(format!("iv: {e}")))?;

        let mut buffer = hex::decode(ciphertext_hex)
            .map_err(|e| CipherError::MalformedEnvelope(format!("ciphertext: {e}")))?;
        self.keystream(&iv).apply_keystream(&mut buffer);

        String::from_utf8(buffer).map_err(|e| {
            let mut bytes = e.into_bytes();
            bytes.zeroize();
            CipherError::MalformedEnvelope("plaintext is not valid UTF-8".to_string())
        })
    }

    fn keystream(&self, iv: &[u8; IV_LENGTH]) -> Aes256Ctr {
        Aes256Ctr::new(&self.key.into(), &(*iv).into())
    }
}

impl fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCipher").finish_non_exhaustive()
    }
}
