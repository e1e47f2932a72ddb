//! Content encryption: XChaCha20-Poly1305 under the channel key.
//!
//! The extended 24-byte nonce is generated randomly per encryption,
//! which is safe under random generation for the message volumes a chat
//! channel sees.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use hashchat_core::KeyId;

use crate::error::CipherError;

/// Length of a content key in bytes.
pub const CONTENT_KEY_LEN: usize = 32;

/// Length of an envelope nonce in bytes.
pub const NONCE_LEN: usize = 24;

/// A 256-bit symmetric content key for one channel.
///
/// Held only in memory; the persisted form is always the oracle-sealed
/// encoding.
#[derive(Clone, PartialEq, Eq)]
pub struct ContentKey([u8; CONTENT_KEY_LEN]);

impl ContentKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; CONTENT_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; CONTENT_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, e.g. oracle-returned key material.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CipherError> {
        let arr: [u8; CONTENT_KEY_LEN] = bytes.try_into().map_err(|_| {
            CipherError::MalformedEnvelope(format!(
                "invalid key length: expected {CONTENT_KEY_LEN}, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; CONTENT_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Redacted: key material must not leak through logs.
        write!(f, "ContentKey(..)")
    }
}

/// Format identifier for encrypted envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EnvelopeFormat {
    /// XChaCha20-Poly1305 with 256-bit key and 24-byte nonce.
    XChaCha20Poly1305 = 1,
}

/// An encrypted message envelope, opaque to the transport.
///
/// Carries everything a reader needs besides the key itself: which
/// sealed key it was encrypted under, the nonce, and the ciphertext
/// (authentication tag included).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// Encryption algorithm used.
    pub format: EnvelopeFormat,

    /// Id of the channel key this was encrypted under.
    pub key_id: KeyId,

    /// Nonce used for encryption (unique per encryption).
    pub nonce: [u8; NONCE_LEN],

    /// The encrypted data, authentication tag appended.
    pub ciphertext: Vec<u8>,
}

impl EncryptedEnvelope {
    /// Serialize to CBOR bytes (what the transport carries).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CipherError> {
        ciborium::from_reader(bytes).map_err(|e| CipherError::MalformedEnvelope(e.to_string()))
    }
}

/// Encrypts and decrypts message bodies with a resolved content key.
#[derive(Debug, Clone, Default)]
pub struct MessageCipher;

impl MessageCipher {
    pub fn new() -> Self {
        Self
    }

    /// Encrypt plaintext under a channel key.
    ///
    /// `key_id` must be the id derived from the key's sealed record; it
    /// travels in the envelope so readers resolve the right key.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        key: &ContentKey,
        key_id: KeyId,
    ) -> Result<EncryptedEnvelope, CipherError> {
        let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
            .map_err(|e| CipherError::EncryptionError(e.to_string()))?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|e| CipherError::EncryptionError(e.to_string()))?;

        Ok(EncryptedEnvelope {
            format: EnvelopeFormat::XChaCha20Poly1305,
            key_id,
            nonce,
            ciphertext,
        })
    }

    /// Decrypt an envelope with a channel key.
    ///
    /// `supplied_key_id` is the id of the sealed record `key` came
    /// from. Fails with [`CipherError::KeyMismatch`] if it disagrees
    /// with the envelope, and with [`CipherError::AuthenticationFailed`]
    /// if the tag check fails (tampered or wrong key).
    pub fn decrypt(
        &self,
        envelope: &EncryptedEnvelope,
        key: &ContentKey,
        supplied_key_id: KeyId,
    ) -> Result<Vec<u8>, CipherError> {
        if envelope.key_id != supplied_key_id {
            return Err(CipherError::KeyMismatch {
                envelope: envelope.key_id,
                supplied: supplied_key_id,
            });
        }

        match envelope.format {
            EnvelopeFormat::XChaCha20Poly1305 => {
                let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
                    .map_err(|_| CipherError::AuthenticationFailed)?;
                cipher
                    .decrypt(XNonce::from_slice(&envelope.nonce), envelope.ciphertext.as_slice())
                    .map_err(|_| CipherError::AuthenticationFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_and_id() -> (ContentKey, KeyId) {
        (ContentKey::generate(), KeyId::derive(b"sealed-form"))
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let (key, key_id) = key_and_id();
        let cipher = MessageCipher::new();

        let envelope = cipher.encrypt(b"hello, sealed world", &key, key_id).unwrap();
        assert_ne!(envelope.ciphertext, b"hello, sealed world");

        let plaintext = cipher.decrypt(&envelope, &key, key_id).unwrap();
        assert_eq!(plaintext, b"hello, sealed world");
    }

    #[test]
    fn test_nonces_are_unique() {
        let (key, key_id) = key_and_id();
        let cipher = MessageCipher::new();
        let e1 = cipher.encrypt(b"same", &key, key_id).unwrap();
        let e2 = cipher.encrypt(b"same", &key, key_id).unwrap();
        assert_ne!(e1.nonce, e2.nonce);
        assert_ne!(e1.ciphertext, e2.ciphertext);
    }

    #[test]
    fn test_key_mismatch_detected_before_decryption() {
        let (key, key_id) = key_and_id();
        let other_id = KeyId::derive(b"another-sealed-form");
        let cipher = MessageCipher::new();

        let envelope = cipher.encrypt(b"secret", &key, key_id).unwrap();
        assert!(matches!(
            cipher.decrypt(&envelope, &key, other_id),
            Err(CipherError::KeyMismatch { .. })
        ));
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let (key, key_id) = key_and_id();
        let cipher = MessageCipher::new();
        let envelope = cipher.encrypt(b"secret", &key, key_id).unwrap();

        let wrong = ContentKey::generate();
        assert!(matches!(
            cipher.decrypt(&envelope, &wrong, key_id),
            Err(CipherError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_any_bit_flip_fails_authentication() {
        let (key, key_id) = key_and_id();
        let cipher = MessageCipher::new();
        let envelope = cipher.encrypt(b"integrity matters", &key, key_id).unwrap();

        // Flip one bit at every position, ciphertext and tag alike.
        for i in 0..envelope.ciphertext.len() {
            let mut tampered = envelope.clone();
            tampered.ciphertext[i] ^= 0x01;
            assert!(
                matches!(
                    cipher.decrypt(&tampered, &key, key_id),
                    Err(CipherError::AuthenticationFailed)
                ),
                "bit flip at byte {i} was not detected"
            );
        }
    }

    #[test]
    fn test_envelope_bytes_roundtrip() {
        let (key, key_id) = key_and_id();
        let cipher = MessageCipher::new();
        let envelope = cipher.encrypt(b"wire form", &key, key_id).unwrap();

        let recovered = EncryptedEnvelope::from_bytes(&envelope.to_bytes()).unwrap();
        assert_eq!(envelope, recovered);
        assert_eq!(cipher.decrypt(&recovered, &key, key_id).unwrap(), b"wire form");
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(matches!(
            EncryptedEnvelope::from_bytes(b"not cbor at all"),
            Err(CipherError::MalformedEnvelope(_))
        ));
    }
}
