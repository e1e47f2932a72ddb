//! Error types for the vault module.

use thiserror::Error;

use hashchat_core::KeyId;

/// Errors from the key-value storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A blocking task failed to complete.
    #[error("storage task failed: {0}")]
    TaskFailed(String),

    /// Schema migration failure.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors during channel key resolution.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The oracle could not be reached. Transient; safe to retry with
    /// backoff.
    #[error("policy oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// The oracle evaluated the conditions and refused key release.
    /// Terminal for the current credentials; retrying cannot change a
    /// policy outcome.
    #[error("access denied by channel policy: {0}")]
    AccessDenied(String),

    /// The persisted sealed-key record cannot be used (storage
    /// corruption, or the oracle returned key material of the wrong
    /// shape).
    #[error("malformed sealed key: {0}")]
    MalformedSealedKey(String),

    /// Storage backend failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Canonical encoding failure.
    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Errors during content encryption and decryption.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The supplied key's id disagrees with the envelope's key id.
    #[error("key mismatch: envelope sealed under {envelope}, supplied {supplied}")]
    KeyMismatch { envelope: KeyId, supplied: KeyId },

    /// AEAD tag check failed: the envelope was tampered with or sealed
    /// under a different key. Never retried silently.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The envelope bytes do not decode.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Encryption-side failure.
    #[error("encryption error: {0}")]
    EncryptionError(String),
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, KeyError>;
