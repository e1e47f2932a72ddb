//! Error types for the chat pipeline.

use thiserror::Error;

use hashchat_core::CoreError;
use hashchat_policy::{ChannelId, PolicyError};
use hashchat_session::{AuthError, VerificationError};
use hashchat_transport::TransportError;
use hashchat_vault::{CipherError, KeyError};

/// Errors that can occur during pipeline operations.
///
/// Retry guidance: [`ChatError::Transport`] and
/// [`KeyError::OracleUnavailable`] are transient and safe to retry with
/// backoff. Policy and cryptographic failures
/// ([`KeyError::AccessDenied`], [`ChatError::Cipher`],
/// [`ChatError::Verification`]) are terminal for the attempt: blind
/// retry cannot change the outcome and they should surface to the user.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Operation requires an authenticated pipeline.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The session's capability delegation has lapsed.
    #[error("session expired")]
    SessionExpired,

    /// The channel holds no message to fetch.
    #[error("no message on channel {0}")]
    NoMessage(ChannelId),

    /// Session establishment failed.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Policy construction failed.
    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    /// Key resolution failed.
    #[error("key error: {0}")]
    Key(#[from] KeyError),

    /// Content encryption or decryption failed.
    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),

    /// Envelope verification failed.
    #[error("verification error: {0}")]
    Verification(#[from] VerificationError),

    /// Transport or token-exchange failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Canonical encoding failure.
    #[error("encoding error: {0}")]
    Encoding(#[from] CoreError),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, ChatError>;
