//! Error types for the policy module.

use thiserror::Error;

use hashchat_core::CoreError;

/// Errors that can occur during policy construction.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A member's chain namespace has no mapping to the oracle's chain
    /// identifier space.
    #[error("unsupported chain namespace: {0}")]
    UnsupportedChainNamespace(String),

    /// An EVM chain reference the oracle has no name for.
    #[error("unknown chain reference: {namespace}:{reference}")]
    UnknownChainReference { namespace: String, reference: String },

    /// A channel policy needs at least one member or gate.
    #[error("channel {0} has no members to build a policy from")]
    NoMembers(String),

    /// A channel id that does not decode as the claimed kind.
    #[error("malformed channel id: {0}")]
    MalformedChannelId(String),

    /// An asset gate token id that is not valid hex.
    #[error("invalid token id: {0}")]
    InvalidTokenId(String),

    /// Canonical encoding failure.
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl From<CoreError> for PolicyError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::UnsupportedChainNamespace(ns) => PolicyError::UnsupportedChainNamespace(ns),
            CoreError::UnknownChainReference {
                namespace,
                reference,
            } => PolicyError::UnknownChainReference {
                namespace,
                reference,
            },
            other => PolicyError::Encoding(other.to_string()),
        }
    }
}

/// Result type for policy operations.
pub type Result<T> = std::result::Result<T, PolicyError>;
