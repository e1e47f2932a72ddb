//! Error types for sessions and message verification.

use thiserror::Error;

use hashchat_core::CoreError;

/// Errors surfaced by a wallet provider.
#[derive(Debug, Error)]
pub enum WalletError {
    /// The user rejected the signature request.
    #[error("wallet rejected the signature request: {0}")]
    Rejected(String),

    /// The provider dropped the connection mid-flow.
    #[error("wallet provider disconnected: {0}")]
    Disconnected(String),

    /// The provider reported a chain this system cannot resolve.
    #[error("unresolvable wallet chain: {0}")]
    UnresolvableChain(String),
}

/// Errors during session establishment.
///
/// Any failing step surfaces here with the underlying cause attached;
/// no partial session is ever returned.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The wallet provider failed or refused.
    #[error("wallet error: {0}")]
    Wallet(#[from] WalletError),

    /// The delegation statement could not be encoded.
    #[error("encoding error: {0}")]
    Encoding(#[from] CoreError),

    /// The wallet produced a delegation the session itself cannot verify.
    #[error("invalid delegation: {0}")]
    InvalidDelegation(#[from] VerificationError),
}

/// Errors during envelope or capability-chain verification.
///
/// All of these are terminal for the current message: retrying cannot
/// change a cryptographic outcome.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// A signature did not verify against the claimed key.
    #[error("signature invalid")]
    SignatureInvalid,

    /// The capability delegation has expired.
    #[error("capability expired at {expires_at}, now {now}")]
    CapabilityExpired { expires_at: i64, now: i64 },

    /// The chain is structurally unusable.
    #[error("malformed capability chain: {0}")]
    MalformedChain(String),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, AuthError>;
