//! Error types for the transport module.

use thiserror::Error;

/// Errors from the transport and the token exchange.
///
/// All of these are transient from the protocol's point of view: safe
/// to retry with backoff at the caller's discretion.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Operation attempted before `connect`.
    #[error("not connected to transport")]
    NotConnected,

    /// Could not establish or authenticate the transport connection.
    #[error("transport connection failed: {0}")]
    ConnectionFailed(String),

    /// The backend token exchange failed.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// A publish did not reach the message store.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// A fetch or subscription read failed.
    #[error("fetch failed: {0}")]
    FetchFailed(String),

    /// The channel does not exist on the transport.
    #[error("channel not found: {0}")]
    ChannelNotFound(String),
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
