//! Error types for Hashchat Core.

use thiserror::Error;

/// Core errors for identity parsing and canonical encoding.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unsupported chain namespace: {0}")]
    UnsupportedChainNamespace(String),

    #[error("unknown chain reference for {namespace}: {reference}")]
    UnknownChainReference {
        namespace: String,
        reference: String,
    },

    #[error("malformed account id: {0}")]
    MalformedAccountId(String),

    #[error("floats are not permitted in canonical payloads")]
    FloatInCanonicalValue,

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}
