//! # Hashchat Transport
//!
//! Pub/sub transport seam and backend token exchange.
//!
//! ## Overview
//!
//! The transport is an opaque message store: Hashchat only publishes and
//! fetches ciphertext blobs per channel and reads channel membership.
//! Authentication to the transport goes through the backend token
//! exchange, which maps a wallet identity (proven by its authorization
//! credential) to a transport user id and token.
//!
//! Implementations may use any pub/sub service; the in-process
//! [`memory`] hub backs tests and the testkit.
//!
//! [`memory`]: transport::memory

pub mod error;
pub mod token;
pub mod transport;

pub use error::{Result, TransportError};
pub use token::{local::LocalTokenExchange, HttpTokenExchange, TokenExchange, TransportCredentials};
pub use transport::{memory::MemoryHub, memory::MemoryTransport, EnvelopeStream, Transport};
