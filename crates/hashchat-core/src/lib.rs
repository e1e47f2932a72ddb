//! # Hashchat Core
//!
//! Pure primitives for Hashchat: wallet identities, message payloads,
//! and canonicalization.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over the data structures every other Hashchat crate builds
//! on.
//!
//! ## Key Types
//!
//! - [`AccountIdentity`] - Chain-namespaced wallet address (CAIP-10 style)
//! - [`MessagePayload`] - Plaintext chat message payload
//! - [`Keypair`] - Ed25519 signing key (sessions, local wallets)
//! - [`KeyId`] - Content-address of a sealed channel key (Blake3 hash)
//!
//! ## Canonicalization
//!
//! Everything that is signed or bound by the policy oracle is encoded as
//! deterministic CBOR. See [`canonical`].

pub mod canonical;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod payload;

pub use canonical::{canonical_bytes, canonical_json_value, canonical_payload_bytes};
pub use crypto::{AuthorizationCredential, Ed25519PublicKey, Ed25519Signature, KeyId, Keypair};
pub use error::CoreError;
pub use identity::{oracle_chain_name, AccountIdentity, ChainNamespace};
pub use payload::{MessageId, MessageKind, MessagePayload};
