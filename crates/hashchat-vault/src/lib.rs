//! # Hashchat Vault
//!
//! Channel key resolution, sealed-key storage, and content encryption.
//!
//! ## Overview
//!
//! Every channel has one symmetric content key. The key is never stored
//! in plaintext: on first use it is *sealed* by the policy oracle,
//! bound to the channel's access conditions, and only the sealed form
//! is persisted. Any later party satisfying the conditions can have the
//! oracle *unseal* it. The vault coordinates this lifecycle and keeps
//! unsealed keys in memory for the life of the process.
//!
//! ## Key Types
//!
//! - [`KeyVault`] - Resolves a channel's content key (create or fetch)
//! - [`PolicyOracle`] - Seam to the external seal/unseal oracle
//! - [`KeyValueStore`] - Seam to sealed-key persistence (memory, SQLite)
//! - [`MessageCipher`] / [`EncryptedEnvelope`] - AEAD content encryption
//!
//! ## Encryption Model
//!
//! Content is encrypted with XChaCha20-Poly1305 under the channel key.
//! Envelopes carry the key id (Blake3 of the sealed key) so a reader
//! knows which sealed record to resolve, a random 24-byte nonce, and
//! the ciphertext with its authentication tag.

pub mod cipher;
pub mod error;
pub mod kv;
pub mod oracle;
pub mod sqlite;
pub mod vault;

pub use cipher::{ContentKey, EncryptedEnvelope, EnvelopeFormat, MessageCipher};
pub use error::{CipherError, KeyError, Result, StorageError};
pub use kv::{KeyValueStore, MemoryKvStore};
pub use oracle::PolicyOracle;
pub use sqlite::SqliteKvStore;
pub use vault::{ChannelKeyRecord, KeyVault, VaultConfig};
