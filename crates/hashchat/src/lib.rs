//! # Hashchat
//!
//! The unified API for Hashchat: end-to-end-encrypted, wallet-to-wallet
//! messaging over an untrusted pub/sub transport.
//!
//! ## Overview
//!
//! Hashchat lets wallet-identified participants exchange encrypted,
//! authenticated messages where confidentiality is gated by
//! on-chain-verifiable access policies rather than server ACLs:
//!
//! - **Sessions**: a wallet signature delegates signing to an ephemeral
//!   session key for a bounded time
//! - **Policies**: each channel's content key is released only to
//!   requesters satisfying its access conditions
//! - **Envelopes**: messages are signed, then sealed; the transport only
//!   ever carries opaque ciphertext
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hashchat::{ChatPipeline, PipelineConfig};
//! use hashchat::policy::{AccessPolicyBuilder, ChannelDescriptor, ChannelId};
//! use hashchat::session::{LocalWallet, MessageSigner};
//! use hashchat::transport::{LocalTokenExchange, MemoryHub};
//! use hashchat::vault::{KeyVault, MemoryKvStore, MessageCipher, VaultConfig};
//! use hashchat::core::MessagePayload;
//! # use hashchat::vault::PolicyOracle;
//!
//! async fn example(oracle: Arc<dyn PolicyOracle>) {
//!     let hub = MemoryHub::new();
//!     let vault = KeyVault::new(Arc::new(MemoryKvStore::new()), oracle, VaultConfig::default());
//!
//!     let pipeline = ChatPipeline::new(
//!         AccessPolicyBuilder::new(),
//!         vault,
//!         MessageSigner::new(),
//!         MessageCipher::new(),
//!         Arc::new(LocalTokenExchange::new()),
//!         Arc::new(hub.client()),
//!         PipelineConfig::default(),
//!     );
//!
//!     let wallet = LocalWallet::eip155(1);
//!     pipeline.authenticate(&wallet).await.unwrap();
//!
//!     let channel = ChannelDescriptor::direct(ChannelId::from("c1"));
//!     let payload = MessagePayload::message(serde_json::json!({"content": "hi"}));
//!     pipeline.send(&channel, payload).await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `hashchat::core` - Identities, payloads, canonicalization
//! - `hashchat::policy` - Access conditions and channel policies
//! - `hashchat::session` - Wallet sessions and message signing
//! - `hashchat::vault` - Key resolution and content encryption
//! - `hashchat::transport` - Transport and token-exchange seams

pub mod config;
pub mod error;
pub mod pipeline;

// Re-export component crates
pub use hashchat_core as core;
pub use hashchat_policy as policy;
pub use hashchat_session as session;
pub use hashchat_transport as transport;
pub use hashchat_vault as vault;

// Re-export main types for convenience
pub use config::PipelineConfig;
pub use error::{ChatError, Result};
pub use pipeline::{ChatPipeline, MessageStream};

// Re-export commonly used component types
pub use hashchat_core::{AccountIdentity, MessageId, MessagePayload};
pub use hashchat_policy::{ChannelDescriptor, ChannelId};
pub use hashchat_session::VerifiedMessage;
