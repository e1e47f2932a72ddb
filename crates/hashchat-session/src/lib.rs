//! # Hashchat Session
//!
//! Wallet sessions, capability delegation, and message signing.
//!
//! ## Overview
//!
//! A Hashchat identity is a wallet, but wallets cannot be asked to sign
//! every message. Instead, `connect` derives an ephemeral session key and
//! has the wallet sign a *delegation statement* binding that key to the
//! wallet account for a bounded time. The statement plus the wallet
//! signature form a [`CapabilityChain`]: a self-contained proof that
//! travels inside every signed message, so any recipient can verify
//! provenance back to the wallet without knowing the sender's session.
//!
//! ## Key Types
//!
//! - [`WalletProvider`] - Seam to the connected wallet (external)
//! - [`CapabilitySession`] - An authenticated session holding the
//!   delegated signing key and the authorization credential
//! - [`MessageSigner`] - Signs payloads under a session, verifies
//!   envelopes against their embedded chain
//! - [`SignedEnvelope`] - Payload + proof + capability chain

pub mod capability;
pub mod error;
pub mod session;
pub mod signer;
pub mod wallet;

pub use capability::{CapabilityChain, DelegationStatement};
pub use error::{AuthError, VerificationError, WalletError};
pub use session::{now_millis, CapabilitySession, SessionConfig};
pub use signer::{MessageSigner, SignedEnvelope, VerifiedMessage};
pub use wallet::{local::LocalWallet, wallet_address, WalletProvider, WalletSignature};
