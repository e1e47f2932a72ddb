//! Session establishment: wallet connection to capability session.

use rand::RngCore;
use tracing::debug;

use hashchat_core::{AccountIdentity, AuthorizationCredential, Ed25519Signature, Keypair};

use crate::capability::{CapabilityChain, DelegationStatement};
use crate::error::{AuthError, Result};
use crate::wallet::WalletProvider;

/// Domain-separation prefix for session-key activation signatures.
const ACTIVATION_SIGN_DOMAIN: &[u8] = b"hashchat-session-activation-v1:";

/// Configuration for session establishment.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Application domain bound into the delegation statement.
    pub domain: String,
    /// Session lifetime in milliseconds.
    pub session_ttl_ms: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            domain: "hashchat.xyz".to_string(),
            // One day, matching typical wallet auth-message expiries.
            session_ttl_ms: 24 * 60 * 60 * 1000,
        }
    }
}

/// An authenticated wallet session.
///
/// Holds the ephemeral signing key the wallet delegated to and the
/// credential presented to the policy oracle. Only constructed by
/// [`CapabilitySession::connect`]; never serialized.
pub struct CapabilitySession {
    account: AccountIdentity,
    keypair: Keypair,
    chain: CapabilityChain,
    credential: AuthorizationCredential,
    activation: Ed25519Signature,
    expires_at: i64,
}

impl CapabilitySession {
    /// Establish a session against a connected wallet.
    ///
    /// Protocol: fetch the wallet account, generate an ephemeral session
    /// key, have the wallet sign a delegation statement binding the key
    /// to the account and an expiry, package the chain as the oracle
    /// credential, then self-sign with the session key to activate it.
    /// Any failing step returns [`AuthError`]; no partial session exists.
    pub async fn connect(wallet: &dyn WalletProvider, config: &SessionConfig) -> Result<Self> {
        let account = wallet.account().await?;
        let now = now_millis();

        let keypair = Keypair::generate();
        let statement = DelegationStatement {
            domain: config.domain.clone(),
            account: account.clone(),
            session_key: keypair.public_key(),
            issued_at: now,
            expires_at: now + config.session_ttl_ms,
            nonce: fresh_nonce(),
        };

        let wallet_sig = wallet.sign_statement(&statement.signing_message()?).await?;
        let chain = CapabilityChain {
            statement,
            wallet_key: wallet_sig.signer,
            wallet_signature: wallet_sig.signature,
        };

        // Reject a bad delegation here rather than on first send.
        chain.verify(now)?;

        let credential = AuthorizationCredential::from_bytes(chain.to_bytes());

        // Activation: the session key countersigns its own delegation.
        let mut activation_msg = ACTIVATION_SIGN_DOMAIN.to_vec();
        activation_msg.extend_from_slice(credential.as_bytes());
        let activation = keypair.sign(&activation_msg);

        let expires_at = chain.statement.expires_at;
        debug!(account = %account, expires_at, "session established");

        Ok(Self {
            account,
            keypair,
            chain,
            credential,
            activation,
            expires_at,
        })
    }

    /// The wallet account this session acts for.
    pub fn account(&self) -> &AccountIdentity {
        &self.account
    }

    /// Hex identifier of the delegated session key.
    pub fn delegated_key_id(&self) -> String {
        self.keypair.public_key().to_hex()
    }

    /// The capability chain attached to outgoing envelopes.
    pub fn chain(&self) -> &CapabilityChain {
        &self.chain
    }

    /// The credential presented to the policy oracle.
    pub fn credential(&self) -> &AuthorizationCredential {
        &self.credential
    }

    /// The session key's activation signature over the credential.
    pub fn activation(&self) -> &Ed25519Signature {
        &self.activation
    }

    /// When the delegation lapses (Unix ms).
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Whether the session has lapsed.
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }

    /// Sign bytes with the delegated session key.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        self.keypair.sign(message)
    }
}

impl std::fmt::Debug for CapabilitySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilitySession")
            .field("account", &self.account.to_string())
            .field("delegated_key_id", &self.delegated_key_id())
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}

fn fresh_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
