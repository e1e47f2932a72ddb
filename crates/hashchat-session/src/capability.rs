//! Capability delegation chains.
//!
//! A chain is the serializable proof that a session key may act for a
//! wallet: the delegation statement the wallet signed, plus the wallet's
//! signature and verifying key. Verification is self-contained: it
//! never consults the verifier's own session state.

use serde::{Deserialize, Serialize};

use hashchat_core::{
    canonical_bytes, AccountIdentity, CoreError, Ed25519PublicKey, Ed25519Signature,
};

use crate::error::VerificationError;
use crate::wallet::wallet_address;

/// Domain-separation prefix for delegation statement signatures.
const DELEGATION_SIGN_DOMAIN: &[u8] = b"hashchat-delegation-v1:";

/// The statement a wallet signs to delegate signing to a session key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationStatement {
    /// The application domain requesting the delegation.
    pub domain: String,

    /// The delegating wallet account.
    pub account: AccountIdentity,

    /// The session key being authorized.
    pub session_key: Ed25519PublicKey,

    /// When the delegation was issued (Unix ms). Author-claimed.
    pub issued_at: i64,

    /// When the delegation lapses (Unix ms).
    pub expires_at: i64,

    /// Fresh randomness so identical statements never collide.
    pub nonce: String,
}

impl DelegationStatement {
    /// The deterministic bytes of the statement.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CoreError> {
        canonical_bytes(self)
    }

    /// The domain-separated message the wallet signs.
    pub fn signing_message(&self) -> Result<Vec<u8>, CoreError> {
        let mut msg = DELEGATION_SIGN_DOMAIN.to_vec();
        msg.extend_from_slice(&self.canonical_bytes()?);
        Ok(msg)
    }
}

/// A delegation statement plus the wallet signature that roots it.
///
/// Carried inside every signed envelope so verification needs no live
/// session object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityChain {
    /// The signed statement.
    pub statement: DelegationStatement,

    /// The wallet verifying key that claims to have signed it.
    pub wallet_key: Ed25519PublicKey,

    /// The wallet's signature over the statement's signing message.
    pub wallet_signature: Ed25519Signature,
}

impl CapabilityChain {
    /// Verify the chain at the given time.
    ///
    /// Checks, in order: structural well-formedness, expiry, the wallet
    /// signature over the canonical statement bytes, and that the stated
    /// account address is the one this wallet key derives for its
    /// namespace.
    pub fn verify(&self, now: i64) -> Result<(), VerificationError> {
        if self.statement.expires_at <= self.statement.issued_at {
            return Err(VerificationError::MalformedChain(
                "expiry precedes issuance".into(),
            ));
        }

        if now > self.statement.expires_at {
            return Err(VerificationError::CapabilityExpired {
                expires_at: self.statement.expires_at,
                now,
            });
        }

        let message = self
            .statement
            .signing_message()
            .map_err(|e| VerificationError::MalformedChain(e.to_string()))?;

        if !self.wallet_key.verify(&message, &self.wallet_signature) {
            return Err(VerificationError::SignatureInvalid);
        }

        // The chain must be rooted in the wallet it names: the stated
        // address has to match the one the signing key derives.
        let derived = wallet_address(&self.statement.account.namespace, &self.wallet_key);
        if derived != self.statement.account.address {
            return Err(VerificationError::SignatureInvalid);
        }

        Ok(())
    }

    /// Serialize to CBOR bytes (the credential encoding).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VerificationError> {
        ciborium::from_reader(bytes)
            .map_err(|e| VerificationError::MalformedChain(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashchat_core::Keypair;

    fn chain_for(wallet: &Keypair, session: &Keypair, issued_at: i64, ttl: i64) -> CapabilityChain {
        let account = AccountIdentity::eip155(
            1,
            wallet_address(&hashchat_core::ChainNamespace::Eip155, &wallet.public_key()),
        );
        let statement = DelegationStatement {
            domain: "hashchat.xyz".into(),
            account,
            session_key: session.public_key(),
            issued_at,
            expires_at: issued_at + ttl,
            nonce: "6e6f6e6365".into(),
        };
        let signature = wallet.sign(&statement.signing_message().unwrap());
        CapabilityChain {
            statement,
            wallet_key: wallet.public_key(),
            wallet_signature: signature,
        }
    }

    #[test]
    fn test_valid_chain_verifies() {
        let wallet = Keypair::from_seed(&[1u8; 32]);
        let session = Keypair::from_seed(&[2u8; 32]);
        let chain = chain_for(&wallet, &session, 1000, 10_000);
        chain.verify(2000).unwrap();
    }

    #[test]
    fn test_expired_chain_fails() {
        let wallet = Keypair::from_seed(&[1u8; 32]);
        let session = Keypair::from_seed(&[2u8; 32]);
        let chain = chain_for(&wallet, &session, 1000, 10_000);
        assert!(matches!(
            chain.verify(12_000),
            Err(VerificationError::CapabilityExpired { .. })
        ));
    }

    #[test]
    fn test_tampered_statement_fails() {
        let wallet = Keypair::from_seed(&[1u8; 32]);
        let session = Keypair::from_seed(&[2u8; 32]);
        let mut chain = chain_for(&wallet, &session, 1000, 10_000);
        chain.statement.domain = "evil.example".into();
        assert!(matches!(
            chain.verify(2000),
            Err(VerificationError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_wrong_wallet_key_fails() {
        let wallet = Keypair::from_seed(&[1u8; 32]);
        let session = Keypair::from_seed(&[2u8; 32]);
        let mut chain = chain_for(&wallet, &session, 1000, 10_000);
        // Another key claiming the same account.
        chain.wallet_key = Keypair::from_seed(&[3u8; 32]).public_key();
        assert!(matches!(
            chain.verify(2000),
            Err(VerificationError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_address_binding_checked() {
        let wallet = Keypair::from_seed(&[1u8; 32]);
        let session = Keypair::from_seed(&[2u8; 32]);
        let mut chain = chain_for(&wallet, &session, 1000, 10_000);
        // Re-sign a statement naming someone else's address.
        chain.statement.account.address = "0xsomeoneelse".into();
        chain.wallet_signature = wallet.sign(&chain.statement.signing_message().unwrap());
        assert!(matches!(
            chain.verify(2000),
            Err(VerificationError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_inverted_validity_window_fails() {
        let wallet = Keypair::from_seed(&[1u8; 32]);
        let session = Keypair::from_seed(&[2u8; 32]);
        let chain = chain_for(&wallet, &session, 1000, -1);
        assert!(matches!(
            chain.verify(500),
            Err(VerificationError::MalformedChain(_))
        ));
    }

    #[test]
    fn test_chain_bytes_roundtrip() {
        let wallet = Keypair::from_seed(&[1u8; 32]);
        let session = Keypair::from_seed(&[2u8; 32]);
        let chain = chain_for(&wallet, &session, 1000, 10_000);
        let recovered = CapabilityChain::from_bytes(&chain.to_bytes()).unwrap();
        assert_eq!(chain, recovered);
        recovered.verify(2000).unwrap();
    }
}
