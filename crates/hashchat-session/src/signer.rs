//! Message signing and verification.
//!
//! Outgoing payloads are signed with the session's delegated key; the
//! capability chain rides along so any holder of the channel key can
//! verify provenance back to the wallet after decryption, with no
//! knowledge of the sender's live session.

use serde::{Deserialize, Serialize};

use hashchat_core::{
    canonical_payload_bytes, AccountIdentity, CoreError, Ed25519Signature, MessagePayload,
};

use crate::capability::CapabilityChain;
use crate::error::VerificationError;
use crate::session::CapabilitySession;

/// Domain-separation prefix for payload signatures.
const PAYLOAD_SIGN_DOMAIN: &[u8] = b"hashchat-payload-v1:";

/// A payload plus the proof and chain needed to verify it standalone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    /// The plaintext payload.
    pub payload: MessagePayload,

    /// Session-key signature over the payload's signing message.
    pub proof: Ed25519Signature,

    /// Delegation proof from the wallet to the session key.
    pub chain: CapabilityChain,
}

impl SignedEnvelope {
    /// Serialize to CBOR bytes (what the cipher encrypts).
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

/// A verified incoming message: the payload and who sent it.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedMessage {
    /// The payload, exactly as signed.
    pub payload: MessagePayload,
    /// The wallet account the capability chain roots to.
    pub signer: AccountIdentity,
}

/// Signs outgoing payloads; verifies incoming envelopes.
///
/// Stateless: the session is passed into `sign`, and `verify` relies
/// only on what the envelope itself carries.
#[derive(Debug, Clone, Default)]
pub struct MessageSigner;

impl MessageSigner {
    pub fn new() -> Self {
        Self
    }

    /// Sign a payload under the session's delegated key.
    pub fn sign(
        &self,
        payload: &MessagePayload,
        session: &CapabilitySession,
    ) -> Result<SignedEnvelope, CoreError> {
        let message = signing_message(payload)?;
        Ok(SignedEnvelope {
            payload: payload.clone(),
            proof: session.sign(&message),
            chain: session.chain().clone(),
        })
    }

    /// Verify an envelope at the given time.
    ///
    /// Recomputes the canonical payload bytes, validates the capability
    /// chain (well-formed, non-expired, wallet-signed), and checks the
    /// proof against the exact session key the chain names.
    pub fn verify(
        &self,
        envelope: &SignedEnvelope,
        now: i64,
    ) -> Result<VerifiedMessage, VerificationError> {
        envelope.chain.verify(now)?;

        let message = signing_message(&envelope.payload)
            .map_err(|e| VerificationError::MalformedChain(e.to_string()))?;

        if !envelope
            .chain
            .statement
            .session_key
            .verify(&message, &envelope.proof)
        {
            return Err(VerificationError::SignatureInvalid);
        }

        Ok(VerifiedMessage {
            payload: envelope.payload.clone(),
            signer: envelope.chain.statement.account.clone(),
        })
    }
}

fn signing_message(payload: &MessagePayload) -> Result<Vec<u8>, CoreError> {
    let mut msg = PAYLOAD_SIGN_DOMAIN.to_vec();
    msg.extend_from_slice(&canonical_payload_bytes(payload)?);
    Ok(msg)
}
