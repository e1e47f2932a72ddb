//! Policy-evaluation oracle seam.
//!
//! The oracle is an external, trusted service: it wraps content keys so
//! they can only be recovered by a requester whose credential satisfies
//! the bound access conditions. This crate consumes it as a black box.

use async_trait::async_trait;

use hashchat_core::AuthorizationCredential;
use hashchat_policy::ConditionSet;

use crate::error::KeyError;

/// Seam to the policy-evaluation oracle.
///
/// Implementations must be thread-safe (Send + Sync).
///
/// # Error contract
///
/// Connectivity failures map to [`KeyError::OracleUnavailable`]
/// (retryable); a policy evaluation that rejects the requester maps to
/// [`KeyError::AccessDenied`] (terminal for these credentials).
#[async_trait]
pub trait PolicyOracle: Send + Sync {
    /// Seal a content key under a condition set.
    ///
    /// Returns the sealed form, recoverable only through [`unseal`]
    /// with a satisfying credential.
    ///
    /// [`unseal`]: PolicyOracle::unseal
    async fn seal(
        &self,
        conditions: &ConditionSet,
        key: &[u8],
        credential: &AuthorizationCredential,
    ) -> Result<Vec<u8>, KeyError>;

    /// Recover a content key from its sealed form.
    async fn unseal(
        &self,
        conditions: &ConditionSet,
        sealed: &[u8],
        credential: &AuthorizationCredential,
    ) -> Result<Vec<u8>, KeyError>;
}
