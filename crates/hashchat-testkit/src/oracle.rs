//! An in-process policy oracle.
//!
//! Behaves like the real thing from the vault's point of view: `seal`
//! wraps a content key under a secret bound to the canonical condition
//! bytes, and `unseal` releases it only after evaluating the conditions
//! against registered chain state (addresses, balances, roles) for the
//! wallet the credential proves.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;

use hashchat_core::{AccountIdentity, AuthorizationCredential};
use hashchat_policy::{AccessCondition, Combinator, Comparator, ConditionEntry, ConditionSet};
use hashchat_session::{now_millis, CapabilityChain};
use hashchat_vault::{KeyError, PolicyOracle};

const NONCE_LEN: usize = 24;

/// Simulated chain state the oracle evaluates conditions against.
#[derive(Default)]
struct ChainState {
    /// (chain, contract, holder address) -> balance.
    balances: HashMap<(String, String, String), u64>,
    /// (chain, contract, token id decimal) -> owner address.
    token_owners: HashMap<(String, String, String), String>,
    /// (chain, contract, method, address) -> predicate result.
    roles: HashMap<(String, String, String, String), bool>,
}

/// In-process oracle implementation.
pub struct LocalOracle {
    secret: [u8; 32],
    state: RwLock<ChainState>,
}

impl LocalOracle {
    /// Create an oracle with a random network secret.
    pub fn new() -> Self {
        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self {
            secret,
            state: RwLock::new(ChainState::default()),
        }
    }

    /// Register a token balance.
    pub fn register_balance(&self, chain: &str, contract: &str, holder: &str, balance: u64) {
        self.state
            .write()
            .expect("lock poisoned")
            .balances
            .insert((chain.into(), contract.into(), holder.into()), balance);
    }

    /// Register a token's owner.
    pub fn register_token_owner(&self, chain: &str, contract: &str, token_id: &str, owner: &str) {
        self.state
            .write()
            .expect("lock poisoned")
            .token_owners
            .insert((chain.into(), contract.into(), token_id.into()), owner.into());
    }

    /// Register a role-predicate result for an address.
    pub fn register_role(&self, chain: &str, contract: &str, method: &str, address: &str, held: bool) {
        self.state
            .write()
            .expect("lock poisoned")
            .roles
            .insert(
                (chain.into(), contract.into(), method.into(), address.into()),
                held,
            );
    }

    /// The key that wraps content keys sealed under a condition set.
    fn wrap_key(&self, conditions: &ConditionSet) -> Result<[u8; 32], KeyError> {
        let condition_bytes = conditions
            .canonical_bytes()
            .map_err(|e| KeyError::Encoding(e.to_string()))?;

        let mut hasher = blake3::Hasher::new_derive_key("hashchat-testkit-oracle-v1");
        hasher.update(&self.secret);
        hasher.update(&condition_bytes);
        Ok(*hasher.finalize().as_bytes())
    }

    /// Validate the credential and extract the wallet it proves.
    fn requester(&self, credential: &AuthorizationCredential) -> Result<AccountIdentity, KeyError> {
        let chain = CapabilityChain::from_bytes(credential.as_bytes())
            .map_err(|e| KeyError::AccessDenied(format!("unusable credential: {e}")))?;
        chain
            .verify(now_millis())
            .map_err(|e| KeyError::AccessDenied(format!("credential rejected: {e}")))?;
        Ok(chain.statement.account)
    }

    fn evaluate(&self, conditions: &ConditionSet, requester: &AccountIdentity) -> bool {
        let state = self.state.read().expect("lock poisoned");
        let requester_chain = requester
            .oracle_chain_name()
            .map(str::to_string)
            .unwrap_or_default();

        let mut result: Option<bool> = None;
        let mut pending: Option<Combinator> = None;

        for entry in conditions.entries() {
            match entry {
                ConditionEntry::Operator(op) => pending = Some(*op),
                ConditionEntry::Condition(condition) => {
                    let value =
                        evaluate_condition(&state, condition, requester, &requester_chain);
                    result = Some(match (result, pending.take()) {
                        (None, _) => value,
                        (Some(acc), Some(Combinator::Or)) => acc || value,
                        (Some(acc), Some(Combinator::And)) | (Some(acc), None) => acc && value,
                    });
                }
            }
        }

        result.unwrap_or(false)
    }
}

impl Default for LocalOracle {
    fn default() -> Self {
        Self::new()
    }
}

fn evaluate_condition(
    state: &ChainState,
    condition: &AccessCondition,
    requester: &AccountIdentity,
    requester_chain: &str,
) -> bool {
    match condition {
        AccessCondition::WalletMatch {
            chain,
            expected_address,
        } => chain == requester_chain && expected_address == &requester.address,

        AccessCondition::AssetOwnership {
            chain,
            contract,
            method,
            parameters,
            comparator,
            threshold,
            ..
        } => match method.as_str() {
            "balanceOf" => {
                let balance = state
                    .balances
                    .get(&(chain.clone(), contract.clone(), requester.address.clone()))
                    .copied()
                    .unwrap_or(0);
                let Ok(expected) = threshold.parse::<u64>() else {
                    return false;
                };
                match comparator {
                    Comparator::GreaterThan => balance > expected,
                    Comparator::Equal => balance == expected,
                }
            }
            "ownerOf" => {
                let Some(token_id) = parameters.first() else {
                    return false;
                };
                state
                    .token_owners
                    .get(&(chain.clone(), contract.clone(), token_id.clone()))
                    .map(|owner| owner == threshold)
                    .unwrap_or(false)
            }
            _ => false,
        },

        AccessCondition::ContractRole {
            chain,
            contract,
            method,
            expected,
        } => {
            let held = state
                .roles
                .get(&(
                    chain.clone(),
                    contract.clone(),
                    method.clone(),
                    requester.address.clone(),
                ))
                .copied()
                .unwrap_or(false);
            held == (expected == "true")
        }
    }
}

#[async_trait]
impl PolicyOracle for LocalOracle {
    async fn seal(
        &self,
        conditions: &ConditionSet,
        key: &[u8],
        credential: &AuthorizationCredential,
    ) -> Result<Vec<u8>, KeyError> {
        // Sealing also requires a usable credential, as the network does.
        self.requester(credential)?;

        let cipher = XChaCha20Poly1305::new_from_slice(&self.wrap_key(conditions)?)
            .map_err(|e| KeyError::Encoding(e.to_string()))?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut sealed = nonce.to_vec();
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), key)
            .map_err(|e| KeyError::Encoding(e.to_string()))?;
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    async fn unseal(
        &self,
        conditions: &ConditionSet,
        sealed: &[u8],
        credential: &AuthorizationCredential,
    ) -> Result<Vec<u8>, KeyError> {
        let requester = self.requester(credential)?;

        if !self.evaluate(conditions, &requester) {
            return Err(KeyError::AccessDenied(format!(
                "conditions not satisfied for {requester}"
            )));
        }

        if sealed.len() <= NONCE_LEN {
            return Err(KeyError::MalformedSealedKey("sealed key too short".into()));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

        let cipher = XChaCha20Poly1305::new_from_slice(&self.wrap_key(conditions)?)
            .map_err(|e| KeyError::Encoding(e.to_string()))?;
        cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| KeyError::MalformedSealedKey("sealed under different conditions".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashchat_session::{CapabilitySession, LocalWallet, SessionConfig};

    async fn credential_for(wallet: &LocalWallet) -> AuthorizationCredential {
        CapabilitySession::connect(wallet, &SessionConfig::default())
            .await
            .unwrap()
            .credential()
            .clone()
    }

    fn wallet_conditions(address: &str) -> ConditionSet {
        ConditionSet::single(AccessCondition::WalletMatch {
            chain: "ethereum".into(),
            expected_address: address.into(),
        })
    }

    #[tokio::test]
    async fn test_seal_unseal_roundtrip_for_matching_wallet() {
        let oracle = LocalOracle::new();
        let wallet = LocalWallet::eip155(1);
        let credential = credential_for(&wallet).await;
        let conditions = wallet_conditions(&wallet.wallet_account().address);

        let sealed = oracle.seal(&conditions, b"0123456789abcdef0123456789abcdef", &credential)
            .await
            .unwrap();
        let key = oracle.unseal(&conditions, &sealed, &credential).await.unwrap();
        assert_eq!(key, b"0123456789abcdef0123456789abcdef");
    }

    #[tokio::test]
    async fn test_unseal_denied_for_other_wallet() {
        let oracle = LocalOracle::new();
        let owner = LocalWallet::eip155(1);
        let outsider = LocalWallet::eip155(1);
        let conditions = wallet_conditions(&owner.wallet_account().address);

        let sealed = oracle.seal(&conditions, b"k".as_slice(), &credential_for(&owner).await)
            .await
            .unwrap();

        let err = oracle
            .unseal(&conditions, &sealed, &credential_for(&outsider).await)
            .await
            .unwrap_err();
        assert!(matches!(err, KeyError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn test_or_combinator_grants_any_member() {
        let oracle = LocalOracle::new();
        let a = LocalWallet::eip155(1);
        let b = LocalWallet::eip155(1);

        let conditions = hashchat_policy::ConditionSetBuilder::new(AccessCondition::WalletMatch {
            chain: "ethereum".into(),
            expected_address: a.wallet_account().address.clone(),
        })
        .or(AccessCondition::WalletMatch {
            chain: "ethereum".into(),
            expected_address: b.wallet_account().address.clone(),
        })
        .build();

        let sealed = oracle.seal(&conditions, b"k".as_slice(), &credential_for(&a).await)
            .await
            .unwrap();

        // Either listed wallet unseals.
        oracle.unseal(&conditions, &sealed, &credential_for(&a).await).await.unwrap();
        oracle.unseal(&conditions, &sealed, &credential_for(&b).await).await.unwrap();
    }

    #[tokio::test]
    async fn test_balance_condition() {
        let oracle = LocalOracle::new();
        let holder = LocalWallet::eip155(1);
        let broke = LocalWallet::eip155(1);
        oracle.register_balance("ethereum", "0xtoken", &holder.wallet_account().address, 3);

        let conditions = ConditionSet::single(AccessCondition::AssetOwnership {
            chain: "ethereum".into(),
            contract: "0xtoken".into(),
            standard: hashchat_policy::AssetStandard::Erc721,
            method: "balanceOf".into(),
            parameters: vec![":userAddress".into()],
            comparator: Comparator::GreaterThan,
            threshold: "0".into(),
        });

        let sealed = oracle.seal(&conditions, b"k".as_slice(), &credential_for(&holder).await)
            .await
            .unwrap();

        oracle.unseal(&conditions, &sealed, &credential_for(&holder).await).await.unwrap();
        assert!(matches!(
            oracle.unseal(&conditions, &sealed, &credential_for(&broke).await).await,
            Err(KeyError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_mismatched_conditions_cannot_unseal() {
        let oracle = LocalOracle::new();
        let wallet = LocalWallet::eip155(1);
        let credential = credential_for(&wallet).await;
        let address = wallet.wallet_account().address.clone();

        let sealed = oracle.seal(&wallet_conditions(&address), b"k".as_slice(), &credential)
            .await
            .unwrap();

        // Present different (but satisfied) conditions: binding fails.
        let other = hashchat_policy::ConditionSetBuilder::new(AccessCondition::WalletMatch {
            chain: "ethereum".into(),
            expected_address: address.clone(),
        })
        .or(AccessCondition::WalletMatch {
            chain: "ethereum".into(),
            expected_address: "0xother".into(),
        })
        .build();

        assert!(matches!(
            oracle.unseal(&other, &sealed, &credential).await,
            Err(KeyError::MalformedSealedKey(_))
        ));
    }
}
