//! Wallet provider seam.
//!
//! The wallet (browser extension, hardware device, remote signer) is an
//! external collaborator: Hashchat only needs its account identity and
//! one signature over a delegation statement per session.

use async_trait::async_trait;

use hashchat_core::{AccountIdentity, ChainNamespace, Ed25519PublicKey, Ed25519Signature};

use crate::error::WalletError;

/// A wallet's signature over a delegation statement, together with the
/// verifying key that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletSignature {
    /// The wallet's verifying key.
    pub signer: Ed25519PublicKey,
    /// Signature over the statement's signing message.
    pub signature: Ed25519Signature,
}

/// Seam to the connected wallet.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// The account the wallet is connected as.
    async fn account(&self) -> Result<AccountIdentity, WalletError>;

    /// Ask the wallet to sign a delegation statement.
    ///
    /// The message is the statement's domain-separated signing bytes;
    /// the wallet may display it to the user and refuse.
    async fn sign_statement(&self, message: &[u8]) -> Result<WalletSignature, WalletError>;
}

/// Derive the address a wallet key presents for a given namespace.
///
/// Only meaningful for wallets whose address is derived from an Ed25519
/// key; capability verification uses this to check the address binding
/// of a chain's statement.
pub fn wallet_address(namespace: &ChainNamespace, key: &Ed25519PublicKey) -> String {
    match namespace {
        ChainNamespace::Eip155 => format!("0x{}", key.to_hex()),
        _ => key.to_hex(),
    }
}

/// A reference wallet holding its key in-process.
///
/// Used by tests and the testkit; real deployments plug an actual
/// provider in behind [`WalletProvider`].
pub mod local {
    use std::sync::atomic::{AtomicBool, Ordering};

    use hashchat_core::Keypair;

    use super::*;

    /// In-process wallet implementation.
    pub struct LocalWallet {
        keypair: Keypair,
        account: AccountIdentity,
        /// When set, every signature request is refused, simulating the
        /// user dismissing the wallet prompt.
        reject_signatures: AtomicBool,
    }

    impl LocalWallet {
        /// A wallet on an EVM chain with a fresh random key.
        pub fn eip155(chain_id: u64) -> Self {
            Self::from_keypair(Keypair::generate(), ChainNamespace::Eip155, chain_id.to_string())
        }

        /// A deterministic wallet from a seed, for fixtures.
        pub fn eip155_from_seed(chain_id: u64, seed: [u8; 32]) -> Self {
            Self::from_keypair(
                Keypair::from_seed(&seed),
                ChainNamespace::Eip155,
                chain_id.to_string(),
            )
        }

        /// A Solana wallet with a fresh random key.
        pub fn solana() -> Self {
            Self::from_keypair(Keypair::generate(), ChainNamespace::Solana, "mainnet")
        }

        fn from_keypair(
            keypair: Keypair,
            namespace: ChainNamespace,
            reference: impl Into<String>,
        ) -> Self {
            let address = wallet_address(&namespace, &keypair.public_key());
            let account = AccountIdentity::new(namespace, reference, address);
            Self {
                keypair,
                account,
                reject_signatures: AtomicBool::new(false),
            }
        }

        /// The wallet's account identity.
        pub fn wallet_account(&self) -> &AccountIdentity {
            &self.account
        }

        /// Toggle signature refusal.
        pub fn set_reject_signatures(&self, reject: bool) {
            self.reject_signatures.store(reject, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl WalletProvider for LocalWallet {
        async fn account(&self) -> Result<AccountIdentity, WalletError> {
            Ok(self.account.clone())
        }

        async fn sign_statement(&self, message: &[u8]) -> Result<WalletSignature, WalletError> {
            if self.reject_signatures.load(Ordering::SeqCst) {
                return Err(WalletError::Rejected("user dismissed the prompt".into()));
            }
            Ok(WalletSignature {
                signer: self.keypair.public_key(),
                signature: self.keypair.sign(message),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::local::LocalWallet;
    use super::*;

    #[tokio::test]
    async fn test_local_wallet_signs() {
        let wallet = LocalWallet::eip155(1);
        let account = wallet.account().await.unwrap();
        assert_eq!(account.namespace, ChainNamespace::Eip155);
        assert!(account.address.starts_with("0x"));

        let signed = wallet.sign_statement(b"statement").await.unwrap();
        assert!(signed.signer.verify(b"statement", &signed.signature));
    }

    #[tokio::test]
    async fn test_local_wallet_rejects_when_toggled() {
        let wallet = LocalWallet::eip155(1);
        wallet.set_reject_signatures(true);
        assert!(matches!(
            wallet.sign_statement(b"x").await,
            Err(WalletError::Rejected(_))
        ));
    }

    #[test]
    fn test_address_binding_is_derivable() {
        let wallet = LocalWallet::eip155_from_seed(1, [9u8; 32]);
        let account = wallet.wallet_account();
        // The address is recomputable from the public key alone.
        let keypair = hashchat_core::Keypair::from_seed(&[9u8; 32]);
        assert_eq!(
            account.address,
            wallet_address(&account.namespace, &keypair.public_key())
        );
    }
}
