//! Test fixtures and helpers.
//!
//! Common setup code for multi-party integration tests: a shared
//! network (memory hub + local oracle) and per-party pipelines, each
//! with its own wallet and key-value store, as separate clients would
//! have.

use std::sync::Arc;

use hashchat::{ChatPipeline, PipelineConfig};
use hashchat_core::AccountIdentity;
use hashchat_policy::{AccessPolicyBuilder, ChannelDescriptor, ChannelId};
use hashchat_session::{LocalWallet, MessageSigner};
use hashchat_transport::{LocalTokenExchange, MemoryHub};
use hashchat_vault::{KeyVault, MemoryKvStore, MessageCipher, VaultConfig};

use crate::oracle::LocalOracle;

/// The services every party shares: transport hub, policy oracle, and
/// the sealed-key store.
///
/// The key-value store is shared because sealed-key records are how a
/// second party finds a channel's key: the first sender persists the
/// record, later readers resolve it and recompute the same key id.
pub struct TestNetwork {
    pub hub: Arc<MemoryHub>,
    pub oracle: Arc<LocalOracle>,
    pub kv: Arc<MemoryKvStore>,
}

impl TestNetwork {
    pub fn new() -> Self {
        Self {
            hub: MemoryHub::new(),
            oracle: Arc::new(LocalOracle::new()),
            kv: Arc::new(MemoryKvStore::new()),
        }
    }
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// One party: a wallet and a pipeline wired to the shared network.
pub struct TestFixture {
    pub wallet: LocalWallet,
    pub pipeline: ChatPipeline,
}

impl TestFixture {
    /// A party with a fresh random wallet on Ethereum mainnet.
    pub fn new(network: &TestNetwork) -> Self {
        Self::with_wallet(network, LocalWallet::eip155(1))
    }

    /// A party with a deterministic wallet, for reproducible scenarios.
    pub fn with_seed(network: &TestNetwork, seed: [u8; 32]) -> Self {
        Self::with_wallet(network, LocalWallet::eip155_from_seed(1, seed))
    }

    /// A party with the given wallet.
    pub fn with_wallet(network: &TestNetwork, wallet: LocalWallet) -> Self {
        let pipeline = ChatPipeline::new(
            AccessPolicyBuilder::new(),
            KeyVault::new(
                network.kv.clone(),
                network.oracle.clone(),
                VaultConfig::default(),
            ),
            MessageSigner::new(),
            MessageCipher::new(),
            Arc::new(LocalTokenExchange::new()),
            Arc::new(network.hub.client()),
            PipelineConfig::default(),
        );
        Self { wallet, pipeline }
    }

    /// Authenticate the pipeline against this party's wallet.
    pub async fn connect(&self) -> hashchat::Result<AccountIdentity> {
        self.pipeline.authenticate(&self.wallet).await
    }

    /// This party's wallet account.
    pub fn account(&self) -> &AccountIdentity {
        self.wallet.wallet_account()
    }

    /// This party's transport user id.
    pub fn user_id(&self) -> String {
        self.account().to_user_id()
    }
}

/// Create multiple parties on one network for multi-party tests.
pub fn multi_party_fixtures(network: &TestNetwork, count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            TestFixture::with_seed(network, seed)
        })
        .collect()
}

/// Register a direct-message channel whose members are the given
/// parties, and return its descriptor.
pub async fn dm_channel(
    network: &TestNetwork,
    id: &str,
    parties: &[&TestFixture],
) -> ChannelDescriptor {
    let channel = ChannelDescriptor::direct(ChannelId::from(id));
    let members = parties.iter().map(|p| p.user_id()).collect();
    network.hub.create_channel(channel.id.clone(), members).await;
    channel
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixture_connects() {
        let network = TestNetwork::new();
        let fixture = TestFixture::new(&network);

        let account = fixture.connect().await.unwrap();
        assert_eq!(&account, fixture.account());
    }

    #[tokio::test]
    async fn test_multi_party_unique_wallets() {
        let network = TestNetwork::new();
        let parties = multi_party_fixtures(&network, 3);

        let addresses: Vec<_> = parties.iter().map(|p| p.account().address.clone()).collect();
        assert_ne!(addresses[0], addresses[1]);
        assert_ne!(addresses[1], addresses[2]);
        assert_ne!(addresses[0], addresses[2]);
    }
}
