//! The ChatPipeline: authenticate, send, receive.
//!
//! Composes the policy builder, key vault, signer, and cipher against
//! the external transport and token exchange. One pipeline instance
//! holds at most one active session; multiple instances do not
//! coordinate (two tabs may race on first-key-creation for a channel,
//! which the persisted record resolves last-writer-wins).

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, info, warn};

use hashchat_core::{AccountIdentity, MessageId, MessagePayload};
use hashchat_policy::{AccessPolicyBuilder, ChannelDescriptor, ChannelKind, ConditionSet};
use hashchat_session::{
    now_millis, CapabilitySession, MessageSigner, SignedEnvelope, VerifiedMessage, WalletProvider,
};
use hashchat_transport::{TokenExchange, Transport, TransportCredentials};
use hashchat_vault::{EncryptedEnvelope, KeyVault, MessageCipher};

use crate::config::PipelineConfig;
use crate::error::{ChatError, Result};

/// A stream of decrypted, verified messages from a subscription.
pub type MessageStream = BoxStream<'static, Result<VerifiedMessage>>;

/// Authentication state of one pipeline instance.
enum PipelineState {
    Unauthenticated,
    Authenticated {
        session: Arc<CapabilitySession>,
        credentials: TransportCredentials,
    },
}

/// The chat pipeline.
///
/// Components are injected at construction; the wallet provider is
/// handed to [`authenticate`] per connection attempt.
///
/// [`authenticate`]: ChatPipeline::authenticate
pub struct ChatPipeline {
    policy: AccessPolicyBuilder,
    vault: KeyVault,
    signer: MessageSigner,
    cipher: MessageCipher,
    token_exchange: Arc<dyn TokenExchange>,
    transport: Arc<dyn Transport>,
    config: PipelineConfig,
    state: tokio::sync::RwLock<PipelineState>,
}

impl ChatPipeline {
    /// Assemble a pipeline from its components.
    pub fn new(
        policy: AccessPolicyBuilder,
        vault: KeyVault,
        signer: MessageSigner,
        cipher: MessageCipher,
        token_exchange: Arc<dyn TokenExchange>,
        transport: Arc<dyn Transport>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            policy,
            vault,
            signer,
            cipher,
            token_exchange,
            transport,
            config,
            state: tokio::sync::RwLock::new(PipelineState::Unauthenticated),
        }
    }

    /// The authenticated account, if any.
    pub async fn account(&self) -> Option<AccountIdentity> {
        match &*self.state.read().await {
            PipelineState::Authenticated { session, .. } => Some(session.account().clone()),
            PipelineState::Unauthenticated => None,
        }
    }

    /// Authenticate against a wallet and connect to the transport.
    ///
    /// Drives the whole chain: wallet connection → capability session →
    /// backend token exchange → transport connection. Any step failing
    /// leaves the pipeline `Unauthenticated`. A successful call replaces
    /// any previous session and drops every cached channel key (the
    /// oracle binds key release to the credential's signer).
    pub async fn authenticate(&self, wallet: &dyn WalletProvider) -> Result<AccountIdentity> {
        // Tear down the old session first so a failure below cannot
        // leave a half-replaced state.
        self.logout().await;

        let session = CapabilitySession::connect(wallet, &self.config.session).await?;
        let account = session.account().clone();

        let credentials = self
            .token_exchange
            .exchange(&account, session.credential())
            .await?;
        self.transport.connect(&credentials).await?;

        *self.state.write().await = PipelineState::Authenticated {
            session: Arc::new(session),
            credentials,
        };

        info!(account = %account, "pipeline authenticated");
        Ok(account)
    }

    /// Drop the session and every cached key.
    pub async fn logout(&self) {
        let mut state = self.state.write().await;
        if matches!(&*state, PipelineState::Authenticated { .. }) {
            debug!("pipeline logged out");
        }
        *state = PipelineState::Unauthenticated;
        drop(state);
        self.vault.reset_cache().await;
    }

    /// Send a payload to a channel.
    ///
    /// Assigns a fresh `id` and the sender's `from` when absent, signs
    /// under the session, resolves the channel key, encrypts, and
    /// publishes. Returns the plaintext payload as sent.
    pub async fn send(
        &self,
        channel: &ChannelDescriptor,
        payload: MessagePayload,
    ) -> Result<MessagePayload> {
        let (session, credentials) = self.require_session().await?;

        let mut payload = payload;
        let message_id = match payload.id.clone() {
            Some(id) => id,
            None => {
                let id = MessageId::generate();
                payload.id = Some(id.clone());
                id
            }
        };
        if payload.from.is_none() {
            payload.from = Some(credentials.user_id.clone());
        }

        let envelope = self.signer.sign(&payload, &session)?;

        let conditions = self.channel_conditions(channel).await?;
        let (key_id, key) = self
            .vault
            .resolve(&channel.id, &conditions, session.credential())
            .await?;

        let encrypted = self.cipher.encrypt(&envelope.to_bytes(), &key, key_id)?;
        self.transport
            .publish(&channel.id, &encrypted.to_bytes(), &message_id)
            .await?;

        debug!(channel = %channel.id, message_id = %message_id, "message sent");
        Ok(payload)
    }

    /// Fetch and open the latest message on a channel.
    ///
    /// Resolves the channel key, decrypts, verifies, and returns the
    /// payload with its proven sender. The first failure (decryption vs
    /// verification) propagates untouched.
    pub async fn receive(&self, channel: &ChannelDescriptor) -> Result<VerifiedMessage> {
        let (session, _) = self.require_session().await?;

        let bytes = self
            .transport
            .fetch_latest(&channel.id)
            .await?
            .ok_or_else(|| ChatError::NoMessage(channel.id.clone()))?;

        let conditions = self.channel_conditions(channel).await?;
        let (key_id, key) = self
            .vault
            .resolve(&channel.id, &conditions, session.credential())
            .await?;

        let encrypted = EncryptedEnvelope::from_bytes(&bytes)?;
        let plaintext = self.cipher.decrypt(&encrypted, &key, key_id)?;
        let signed = SignedEnvelope::from_bytes(&plaintext)?;
        let verified = self.signer.verify(&signed, now_millis())?;

        debug!(channel = %channel.id, signer = %verified.signer, "message received");
        Ok(verified)
    }

    /// Subscribe to a channel, yielding each message as it is opened.
    ///
    /// The channel key is resolved once up front; per-message failures
    /// surface as stream items rather than ending the stream.
    pub async fn subscribe(&self, channel: &ChannelDescriptor) -> Result<MessageStream> {
        let (session, _) = self.require_session().await?;

        let conditions = self.channel_conditions(channel).await?;
        let (key_id, key) = self
            .vault
            .resolve(&channel.id, &conditions, session.credential())
            .await?;

        let envelopes = self.transport.subscribe(&channel.id).await?;
        let cipher = self.cipher.clone();
        let signer = self.signer.clone();

        let messages = envelopes.map(move |bytes| -> Result<VerifiedMessage> {
            let encrypted = EncryptedEnvelope::from_bytes(&bytes)?;
            let plaintext = cipher.decrypt(&encrypted, &key, key_id)?;
            let signed = SignedEnvelope::from_bytes(&plaintext)?;
            Ok(signer.verify(&signed, now_millis())?)
        });

        Ok(Box::pin(messages))
    }

    /// Build the access conditions for a channel.
    ///
    /// Direct-message channels read their member list from the
    /// transport; gated channels derive everything from the channel id.
    async fn channel_conditions(&self, channel: &ChannelDescriptor) -> Result<ConditionSet> {
        let members = match &channel.kind {
            ChannelKind::DirectMessage => {
                let user_ids = self.transport.members(&channel.id).await?;
                user_ids
                    .iter()
                    .map(|id| AccountIdentity::from_user_id(id))
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            _ => Vec::new(),
        };

        Ok(self
            .policy
            .build(channel, &members, self.config.profile_gate.as_ref())?)
    }

    /// The current session, or the reason there is none.
    ///
    /// A lapsed session is torn down here: the pipeline drops back to
    /// `Unauthenticated` and the caller must re-authenticate.
    async fn require_session(&self) -> Result<(Arc<CapabilitySession>, TransportCredentials)> {
        let expired = {
            let state = self.state.read().await;
            match &*state {
                PipelineState::Unauthenticated => return Err(ChatError::NotAuthenticated),
                PipelineState::Authenticated { session, credentials } => {
                    if session.is_expired(now_millis()) {
                        true
                    } else {
                        return Ok((Arc::clone(session), credentials.clone()));
                    }
                }
            }
        };

        if expired {
            warn!("session expired, dropping to unauthenticated");
            self.logout().await;
        }
        Err(ChatError::SessionExpired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hashchat_core::AuthorizationCredential;
    use hashchat_policy::ChannelId;
    use hashchat_session::{LocalWallet, SessionConfig};
    use hashchat_transport::{LocalTokenExchange, MemoryHub};
    use hashchat_vault::{KeyError, MemoryKvStore, PolicyOracle, VaultConfig};
    use serde_json::json;

    /// Pass-through oracle: wraps keys with a marker, no policy
    /// evaluation. Policy enforcement paths are covered by the testkit's
    /// local oracle.
    struct PassthroughOracle;

    #[async_trait]
    impl PolicyOracle for PassthroughOracle {
        async fn seal(
            &self,
            _conditions: &ConditionSet,
            key: &[u8],
            _credential: &AuthorizationCredential,
        ) -> std::result::Result<Vec<u8>, KeyError> {
            let mut sealed = b"sealed:".to_vec();
            sealed.extend_from_slice(key);
            Ok(sealed)
        }

        async fn unseal(
            &self,
            _conditions: &ConditionSet,
            sealed: &[u8],
            _credential: &AuthorizationCredential,
        ) -> std::result::Result<Vec<u8>, KeyError> {
            sealed
                .strip_prefix(b"sealed:".as_slice())
                .map(<[u8]>::to_vec)
                .ok_or_else(|| KeyError::MalformedSealedKey("missing marker".into()))
        }
    }

    fn pipeline(hub: &Arc<MemoryHub>) -> ChatPipeline {
        pipeline_with_config(hub, PipelineConfig::default())
    }

    fn pipeline_with_config(hub: &Arc<MemoryHub>, config: PipelineConfig) -> ChatPipeline {
        ChatPipeline::new(
            AccessPolicyBuilder::new(),
            KeyVault::new(
                Arc::new(MemoryKvStore::new()),
                Arc::new(PassthroughOracle),
                VaultConfig::default(),
            ),
            MessageSigner::new(),
            MessageCipher::new(),
            Arc::new(LocalTokenExchange::new()),
            Arc::new(hub.client()),
            config,
        )
    }

    async fn dm_channel(hub: &Arc<MemoryHub>, wallets: &[&LocalWallet]) -> ChannelDescriptor {
        let channel = ChannelDescriptor::direct(ChannelId::from("c1"));
        let members = wallets
            .iter()
            .map(|w| w.wallet_account().to_user_id())
            .collect();
        hub.create_channel(channel.id.clone(), members).await;
        channel
    }

    #[tokio::test]
    async fn test_authenticate_sets_account() {
        let hub = MemoryHub::new();
        let pipeline = pipeline(&hub);
        let wallet = LocalWallet::eip155(1);

        assert_eq!(pipeline.account().await, None);
        let account = pipeline.authenticate(&wallet).await.unwrap();
        assert_eq!(&account, wallet.wallet_account());
        assert_eq!(pipeline.account().await, Some(account));
    }

    #[tokio::test]
    async fn test_authenticate_failure_leaves_unauthenticated() {
        let hub = MemoryHub::new();
        let pipeline = pipeline(&hub);
        let wallet = LocalWallet::eip155(1);
        wallet.set_reject_signatures(true);

        assert!(matches!(
            pipeline.authenticate(&wallet).await,
            Err(ChatError::Auth(_))
        ));
        assert_eq!(pipeline.account().await, None);
        // Still unusable for sends.
        let channel = ChannelDescriptor::direct(ChannelId::from("c1"));
        assert!(matches!(
            pipeline.send(&channel, MessagePayload::message(json!({}))).await,
            Err(ChatError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_send_requires_authentication() {
        let hub = MemoryHub::new();
        let pipeline = pipeline(&hub);
        let channel = ChannelDescriptor::direct(ChannelId::from("c1"));

        assert!(matches!(
            pipeline
                .send(&channel, MessagePayload::message(json!({"content": "hi"})))
                .await,
            Err(ChatError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_send_assigns_id_and_from() {
        let hub = MemoryHub::new();
        let pipeline = pipeline(&hub);
        let wallet = LocalWallet::eip155(1);
        pipeline.authenticate(&wallet).await.unwrap();

        let channel = dm_channel(&hub, &[&wallet]).await;
        let sent = pipeline
            .send(&channel, MessagePayload::message(json!({"content": "hi"})))
            .await
            .unwrap();

        assert!(sent.id.is_some());
        assert_eq!(sent.from, Some(wallet.wallet_account().to_user_id()));
        // Caller-supplied ids are kept.
        let supplied = MessagePayload::message(json!({})).with_id(MessageId::new("m1"));
        let sent = pipeline.send(&channel, supplied).await.unwrap();
        assert_eq!(sent.id, Some(MessageId::new("m1")));
    }

    #[tokio::test]
    async fn test_send_receive_roundtrip() {
        let hub = MemoryHub::new();
        let pipeline = pipeline(&hub);
        let wallet = LocalWallet::eip155(1);
        pipeline.authenticate(&wallet).await.unwrap();

        let channel = dm_channel(&hub, &[&wallet]).await;
        let sent = pipeline
            .send(
                &channel,
                MessagePayload::message(json!({"content": "round trip"})),
            )
            .await
            .unwrap();

        let received = pipeline.receive(&channel).await.unwrap();
        assert_eq!(received.payload, sent);
        assert_eq!(&received.signer, wallet.wallet_account());
    }

    #[tokio::test]
    async fn test_transport_only_sees_ciphertext() {
        let hub = MemoryHub::new();
        let pipeline = pipeline(&hub);
        let wallet = LocalWallet::eip155(1);
        pipeline.authenticate(&wallet).await.unwrap();

        let channel = dm_channel(&hub, &[&wallet]).await;
        pipeline
            .send(
                &channel,
                MessagePayload::message(json!({"content": "super secret"})),
            )
            .await
            .unwrap();

        let observer = hub.client();
        observer
            .connect(&hashchat_transport::TransportCredentials {
                user_id: "observer".into(),
                token: "t".into(),
            })
            .await
            .unwrap();
        let raw = observer.fetch_latest(&channel.id).await.unwrap().unwrap();

        let haystack = String::from_utf8_lossy(&raw);
        assert!(!haystack.contains("super secret"));
    }

    #[tokio::test]
    async fn test_receive_empty_channel() {
        let hub = MemoryHub::new();
        let pipeline = pipeline(&hub);
        let wallet = LocalWallet::eip155(1);
        pipeline.authenticate(&wallet).await.unwrap();

        let channel = dm_channel(&hub, &[&wallet]).await;
        assert!(matches!(
            pipeline.receive(&channel).await,
            Err(ChatError::NoMessage(_))
        ));
    }

    #[tokio::test]
    async fn test_subscribe_yields_messages() {
        let hub = MemoryHub::new();
        let pipeline = pipeline(&hub);
        let wallet = LocalWallet::eip155(1);
        pipeline.authenticate(&wallet).await.unwrap();

        let channel = dm_channel(&hub, &[&wallet]).await;
        let mut stream = pipeline.subscribe(&channel).await.unwrap();

        pipeline
            .send(&channel, MessagePayload::message(json!({"content": "live"})))
            .await
            .unwrap();

        let received = stream.next().await.unwrap().unwrap();
        assert_eq!(received.payload.content(), Some("live"));
    }

    #[tokio::test]
    async fn test_logout_drops_session() {
        let hub = MemoryHub::new();
        let pipeline = pipeline(&hub);
        let wallet = LocalWallet::eip155(1);
        pipeline.authenticate(&wallet).await.unwrap();

        pipeline.logout().await;
        assert_eq!(pipeline.account().await, None);

        let channel = ChannelDescriptor::direct(ChannelId::from("c1"));
        assert!(matches!(
            pipeline.receive(&channel).await,
            Err(ChatError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_expired_session_drops_to_unauthenticated() {
        let hub = MemoryHub::new();
        let config = PipelineConfig {
            session: SessionConfig {
                session_ttl_ms: 1,
                ..SessionConfig::default()
            },
            ..PipelineConfig::default()
        };
        let pipeline = pipeline_with_config(&hub, config);
        let wallet = LocalWallet::eip155(1);
        pipeline.authenticate(&wallet).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let channel = ChannelDescriptor::direct(ChannelId::from("c1"));
        assert!(matches!(
            pipeline.send(&channel, MessagePayload::message(json!({}))).await,
            Err(ChatError::SessionExpired)
        ));
        // The lapse is sticky: the pipeline is unauthenticated now.
        assert_eq!(pipeline.account().await, None);
    }
}
