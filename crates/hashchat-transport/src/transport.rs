//! Transport seam: the opaque pub/sub message store.
//!
//! The transport never sees plaintext: everything published through it
//! is an encrypted envelope's bytes. Channel membership is the one
//! piece of metadata read back (direct-message policies are built from
//! it).

use async_trait::async_trait;
use futures::stream::BoxStream;

use hashchat_core::MessageId;
use hashchat_policy::ChannelId;

use crate::error::Result;
use crate::token::TransportCredentials;

/// A stream of opaque envelope bytes from a subscription.
pub type EnvelopeStream = BoxStream<'static, Vec<u8>>;

/// The transport seam.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Authenticate to the transport as the exchanged user.
    async fn connect(&self, credentials: &TransportCredentials) -> Result<()>;

    /// Publish an opaque envelope to a channel.
    ///
    /// `message_id` is the payload's unique id; the store may use it to
    /// deduplicate redelivery.
    async fn publish(
        &self,
        channel: &ChannelId,
        envelope: &[u8],
        message_id: &MessageId,
    ) -> Result<()>;

    /// Fetch the most recent envelope on a channel, if any.
    async fn fetch_latest(&self, channel: &ChannelId) -> Result<Option<Vec<u8>>>;

    /// Subscribe to envelopes published to a channel from now on.
    async fn subscribe(&self, channel: &ChannelId) -> Result<EnvelopeStream>;

    /// The user ids of a channel's members.
    async fn members(&self, channel: &ChannelId) -> Result<Vec<String>>;
}

/// A simple in-memory transport for testing.
///
/// A shared hub holds per-channel state; each client is a transport
/// handle onto the hub.
pub mod memory {
    use std::collections::HashMap;
    use std::sync::Arc;

    use tokio::sync::{broadcast, RwLock};
    use tokio_stream::wrappers::BroadcastStream;
    use tokio_stream::StreamExt;
    use tracing::trace;

    use crate::error::TransportError;

    use super::*;

    /// Per-channel state on the hub.
    struct ChannelState {
        members: Vec<String>,
        latest: Option<Vec<u8>>,
        publishes: broadcast::Sender<Vec<u8>>,
    }

    impl ChannelState {
        fn new(members: Vec<String>) -> Self {
            let (publishes, _) = broadcast::channel(64);
            Self {
                members,
                latest: None,
                publishes,
            }
        }
    }

    /// Shared state for the memory transport network.
    pub struct MemoryHub {
        channels: RwLock<HashMap<ChannelId, ChannelState>>,
    }

    impl MemoryHub {
        /// Create a new hub.
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                channels: RwLock::new(HashMap::new()),
            })
        }

        /// Create a channel with a member list.
        pub async fn create_channel(&self, id: ChannelId, members: Vec<String>) {
            self.channels
                .write()
                .await
                .entry(id)
                .or_insert_with(|| ChannelState::new(members));
        }

        /// Create a client transport onto this hub.
        pub fn client(self: &Arc<Self>) -> MemoryTransport {
            MemoryTransport {
                hub: Arc::clone(self),
                connected_as: RwLock::new(None),
            }
        }
    }

    impl Default for MemoryHub {
        fn default() -> Self {
            Self {
                channels: RwLock::new(HashMap::new()),
            }
        }
    }

    /// In-memory transport implementation.
    pub struct MemoryTransport {
        hub: Arc<MemoryHub>,
        connected_as: RwLock<Option<TransportCredentials>>,
    }

    impl MemoryTransport {
        async fn require_connected(&self) -> Result<()> {
            if self.connected_as.read().await.is_none() {
                return Err(TransportError::NotConnected);
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn connect(&self, credentials: &TransportCredentials) -> Result<()> {
            if credentials.token.is_empty() {
                return Err(TransportError::ConnectionFailed("empty token".into()));
            }
            *self.connected_as.write().await = Some(credentials.clone());
            Ok(())
        }

        async fn publish(
            &self,
            channel: &ChannelId,
            envelope: &[u8],
            message_id: &MessageId,
        ) -> Result<()> {
            self.require_connected().await?;

            let mut channels = self.hub.channels.write().await;
            let state = channels
                .entry(channel.clone())
                .or_insert_with(|| ChannelState::new(Vec::new()));

            state.latest = Some(envelope.to_vec());
            // No subscribers is fine; the latest slot still updates.
            let _ = state.publishes.send(envelope.to_vec());
            trace!(channel = %channel, message_id = %message_id, "published envelope");
            Ok(())
        }

        async fn fetch_latest(&self, channel: &ChannelId) -> Result<Option<Vec<u8>>> {
            self.require_connected().await?;
            Ok(self
                .hub
                .channels
                .read()
                .await
                .get(channel)
                .and_then(|state| state.latest.clone()))
        }

        async fn subscribe(&self, channel: &ChannelId) -> Result<EnvelopeStream> {
            self.require_connected().await?;

            let mut channels = self.hub.channels.write().await;
            let state = channels
                .entry(channel.clone())
                .or_insert_with(|| ChannelState::new(Vec::new()));

            let stream = BroadcastStream::new(state.publishes.subscribe())
                .filter_map(|item| item.ok());
            Ok(Box::pin(stream))
        }

        async fn members(&self, channel: &ChannelId) -> Result<Vec<String>> {
            self.require_connected().await?;
            self.hub
                .channels
                .read()
                .await
                .get(channel)
                .map(|state| state.members.clone())
                .ok_or_else(|| TransportError::ChannelNotFound(channel.to_string()))
        }
    }
}
