//! The KeyVault: create-or-fetch lifecycle for channel content keys.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, trace};

use hashchat_core::{AuthorizationCredential, KeyId};
use hashchat_policy::{ChannelId, ConditionSet};

use crate::cipher::ContentKey;
use crate::error::{KeyError, Result};
use crate::kv::KeyValueStore;
use crate::oracle::PolicyOracle;

/// The persisted pointer from a channel to its sealed key.
///
/// Only the sealed form is stored; `key_id` is recomputable as
/// Blake3(sealed_key), so a second party resolving the channel derives
/// the same id with no side channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelKeyRecord {
    pub channel_id: ChannelId,
    pub key_id: KeyId,
    pub sealed_key: Vec<u8>,
}

impl ChannelKeyRecord {
    /// Serialize to CBOR bytes for the key-value store.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| KeyError::MalformedSealedKey(e.to_string()))
    }
}

/// Vault configuration.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Namespace prefix for storage keys.
    pub namespace: String,

    /// Whether unsealed keys may also be persisted to the key-value
    /// store (`<ns>:keys:<keyId>`). Trades an oracle round-trip per
    /// process lifetime against plaintext key material at rest; off
    /// unless the embedder explicitly opts in.
    pub persist_plaintext_keys: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            namespace: "hashchat".to_string(),
            persist_plaintext_keys: false,
        }
    }
}

/// Resolves channel content keys: creating and sealing on first use,
/// retrieving and unsealing thereafter.
///
/// Unsealed keys are cached in memory per `(channel, key_id)` for the
/// process lifetime. Resolution for the same channel is serialized by a
/// per-channel mutex so the create path runs at most once per channel
/// per process; cross-process races remain last-writer-wins on the
/// persisted record.
pub struct KeyVault {
    kv: Arc<dyn KeyValueStore>,
    oracle: Arc<dyn PolicyOracle>,
    config: VaultConfig,

    /// Unsealed keys, in memory only.
    keys: RwLock<HashMap<KeyId, ContentKey>>,

    /// Per-channel resolution locks.
    locks: Mutex<HashMap<ChannelId, Arc<Mutex<()>>>>,
}

impl KeyVault {
    /// Create a vault over a key-value store and an oracle.
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        oracle: Arc<dyn PolicyOracle>,
        config: VaultConfig,
    ) -> Self {
        Self {
            kv,
            oracle,
            config,
            keys: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the content key for a channel.
    ///
    /// First use generates and seals a fresh key; later uses serve from
    /// the in-memory cache or unseal the persisted record through the
    /// oracle. Returns the key together with its id (the envelope
    /// binding).
    pub async fn resolve(
        &self,
        channel: &ChannelId,
        conditions: &ConditionSet,
        credential: &AuthorizationCredential,
    ) -> Result<(KeyId, ContentKey)> {
        let lock = self.channel_lock(channel).await;
        let _guard = lock.lock().await;

        match self.load_record(channel).await? {
            Some(record) => self.fetch_existing(channel, record, conditions, credential).await,
            None => self.create_and_seal(channel, conditions, credential).await,
        }
    }

    /// Drop every unsealed key from memory.
    ///
    /// Called on re-authentication and logout: the oracle binds key
    /// release to a credential's signer, so keys resolved under an old
    /// session must be re-proven under the new one.
    pub async fn reset_cache(&self) {
        self.keys.write().await.clear();
    }

    async fn fetch_existing(
        &self,
        channel: &ChannelId,
        record: ChannelKeyRecord,
        conditions: &ConditionSet,
        credential: &AuthorizationCredential,
    ) -> Result<(KeyId, ContentKey)> {
        // The stored id must agree with the sealed bytes it points to.
        if record.key_id != KeyId::derive(&record.sealed_key) {
            return Err(KeyError::MalformedSealedKey(format!(
                "key id {} does not match sealed bytes",
                record.key_id
            )));
        }

        if let Some(key) = self.keys.read().await.get(&record.key_id) {
            trace!(channel = %channel, key_id = %record.key_id, "key cache hit");
            return Ok((record.key_id, key.clone()));
        }

        if let Some(key) = self.load_persisted_plaintext(&record.key_id).await? {
            self.keys.write().await.insert(record.key_id, key.clone());
            return Ok((record.key_id, key));
        }

        let key_bytes = self
            .oracle
            .unseal(conditions, &record.sealed_key, credential)
            .await?;
        let key = ContentKey::from_slice(&key_bytes)
            .map_err(|e| KeyError::MalformedSealedKey(e.to_string()))?;

        debug!(channel = %channel, key_id = %record.key_id, "unsealed channel key");
        self.remember(record.key_id, key.clone()).await?;
        Ok((record.key_id, key))
    }

    async fn create_and_seal(
        &self,
        channel: &ChannelId,
        conditions: &ConditionSet,
        credential: &AuthorizationCredential,
    ) -> Result<(KeyId, ContentKey)> {
        let key = ContentKey::generate();
        let sealed_key = self
            .oracle
            .seal(conditions, key.as_bytes(), credential)
            .await?;
        let key_id = KeyId::derive(&sealed_key);

        let record = ChannelKeyRecord {
            channel_id: channel.clone(),
            key_id,
            sealed_key,
        };
        self.kv
            .set(&self.record_key(channel), &record.to_bytes())
            .await
            .map_err(KeyError::from)?;

        debug!(channel = %channel, key_id = %key_id, "sealed new channel key");
        self.remember(key_id, key.clone()).await?;
        Ok((key_id, key))
    }

    async fn load_record(&self, channel: &ChannelId) -> Result<Option<ChannelKeyRecord>> {
        match self.kv.get(&self.record_key(channel)).await? {
            Some(bytes) => Ok(Some(ChannelKeyRecord::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn load_persisted_plaintext(&self, key_id: &KeyId) -> Result<Option<ContentKey>> {
        if !self.config.persist_plaintext_keys {
            return Ok(None);
        }
        match self.kv.get(&self.plaintext_key(key_id)).await? {
            Some(bytes) => {
                let key = ContentKey::from_slice(&bytes)
                    .map_err(|e| KeyError::MalformedSealedKey(e.to_string()))?;
                Ok(Some(key))
            }
            None => Ok(None),
        }
    }

    async fn remember(&self, key_id: KeyId, key: ContentKey) -> Result<()> {
        if self.config.persist_plaintext_keys {
            self.kv
                .set(&self.plaintext_key(&key_id), key.as_bytes())
                .await
                .map_err(KeyError::from)?;
        }
        self.keys.write().await.insert(key_id, key);
        Ok(())
    }

    async fn channel_lock(&self, channel: &ChannelId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(channel.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn record_key(&self, channel: &ChannelId) -> String {
        format!("{}:kids:{}", self.config.namespace, channel)
    }

    fn plaintext_key(&self, key_id: &KeyId) -> String {
        format!("{}:keys:{}", self.config.namespace, key_id.to_hex())
    }
}
