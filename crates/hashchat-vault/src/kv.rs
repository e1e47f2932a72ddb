//! Key-value store seam: the abstract interface for sealed-key
//! persistence.
//!
//! The vault never assumes anything about where records live.
//! Implementations include SQLite (primary) and in-memory (for tests).
//! Keys are namespaced strings (`<ns>:kids:<channel>`,
//! `<ns>:keys:<keyId>`); values are opaque bytes.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::StorageError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// The key-value store seam.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value for a key, if present.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a value under a key, replacing any previous value.
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove every stored entry.
    async fn clear(&self) -> Result<()>;
}

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .entries
            .read()
            .map_err(|e| StorageError::TaskFailed(format!("lock poisoned: {e}")))?
            .get(key)
            .cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries
            .write()
            .map_err(|e| StorageError::TaskFailed(format!("lock poisoned: {e}")))?
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries
            .write()
            .map_err(|e| StorageError::TaskFailed(format!("lock poisoned: {e}")))?
            .clear();
        Ok(())
    }
}
