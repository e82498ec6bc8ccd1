use std::sync::Mutex;

use super::SecureStorage;
use crate::error::StorageError;
use crate::models::TokenPair;
use async_trait::async_trait;

/// A process-local store: sessions do not survive a restart.
pub struct MemoryStorage {
    slot: Mutex<Option<TokenPair>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage {
            slot: Mutex::new(None),
        }
    }

    /// Starts with an already persisted pair, as if written by an earlier run.
    pub fn with_pair(pair: TokenPair) -> Self {
        MemoryStorage {
            slot: Mutex::new(Some(pair)),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<TokenPair>> {
        self.slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecureStorage for MemoryStorage {
    async fn load(&self) -> Result<Option<TokenPair>, StorageError> {
        Ok(self.slot().clone())
    }

    async fn save(&self, pair: &TokenPair) -> Result<(), StorageError> {
        *self.slot() = Some(pair.clone());
        Ok(())
    }

    async fn remove(&self) -> Result<(), StorageError> {
        *self.slot() = None;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }
}
