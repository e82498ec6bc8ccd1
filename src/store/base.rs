use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{file_storage::FileStorage, memory_storage::MemoryStorage};
use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::models::TokenPair;

/// The SecureStorage trait abstracts durable persistence of the token pair.
///
/// Implementations only move bytes; atomicity with respect to readers is the
/// job of [`super::TokenStore`].
#[async_trait]
pub trait SecureStorage: Send + Sync {
    async fn load(&self) -> Result<Option<TokenPair>, StorageError>;
    async fn save(&self, pair: &TokenPair) -> Result<(), StorageError>;
    async fn remove(&self) -> Result<(), StorageError>;
    fn is_durable(&self) -> bool {
        // Real backends survive a restart; MemoryStorage overrides this
        // so start-up can warn about it.
        true
    }
}

/// Creates a concrete storage implementation based on the StorageConfig.
pub fn create_storage(config: &StorageConfig) -> Arc<dyn SecureStorage> {
    match config {
        StorageConfig::File(file_config) => {
            info!(
                "Persisting session tokens to '{}'",
                file_config.path.display()
            );
            Arc::new(FileStorage::new(&file_config.path))
        }
        StorageConfig::Memory => {
            info!("Session tokens are kept in memory only.");
            Arc::new(MemoryStorage::new())
        }
    }
}
