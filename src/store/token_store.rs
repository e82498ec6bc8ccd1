use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{MemoryStorage, SecureStorage};
use crate::error::StorageError;
use crate::models::{SessionState, TokenPair};
use crate::session::{SessionBroadcaster, SessionStream};

/// Owner of the single credential pair of this client.
///
/// Reads are snapshot clones and never wait on I/O. Writers are serialized by
/// an async mutex that is held while the pair is persisted; the in-memory copy
/// is only swapped after the write landed, so `get()` never observes a pair
/// that is not on disk, nor half of one.
pub struct TokenStore {
    storage: Arc<dyn SecureStorage>,
    current: RwLock<Option<TokenPair>>,
    writer: Mutex<()>,
    session: SessionBroadcaster,
}

impl TokenStore {
    /// Opens the store, resuming whatever session the storage holds.
    ///
    /// A malformed or incomplete record is treated as "signed out" rather
    /// than as a hard error: the user simply has to log in again.
    pub async fn open(storage: Arc<dyn SecureStorage>) -> Result<Self, StorageError> {
        if !storage.is_durable() {
            warn!("Token storage is not durable; sessions end with the process.");
        }

        let initial = match storage.load().await {
            Ok(Some(pair)) if pair.is_complete() => Some(pair),
            Ok(Some(_)) => {
                warn!("Stored session is incomplete; starting signed out.");
                None
            }
            Ok(None) => None,
            Err(StorageError::Malformed(e)) => {
                warn!("Stored session could not be parsed ({}); starting signed out.", e);
                None
            }
            Err(e) => return Err(e),
        };

        if initial.is_some() {
            info!("Resumed persisted session.");
        }

        Ok(Self::with_initial(storage, initial))
    }

    /// A store backed by [`MemoryStorage`], starting signed out.
    pub fn in_memory() -> Self {
        Self::with_initial(Arc::new(MemoryStorage::new()), None)
    }

    fn with_initial(storage: Arc<dyn SecureStorage>, initial: Option<TokenPair>) -> Self {
        let state = initial
            .as_ref()
            .map(|pair| SessionState::from_access_token(pair.access()))
            .unwrap_or_default();

        TokenStore {
            storage,
            current: RwLock::new(initial),
            writer: Mutex::new(()),
            session: SessionBroadcaster::new(state),
        }
    }

    pub fn get(&self) -> Option<TokenPair> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|pair| pair.access().to_string())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.current().authenticated
    }

    pub fn session(&self) -> SessionState {
        self.session.current()
    }

    pub fn subscribe(&self) -> SessionStream {
        self.session.subscribe()
    }

    /// Persists `pair` and marks the session authenticated.
    ///
    /// On a storage error nothing changes in memory.
    pub async fn set(&self, pair: TokenPair) -> Result<(), StorageError> {
        let _writer = self.writer.lock().await;
        self.store_pair(pair).await
    }

    /// Drops both tokens and marks the session unauthenticated.
    ///
    /// Memory is cleared even if the storage removal fails, so a failing disk
    /// can never keep a logged-out user signed in; the error is still returned.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let _writer = self.writer.lock().await;
        self.drop_pair().await
    }

    /// Applies `next` (a new pair, or `None` to sign out) only if the stored
    /// refresh token is still `expected_refresh`.
    ///
    /// Returns `Ok(false)` without touching anything when the session moved on
    /// in the meantime (logout, or a new login).
    pub async fn replace_if_current(
        &self,
        expected_refresh: &str,
        next: Option<TokenPair>,
    ) -> Result<bool, StorageError> {
        let _writer = self.writer.lock().await;

        let unchanged = self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|pair| pair.refresh() == expected_refresh);
        if !unchanged {
            return Ok(false);
        }

        match next {
            Some(pair) => self.store_pair(pair).await?,
            None => self.drop_pair().await?,
        }
        Ok(true)
    }

    // Callers hold `writer`.
    async fn store_pair(&self, pair: TokenPair) -> Result<(), StorageError> {
        self.storage.save(&pair).await?;
        let state = SessionState::from_access_token(pair.access());
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(pair);

        if self.session.publish(state) {
            debug!(
                event_name = "token_store.session.changed",
                event_domain = "session",
                authenticated = true,
                "session state published"
            );
        }
        Ok(())
    }

    // Callers hold `writer`.
    async fn drop_pair(&self) -> Result<(), StorageError> {
        let removed = self.storage.remove().await;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;

        if self.session.publish(SessionState::signed_out()) {
            info!(
                event_name = "token_store.session.cleared",
                event_domain = "session",
                authenticated = false,
                "session cleared"
            );
        }
        removed
    }
}
