//! Single-flight credential refresh.
//!
//! Many requests can fail with 401 at the same moment because they were all
//! sent with the same expired access token. Only the first of them starts a
//! refresh; the rest queue up as waiters and receive a clone of its outcome.
//! A request whose token was already replaced skips the queue entirely.
//!
//! The state lock is a plain `std::sync::Mutex` that is never held across an
//! `.await`: it guards inspection and transition only. The network call runs
//! on its own task so that dropping any caller (for instance on the caller's
//! own timeout) cannot cancel a refresh that other callers wait on.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::{RefreshClient, RefreshOutcome};
use crate::error::RefreshFailure;
use crate::models::{token_preview, TokenPair};
use crate::store::TokenStore;
use crate::utils::log_throttle::LogThrottle;

const FAST_PATH_LOG_WINDOW: Duration = Duration::from_secs(30);

/// The refresh in flight and everyone waiting for it.
struct PendingRefresh {
    trigger_token: String,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

enum State {
    Idle,
    Refreshing(PendingRefresh),
}

struct Inner {
    store: Arc<TokenStore>,
    client: Arc<dyn RefreshClient>,
    refresh_timeout: Duration,
    state: Mutex<State>,
    throttle: LogThrottle,
}

/// Coordinates refreshes for one [`TokenStore`]. Cheap to clone; clones share
/// the same state machine.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<TokenStore>,
        client: Arc<dyn RefreshClient>,
        refresh_timeout: Duration,
    ) -> Self {
        RefreshCoordinator {
            inner: Arc::new(Inner {
                store,
                client,
                refresh_timeout,
                state: Mutex::new(State::Idle),
                throttle: LogThrottle::new(FAST_PATH_LOG_WINDOW),
            }),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.inner.lock_state(), State::Refreshing(_))
    }

    /// Obtains a usable access token after a request made with `failed_token`
    /// was rejected.
    ///
    /// Returns immediately if the stored token already moved on. Otherwise
    /// joins the refresh in flight, or starts one.
    pub async fn request_refresh(&self, failed_token: &str) -> RefreshOutcome {
        let receiver = {
            let mut state = self.inner.lock_state();

            match self.inner.store.access_token() {
                Some(current) if current != failed_token => {
                    if let Some(suppressed_count) =
                        self.inner.throttle.should_emit("refresh.fast_path")
                    {
                        debug!(
                            event_name = "refresh.fast_path",
                            event_domain = "auth",
                            suppressed_count,
                            "token already replaced, retrying without refresh"
                        );
                    }
                    return RefreshOutcome::NewAccessToken(current);
                }
                None => {
                    debug!(
                        event_name = "refresh.session_cleared",
                        event_domain = "auth",
                        "no session left to refresh"
                    );
                    return RefreshOutcome::Failed(RefreshFailure::SessionCleared);
                }
                Some(_) => {}
            }

            let (sender, receiver) = oneshot::channel();
            match &mut *state {
                State::Refreshing(pending) => {
                    pending.waiters.push(sender);
                    if let Some(suppressed_count) =
                        self.inner.throttle.should_emit("refresh.joined")
                    {
                        debug!(
                            event_name = "refresh.joined",
                            event_domain = "auth",
                            trigger = token_preview(&pending.trigger_token).as_str(),
                            waiters = pending.waiters.len(),
                            suppressed_count,
                            "joined refresh in flight"
                        );
                    }
                }
                State::Idle => {
                    info!(
                        event_name = "refresh.started",
                        event_domain = "auth",
                        trigger = token_preview(failed_token).as_str(),
                        "access token rejected, refreshing credentials"
                    );
                    *state = State::Refreshing(PendingRefresh {
                        trigger_token: failed_token.to_string(),
                        waiters: vec![sender],
                    });
                    let inner = Arc::clone(&self.inner);
                    tokio::spawn(inner.run_refresh());
                }
            }
            receiver
        };

        receiver.await.unwrap_or_else(|_| {
            RefreshOutcome::Failed(RefreshFailure::Aborted(
                "refresh task ended without an outcome".into(),
            ))
        })
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drives one refresh cycle to completion and releases every waiter.
    async fn run_refresh(self: Arc<Self>) {
        let outcome = match self.store.get() {
            None => RefreshOutcome::Failed(RefreshFailure::NoRefreshToken),
            Some(pair) => {
                let sent = pair.refresh().to_string();
                match AssertUnwindSafe(self.perform_refresh(pair)).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        error!("Refresh task panicked; signing out");
                        let failure = RefreshFailure::Aborted("refresh task panicked".into());
                        self.discard_session(&sent, failure).await
                    }
                }
            }
        };

        let finished = std::mem::replace(&mut *self.lock_state(), State::Idle);
        let waiters = match finished {
            State::Refreshing(pending) => pending.waiters,
            State::Idle => Vec::new(),
        };

        match &outcome {
            RefreshOutcome::NewAccessToken(token) => info!(
                event_name = "refresh.succeeded",
                event_domain = "auth",
                token = token_preview(token).as_str(),
                waiters = waiters.len(),
                "credentials refreshed"
            ),
            RefreshOutcome::Failed(failure) => warn!(
                event_name = "refresh.failed",
                event_domain = "auth",
                reason = %failure,
                waiters = waiters.len(),
                "credential refresh failed, session cleared"
            ),
        }

        for waiter in waiters {
            // A dropped receiver means that caller gave up; the others still get it.
            let _ = waiter.send(outcome.clone());
        }
    }

    /// Network refresh plus the store transition. The store is updated before
    /// the coordinator goes back to idle, so a late 401 for the old token
    /// takes the fast path instead of starting a second cycle.
    ///
    /// Both transitions are conditional on `pair` still being the stored
    /// session: a logout or login that lands while the call is outstanding
    /// wins over the network result.
    async fn perform_refresh(&self, pair: TokenPair) -> RefreshOutcome {
        let sent = pair.refresh();
        let result = match timeout(self.refresh_timeout, self.client.refresh(sent)).await {
            Ok(result) => result,
            Err(_) => Err(RefreshFailure::Timeout),
        };

        let failure = match result {
            Ok(new_pair) => {
                let access = new_pair.access().to_string();
                match self.store.replace_if_current(sent, Some(new_pair)).await {
                    Ok(true) => return RefreshOutcome::NewAccessToken(access),
                    Ok(false) => return self.superseded(),
                    Err(e) => RefreshFailure::Storage(e.to_string()),
                }
            }
            Err(failure) => failure,
        };

        self.discard_session(sent, failure).await
    }

    /// Signs out the session that was refreshed with `sent`, unless it has
    /// already been replaced.
    async fn discard_session(&self, sent: &str, failure: RefreshFailure) -> RefreshOutcome {
        match self.store.replace_if_current(sent, None).await {
            Ok(true) => {}
            Ok(false) => return self.superseded(),
            Err(e) => error!("Failed to remove persisted session: {}", e),
        }
        RefreshOutcome::Failed(failure)
    }

    /// Outcome for a cycle whose session changed under it: whatever the store
    /// holds now.
    fn superseded(&self) -> RefreshOutcome {
        debug!(
            event_name = "refresh.superseded",
            event_domain = "auth",
            "session changed during refresh, discarding network result"
        );
        match self.store.access_token() {
            Some(current) => RefreshOutcome::NewAccessToken(current),
            None => RefreshOutcome::Failed(RefreshFailure::SessionCleared),
        }
    }
}
