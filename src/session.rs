//! Session state broadcasting.
//!
//! The token store publishes every transition here; the UI layer subscribes
//! to learn when it has to route to or away from the login screen. Only the
//! latest value is kept, so a slow observer may skip intermediate states but
//! always sees the final one.

use futures::stream::{self, Stream};
use tokio::sync::watch;

use crate::models::SessionState;

/// Multi-subscriber observable of the current [`SessionState`].
pub struct SessionBroadcaster {
    sender: watch::Sender<SessionState>,
}

impl SessionBroadcaster {
    pub fn new(initial: SessionState) -> Self {
        let (sender, _) = watch::channel(initial);
        SessionBroadcaster { sender }
    }

    /// Stream of the "is authenticated" flag, starting with the current value.
    pub fn subscribe(&self) -> SessionStream {
        SessionStream {
            receiver: self.sender.subscribe(),
            last: None,
        }
    }

    pub fn current(&self) -> SessionState {
        self.sender.borrow().clone()
    }

    /// Replaces the state; subscribers are only woken when it actually changed.
    pub(crate) fn publish(&self, state: SessionState) -> bool {
        self.sender.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        })
    }
}

/// Receiving side of [`SessionBroadcaster::subscribe`].
///
/// Yields the current flag on the first call, then one value per change of
/// the flag. Consecutive identical values are collapsed.
pub struct SessionStream {
    receiver: watch::Receiver<SessionState>,
    last: Option<bool>,
}

impl SessionStream {
    /// Waits for the next flag value. `None` once the broadcaster is gone.
    pub async fn next(&mut self) -> Option<bool> {
        loop {
            if self.last.is_some() && self.receiver.changed().await.is_err() {
                return None;
            }
            let authenticated = self.receiver.borrow_and_update().authenticated;
            if self.last != Some(authenticated) {
                self.last = Some(authenticated);
                return Some(authenticated);
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = bool> {
        stream::unfold(self, |mut session| async move {
            let value = session.next().await?;
            Some((value, session))
        })
    }
}
